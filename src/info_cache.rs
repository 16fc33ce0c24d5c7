use std::{collections::HashMap, sync::Arc};

use tower_lsp_server::lsp_types::Uri;

use crate::source_info::SourceInfo;

/// Open documents and their analysis, keyed by uri
///
/// Analysis happens lazily on the first request for a document's info, and any update to the
/// document's contents discards the previous analysis.
#[derive(Default)]
pub struct InfoCache {
    entries: HashMap<Arc<Uri>, Entry>,
}

struct Entry {
    uri: Arc<Uri>,
    script: String,
    info: Option<SourceInfo>,
}

impl InfoCache {
    /// Stores a document's new contents, invalidating its cached analysis
    pub fn update(&mut self, uri: Arc<Uri>, script: String) {
        self.entries.insert(
            uri.clone(),
            Entry {
                uri,
                script,
                info: None,
            },
        );
    }

    pub fn remove(&mut self, uri: &Uri) {
        self.entries.remove(uri);
    }

    /// Returns the document's analysis, analyzing the document if needed
    pub fn get(&mut self, document: &Uri) -> Option<&SourceInfo> {
        let Entry { uri, script, info } = self.entries.get_mut(document)?;
        Some(info.get_or_insert_with(|| SourceInfo::new(script, uri.clone())))
    }

    #[cfg(test)]
    fn is_analyzed(&self, uri: &Uri) -> bool {
        self.entries
            .get(uri)
            .is_some_and(|entry| entry.info.is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    use tower_lsp_server::lsp_types::Position;

    fn test_uri() -> Arc<Uri> {
        Arc::new(Uri::from_str("file:///test.mykt").unwrap())
    }

    fn position(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn analysis_is_lazy() {
        let mut cache = InfoCache::default();
        let uri = test_uri();

        cache.update(uri.clone(), "var a = 1".into());
        assert!(!cache.is_analyzed(&uri));

        assert!(cache.get(&uri).is_some());
        assert!(cache.is_analyzed(&uri));
    }

    #[test]
    fn updates_invalidate_the_analysis() {
        let mut cache = InfoCache::default();
        let uri = test_uri();

        cache.update(uri.clone(), "var a = 1\na".into());
        let before = cache.get(&uri).and_then(|info| info.get_definition(position(1, 0)));
        assert_eq!(
            before.map(|d| d.declaration.selection_range.start),
            Some(position(0, 4))
        );

        cache.update(uri.clone(), "\n\nvar a = 2\na".into());
        assert!(!cache.is_analyzed(&uri));

        // The old declaration location must not survive the change
        let stale = cache.get(&uri).and_then(|info| info.get_definition(position(1, 0)));
        assert!(stale.is_none());
        let after = cache.get(&uri).and_then(|info| info.get_definition(position(3, 0)));
        assert_eq!(
            after.map(|d| d.declaration.selection_range.start),
            Some(position(2, 4))
        );
    }

    #[test]
    fn removed_documents_have_no_info() {
        let mut cache = InfoCache::default();
        let uri = test_uri();

        cache.update(uri.clone(), "var a = 1".into());
        cache.remove(&uri);

        assert!(cache.get(&uri).is_none());
        assert!(!cache.is_analyzed(&uri));
    }
}
