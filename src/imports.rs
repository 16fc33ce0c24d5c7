use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use thiserror::Error;
use tower_lsp_server::{UriExt, lsp_types::Uri};
use tracing::{debug, warn};

use crate::{
    symbol_builder::SymbolBuilder,
    syntax::{Import, ParseResult, Parser},
};

/// The extension given to imported files
pub const MYKT_EXTENSION: &str = "mykt";

/// A problem encountered while resolving an import
///
/// These are reported to the user but don't stop the analysis, the import's declarations are
/// simply missing from the symbol table.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ImportWarning {
    #[error("Imported file not found: '{import}' ({})", path.display())]
    NotFound { import: String, path: PathBuf },
    #[error("Imported file could not be read: '{import}' ({}): {detail}", path.display())]
    ReadFailure {
        import: String,
        path: PathBuf,
        detail: String,
    },
}

/// Converts a document identity into a filesystem path
///
/// `file:` URIs are percent-decoded, URIs with other schemes have no path, and anything else
/// is treated as a path and made absolute.
pub fn document_path(document: &str) -> Option<PathBuf> {
    if document.starts_with("file:") {
        let uri = Uri::from_str(document).ok()?;
        let path = uri.to_file_path()?.to_path_buf();
        Some(strip_drive_prefix(path))
    } else if has_uri_scheme(document) {
        None
    } else {
        std::path::absolute(document).ok()
    }
}

// Single letter schemes are left alone, they're drive letters
fn has_uri_scheme(document: &str) -> bool {
    document.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

// Decoding `file:///C:/x` can leave a leading separator in front of the drive letter
fn strip_drive_prefix(path: PathBuf) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path;
    };
    let bytes = text.as_bytes();
    let has_spurious_separator = bytes.len() >= 3
        && matches!(bytes[0], b'/' | b'\\')
        && bytes[1].is_ascii_alphabetic()
        && bytes[2] == b':';
    if has_spurious_separator && cfg!(windows) {
        PathBuf::from(&text[1..])
    } else {
        path
    }
}

/// Returns the file that an import refers to, relative to the importing document
pub fn import_candidate(importer: &Path, import: &str) -> Option<PathBuf> {
    let base = importer.parent()?;
    Some(base.join(format!("{import}.{MYKT_EXTENSION}")))
}

/// Folds the declarations of imported files into a shared [SymbolBuilder]
///
/// Imports are followed transitively. Each file is merged at most once per resolution session,
/// which also breaks import cycles. A file that can't be read isn't marked as merged, every
/// import of it produces a warning.
pub struct ImportResolver {
    visited: HashSet<PathBuf>,
    warnings: Vec<ImportWarning>,
}

impl ImportResolver {
    /// Creates a resolver for a session analyzing the given document
    pub fn new(document: &Uri) -> Self {
        let mut visited = HashSet::new();
        if let Some(path) = document_path(document.as_str()) {
            visited.insert(canonical(&path));
        }
        Self {
            visited,
            warnings: Vec::new(),
        }
    }

    /// Resolves each import of the document at `uri`, walking the imported files into `builder`
    pub fn resolve_imports(
        &mut self,
        imports: impl IntoIterator<Item = Import>,
        builder: &mut SymbolBuilder,
        uri: &Arc<Uri>,
    ) {
        for import in imports {
            if let Err(warning) = self.resolve_import(&import, builder, uri) {
                debug!(%warning, "Import skipped");
                self.warnings.push(warning);
            }
        }
    }

    /// Returns the warnings produced since the last call
    pub fn take_warnings(&mut self) -> Vec<ImportWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn resolve_import(
        &mut self,
        import: &Import,
        builder: &mut SymbolBuilder,
        uri: &Arc<Uri>,
    ) -> Result<(), ImportWarning> {
        let candidate = document_path(uri.as_str())
            .and_then(|importer| import_candidate(&importer, &import.path));
        let path = match candidate {
            Some(path) if path.is_file() => path,
            candidate => {
                return Err(ImportWarning::NotFound {
                    import: import.path.clone(),
                    path: candidate.unwrap_or_else(|| {
                        PathBuf::from(format!("{}.{MYKT_EXTENSION}", import.path))
                    }),
                });
            }
        };

        let canonical_path = canonical(&path);
        if self.visited.contains(&canonical_path) {
            debug!(path = %path.display(), "Already imported");
            return Ok(());
        }

        let script = fs::read_to_string(&path).map_err(|error| {
            warn!(%error, path = %path.display(), "Failed to read imported file");
            ImportWarning::ReadFailure {
                import: import.path.clone(),
                path: path.clone(),
                detail: error.to_string(),
            }
        })?;
        // Only files that were read are marked, so each importer of an unreadable file is warned
        self.visited.insert(canonical_path);

        let Some(import_uri) = Uri::from_file_path(&path) else {
            return Err(ImportWarning::ReadFailure {
                import: import.path.clone(),
                path,
                detail: "the path can't be represented as a URI".into(),
            });
        };
        let import_uri = Arc::new(import_uri);

        let ParseResult { tree, errors } = Parser::parse(&script);
        if !errors.is_empty() {
            debug!(
                uri = import_uri.as_str(),
                count = errors.len(),
                "Imported file has parse errors"
            );
        }

        // The imported file's own imports come first, as they do for the main document
        self.resolve_imports(tree.imports(), builder, &import_uri);
        builder.walk(&tree, &import_uri);

        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
