use std::sync::Arc;

use tower_lsp_server::lsp_types::{DocumentSymbol, Position, Range, Uri};

use crate::{
    imports::{ImportResolver, ImportWarning},
    locator::{Definition, locate},
    symbol_builder::{SymbolBuilder, declaration_kind, declaration_location},
    symbol_table::SymbolTable,
    syntax::{self, Import, NodeId, ParseResult, Parser, SyntaxTree},
    utils::node_range,
};

/// An import warning, positioned at the import directive that led to it
#[derive(Clone, Debug, PartialEq)]
pub struct ImportDiagnostic {
    pub range: Range,
    pub warning: ImportWarning,
}

/// Analyzed information about the contents of a source file
#[derive(Clone, Debug)]
pub struct SourceInfo {
    uri: Arc<Uri>,
    tree: SyntaxTree,
    // Declarations from the file and everything it imports
    table: SymbolTable,
    errors: Vec<syntax::Error>,
    import_warnings: Vec<ImportDiagnostic>,
}

impl SourceInfo {
    /// Returns a [SourceInfo] containing the result of analyzing the given script
    ///
    /// Imports are resolved before the script's own declarations are added, so that the
    /// script's declarations take precedence over imported ones with the same name.
    pub fn new(script: &str, uri: Arc<Uri>) -> Self {
        let ParseResult { tree, errors } = Parser::parse(script);
        let imports: Vec<Import> = tree.imports().collect();

        let (table, import_warnings) = if imports.is_empty() {
            (SymbolBuilder::build(&tree, &uri), Vec::new())
        } else {
            let mut builder = SymbolBuilder::default();
            let mut resolver = ImportResolver::new(&uri);
            let mut import_warnings = Vec::new();

            for import in imports {
                // Warnings from transitive imports are reported on the top-level import
                let range = node_range(&tree, import.node).unwrap_or_default();
                resolver.resolve_imports([import], &mut builder, &uri);
                import_warnings.extend(
                    resolver
                        .take_warnings()
                        .into_iter()
                        .map(|warning| ImportDiagnostic { range, warning }),
                );
            }

            builder.walk(&tree, &uri);
            (builder.finish(), import_warnings)
        };

        Self {
            uri,
            tree,
            table,
            errors,
            import_warnings,
        }
    }

    pub fn errors(&self) -> &[syntax::Error] {
        &self.errors
    }

    pub fn import_warnings(&self) -> &[ImportDiagnostic] {
        &self.import_warnings
    }

    /// Returns the declaration of the identifier at the given position
    pub fn get_definition(&self, position: Position) -> Option<Definition> {
        let node = self.tree.identifier_at(position)?;
        locate(&self.tree, &self.uri, node, &self.table)
    }

    /// Returns the declarations made in this file, routines contain their parameters and locals
    pub fn document_symbols(&self) -> Vec<DocumentSymbol> {
        let mut symbols = Vec::new();
        self.collect_document_symbols(self.tree.root(), &mut symbols);
        symbols
    }

    fn collect_document_symbols(&self, node: NodeId, symbols: &mut Vec<DocumentSymbol>) {
        for &child in self.tree.children(node) {
            let Some(kind) = declaration_kind(self.tree.kind(child)) else {
                self.collect_document_symbols(child, symbols);
                continue;
            };

            let mut children = Vec::new();
            self.collect_document_symbols(child, &mut children);

            let (Ok(Some(location)), Some(name)) = (
                declaration_location(&self.tree, &self.uri, child),
                self.tree.name(child),
            ) else {
                // Incomplete declarations are left out, but not what they contain
                symbols.extend(children);
                continue;
            };

            #[allow(deprecated)]
            symbols.push(DocumentSymbol {
                name: self.tree.text(name).to_string(),
                detail: None,
                kind: kind.into(),
                tags: None,
                deprecated: None,
                range: location.range,
                selection_range: location.selection_range,
                children: if children.is_empty() {
                    None
                } else {
                    Some(children)
                },
            });
        }
    }
}
