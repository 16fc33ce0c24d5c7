use std::sync::Arc;

use tokio::sync::Mutex;
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result, lsp_types::*};
use tracing::debug;

use crate::{info_cache::InfoCache, source_info::SourceInfo, utils::default};

pub struct MyktServer {
    client: Client,
    info_cache: Arc<Mutex<InfoCache>>,
}

impl MyktServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            info_cache: Arc::new(Mutex::new(InfoCache::default())),
        }
    }

    // Stores the new document contents and publishes the problems found while analyzing them
    async fn update_document(&self, uri: Uri, script: String, version: i32) {
        let uri = Arc::new(uri);

        let diagnostics = {
            let mut info_cache = self.info_cache.lock().await;
            info_cache.update(uri.clone(), script);
            match info_cache.get(&uri) {
                Some(info) => diagnostics(info),
                None => return,
            }
        };

        self.client
            .publish_diagnostics(uri.as_ref().clone(), diagnostics, Some(version))
            .await;
    }
}

// Parse errors, followed by warnings for imports that couldn't be resolved
fn diagnostics(info: &SourceInfo) -> Vec<Diagnostic> {
    let errors = info.errors().iter().map(|error| Diagnostic {
        range: error.range(),
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("mykt".into()),
        message: error.to_string(),
        ..default()
    });

    let warnings = info.import_warnings().iter().map(|import| Diagnostic {
        range: import.range,
        severity: Some(DiagnosticSeverity::WARNING),
        source: Some("mykt".into()),
        message: import.warning.to_string(),
        ..default()
    });

    errors.chain(warnings).collect()
}

impl LanguageServer for MyktServer {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                ..default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, concat!(env!("CARGO_PKG_NAME"), " ready"))
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        debug!(uri = doc.uri.as_str(), "Document opened");
        self.update_document(doc.uri, doc.text, doc.version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync is used, so the last change contains the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            let doc = params.text_document;
            self.update_document(doc.uri, change.text, doc.version).await;
        } else {
            debug!("Change notification without content changes");
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.info_cache.lock().await.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let result = self
            .info_cache
            .lock()
            .await
            .get(&uri)
            .and_then(|info| info.get_definition(position))
            .map(|definition| GotoDefinitionResponse::Link(vec![definition.into()]));

        if result.is_none() {
            debug!(uri = uri.as_str(), ?position, "No definition found");
        }

        Ok(result)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;

        let result = self
            .info_cache
            .lock()
            .await
            .get(&uri)
            .map(|info| DocumentSymbolResponse::Nested(info.document_symbols()));

        Ok(result)
    }
}
