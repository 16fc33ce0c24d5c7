mod imports;
mod info_cache;
mod locator;
mod server;
mod source_info;
mod symbol_builder;
mod symbol_table;
mod syntax;
mod utils;

use crate::server::MyktServer;
use tower_lsp_server::{LspService, Server};

#[tokio::main]
async fn main() {
    #[cfg(feature = "log")]
    {
        // stdout is reserved for the protocol
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());
    let (service, socket) = LspService::new(MyktServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
