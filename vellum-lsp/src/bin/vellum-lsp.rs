use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;
use vellum_analysis::{Format, Settings};
use vellum_config::Loader;
use vellum_lsp::VellumLanguageServer;

#[tokio::main]
async fn main() {
    let mut loader = Loader::new().with_user_file("vellum.toml");
    if let Ok(level) = std::env::var("VELLUM_LOG") {
        loader = loader.with_log_level(&level).unwrap_or_else(|err| {
            eprintln!("vellum-lsp: bad VELLUM_LOG: {}", err);
            std::process::exit(2);
        });
    }
    let config = loader.build().unwrap_or_else(|err| {
        eprintln!("vellum-lsp: bad configuration: {}", err);
        std::process::exit(2);
    });

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        default_format: Format::from_id(&config.documents.default_format),
        search_paths: config.completion.search_paths.clone(),
    };
    let snippets = config.completion.snippets;

    let (service, socket) =
        LspService::new(move |client| VellumLanguageServer::with_settings(client, settings, snippets));
    Server::new(stdin(), stdout(), socket).serve(service).await;
}
