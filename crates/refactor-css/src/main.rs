use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter, checked before `RUST_LOG`
const LOG_ENV: &str = "REFACTOR_CSS_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "--version" || arg == "-V") {
        println!("refactor-css {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // stdout carries the protocol, so logs go to stderr
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::info!("refactor-css {} starting", env!("CARGO_PKG_VERSION"));
    refactor_css::lsp::run()
        .await
        .wrap_err("Language server stopped unexpectedly")
}
