use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_DIR: &str = "./logs";
const LOG_FILE: &str = "ratings_api.log";

/// Console filter: `RUST_LOG` when set, INFO otherwise.
fn console_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"))
}

/// Initialize tracing with console and daily rolling file output
///
/// - console (stdout): INFO and above, or whatever `RUST_LOG` says
/// - file (`./logs/ratings_api.log.YYYY-MM-DD`): DEBUG and above for this
///   crate and the HTTP trace layer, INFO for dependencies
///
/// The returned guard owns the background writer of the file layer; keep it
/// alive for the whole program (`let _guard = init_tracing();`) or buffered
/// lines are lost on shutdown.
pub fn init_tracing() -> WorkerGuard {
    let file_appender = rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("info,ratings_api=debug,tower_http=debug"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(console_filter());

    // Panics if a global subscriber is already set; call once from main
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
