// Logging goes to stderr: stdout carries the JSON-RPC stream when serving.
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Pretty output when `debug` is set, JSON lines otherwise. A valid
/// `RUST_LOG` replaces `level` and the per-crate filter entirely.
pub fn init_logging(debug: bool, level: Option<&str>) {
    let level = match (debug, level) {
        (true, _) => "debug",
        (false, Some(level)) => level,
        (false, None) => "info",
    };
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (env_filter, app_filter) = filters(level, rust_log.as_deref());

    let pretty = debug.then(|| {
        fmt::layer()
            .pretty()
            .without_time()
            .with_writer(std::io::stderr)
    });
    let json = (!debug).then(|| fmt::layer().json().with_writer(std::io::stderr));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(app_filter)
        .with(env_filter)
        .try_init();
}

/// Without `RUST_LOG`, this crate logs at `level` and dependencies at warn.
fn filters(level: &str, rust_log: Option<&str>) -> (EnvFilter, Option<Targets>) {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return (filter, None);
    }
    let level_filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let app_filter = Targets::new()
        .with_target("tcmb_mcp", level_filter)
        .with_target("tcmb", level_filter)
        .with_default(LevelFilter::WARN);
    (EnvFilter::new(level), Some(app_filter))
}
