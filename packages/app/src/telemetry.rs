use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the process-wide tracing subscriber.
///
/// Call once from the embedding application's entry point. `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,app_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
