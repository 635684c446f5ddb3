use crate::engine::{Engine, EngineConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber from `RUST_LOG`. Safe to call many
/// times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Background intervals set far longer than any test's runtime, so tests
/// that want deterministic compaction/deletion call `compact_now` /
/// `run_deletion_now` explicitly instead of racing a timer.
pub fn quiet_config() -> EngineConfig {
    init_tracing();
    EngineConfig {
        compaction_interval: Duration::from_secs(3600),
        deletion_interval: Duration::from_secs(3600),
        ..EngineConfig::default()
    }
}

/// Opens an engine at `path` with background tasks effectively disabled.
pub fn open(path: &std::path::Path) -> Engine {
    Engine::open(path, quiet_config()).expect("open")
}
