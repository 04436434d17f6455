pub mod cli;
pub mod commands;
pub mod core;
pub mod export;
pub mod ingest;
pub mod pipeline;
pub mod providers;
pub mod raster;
pub mod security;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SCAN_ASSEMBLER_LOG";

fn log_level_from_env() -> &'static str {
    match std::env::var(LOG_ENV)
        .unwrap_or_else(|_| "info".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Installs the stderr subscriber. Safe to call more than once.
pub fn init_tracing() {
    let env_filter = EnvFilter::new(format!(
        "{},pdfium_render=warn,reqwest=warn",
        log_level_from_env()
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
