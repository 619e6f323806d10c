pub mod config;
pub mod confirm;
pub mod drives_fetcher;
pub mod missing_drives;
pub mod parse_csv;
pub mod ratings_importer;
pub mod resync;
pub mod types;

/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
