// OnlyRepo - File manager client core
// Paginated, epoch-guarded listing of a remote file store

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod media;
pub mod session;

pub use config::ClientConfig;
pub use controller::{
    FetchOutcome, FolderLocation, ListController, LoadPhase, ScrollMetrics, SessionFollower,
    UploadReport, ViewCoordinates,
};
pub use error::ClientError;
pub use gateway::{HttpGateway, MutationKind, ResourceEntry, ResourceGateway};
pub use media::MediaType;
pub use session::{Session, SessionProvider, TokenSession};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "onlyrepo=info";

/// Install the global tracing subscriber (stderr, `RUST_LOG` aware).
/// Calling it again is harmless.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(val) if !val.trim().is_empty() => tracing_subscriber::EnvFilter::new(val),
        _ => tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
