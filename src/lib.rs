//! `tubemux` - Resilient video metadata and stream resolution
//!
//! # Features
//!
//! - **Provider rotation**: liveness probes and a rotating cursor over
//!   interchangeable public mirrors
//! - **Two schemas**: page-number (`/api/v1`) and cursor-paginated mirror
//!   families, normalized into one record shape
//! - **Bounded retries**: fixed delay, per-attempt timeout, no unbounded loops
//! - **Cached pagination**: prefix reads never touch the network, appends
//!   are deduplicated by identifier
//! - **Stream fallback chain**: every primary mirror, then every secondary
//!   mirror, first usable manifest wins
//!
//! # Example
//!
//! ```rust,no_run
//! use tubemux::{EngineConfig, QueryKey, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(EngineConfig::load()?)?;
//!
//!     let music = session.get_page(&QueryKey::category("Music"), 10, false).await;
//!     for record in &music {
//!         println!("{} - {} ({})", record.title, record.author, record.views);
//!     }
//!
//!     if let Some(first) = music.first() {
//!         let manifest = session.resolve_stream(&first.id).await?;
//!         println!("{:?}", manifest.preferred_url());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod paginate;
pub mod provider;
pub mod session;
pub mod stream;
pub mod transport;

pub use cache::{QueryKey, QueryKind, ResultCache};
pub use config::EngineConfig;
pub use debounce::Debouncer;
pub use error::{
    AttemptCause, ConfigError, FetchError, ResolveAttempt, ResolveError, Result, SessionError,
};
pub use fetch::{FetchEngine, Providers};
pub use normalize::CanonicalRecord;
pub use paginate::{category_endpoint, Paginator, DEFAULT_CATEGORY};
pub use provider::{
    Continuation, FamilySchema, LogicalEndpoint, MetadataRequest, Page, ProbeStrategy,
    ProviderEndpoint, ProviderFamily, ProviderTracker,
};
pub use session::Session;
pub use stream::{Quality, StreamManifest, StreamResolver};
pub use transport::{with_timeout, HttpTransport, ReqwestTransport};

/// Version of tubemux
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
