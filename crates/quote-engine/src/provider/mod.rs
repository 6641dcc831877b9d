//! Quote provider abstraction and the HTTP client.
//!
//! - [`QuoteProvider`]: the seam the orchestrator calls through
//! - [`ProviderClient`]: HTTP implementation with mock mode, retry and parsing
//! - [`ProviderMapping`]: per-provider request dialects

mod client;
pub mod mapping;
pub mod mock;
pub mod normalize;
pub mod retry;
mod traits;

pub use client::ProviderClient;
pub use mapping::ProviderMapping;
pub use traits::{ProviderCall, QuoteProvider};
