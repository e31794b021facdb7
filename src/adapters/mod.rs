//! HTTP adapters for the remote data sources.
//!
//! All adapters degrade gracefully: a failed call becomes a warning at the
//! panel boundary, never a failed request.

pub mod gleif;
pub mod openaire;
pub mod semantic_scholar;

pub use gleif::{GleifResolver, ResolvedEntity};
pub use openaire::OpenAireClient;
pub use semantic_scholar::SemanticScholarClient;
