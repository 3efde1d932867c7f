//! The Artifact Store Gateway trait.
//!
//! Trimmed from the teacher's `ArtifactStore` (no `prune`/retention
//! policy — out of scope here): a gateway that may or may not be
//! configured, and a single `put` operation.

use async_trait::async_trait;

/// An object store gateway for published documentation artifacts.
/// Implementations must degrade gracefully: `put` is only ever called
/// after `configured()` returns `true`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether this store has the configuration it needs to accept
    /// uploads (credentials, bucket name, ...).
    fn configured(&self) -> bool;

    /// Upload `bytes` under `key`, returning a publicly reachable URL.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, crate::Error>;
}
