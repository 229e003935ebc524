//! Artifact publication: the index of built packages, the store layout they
//! live in, and the lock that serializes builds against one artifact root.

pub mod index;
pub mod lock;
pub mod store;
mod types;

pub use index::{ArtifactIndex, PublishError, PublishOutcome};
pub use lock::{ArtifactLockError, ArtifactRootLock, LockMode};
pub use store::StoreLayout;
pub use types::{Artifact, ArtifactKey};
