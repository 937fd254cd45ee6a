pub mod resolver;
pub mod types;

use async_trait::async_trait;

pub use resolver::{resolve, ResolveError};
pub use types::Participant;

/// Source of the current meeting roster.
/// Queried fresh on every resolution; implementations must not cache.
#[async_trait]
pub trait ParticipantDirectory {
    async fn participants(&self) -> Vec<Participant>;
}
