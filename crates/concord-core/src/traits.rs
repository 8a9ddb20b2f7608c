//! Adapter contracts.

use async_trait::async_trait;

use crate::error::AdapterResult;
use crate::reconcile::Action;
use crate::record::{Keyed, Snapshot};

/// A system we can read a full snapshot from.
///
/// Implementations paginate internally; any page failure fails the
/// whole fetch, never yielding a partial snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Record type this source yields.
    type Record: Keyed + Send;

    /// Short system name used in logs ("directory", "inventory", ...).
    fn system(&self) -> &'static str;

    /// Fetch the complete snapshot for this pass.
    async fn fetch_all(&self) -> AdapterResult<Snapshot<Self::Record>>;
}

/// A system that consumes reconciliation actions.
///
/// Each application is independent: a failure is reported through the
/// returned error and must not poison subsequent actions.
#[async_trait]
pub trait ActionSink<A: Send + Sync, L: Send + Sync>: Send + Sync {
    /// Short system name used in logs.
    fn system(&self) -> &'static str;

    /// Apply one action against the target system.
    async fn apply(&self, action: &Action<A, L>) -> AdapterResult<()>;
}
