//! One reconciliation pass: fetch target, decide, apply, summarize.

use tracing::{error, info};

use crate::error::{AdapterError, AdapterResult};
use crate::reconcile::{reconcile, Action, ActionKind, ReconcileOptions};
use crate::record::{FieldView, Keyed, Snapshot, TargetEntry};
use crate::traits::{ActionSink, SnapshotSource};

/// Counters for one application run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub disabled: usize,
    pub removed: usize,
    pub failed: usize,
}

impl ApplyStats {
    pub fn attempted(&self) -> usize {
        self.created + self.updated + self.disabled + self.removed + self.failed
    }
}

/// Outcome of one pass against one target system.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub system: &'static str,
    pub authoritative: usize,
    pub target: usize,
    pub planned: usize,
    pub stats: ApplyStats,
    pub dry_run: bool,
}

/// Apply every action sequentially. Failures are logged with full
/// context and counted; the queue always runs to completion.
pub async fn apply_all<A, L, S>(sink: &S, actions: &[Action<A, L>]) -> ApplyStats
where
    A: Keyed + Send + Sync,
    L: Send + Sync,
    S: ActionSink<A, L> + ?Sized,
{
    let mut stats = ApplyStats::default();
    for action in actions {
        match sink.apply(action).await {
            Ok(()) => match action.kind() {
                ActionKind::Create => stats.created += 1,
                ActionKind::Update => stats.updated += 1,
                ActionKind::Disable => stats.disabled += 1,
                ActionKind::Remove => stats.removed += 1,
            },
            Err(e) => {
                error!(
                    system = sink.system(),
                    key = %action.key(),
                    kind = %action.kind(),
                    error = %e,
                    "action failed, continuing with remaining queue"
                );
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Run one full pass: fetch the target snapshot, reconcile it against
/// the already-fetched authoritative snapshot, and apply the actions.
///
/// The authoritative snapshot is a parameter so callers can fetch it
/// once and converge several targets on it. A target fetch failure is
/// fatal to the pass and is surfaced before anything is written.
pub async fn converge<A, L, ST, SK>(
    authoritative: &Snapshot<A>,
    target: &ST,
    sink: &SK,
    options: &ReconcileOptions,
    dry_run: bool,
) -> AdapterResult<PassSummary>
where
    A: Keyed + FieldView + Clone + Send + Sync,
    L: Clone + Send + Sync,
    ST: SnapshotSource<Record = TargetEntry<L>>,
    SK: ActionSink<A, L>,
{
    let target_snapshot = target
        .fetch_all()
        .await
        .map_err(|e| AdapterError::source_fetch(target.system(), e))?;

    let actions = reconcile(authoritative, &target_snapshot, options)?;
    info!(
        system = sink.system(),
        authoritative = authoritative.len(),
        target = target_snapshot.len(),
        planned = actions.len(),
        "reconciliation computed"
    );

    let stats = if dry_run {
        for action in &actions {
            info!(
                system = sink.system(),
                kind = %action.kind(),
                key = %action.key(),
                "dry-run: would apply"
            );
        }
        ApplyStats::default()
    } else {
        apply_all(sink, &actions).await
    };

    Ok(PassSummary {
        system: sink.system(),
        authoritative: authoritative.len(),
        target: target_snapshot.len(),
        planned: actions.len(),
        stats,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::AbsencePolicy;
    use crate::record::{AssetRecord, FieldView};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn asset(id: u64, model: &str) -> AssetRecord {
        AssetRecord {
            inventory_id: id,
            manufacturer: "Dell".into(),
            model: model.into(),
            status: "Deployed".into(),
            serial_number: "S".into(),
            asset_tag: "T".into(),
            item_type: "Laptop".into(),
        }
    }

    struct FixedTarget {
        snapshot: Snapshot<TargetEntry<u64>>,
    }

    #[async_trait]
    impl SnapshotSource for FixedTarget {
        type Record = TargetEntry<u64>;

        fn system(&self) -> &'static str {
            "fixture"
        }

        async fn fetch_all(&self) -> AdapterResult<Snapshot<TargetEntry<u64>>> {
            Ok(self.snapshot.clone())
        }
    }

    struct FailingTarget;

    #[async_trait]
    impl SnapshotSource for FailingTarget {
        type Record = TargetEntry<u64>;

        fn system(&self) -> &'static str {
            "fixture"
        }

        async fn fetch_all(&self) -> AdapterResult<Snapshot<TargetEntry<u64>>> {
            Err(AdapterError::Http {
                message: "connection refused".into(),
                source: None,
            })
        }
    }

    /// Records applied kinds; fails every action whose key is listed.
    struct RecordingSink {
        fail_keys: Vec<String>,
        seen: Mutex<Vec<(ActionKind, String)>>,
    }

    impl RecordingSink {
        fn new(fail_keys: &[&str]) -> Self {
            Self {
                fail_keys: fail_keys.iter().map(|s| (*s).to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ActionSink<AssetRecord, u64> for RecordingSink {
        fn system(&self) -> &'static str {
            "recording"
        }

        async fn apply(&self, action: &Action<AssetRecord, u64>) -> AdapterResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push((action.kind(), action.key()));
            if self.fail_keys.contains(&action.key()) {
                return Err(AdapterError::invalid_record("simulated failure"));
            }
            Ok(())
        }
    }

    fn mirror(record: &AssetRecord, item_id: u64) -> TargetEntry<u64> {
        let mut entry = TargetEntry::new(record.business_key(), item_id);
        entry.fields = record.fields();
        entry
    }

    #[tokio::test]
    async fn converge_applies_creates_and_removes() {
        let auth: Snapshot<AssetRecord> = [asset(1, "A"), asset(2, "B")].into_iter().collect();
        let target = FixedTarget {
            snapshot: [mirror(&asset(3, "C"), 30)].into_iter().collect(),
        };
        let sink = RecordingSink::new(&[]);

        let opts = ReconcileOptions::new(AbsencePolicy::Remove);
        let summary = converge(&auth, &target, &sink, &opts, false).await.unwrap();

        assert_eq!(summary.planned, 3);
        assert_eq!(summary.stats.created, 2);
        assert_eq!(summary.stats.removed, 1);
        assert_eq!(summary.stats.failed, 0);
    }

    #[tokio::test]
    async fn sink_failure_does_not_abort_the_queue() {
        let auth: Snapshot<AssetRecord> =
            [asset(1, "A"), asset(2, "B"), asset(3, "C")].into_iter().collect();
        let target = FixedTarget {
            snapshot: Snapshot::new(),
        };
        let sink = RecordingSink::new(&["2"]);

        let opts = ReconcileOptions::new(AbsencePolicy::Remove);
        let summary = converge(&auth, &target, &sink, &opts, false).await.unwrap();

        assert_eq!(summary.stats.created, 2);
        assert_eq!(summary.stats.failed, 1);
        // All three were attempted.
        assert_eq!(sink.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn target_fetch_failure_is_fatal_and_nothing_is_applied() {
        let auth: Snapshot<AssetRecord> = [asset(1, "A")].into_iter().collect();
        let sink = RecordingSink::new(&[]);

        let opts = ReconcileOptions::new(AbsencePolicy::Remove);
        let err = converge(&auth, &FailingTarget, &sink, &opts, false)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_plans_but_applies_nothing() {
        let auth: Snapshot<AssetRecord> = [asset(1, "A")].into_iter().collect();
        let target = FixedTarget {
            snapshot: Snapshot::new(),
        };
        let sink = RecordingSink::new(&[]);

        let opts = ReconcileOptions::new(AbsencePolicy::Remove);
        let summary = converge(&auth, &target, &sink, &opts, true).await.unwrap();

        assert_eq!(summary.planned, 1);
        assert_eq!(summary.stats.attempted(), 0);
        assert!(sink.seen.lock().unwrap().is_empty());
    }
}
