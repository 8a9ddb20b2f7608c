//! Core of the concord reconciliation engine.
//!
//! Concord converges downstream systems of record (an asset-inventory
//! HTTP API, a helpdesk database) on authoritative sources (a
//! directory service for people, the inventory itself for assets),
//! one direction only. This crate holds everything that decides:
//!
//! - [`record`]: canonical records, per-run snapshots, target entries,
//! - [`mapper`]: the field-level normalization rules,
//! - [`fields`]: the numeric field-id tables for the helpdesk forms,
//! - [`diff`] and [`reconcile`]: the change-detection and decision
//!   engine,
//! - [`traits`] and [`pipeline`]: the adapter contracts and the pass
//!   driver.
//!
//! Adapters that actually talk to the outside world live in their own
//! crates and implement the contracts defined here.

pub mod diff;
pub mod error;
pub mod fields;
pub mod mapper;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod traits;

pub use error::{AdapterError, AdapterResult};
pub use pipeline::{apply_all, converge, ApplyStats, PassSummary};
pub use reconcile::{reconcile, AbsencePolicy, Action, ActionKind, ReconcileOptions};
pub use record::{AssetRecord, FieldMap, FieldView, Keyed, Snapshot, TargetEntry, UserRecord};
pub use traits::{ActionSink, SnapshotSource};
