//! Asset-inventory API adapter.
//!
//! Talks to the inventory's paginated HTTP API under its read and
//! write quotas. The inventory is the authoritative source for assets
//! and a convergence target for user accounts.

pub mod client;
pub mod config;
pub mod rate_limit;
pub mod sync;

pub use client::{department_name, DepartmentIndex, InventoryClient, InventoryUserId, API_PREFIX};
pub use config::InventoryConfig;
pub use rate_limit::{RateLimit, RateLimiter};
pub use sync::{InventoryAssetSource, InventoryUserSink, InventoryUserSource};
