//! Helpdesk database adapter.
//!
//! The helpdesk is a convergence target for both passes: assets land
//! in a custom list, users in the user/account/contact-form tables.
//! All access goes through [`HelpdeskStore`], which validates the
//! configured field-id tables against the live schema on connect.

pub mod assets;
pub mod config;
pub mod store;
pub mod users;

pub use assets::{
    decode_properties, encode_properties, HelpdeskAssetSink, HelpdeskAssetSource, HelpdeskItemId,
};
pub use config::HelpdeskConfig;
pub use store::HelpdeskStore;
pub use users::{HelpdeskUserLinkage, HelpdeskUserSink, HelpdeskUserSource};
