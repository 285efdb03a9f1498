//! Workspace entry crate.
//!
//! Re-exports the service context so host applications can depend on a single
//! crate and toggle the documented feature flags (`desktop-shims`) instead of
//! wiring each workspace crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
