//! # Host Bridge Traits
//!
//! Capability contracts the playback core requires from its host.
//!
//! ## Overview
//!
//! This crate defines the boundary between the core and the environment it runs
//! in. Each trait is a capability the core consumes but never implements for a
//! specific platform itself (desktop, browser shell, tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests against streaming platform APIs
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable client-side key-value storage
//!   (queue snapshot, active platform preference, credential markers)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Host | Implementation Crate |
//! |------|---------------------|
//! | Desktop | `bridge-desktop` (`SqliteSettingsStore`, `ReqwestHttpClient`) |
//! | Tests / development | this crate ([`MemorySettingsStore`](storage::MemorySettingsStore), [`ConsoleLogger`](time::ConsoleLogger)) |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert host-specific failures into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so handles can be shared as
//! `Arc<dyn Trait>` across async tasks.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{MemorySettingsStore, SettingsStore};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
