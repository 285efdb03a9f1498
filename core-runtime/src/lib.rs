//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//! - Platform selection
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the event broadcasting mechanism
//! and the rules deciding which streaming platform is active.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod platform;

pub use error::{Error, Result};
pub use platform::{Platform, PlatformOverrides, PlatformSelector, ResolverScope};
