//! Foundation module - Core utilities and types
//!
//! Fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Time management
//! - Logging utilities

pub mod math;
pub mod time;
pub mod logging;
