//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scene core:
//! - Math types and operations
//! - Arena keys for spatials
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
