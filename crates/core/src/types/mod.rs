//! Core types for the Covey shop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::round2;
pub use status::{OrderStatus, ParseOrderStatusError};
