//! Core runtime types for Cb
//!
//! This module provides the value type shared by the interpreter and the
//! async task scheduler.

pub mod runtime_value;
pub use runtime_value::*;

#[cfg(test)]
mod tests;
