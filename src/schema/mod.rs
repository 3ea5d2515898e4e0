//! Interaction log schema
//!
//! This module defines the input records (one interaction of a user with a
//! vocabulary item), their validation, and the entity identity used to
//! group them.

mod adapter;
mod event;

pub use adapter::*;
pub use event::*;
