//! CLI command implementations.

pub mod copy;
pub mod count;
pub mod head;
