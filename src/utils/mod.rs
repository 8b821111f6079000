//! Shared helpers with no workflow semantics of their own.

pub mod collections;
pub mod json_ext;
