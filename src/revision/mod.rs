//! Code review revisions and their status field.

pub mod handler;
pub mod status_field;
