//! Text markup rules. Only the file embed rule lives here.

pub mod embed;
pub mod handler;
pub mod options;
