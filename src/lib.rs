pub mod config;
pub mod error;
pub mod markup;
pub mod project;
pub mod report;
pub mod revision;
pub mod routes;
pub mod storage;
pub mod task;
