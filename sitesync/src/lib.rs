//! Sitesync Library
//!
//! Content-addressed deploy synchronization: hash a directory, ask the
//! remote side which files it is missing, and upload only those.

pub mod app;
pub mod errors;
pub mod http;
pub mod logs;
pub mod manifest;
pub mod models;
pub mod storage;
pub mod sync;
pub mod utils;
