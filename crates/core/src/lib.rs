pub mod attributes;
pub mod db;
pub mod dedup;
pub mod drive;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod media;
pub mod metadata;
pub mod models;
pub mod quarantine;

pub use crate::error::{Error, Result};
pub use crate::models::*;
