//! Storage collaborators.
//!
//! [`Warehouse`] is the relational store shared by the stages: staging
//! tables are fully refreshed by extraction, output tables are appended to by
//! loading. [`FileStore`] is where output files land; [`LocalFileStore`]
//! writes to a directory and [`S3FileStore`] mirrors to a bucket.

mod files;
mod s3;
mod warehouse;

pub use files::{FileStore, LocalFileStore};
pub use s3::S3FileStore;
pub use warehouse::Warehouse;
