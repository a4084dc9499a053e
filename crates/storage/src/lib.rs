//! Storage - Pluggable object backends for snapshot synchronisation
//!
//! Provides async storage operations with support for:
//! - Local filesystem (default feature)
//! - Amazon S3 / S3-compatible storage (with `s3` feature)
//!
//! # Example
//!
//! ```no_run
//! use storage::{StorageBackend, LocalStorage};
//! use bytes::Bytes;
//!
//! # async fn example() -> sync_core::Result<()> {
//! let storage = LocalStorage::new("/tmp/snapshot-store");
//! storage.write("sunshk/run-a-20250101_120000/finish_check.txt", Bytes::from("done")).await?;
//! let runs = storage.list_dirs("sunshk/").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod local;

#[cfg(feature = "s3")]
mod s3;

pub use backend::{join_key, StorageBackend};
pub use local::LocalStorage;

#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Storage};
