//! skysync-core - Core library for skysync
//!
//! This crate contains the synchronization engine shared by every skysync
//! interface: the batching sync dispatcher, conflict resolution, platform
//! metadata translation and motion-photo transcoding.

pub mod config;
pub mod conflict;
pub mod error;
pub mod media;
pub mod metadata;
pub mod models;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use conflict::{ConflictPair, ConflictStrategy, ResolutionError};
pub use error::{Error, Result};
pub use media::{MotionPhotoTranscoder, TranscodeError};
pub use metadata::MetadataError;
pub use models::{AttributeBag, SyncMethod, SyncOutcome, SyncRecord};
pub use sync::{SyncDispatcher, SyncError};
