//! Data models for skysync

mod attributes;
mod live_photo;
mod outcome;
mod record;

pub use attributes::{AttributeBag, RemoteAttributes};
pub use live_photo::{LivePhotoPair, LivePhotoUpload};
pub use outcome::{AppliedRecord, FailureKind, SyncFailure, SyncOutcome};
pub use record::{SyncInput, SyncMethod, SyncRecord};
