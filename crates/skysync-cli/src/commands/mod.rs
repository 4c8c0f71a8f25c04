pub mod common;
pub mod completions;
pub mod files;
pub mod live_photo;
pub mod metadata;
pub mod resolve;
pub mod sync;
