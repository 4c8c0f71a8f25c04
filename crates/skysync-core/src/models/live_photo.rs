//! Live photo models

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A still image and its motion clip, as the local platform stores them.
#[derive(Clone, PartialEq, Eq)]
pub struct LivePhotoPair {
    pub image: Vec<u8>,
    pub video: Vec<u8>,
}

impl fmt::Debug for LivePhotoPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LivePhotoPair")
            .field("image_bytes", &self.image.len())
            .field("video_bytes", &self.video.len())
            .finish()
    }
}

/// Result of uploading a spliced live photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePhotoUpload {
    /// Identifier the asset was stored under remotely
    pub id: String,
    /// Size of the spliced single-file encoding
    pub size_bytes: usize,
    /// Parsed JSON response body, if the remote returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}
