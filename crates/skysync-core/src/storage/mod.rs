//! Generic remote-file transfer for non-media record types.

mod r2;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use r2::{R2Config, R2Storage};

/// An object listed under a remote prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Plain upload/download/list/delete of byte sequences at a path.
#[allow(async_fn_in_trait)]
pub trait RemoteFileStorage {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()>;

    /// Bytes and the stored content type, if any.
    async fn download(&self, path: &str) -> Result<(Vec<u8>, Option<String>)>;

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    async fn delete(&self, path: &str) -> Result<()>;
}
