//! Persistence for translated attribute bags, keyed by record id.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::AttributeBag;
use crate::util::storage_key_for_id;
use crate::{Error, Result};

/// Trait for attribute bag storage operations (async)
#[allow(async_fn_in_trait)]
pub trait MetadataStore {
    /// Persist the bag for a record, replacing any previous one
    async fn save(&self, id: &str, bag: &AttributeBag) -> Result<()>;

    /// Load the bag for a record
    async fn get(&self, id: &str) -> Result<Option<AttributeBag>>;
}

/// One JSON document per record under a root directory.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    root: PathBuf,
}

impl FileMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &str) -> Result<PathBuf> {
        let key = storage_key_for_id(id).ok_or_else(|| {
            Error::InvalidInput(format!("Record id '{id}' cannot be used as a storage key"))
        })?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl MetadataStore for FileMetadataStore {
    async fn save(&self, id: &str, bag: &AttributeBag) -> Result<()> {
        let path = self.document_path(id)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // Write-then-rename keeps readers from observing a partial document.
        let staging = self.root.join(format!(".{}.tmp", Uuid::now_v7()));
        let payload = serde_json::to_vec_pretty(bag)?;
        tokio::fs::write(&staging, payload).await?;
        if let Err(error) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }

        tracing::debug!(id, path = %path.display(), "Saved record metadata");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AttributeBag>> {
        let path = self.document_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

/// Process-local store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    entries: Arc<Mutex<HashMap<String, AttributeBag>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    async fn save(&self, id: &str, bag: &AttributeBag) -> Result<()> {
        if storage_key_for_id(id).is_none() {
            return Err(Error::InvalidInput(format!(
                "Record id '{id}' cannot be used as a storage key"
            )));
        }
        self.entries
            .lock()
            .await
            .insert(id.to_string(), bag.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AttributeBag>> {
        Ok(self.entries.lock().await.get(id).cloned())
    }
}
