use std::path::Path;

use skysync_core::storage::{R2Storage, RemoteFileStorage, RemoteObject};

use crate::commands::common::{open_file_storage, write_output};
use crate::error::CliError;

pub async fn run_files_upload(
    path: &Path,
    key: Option<&str>,
    namespace: &str,
    content_type: Option<&str>,
) -> Result<(), CliError> {
    let storage = open_file_storage()?;
    let key = upload_key(&storage, path, key, namespace)?;
    let bytes = tokio::fs::read(path).await?;

    storage.upload(&key, &bytes, content_type).await?;
    tracing::info!(key = %key, bytes = bytes.len(), "Uploaded file");

    match storage.public_object_url(&key) {
        Some(url) => println!("{key}\t{url}"),
        None => println!("{key}"),
    }
    Ok(())
}

pub async fn run_files_download(key: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    let storage = open_file_storage()?;
    let (bytes, _content_type) = storage.download(key.trim()).await?;
    write_output(output_path, &bytes)
}

pub async fn run_files_list(prefix: &str, as_json: bool) -> Result<(), CliError> {
    let storage = open_file_storage()?;
    let objects = storage.list(prefix.trim()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&objects)?);
    } else {
        for line in format_object_lines(&objects) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_files_delete(key: &str) -> Result<(), CliError> {
    let storage = open_file_storage()?;
    let key = key.trim();
    if !storage.object_exists(key).await? {
        println!("No object at {key}");
        return Ok(());
    }

    storage.delete(key).await?;
    println!("Deleted {key}");
    Ok(())
}

pub async fn run_files_check() -> Result<(), CliError> {
    let storage = open_file_storage()?;
    storage.bucket_is_reachable().await?;
    println!("Bucket {} is reachable", storage.config().bucket);
    Ok(())
}

pub fn format_object_lines(objects: &[RemoteObject]) -> Vec<String> {
    objects
        .iter()
        .map(|object| match object.size_bytes {
            Some(size) => format!("{size:>10}  {}", object.key),
            None => format!("{:>10}  {}", "-", object.key),
        })
        .collect()
}

fn upload_key(
    storage: &R2Storage,
    path: &Path,
    key: Option<&str>,
    namespace: &str,
) -> Result<String, CliError> {
    if let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");
    Ok(storage.build_object_key(namespace, file_name)?)
}
