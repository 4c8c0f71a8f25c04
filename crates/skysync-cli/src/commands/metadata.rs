use std::path::Path;

use serde_json::Value;
use skysync_core::metadata::{to_remote_attributes, translate_metadata, MetadataStore};
use skysync_core::{AttributeBag, SyncSettings};

use crate::commands::common::{metadata_store, normalize_record_id, read_json_input};
use crate::error::CliError;

pub async fn run_metadata_show(
    settings: &SyncSettings,
    id: &str,
    remote: bool,
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let bag = metadata_store(settings)
        .get(&id)
        .await?
        .ok_or(CliError::MetadataNotFound(id))?;

    println!("{}", serde_json::to_string_pretty(&render_bag(&bag, remote)?)?);
    Ok(())
}

pub fn run_metadata_translate(input: Option<&Path>, remote: bool) -> Result<(), CliError> {
    let document = read_json_input(input)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&translate_document(&document, remote)?)?
    );
    Ok(())
}

/// Normalize either attribute form into the requested one.
pub fn translate_document(document: &Value, remote: bool) -> Result<Value, CliError> {
    let bag = translate_metadata(document)?;
    render_bag(&bag, remote)
}

fn render_bag(bag: &AttributeBag, remote: bool) -> Result<Value, CliError> {
    let value = if remote {
        serde_json::to_value(to_remote_attributes(bag))?
    } else {
        serde_json::to_value(bag)?
    };
    Ok(value)
}
