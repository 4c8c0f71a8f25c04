use std::path::Path;

use skysync_core::{SyncMethod, SyncSettings};

use crate::commands::common::{
    build_dispatcher, format_outcome_lines, outcome_result, read_json_input,
};
use crate::error::CliError;

pub async fn run_sync(
    settings: SyncSettings,
    endpoint: &str,
    method: SyncMethod,
    input: Option<&Path>,
    as_json: bool,
) -> Result<(), CliError> {
    let document = read_json_input(input)?;
    let dispatcher = build_dispatcher(settings)?;
    let outcome = dispatcher.sync(endpoint, document, method).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in format_outcome_lines(&outcome) {
            println!("{line}");
        }
    }

    outcome_result(&outcome)
}
