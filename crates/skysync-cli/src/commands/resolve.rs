use std::path::Path;

use serde_json::Value;
use skysync_core::{ConflictPair, ConflictStrategy, ResolutionError};

use crate::commands::common::{read_json_input, write_output};
use crate::error::CliError;

pub fn run_resolve(
    local_path: &Path,
    remote_path: &Path,
    strategy: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let local = read_json_input(Some(local_path))?;
    let remote = read_json_input(Some(remote_path))?;

    match resolve_documents(local, remote, strategy) {
        Ok(resolved) => {
            let mut rendered = serde_json::to_vec_pretty(&resolved)?;
            rendered.push(b'\n');
            write_output(output_path, &rendered)
        }
        Err(CliError::Resolution(ResolutionError::ManualResolutionRequired { local, remote })) => {
            eprintln!("local:  {local}");
            eprintln!("remote: {remote}");
            Err(CliError::ManualResolution)
        }
        Err(error) => Err(error),
    }
}

pub fn resolve_documents(
    local: Value,
    remote: Value,
    strategy: Option<&str>,
) -> Result<Value, CliError> {
    let strategy = strategy
        .map(str::parse::<ConflictStrategy>)
        .transpose()?
        .unwrap_or_default();
    Ok(ConflictPair::new(local, remote)
        .with_strategy(strategy)
        .resolve()?)
}
