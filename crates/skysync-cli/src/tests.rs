use std::path::Path;

use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use serde_json::json;
use skysync_core::media::PassthroughTranscoder;
use skysync_core::metadata::{FileMetadataStore, MetadataStore};
use skysync_core::models::{AppliedRecord, FailureKind, SyncFailure};
use skysync_core::storage::RemoteObject;
use skysync_core::{AttributeBag, MotionPhotoTranscoder, SyncMethod, SyncOutcome, SyncSettings};

use crate::cli::{
    Cli, Commands, CompletionShell, FilesCommands, LivePhotoCommands, MetadataCommands, MethodArg,
};
use crate::commands::common::{
    file_stem_for_id, format_outcome_lines, normalize_record_id, outcome_result,
    parse_json_document, read_json_input, resolve_metadata_dir,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::commands::files::format_object_lines;
use crate::commands::live_photo::{run_live_photo_decode, run_live_photo_encode};
use crate::commands::metadata::{run_metadata_show, translate_document};
use crate::commands::resolve::{resolve_documents, run_resolve};
use crate::error::CliError;

/// SOI, one APP0 segment, EOI.
fn tiny_jpeg() -> Vec<u8> {
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    jpeg.extend_from_slice(b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0");
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path
}

fn failure(id: &str, kind: FailureKind, status: Option<u16>) -> SyncFailure {
    SyncFailure {
        id: id.to_string(),
        kind,
        error: "boom".to_string(),
        status,
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn sync_command_defaults_to_put() {
    let cli = Cli::try_parse_from(["skysync", "sync", "contacts"]).unwrap();
    match cli.command {
        Commands::Sync {
            endpoint,
            method,
            input,
            json,
        } => {
            assert_eq!(endpoint, "contacts");
            assert_eq!(method, MethodArg::Put);
            assert_eq!(input, None);
            assert!(!json);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "skysync",
        "sync",
        "files",
        "--method",
        "get",
        "--api-base-url",
        "https://api.example.com",
        "--metadata-dir",
        "/tmp/meta",
    ])
    .unwrap();

    assert_eq!(cli.api_base_url.as_deref(), Some("https://api.example.com"));
    assert_eq!(cli.metadata_dir.as_deref(), Some(Path::new("/tmp/meta")));
    assert!(matches!(
        cli.command,
        Commands::Sync {
            method: MethodArg::Get,
            ..
        }
    ));
}

#[test]
fn nested_subcommands_parse() {
    let cli = Cli::try_parse_from(["skysync", "live-photo", "pull", "abc", "--out-dir", "out"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Commands::LivePhoto {
            command: LivePhotoCommands::Pull { ref id, .. }
        } if id == "abc"
    ));

    let cli = Cli::try_parse_from(["skysync", "metadata", "translate", "--remote"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Metadata {
            command: MetadataCommands::Translate {
                input: None,
                remote: true
            }
        }
    ));

    let cli = Cli::try_parse_from(["skysync", "files", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Files {
            command: FilesCommands::List { ref prefix, json: false }
        } if prefix.is_empty()
    ));
}

#[test]
fn unknown_method_is_rejected() {
    assert!(Cli::try_parse_from(["skysync", "sync", "contacts", "-m", "patch"]).is_err());
}

#[test]
fn method_arg_maps_to_sync_method() {
    assert_eq!(SyncMethod::from(MethodArg::Get), SyncMethod::Get);
    assert_eq!(SyncMethod::from(MethodArg::Post), SyncMethod::Post);
    assert_eq!(SyncMethod::from(MethodArg::Put), SyncMethod::Put);
    assert_eq!(SyncMethod::from(MethodArg::Delete), SyncMethod::Delete);
}

#[test]
fn read_json_input_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_json(dir.path(), "records.json", &json!([{ "id": "c1" }]));

    assert_eq!(read_json_input(Some(&path)).unwrap(), json!([{ "id": "c1" }]));
}

#[test]
fn parse_json_document_rejects_blank_and_invalid_input() {
    assert!(matches!(
        parse_json_document("  \n"),
        Err(CliError::MissingInput)
    ));
    assert!(matches!(
        parse_json_document("{not json"),
        Err(CliError::Serialization(_))
    ));
}

#[test]
fn normalize_record_id_trims_and_rejects_empty() {
    assert_eq!(normalize_record_id("  c1 ").unwrap(), "c1");
    assert!(matches!(
        normalize_record_id("   "),
        Err(CliError::EmptyRecordId)
    ));
}

#[test]
fn file_stem_for_id_escapes_separators() {
    assert_eq!(file_stem_for_id("a/b").unwrap(), "a%2Fb");
    assert!(file_stem_for_id("..").is_err());
}

#[test]
fn resolve_metadata_dir_prefers_explicit_path() {
    assert_eq!(
        resolve_metadata_dir(Some("/tmp/explicit".into())),
        Path::new("/tmp/explicit")
    );
    assert!(resolve_metadata_dir(None).ends_with("skysync/metadata"));
}

#[test]
fn format_outcome_lines_summarizes_failures() {
    let outcome = SyncOutcome {
        applied: vec![AppliedRecord {
            id: "c1".to_string(),
            result: None,
        }],
        errors: vec![failure("c2", FailureKind::Conflict, Some(409))],
        metadata_failures: vec![failure("c1", FailureKind::Metadata, None)],
    };

    let lines = format_outcome_lines(&outcome);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "applied=1 failed=1 metadata_failures=1");
    assert!(lines[1].starts_with("error"));
    assert!(lines[1].contains("c2"));
    assert!(lines[1].contains("conflict"));
    assert!(lines[1].contains("409"));
    assert!(lines[2].starts_with("metadata"));
}

#[test]
fn outcome_result_reports_partial_failure() {
    let mut outcome = SyncOutcome {
        applied: vec![AppliedRecord {
            id: "c1".to_string(),
            result: None,
        }],
        ..SyncOutcome::default()
    };
    assert!(outcome_result(&outcome).is_ok());

    outcome
        .errors
        .push(failure("c2", FailureKind::TransientNetwork, Some(503)));
    assert!(matches!(
        outcome_result(&outcome),
        Err(CliError::PartialFailure {
            failed: 1,
            total: 2
        })
    ));
}

#[test]
fn resolve_documents_uses_requested_strategy() {
    let local = json!({ "id": "c1", "name": "Local", "modificationDate": "2024-01-01T00:00:00Z" });
    let remote = json!({ "id": "c1", "name": "Remote", "modificationDate": "2024-06-01T00:00:00Z" });

    let resolved = resolve_documents(local.clone(), remote.clone(), None).unwrap();
    assert_eq!(resolved, remote);

    let merged = resolve_documents(local, remote, Some("merge")).unwrap();
    assert_eq!(merged["name"], "Local");
}

#[test]
fn resolve_documents_rejects_unknown_strategy() {
    let result = resolve_documents(json!({}), json!({}), Some("coin-flip"));
    assert!(matches!(result, Err(CliError::Resolution(_))));
}

#[test]
fn run_resolve_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let local = write_json(dir.path(), "local.json", &json!({ "tags": ["a"] }));
    let remote = write_json(dir.path(), "remote.json", &json!({ "tags": ["b"] }));
    let output = dir.path().join("resolved.json");

    run_resolve(&local, &remote, Some("merge"), Some(&output)).unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(written, json!({ "tags": ["a", "b"] }));
}

#[test]
fn run_resolve_manual_strategy_fails() {
    let dir = tempfile::tempdir().unwrap();
    let local = write_json(dir.path(), "local.json", &json!({ "id": "c1" }));
    let remote = write_json(dir.path(), "remote.json", &json!({ "id": "c1", "x": 1 }));
    let output = dir.path().join("resolved.json");

    let result = run_resolve(&local, &remote, Some("manual"), Some(&output));
    assert!(matches!(result, Err(CliError::ManualResolution)));
    assert!(!output.exists());
}

#[test]
fn translate_document_converts_between_forms() {
    let flat = json!({
        "label": "Red",
        "tags": "[\"a\",\"b\",\"a\"]",
        "creationTime": "1700000000000",
        "x-origin": "phone"
    });

    let local = translate_document(&flat, false).unwrap();
    assert_eq!(local["label"], "Red");
    assert_eq!(local["tags"], json!(["a", "b"]));
    assert_eq!(local["extras"], json!({ "origin": "phone" }));

    let remote = translate_document(&flat, true).unwrap();
    assert_eq!(remote["creationTime"], "1700000000000");
    assert_eq!(remote["tags"], "[\"a\",\"b\"]");
    assert_eq!(remote["x-origin"], "phone");
}

#[test]
fn translate_document_rejects_non_objects() {
    assert!(matches!(
        translate_document(&json!([1, 2]), false),
        Err(CliError::Metadata(_))
    ));
}

#[tokio::test]
async fn metadata_show_reads_persisted_bag() {
    let dir = tempfile::tempdir().unwrap();
    let settings = SyncSettings::default().with_metadata_dir(dir.path());
    let bag = AttributeBag {
        label: "Blue".to_string(),
        ..AttributeBag::default()
    };
    FileMetadataStore::new(dir.path())
        .save("c1", &bag)
        .await
        .unwrap();

    run_metadata_show(&settings, "c1", true).await.unwrap();
    let missing = run_metadata_show(&settings, "c2", false).await;
    assert!(matches!(missing, Err(CliError::MetadataNotFound(id)) if id == "c2"));
}

#[test]
fn format_object_lines_aligns_sizes() {
    let lines = format_object_lines(&[
        RemoteObject {
            key: "files/a.txt".to_string(),
            size_bytes: Some(42),
        },
        RemoteObject {
            key: "files/b.txt".to_string(),
            size_bytes: None,
        },
    ]);

    assert_eq!(lines[0], "        42  files/a.txt");
    assert_eq!(lines[1], "         -  files/b.txt");
}

#[test]
fn completions_are_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("skysync.bash");

    run_completions(CompletionShell::Bash, Some(&output)).unwrap();

    let script = std::fs::read_to_string(&output).unwrap();
    assert!(script.contains("skysync"));
    assert!(!render_completions(CompletionShell::Fish).is_empty());
}

#[tokio::test]
async fn encode_then_decode_restores_still_and_clip() {
    let dir = tempfile::tempdir().unwrap();
    let still = dir.path().join("IMG_0001.jpg");
    let clip = dir.path().join("IMG_0001.mov");
    let spliced = dir.path().join("IMG_0001.motion.jpg");
    let out_dir = dir.path().join("decoded");
    let video = b"\0\0\0\x18ftypmp42 clip bytes".to_vec();
    std::fs::write(&still, tiny_jpeg()).unwrap();
    std::fs::write(&clip, &video).unwrap();

    let transcoder = MotionPhotoTranscoder::new(PassthroughTranscoder);
    run_live_photo_encode(&transcoder, &still, &clip, &spliced)
        .await
        .unwrap();
    let written = run_live_photo_decode(&transcoder, &spliced, &out_dir)
        .await
        .unwrap();

    assert_eq!(
        written,
        vec![
            out_dir.join("IMG_0001.motion.jpg"),
            out_dir.join("IMG_0001.motion.mov"),
        ]
    );
    assert_eq!(std::fs::read(&written[0]).unwrap(), tiny_jpeg());
    assert_eq!(std::fs::read(&written[1]).unwrap(), video);
}

#[tokio::test]
async fn decode_rejects_plain_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let still = dir.path().join("plain.jpg");
    std::fs::write(&still, tiny_jpeg()).unwrap();

    let transcoder = MotionPhotoTranscoder::new(PassthroughTranscoder);
    let result = run_live_photo_decode(&transcoder, &still, dir.path()).await;
    assert!(matches!(result, Err(CliError::Transcode(_))));
}
