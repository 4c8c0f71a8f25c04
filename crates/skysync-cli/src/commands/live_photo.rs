use std::path::{Path, PathBuf};

use skysync_core::media::{CodecProfile, VideoTranscoder};
use skysync_core::models::LivePhotoPair;
use skysync_core::{MotionPhotoTranscoder, SyncSettings};

use crate::commands::common::{build_dispatcher, file_stem_for_id, normalize_record_id};
use crate::error::CliError;

const STILL_EXTENSION: &str = "jpg";

pub async fn run_live_photo_push(
    settings: SyncSettings,
    still: &Path,
    video: &Path,
    as_json: bool,
) -> Result<(), CliError> {
    let dispatcher = build_dispatcher(settings)?;
    let upload = dispatcher.sync_live_photo(still, video).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&upload)?);
    } else {
        println!("{}\t{} bytes", upload.id, upload.size_bytes);
    }
    Ok(())
}

pub async fn run_live_photo_pull(
    settings: SyncSettings,
    id: &str,
    out_dir: &Path,
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let stem = file_stem_for_id(&id)?;
    let dispatcher = build_dispatcher(settings)?;
    let pair = dispatcher.download_and_convert_live_photo(&id).await?;
    let extension = CodecProfile::local().container_extension;

    for path in write_pair(&pair, out_dir, &stem, &extension).await? {
        println!("{}", path.display());
    }
    Ok(())
}

pub async fn run_live_photo_encode<V: VideoTranscoder>(
    transcoder: &MotionPhotoTranscoder<V>,
    still: &Path,
    video: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let spliced = transcoder.to_remote_encoding(still, video).await?;
    tokio::fs::write(output, &spliced).await?;
    println!("{}", output.display());
    Ok(())
}

pub async fn run_live_photo_decode<V: VideoTranscoder>(
    transcoder: &MotionPhotoTranscoder<V>,
    input: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, CliError> {
    let pair = transcoder.to_local_encoding(input).await?;
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("live-photo");
    let extension = transcoder.local_profile().container_extension.clone();

    let written = write_pair(&pair, out_dir, stem, &extension).await?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(written)
}

/// Write the still and the clip side by side as `<stem>.jpg` and `<stem>.<ext>`.
pub async fn write_pair(
    pair: &LivePhotoPair,
    out_dir: &Path,
    stem: &str,
    video_extension: &str,
) -> Result<Vec<PathBuf>, CliError> {
    tokio::fs::create_dir_all(out_dir).await?;

    let still_path = out_dir.join(format!("{stem}.{STILL_EXTENSION}"));
    let video_path = out_dir.join(format!("{stem}.{video_extension}"));
    tokio::fs::write(&still_path, &pair.image).await?;
    tokio::fs::write(&video_path, &pair.video).await?;

    Ok(vec![still_path, video_path])
}
