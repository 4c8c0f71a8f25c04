//! Motion-photo transcoding between the local two-asset encoding and the
//! remote single-file encoding.
//!
//! Video re-encoding is delegated to a [`VideoTranscoder`]; container
//! splicing happens in-process. Intermediate files live in a scratch
//! directory that is removed when the operation returns, on success or
//! failure alike.

mod splice;
mod video;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::LivePhotoPair;

pub use splice::{
    has_motion_marker, motion_marker_segment, splice_motion_photo, split_motion_photo,
    SplitMotionPhoto, MICRO_VIDEO_SENTINEL, MOTION_PHOTO_SENTINEL, MOTION_PHOTO_VERSION,
    XMP_NAMESPACE,
};
pub use video::{CodecProfile, FfmpegTranscoder, PassthroughTranscoder, VideoTranscoder};

#[cfg(test)]
pub(crate) use splice::tests::{sample_jpeg, sample_video};

const SCRATCH_PREFIX: &str = "skysync-motion-";

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to launch transcoder '{program}': {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Transcoder exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },
    #[error("Input is not a JPEG image")]
    NotJpeg,
    #[error("End-of-image marker not found; input is not a spliced motion photo")]
    MissingEndOfImage,
    #[error("Malformed motion photo: {0}")]
    Malformed(String),
    #[error("Motion photo carries no video payload")]
    MissingVideo,
}

impl TranscodeError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Converts live photos between the two platform encodings.
#[derive(Debug, Clone)]
pub struct MotionPhotoTranscoder<V> {
    video: V,
    remote_profile: CodecProfile,
    local_profile: CodecProfile,
}

impl<V: VideoTranscoder> MotionPhotoTranscoder<V> {
    pub fn new(video: V) -> Self {
        Self::with_profiles(video, CodecProfile::remote(), CodecProfile::local())
    }

    pub fn with_profiles(
        video: V,
        remote_profile: CodecProfile,
        local_profile: CodecProfile,
    ) -> Self {
        Self {
            video,
            remote_profile,
            local_profile,
        }
    }

    pub const fn remote_profile(&self) -> &CodecProfile {
        &self.remote_profile
    }

    pub const fn local_profile(&self) -> &CodecProfile {
        &self.local_profile
    }

    /// Re-encode the clip for the remote platform and splice it into the still.
    pub async fn to_remote_encoding(
        &self,
        image_path: &Path,
        video_path: &Path,
    ) -> Result<Vec<u8>, TranscodeError> {
        let scratch = scratch_dir()?;
        let encoded = scratch
            .path()
            .join(self.remote_profile.output_file_name("clip"));

        self.video
            .transcode(video_path, &encoded, &self.remote_profile)
            .await?;

        let image = read(image_path).await?;
        let video = read(&encoded).await?;
        let spliced = splice_motion_photo(&image, &video)?;

        tracing::debug!(
            image_bytes = image.len(),
            video_bytes = video.len(),
            spliced_bytes = spliced.len(),
            "Encoded motion photo"
        );
        Ok(spliced)
    }

    /// Split a spliced file and re-encode its clip for the local platform.
    pub async fn to_local_encoding(
        &self,
        spliced_path: &Path,
    ) -> Result<LivePhotoPair, TranscodeError> {
        let bytes = read(spliced_path).await?;
        self.to_local_encoding_bytes(&bytes).await
    }

    /// Same as [`Self::to_local_encoding`] for bytes already in memory.
    pub async fn to_local_encoding_bytes(
        &self,
        spliced: &[u8],
    ) -> Result<LivePhotoPair, TranscodeError> {
        let SplitMotionPhoto { image, video } = split_motion_photo(spliced)?;

        let scratch = scratch_dir()?;
        let embedded = scratch
            .path()
            .join(self.remote_profile.output_file_name("embedded"));
        let encoded = scratch
            .path()
            .join(self.local_profile.output_file_name("clip"));

        tokio::fs::write(&embedded, &video)
            .await
            .map_err(|source| TranscodeError::io(&embedded, source))?;
        self.video
            .transcode(&embedded, &encoded, &self.local_profile)
            .await?;
        let video = read(&encoded).await?;

        tracing::debug!(
            image_bytes = image.len(),
            video_bytes = video.len(),
            "Decoded motion photo"
        );
        Ok(LivePhotoPair { image, video })
    }
}

fn scratch_dir() -> Result<tempfile::TempDir, TranscodeError> {
    tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|source| TranscodeError::io(&std::env::temp_dir(), source))
}

async fn read(path: &Path) -> Result<Vec<u8>, TranscodeError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| TranscodeError::io(path, source))
}
