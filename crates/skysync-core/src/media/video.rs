//! Video codec re-encoding through an external tool.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use super::TranscodeError;
use crate::util::compact_text;

/// Target codec and bitrate for one side of the transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecProfile {
    pub video_codec: String,
    pub audio_codec: String,
    pub bitrate_kbps: u32,
    /// Container extension, which also selects the muxer
    pub container_extension: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl CodecProfile {
    /// H.264/AAC in MP4, the clip format embedded in remote motion photos.
    pub fn remote() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            bitrate_kbps: 4_000,
            container_extension: "mp4".to_string(),
            extra_args: vec!["-movflags".to_string(), "+faststart".to_string()],
        }
    }

    /// HEVC/AAC in QuickTime, the clip format of local live photos.
    pub fn local() -> Self {
        Self {
            video_codec: "libx265".to_string(),
            audio_codec: "aac".to_string(),
            bitrate_kbps: 6_000,
            container_extension: "mov".to_string(),
            extra_args: vec!["-tag:v".to_string(), "hvc1".to_string()],
        }
    }

    /// Output file name for this profile inside a scratch directory.
    pub fn output_file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.container_extension)
    }
}

/// External frame/codec transcoding collaborator.
#[allow(async_fn_in_trait)]
pub trait VideoTranscoder {
    /// Re-encode the video at `input` into `output` using `profile`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &CodecProfile,
    ) -> Result<(), TranscodeError>;
}

/// Runs an `ffmpeg`-compatible binary as a subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn arguments(input: &Path, output: &Path, profile: &CodecProfile) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-c:v".to_string(),
            profile.video_codec.clone(),
            "-b:v".to_string(),
            format!("{}k", profile.bitrate_kbps),
            "-c:a".to_string(),
            profile.audio_codec.clone(),
        ];
        args.extend(profile.extra_args.iter().cloned());
        args.push(output.display().to_string());
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl VideoTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: &CodecProfile,
    ) -> Result<(), TranscodeError> {
        let args = Self::arguments(input, output, profile);
        tracing::debug!(program = %self.program, codec = %profile.video_codec, "Transcoding video");

        let result = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::ToolUnavailable {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TranscodeError::ToolFailed {
                status: result.status.to_string(),
                stderr: compact_text(&stderr),
            });
        }
        Ok(())
    }
}

/// Copies the input unchanged. Useful when both platforms share a codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranscoder;

impl VideoTranscoder for PassthroughTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _profile: &CodecProfile,
    ) -> Result<(), TranscodeError> {
        tokio::fs::copy(input, output)
            .await
            .map_err(|source| TranscodeError::io(input, source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn ffmpeg_arguments_follow_profile() {
        let args = FfmpegTranscoder::arguments(
            &PathBuf::from("/tmp/in.mov"),
            &PathBuf::from("/tmp/out.mp4"),
            &CodecProfile::remote(),
        );
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                "/tmp/in.mov",
                "-c:v",
                "libx264",
                "-b:v",
                "4000k",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
                "/tmp/out.mp4",
            ]
        );
    }

    #[test]
    fn local_profile_tags_hevc_for_quicktime() {
        let profile = CodecProfile::local();
        assert_eq!(profile.output_file_name("clip"), "clip.mov");
        assert!(profile.extra_args.contains(&"hvc1".to_string()));
    }

    #[tokio::test]
    async fn missing_tool_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mov");
        tokio::fs::write(&input, b"clip").await.unwrap();

        let transcoder = FfmpegTranscoder::new("skysync-no-such-transcoder");
        let err = transcoder
            .transcode(&input, &dir.path().join("out.mp4"), &CodecProfile::remote())
            .await
            .unwrap_err();
        match err {
            TranscodeError::ToolUnavailable { program, .. } => {
                assert_eq!(program, "skysync-no-such-transcoder");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn passthrough_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mov");
        let output = dir.path().join("out.mp4");
        tokio::fs::write(&input, b"clip-bytes").await.unwrap();

        PassthroughTranscoder
            .transcode(&input, &output, &CodecProfile::remote())
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"clip-bytes");
    }
}
