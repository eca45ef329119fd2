//! ffmpeg-based still-image video encoder
//!
//! Turns one composited image (plus an optional background track) into a
//! fixed-resolution, fixed-frame-rate H.264 MP4. The encoder is treated as a
//! black box: the only result is pass/fail.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Codec flag set selected by the pipeline variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderProfile {
    /// H.264 High@4.0, medium preset, CRF 23
    #[default]
    Reels,
    /// H.264 Main@3.1, faster preset, for players that reject High profile
    Compat,
}

/// Configuration for the encoder
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Video codec
    pub video_codec: String,
    /// H.264 profile (e.g., "high")
    pub profile: String,
    /// H.264 level (e.g., "4.0")
    pub level: String,
    /// x264 preset
    pub preset: String,
    /// Constant rate factor
    pub crf: u8,
    /// Audio codec used when a track is muxed
    pub audio_codec: String,
    /// Audio bitrate (e.g., "128k")
    pub audio_bitrate: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::reels()
    }
}

impl EncoderConfig {
    /// 1080x1920 H.264 High profile, the format both platforms ingest
    #[must_use]
    pub fn reels() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            width: 1080,
            height: 1920,
            fps: 25,
            video_codec: "libx264".to_string(),
            profile: "high".to_string(),
            level: "4.0".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }

    /// Baseline-friendly variant for older ingest pipelines
    #[must_use]
    pub fn compat() -> Self {
        Self {
            profile: "main".to_string(),
            level: "3.1".to_string(),
            preset: "veryfast".to_string(),
            crf: 26,
            ..Self::reels()
        }
    }

    /// Config for a named profile
    #[must_use]
    pub fn for_profile(profile: EncoderProfile) -> Self {
        match profile {
            EncoderProfile::Reels => Self::reels(),
            EncoderProfile::Compat => Self::compat(),
        }
    }

    /// Use a specific ffmpeg binary
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: &str) -> Self {
        self.ffmpeg_path = path.to_string();
        self
    }

    /// Set the output frame rate
    #[must_use]
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

/// Still image -> video transform
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encode `image` looped for `duration_secs` into `output`, muxing
    /// `audio` when it exists on disk. Returns `false` on any failure; no
    /// partial output is left behind.
    async fn encode(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: u32,
        audio: Option<&Path>,
    ) -> bool;
}

/// ffmpeg subprocess encoder
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Create an encoder with the default (reels) config
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EncoderConfig::default(),
        }
    }

    /// Create an encoder with custom config
    #[must_use]
    pub fn with_config(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build ffmpeg arguments
    fn build_args(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: u32,
        audio: Option<&Path>,
    ) -> Vec<String> {
        let c = &self.config;
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        // Loop the still image for the requested duration
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-t".to_string(),
            duration_secs.to_string(),
            "-i".to_string(),
            image.to_string_lossy().to_string(),
        ]);

        if let Some(audio) = audio {
            args.push("-i".to_string());
            args.push(audio.to_string_lossy().to_string());
        }

        // Fit inside the output frame, padding to keep the aspect ratio
        let (w, h) = (c.width, c.height);
        args.push("-vf".to_string());
        args.push(format!(
            "format=yuv420p,scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
        ));

        args.extend([
            "-r".to_string(),
            c.fps.to_string(),
            "-c:v".to_string(),
            c.video_codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-profile:v".to_string(),
            c.profile.clone(),
            "-level".to_string(),
            c.level.clone(),
            "-preset".to_string(),
            c.preset.clone(),
            "-crf".to_string(),
            c.crf.to_string(),
        ]);

        if audio.is_some() {
            args.extend([
                "-c:a".to_string(),
                c.audio_codec.clone(),
                "-b:a".to_string(),
                c.audio_bitrate.clone(),
                // Shorter stream decides the output length
                "-shortest".to_string(),
            ]);
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoEncoder for Encoder {
    async fn encode(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: u32,
        audio: Option<&Path>,
    ) -> bool {
        let audio = audio.filter(|p| p.is_file());
        let args = self.build_args(image, output, duration_secs, audio);

        debug!("ffmpeg args: {:?}", args);

        let result = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let failure = match result {
            Ok(out) if out.status.success() => {
                info!("Encoded video to {:?}", output);
                return true;
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                format!(
                    "ffmpeg exited with status {}: {}",
                    out.status,
                    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
                )
            }
            Err(e) => format!("failed to spawn {}: {e}", self.config.ffmpeg_path),
        };

        error!("{failure}");
        let _ = tokio::fs::remove_file(output).await;
        false
    }
}
