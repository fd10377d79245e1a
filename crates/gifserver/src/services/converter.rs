//! External ffmpeg conversion collaborator.
//!
//! The pipeline treats conversion as an opaque `source file -> output file`
//! step. Each supported output format maps to a content type and a fixed
//! ffmpeg argument set, keeping the dispatch exhaustive.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{TranscodeError, TranscodeResult};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Mp4,
    Ogv,
    Png,
}

impl OutputFormat {
    /// Parses the `format` query parameter.
    pub fn parse(value: &str) -> TranscodeResult<Self> {
        match value {
            "mp4" => Ok(Self::Mp4),
            "ogv" => Ok(Self::Ogv),
            "png" => Ok(Self::Png),
            other => Err(TranscodeError::bad_request(format!(
                "Invalid format: {other}"
            ))),
        }
    }

    /// Best-effort match against an `Accept` header.
    pub fn infer_from_accept(accept: &str) -> Option<Self> {
        if accept.contains("video/mp4") {
            Some(Self::Mp4)
        } else if accept.contains("video/ogg") {
            Some(Self::Ogv)
        } else if accept.contains("image/png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Ogv => "ogv",
            Self::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Ogv => "video/ogg",
            Self::Png => "image/png",
        }
    }
}

/// Invokes ffmpeg to transcode a downloaded source file.
#[derive(Clone, Debug)]
pub struct Converter {
    ffmpeg_command: String,
}

impl Converter {
    pub fn new(ffmpeg_command: impl Into<String>) -> Self {
        Self {
            ffmpeg_command: ffmpeg_command.into(),
        }
    }

    /// Converts `source` into `out.<ext>` inside `workdir`.
    ///
    /// Any non-success outcome (spawn failure, non-zero exit, missing
    /// output file) surfaces as a conversion error carrying the tool's
    /// stderr.
    pub async fn convert(
        &self,
        source: &Path,
        workdir: &Path,
        format: OutputFormat,
    ) -> TranscodeResult<PathBuf> {
        let out_name = format!("out.{}", format.extension());
        let out_path = workdir.join(&out_name);

        debug!("Encoding {} to {}", source.display(), out_name);

        let mut cmd = Command::new(&self.ffmpeg_command);
        cmd.arg("-y");
        cmd.arg("-i").arg(source);
        match format {
            OutputFormat::Mp4 => {
                // h264 requires even dimensions
                cmd.args([
                    "-pix_fmt",
                    "yuv420p",
                    "-vf",
                    "scale=trunc(in_w/2)*2:trunc(in_h/2)*2",
                    "-movflags",
                    "+faststart",
                ]);
            }
            OutputFormat::Ogv => {
                cmd.args(["-q", "5", "-pix_fmt", "yuv420p"]);
            }
            OutputFormat::Png => {
                // first frame only
                cmd.args(["-frames:v", "1"]);
            }
        }
        cmd.arg(&out_name);
        cmd.current_dir(workdir);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            TranscodeError::conversion(format!(
                "Failed to execute {}: {}",
                self.ffmpeg_command, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::conversion(format!(
                "{} exited with {}: {}",
                self.ffmpeg_command,
                output.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&out_path).await.unwrap_or(false) {
            return Err(TranscodeError::conversion(format!(
                "{} produced no output file {}",
                self.ffmpeg_command, out_name
            )));
        }

        Ok(out_path)
    }

    /// Startup check that the configured tool is actually invocable.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_command)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_formats_parse() {
        assert_eq!(OutputFormat::parse("mp4").unwrap(), OutputFormat::Mp4);
        assert_eq!(OutputFormat::parse("ogv").unwrap(), OutputFormat::Ogv);
        assert_eq!(OutputFormat::parse("png").unwrap(), OutputFormat::Png);
    }

    #[test]
    fn unknown_format_is_a_bad_request() {
        let err = OutputFormat::parse("webm").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::TranscodeError::BadRequest { .. }
        ));
    }

    #[test]
    fn accept_header_inference() {
        assert_eq!(
            OutputFormat::infer_from_accept("video/mp4,video/*;q=0.9"),
            Some(OutputFormat::Mp4)
        );
        assert_eq!(
            OutputFormat::infer_from_accept("video/ogg"),
            Some(OutputFormat::Ogv)
        );
        assert_eq!(
            OutputFormat::infer_from_accept("image/png,image/*"),
            Some(OutputFormat::Png)
        );
        assert_eq!(OutputFormat::infer_from_accept("text/html"), None);
    }

    #[test]
    fn content_types_match_extensions() {
        assert_eq!(OutputFormat::Mp4.content_type(), "video/mp4");
        assert_eq!(OutputFormat::Ogv.content_type(), "video/ogg");
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
        assert_eq!(OutputFormat::Ogv.extension(), "ogv");
    }
}
