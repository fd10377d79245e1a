//! Source probing via ffprobe.
//!
//! The dimension guard needs the pixel geometry of the downloaded source
//! without materializing any frames, so we ask ffprobe for the stream
//! width/height as JSON before any expensive work starts.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{TranscodeError, TranscodeResult};

/// Pixel geometry reported for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
}

/// Service for probing downloaded source files
#[derive(Clone, Debug)]
pub struct SourceProber {
    ffprobe_command: String,
    probe_timeout: Duration,
}

impl SourceProber {
    pub fn new(ffprobe_command: impl Into<String>) -> Self {
        Self {
            ffprobe_command: ffprobe_command.into(),
            probe_timeout: Duration::from_secs(10),
        }
    }

    /// Probe a source file for the geometry of its first video stream.
    pub async fn probe(&self, source: &Path) -> TranscodeResult<SourceInfo> {
        debug!("Probing source file: {}", source.display());

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_entries",
            "stream=width,height",
        ]);
        cmd.arg(source);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| {
                TranscodeError::conversion(format!(
                    "{} timeout after {:?}",
                    self.ffprobe_command, self.probe_timeout
                ))
            })?
            .map_err(|e| {
                TranscodeError::conversion(format!(
                    "Failed to execute {}: {}",
                    self.ffprobe_command, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::conversion(format!(
                "{} exited with {}: {}",
                self.ffprobe_command,
                output.status,
                stderr.trim()
            )));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            TranscodeError::conversion(format!("Failed to parse ffprobe output: {e}"))
        })?;

        parse_geometry(&data).ok_or_else(|| {
            TranscodeError::conversion("No video stream geometry in probe output".to_string())
        })
    }
}

/// First stream entry that reports both a width and a height.
fn parse_geometry(data: &serde_json::Value) -> Option<SourceInfo> {
    let streams = data.get("streams")?.as_array()?;
    streams.iter().find_map(|stream| {
        let width = stream.get("width")?.as_u64()?;
        let height = stream.get("height")?.as_u64()?;
        Some(SourceInfo {
            width: width as u32,
            height: height as u32,
        })
    })
}

/// Dimension guard. A zero maximum disables that axis entirely.
pub fn check_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> TranscodeResult<()> {
    if max_width > 0 && width > max_width {
        return Err(TranscodeError::resource_exceeded(format!(
            "Image width too large: {width} > {max_width}"
        )));
    }

    if max_height > 0 && height > max_height {
        return Err(TranscodeError::resource_exceeded(format!(
            "Image height too large: {height} > {max_height}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_axes_over_limit_rejects() {
        assert!(check_dimensions(300, 300, 10, 10).is_err());
    }

    #[test]
    fn single_enabled_axis_still_rejects() {
        assert!(check_dimensions(300, 300, 0, 10).is_err());
        assert!(check_dimensions(300, 300, 10, 0).is_err());
    }

    #[test]
    fn zeroed_guard_accepts_everything() {
        assert!(check_dimensions(300, 300, 0, 0).is_ok());
        assert!(check_dimensions(u32::MAX, u32::MAX, 0, 0).is_ok());
    }

    #[test]
    fn exact_fit_is_accepted() {
        assert!(check_dimensions(300, 300, 300, 300).is_ok());
        assert!(check_dimensions(300, 300, 512, 512).is_ok());
    }

    #[test]
    fn geometry_comes_from_the_first_video_stream() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"streams":[{"width":480,"height":270},{"width":100,"height":100}]}"#,
        )
        .unwrap();

        assert_eq!(
            parse_geometry(&data),
            Some(SourceInfo {
                width: 480,
                height: 270
            })
        );
    }

    #[test]
    fn missing_geometry_is_detected() {
        let data: serde_json::Value = serde_json::from_str(r#"{"streams":[{}]}"#).unwrap();
        assert_eq!(parse_geometry(&data), None);

        let data: serde_json::Value = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(parse_geometry(&data), None);
    }
}
