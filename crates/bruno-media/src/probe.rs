//! FFprobe media inspection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// What the pipeline needs to know about a media file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// Container-reported duration in seconds
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
    /// Codec of the first video stream, or of the first audio stream when
    /// there is no video
    pub codec: Option<String>,
    /// File size in bytes
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("could not read {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        ));
    }

    parse_probe_output(&output.stdout)
}

/// Parse the JSON printed by `ffprobe -show_format -show_streams`.
///
/// The duration is the container's, never a stream's.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let report: ProbeReport = serde_json::from_slice(stdout)?;

    let duration = report
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .ok_or_else(|| MediaError::invalid_media("container reports no duration"))?;

    let first = |kind: &str| report.streams.iter().find(|s| s.codec_type == kind);
    let video = first("video");
    let audio = first("audio");

    Ok(MediaInfo {
        duration,
        has_video: video.is_some(),
        has_audio: audio.is_some(),
        codec: video.or(audio).and_then(|s| s.codec_name.clone()),
        size: report
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    })
}

/// Container-reported duration in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_media(path).await?.duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "duration": "17.366667"},
            {"codec_type": "audio", "codec_name": "aac", "duration": "17.450000"}
        ],
        "format": {"duration": "17.400000", "size": "2048000"}
    }"#;

    #[test]
    fn test_container_duration_wins_over_streams() {
        let info = parse_probe_output(CLIP.as_bytes()).unwrap();
        assert!((info.duration - 17.4).abs() < 1e-9);
        assert!(info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.codec.as_deref(), Some("h264"));
        assert_eq!(info.size, 2_048_000);
    }

    #[test]
    fn test_parse_probe_output_audio_only() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],
                       "format":{"duration":"42.5"}}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert!(!info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.codec.as_deref(), Some("mp3"));
        assert_eq!(info.size, 0);
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let json = r#"{"streams":[],"format":{}}"#;
        let err = parse_probe_output(json.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));

        let json = r#"{"streams":[],"format":{"duration":"N/A"}}"#;
        assert!(parse_probe_output(json.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(MediaError::ProbeOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_media("/nonexistent/clip.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
