//! FFmpeg invocation: argument builder and a runner with timeout and
//! cancellation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One ffmpeg invocation with any number of inputs and a single output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Numbered in `-i` order
    inputs: Vec<PathBuf>,
    output: PathBuf,
    /// Everything between the last `-i` and the output path
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![input.as_ref().to_path_buf()],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(input.as_ref().to_path_buf());
        self
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    fn flag(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Select a stream for the output, e.g. `1:a:0`.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.flag("-map", stream)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.flag("-c:v", codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.flag("-c:a", codec)
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.flag("-preset", preset)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.flag("-b:a", bitrate)
    }

    /// Cut the output at `seconds`.
    pub fn output_duration(self, seconds: f64) -> Self {
        self.flag("-t", format!("{:.3}", seconds))
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-v", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        for input in &self.inputs {
            args.push("-i".into());
            args.push(input.to_string_lossy().into_owned());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs ffmpeg, killing it on timeout or when the cancel signal reads `true`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg"))?;

        if let Some(missing) = cmd.inputs().iter().find(|input| !input.exists()) {
            return Err(MediaError::FileNotFound(missing.clone()));
        }

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let stderr_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        });

        let outcome = self.wait(&mut child).await;
        let stderr_tail = stderr_reader.await.unwrap_or_default();

        match outcome {
            WaitOutcome::Exited(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(MediaError::ffmpeg_failed(
                        format!("exited with {}", status),
                        Some(stderr_tail),
                        status.code(),
                    ))
                }
            }
            WaitOutcome::TimedOut => Err(MediaError::Timeout(
                self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            )),
            WaitOutcome::Cancelled => Err(MediaError::Cancelled),
        }
    }

    async fn wait(&self, child: &mut Child) -> WaitOutcome {
        let mut cancel_rx = self.cancel_rx.clone();

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = sleep_or_forever(self.timeout) => WaitOutcome::TimedOut,
            _ = wait_for_cancel(cancel_rx.as_mut()) => WaitOutcome::Cancelled,
        };

        match outcome {
            WaitOutcome::TimedOut => {
                warn!(timeout = ?self.timeout, "ffmpeg timed out, killing process");
                let _ = child.kill().await;
            }
            WaitOutcome::Cancelled => {
                info!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
            }
            WaitOutcome::Exited(_) => {}
        }
        outcome
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Resolve once the signal reads `true`. A dropped sender never cancels.
async fn wait_for_cancel(cancel_rx: Option<&mut watch::Receiver<bool>>) {
    let Some(rx) = cancel_rx else {
        return std::future::pending().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_with_two_inputs() {
        let args = FfmpegCommand::new("/in/video.mp4", "/out/merged.mp4")
            .add_input("/in/audio.mp3")
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264")
            .audio_codec("aac")
            .output_duration(17.4)
            .build_args();
        let joined = args.join(" ");

        assert!(joined.starts_with("-y -hide_banner -v error -i /in/video.mp4 -i /in/audio.mp3"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-t 17.400"));
        assert!(!joined.contains("-shortest"));
        assert_eq!(args.last().unwrap(), "/out/merged.mp4");
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let cmd = FfmpegCommand::new("/definitely/not/here.mp4", "/tmp/out.mp4");
        match FfmpegRunner::new().run(&cmd).await {
            // Without ffmpeg installed the tool check fires first.
            Err(MediaError::ToolNotFound(_)) => {}
            Err(MediaError::FileNotFound(path)) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.mp4"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_for_cancel_resolves_on_true() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_for_cancel(Some(&mut rx)).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancel should resolve")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_cancel_ignores_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let result =
            tokio::time::timeout(Duration::from_secs(5), wait_for_cancel(Some(&mut rx))).await;
        assert!(result.is_err());
    }
}
