//! Camera devices and video files decoded by an `ffmpeg` subprocess.
//!
//! `ffmpeg` scales the input to the configured size and writes raw BGR24
//! frames to stdout. A reader thread cuts the stream into frames and feeds a
//! small bounded channel; `next_frame` waits on it with a timeout so a
//! stalled camera surfaces as [`SourceError::Timeout`].
//!
//! When the process exits, a live input (camera device or network stream)
//! reports [`SourceError::Disconnected`] so the capture thread reopens it. A
//! file ends with `Ok(None)` on a clean exit and [`SourceError::Exited`]
//! otherwise.
use super::{FrameSource, SourceError};
use crate::frame::{Frame, PixelFormat};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

const QUEUE_SIZE: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Device index (`0`), device path (`/dev/video0`) or a file/URL.
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Read files at their native frame rate (`-re`).
    pub realtime: bool,
    pub frame_timeout_ms: u64,
    /// Capture rate requested from a camera device; `None` keeps the
    /// driver default.
    pub fps: Option<u32>,
    /// V4L2 controls (`exposure_absolute`, `gain`, ...) applied with
    /// `v4l2-ctl` before each camera start.
    pub controls: BTreeMap<String, i64>,
    pub ffmpeg_path: String,
    pub v4l2_ctl_path: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            uri: "0".to_string(),
            width: 1280,
            height: 720,
            realtime: true,
            frame_timeout_ms: 5000,
            fps: None,
            controls: BTreeMap::new(),
            ffmpeg_path: "ffmpeg".to_string(),
            v4l2_ctl_path: "v4l2-ctl".to_string(),
        }
    }
}

impl FfmpegConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * PixelFormat::Bgr8.channels()
    }

    /// Camera device or network stream, as opposed to a finite file.
    pub fn is_live(&self) -> bool {
        const STREAM_SCHEMES: [&str; 4] = ["rtsp://", "rtmp://", "udp://", "srt://"];
        parse_device_index(&self.uri).is_some()
            || STREAM_SCHEMES.iter().any(|scheme| self.uri.starts_with(scheme))
    }
}

pub(crate) fn parse_device_index(uri: &str) -> Option<u32> {
    if let Ok(index) = uri.parse::<u32>() {
        return Some(index);
    }
    let stripped = uri.strip_prefix("/dev/video")?;
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    stripped.parse().ok()
}

/// Arguments for one `ffmpeg` invocation.
pub(crate) fn build_args(config: &FfmpegConfig) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let input = match parse_device_index(&config.uri) {
        Some(index) => {
            if let Some(fps) = config.fps {
                args.extend(["-framerate".to_string(), fps.to_string()]);
            }
            args.extend(["-f".to_string(), "video4linux2".to_string()]);
            format!("/dev/video{index}")
        }
        None => {
            if config.realtime {
                args.push("-re".to_string());
            }
            config.uri.clone()
        }
    };
    args.extend([
        "-i".to_string(),
        input,
        "-an".to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", config.width, config.height),
        "-pix_fmt".to_string(),
        "bgr24".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-".to_string(),
    ]);
    args
}

/// `v4l2-ctl` arguments setting every configured control, if any.
pub(crate) fn control_args(config: &FfmpegConfig) -> Option<Vec<String>> {
    let index = parse_device_index(&config.uri)?;
    if config.controls.is_empty() {
        return None;
    }
    let controls: Vec<String> = config
        .controls
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    Some(vec![
        "-d".to_string(),
        format!("/dev/video{index}"),
        format!("--set-ctrl={}", controls.join(",")),
    ])
}

/// Camera controls are best effort: a driver without a control still
/// delivers frames.
fn apply_controls(config: &FfmpegConfig) {
    let Some(args) = control_args(config) else {
        return;
    };
    match Command::new(&config.v4l2_ctl_path)
        .args(&args)
        .stdin(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {
            debug!("camera controls applied: {}", args.join(" "))
        }
        Ok(status) => warn!(
            "{} exited with {status}; camera controls unchanged",
            config.v4l2_ctl_path
        ),
        Err(err) => warn!("cannot run {}: {err}", config.v4l2_ctl_path),
    }
}

pub struct FfmpegSource {
    config: FfmpegConfig,
    child: Option<Child>,
    frames: Receiver<io::Result<Vec<u8>>>,
}

impl FfmpegSource {
    pub fn spawn(config: FfmpegConfig) -> Result<Self, SourceError> {
        if config.width == 0 || config.height == 0 {
            return Err(SourceError::Open {
                uri: config.uri.clone(),
                reason: "frame size must be non-zero".to_string(),
            });
        }
        let (child, frames) = start_process(&config)?;
        info!(
            "ffmpeg source {} started at {}x{}",
            config.uri, config.width, config.height
        );
        Ok(Self {
            config,
            child: Some(child),
            frames,
        })
    }

    /// The reader hit end of stream: reap the process and decide whether
    /// this is the end or a lost device.
    fn stream_ended(&mut self) -> Result<Option<Frame>, SourceError> {
        let status = self.child.take().map(|mut child| child.wait());
        if self.config.is_live() {
            let detail = match &status {
                Some(Ok(status)) => status.to_string(),
                Some(Err(err)) => err.to_string(),
                None => "no process".to_string(),
            };
            warn!("ffmpeg source {} lost ({detail})", self.config.uri);
            return Err(SourceError::Disconnected(self.describe()));
        }
        match status {
            Some(Ok(status)) if !status.success() => Err(self.exited(status)),
            Some(Err(err)) => Err(SourceError::Io(err)),
            _ => {
                info!("ffmpeg source {} reached end of stream", self.config.uri);
                Ok(None)
            }
        }
    }

    fn exited(&self, status: ExitStatus) -> SourceError {
        SourceError::Exited {
            uri: self.config.uri.clone(),
            status: status.to_string(),
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("ffmpeg source {} stopped", self.config.uri);
        }
    }
}

fn start_process(
    config: &FfmpegConfig,
) -> Result<(Child, Receiver<io::Result<Vec<u8>>>), SourceError> {
    apply_controls(config);
    let mut cmd = Command::new(&config.ffmpeg_path);
    cmd.args(build_args(config))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    let open_err = |reason: String| SourceError::Open {
        uri: config.uri.clone(),
        reason,
    };
    let mut child = cmd.spawn().map_err(|err| open_err(err.to_string()))?;
    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(open_err("failed to capture ffmpeg stdout".to_string()));
    };

    let (tx, rx) = bounded(QUEUE_SIZE);
    let frame_bytes = config.frame_bytes();
    thread::Builder::new()
        .name("ffmpeg-reader".to_string())
        .spawn(move || reader_loop(stdout, frame_bytes, tx))
        .map_err(|err| open_err(err.to_string()))?;
    Ok((child, rx))
}

fn reader_loop(mut stdout: ChildStdout, frame_bytes: usize, tx: Sender<io::Result<Vec<u8>>>) {
    let mut buffer = vec![0u8; frame_bytes];
    loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                if tx.send(Ok(buffer.clone())).is_err() {
                    break;
                }
            }
            // Clean end of the stream; dropping `tx` reports it.
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => {
                let _ = tx.send(Err(err));
                break;
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let timeout = self.config.frame_timeout();
        match self.frames.recv_timeout(timeout) {
            Ok(Ok(data)) => Ok(Some(Frame::new(
                self.config.width as usize,
                self.config.height as usize,
                PixelFormat::Bgr8,
                data,
            ))),
            Ok(Err(err)) if self.config.is_live() => {
                warn!("ffmpeg source {}: {err}", self.config.uri);
                Err(SourceError::Disconnected(self.describe()))
            }
            Ok(Err(err)) => Err(SourceError::Io(err)),
            Err(RecvTimeoutError::Timeout) => Err(SourceError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => self.stream_ended(),
        }
    }

    fn describe(&self) -> String {
        format!(
            "ffmpeg {} ({}x{})",
            self.config.uri, self.config.width, self.config.height
        )
    }

    fn reopen(&mut self) -> Result<(), SourceError> {
        warn!("restarting ffmpeg source {}", self.config.uri);
        self.shutdown();
        let (child, frames) = start_process(&self.config)?;
        self.child = Some(child);
        self.frames = frames;
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
