//! MP4 output through a spawned `ffmpeg` process.
//!
//! The assembler describes the stream once (canvas, frame rate, optional PCM track)
//! and then pushes premultiplied RGBA frames in timeline order. Each frame is
//! flattened over an opaque backdrop and piped to `ffmpeg` as rawvideo; `ffmpeg`
//! encodes H.264 + yuv420p, muxes AAC when audio is present, and writes the moov
//! atom up front.

use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::core::{Canvas, Fps, FrameIndex, Rgba8, mul_div255_u16};
use crate::error::{CardreelError, CardreelResult};

/// Fixed description of the frame stream a sink is about to receive.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    /// PCM track muxed alongside the video, if any.
    pub audio: Option<PcmTrack>,
}

impl EncodeConfig {
    fn validate(&self) -> CardreelResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(CardreelError::validation("output canvas must be non-empty"));
        }
        // yuv420p subsamples chroma 2x2.
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(CardreelError::validation(
                "output dimensions must be even for yuv420p",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(CardreelError::validation(
                "frame rate must be a positive rational",
            ));
        }
        if let Some(track) = &self.audio
            && (track.sample_rate == 0 || track.channels == 0)
        {
            return Err(CardreelError::validation(
                "pcm track needs a sample rate and a channel count",
            ));
        }
        Ok(())
    }

    fn frame_bytes(&self) -> usize {
        self.canvas.width as usize * self.canvas.height as usize * 4
    }
}

/// An interleaved `f32le` PCM file prepared by the audio stage.
#[derive(Clone, Debug)]
pub struct PcmTrack {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Receives composited frames in timeline order.
///
/// `begin` is called once, then `push_frame` once per frame with consecutive indices
/// starting at zero and exactly `canvas.width * canvas.height * 4` premultiplied RGBA
/// bytes, then `end` once.
pub trait FrameSink {
    fn begin(&mut self, config: &EncodeConfig) -> CardreelResult<()>;
    fn push_frame(&mut self, index: FrameIndex, rgba_premul: &[u8]) -> CardreelResult<()>;
    fn end(&mut self) -> CardreelResult<()>;
}

/// Streams frames into a spawned `ffmpeg`, producing an MP4 at `out_path`.
///
/// An existing file at `out_path` is replaced; the tool always re-renders in place.
pub struct FfmpegSink {
    out_path: PathBuf,
    backdrop: Rgba8,
    encoder: Option<RunningEncoder>,
    frame_bytes: usize,
    next_index: u64,
}

struct RunningEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    // Drained off-thread so a chatty ffmpeg cannot deadlock against our writes.
    stderr_drain: std::thread::JoinHandle<Vec<u8>>,
    flattened: Vec<u8>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, backdrop: Rgba8) -> Self {
        Self {
            out_path: out_path.into(),
            backdrop,
            encoder: None,
            frame_bytes: 0,
            next_index: 0,
        }
    }

    fn spawn_encoder(&self, config: &EncodeConfig) -> CardreelResult<Child> {
        let Canvas { width, height } = config.canvas;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{}/{}", config.fps.num, config.fps.den)])
            .args(["-i", "pipe:0"]);
        if let Some(track) = &config.audio {
            cmd.args(["-f", "f32le"])
                .args(["-ar", &track.sample_rate.to_string()])
                .args(["-ac", &track.channels.to_string()])
                .arg("-i")
                .arg(&track.path);
        }
        cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]);
        if config.audio.is_some() {
            cmd.args(["-c:a", "aac", "-shortest"]);
        } else {
            cmd.arg("-an");
        }
        cmd.args(["-movflags", "+faststart"]).arg(&self.out_path);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CardreelError::encode(format!("could not start ffmpeg (is it installed?): {e}"))
            })
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, config: &EncodeConfig) -> CardreelResult<()> {
        config.validate()?;
        if self.encoder.is_some() {
            return Err(CardreelError::encode("encoder already started"));
        }

        if let Some(dir) = self.out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            use anyhow::Context as _;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory '{}'", dir.display()))?;
        }

        let mut child = self.spawn_encoder(config)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CardreelError::encode("ffmpeg stdin was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CardreelError::encode("ffmpeg stderr was not captured"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        self.frame_bytes = config.frame_bytes();
        self.next_index = 0;
        self.encoder = Some(RunningEncoder {
            child,
            stdin: Some(stdin),
            stderr_drain,
            flattened: vec![0; config.frame_bytes()],
        });
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, rgba_premul: &[u8]) -> CardreelResult<()> {
        if index.0 != self.next_index {
            return Err(CardreelError::encode(format!(
                "expected frame {}, got frame {}",
                self.next_index, index.0
            )));
        }
        if rgba_premul.len() != self.frame_bytes {
            return Err(CardreelError::encode(format!(
                "frame has {} bytes, the configured canvas needs {}",
                rgba_premul.len(),
                self.frame_bytes
            )));
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CardreelError::encode("encoder not started"))?;

        flatten_over_backdrop(rgba_premul, self.backdrop, &mut encoder.flattened);

        let stdin = encoder
            .stdin
            .as_mut()
            .ok_or_else(|| CardreelError::encode("encoder already finished"))?;
        stdin.write_all(&encoder.flattened).map_err(|e| {
            CardreelError::encode(format!("ffmpeg stopped accepting frames: {e}"))
        })?;
        self.next_index += 1;
        Ok(())
    }

    fn end(&mut self) -> CardreelResult<()> {
        let mut encoder = self
            .encoder
            .take()
            .ok_or_else(|| CardreelError::encode("encoder not started"))?;
        drop(encoder.stdin.take());

        let status = encoder
            .child
            .wait()
            .map_err(|e| CardreelError::encode(format!("waiting on ffmpeg failed: {e}")))?;
        let stderr = encoder.stderr_drain.join().unwrap_or_default();
        if !status.success() {
            return Err(CardreelError::encode(format!(
                "ffmpeg failed ({status}): {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Collects frames in memory, enforcing the sink contract; stands in for the real
/// encoder in tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    config: Option<EncodeConfig>,
    frames: Vec<Vec<u8>>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&EncodeConfig> {
        self.config.as_ref()
    }

    /// Captured frames in timeline order.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, config: &EncodeConfig) -> CardreelResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, rgba_premul: &[u8]) -> CardreelResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| CardreelError::encode("sink not started"))?;
        if index.0 != self.frames.len() as u64 {
            return Err(CardreelError::encode(format!(
                "expected frame {}, got frame {}",
                self.frames.len(),
                index.0
            )));
        }
        if rgba_premul.len() != config.frame_bytes() {
            return Err(CardreelError::encode(format!(
                "frame has {} bytes, the configured canvas needs {}",
                rgba_premul.len(),
                config.frame_bytes()
            )));
        }
        self.frames.push(rgba_premul.to_vec());
        Ok(())
    }

    fn end(&mut self) -> CardreelResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Composite a premultiplied RGBA frame over an opaque backdrop, writing straight
/// RGBA into `out`. Lengths are guaranteed equal by the callers.
fn flatten_over_backdrop(src_premul: &[u8], backdrop: Rgba8, out: &mut [u8]) {
    let (bg_r, bg_g, bg_b) = (
        u16::from(backdrop.r),
        u16::from(backdrop.g),
        u16::from(backdrop.b),
    );
    for (px, out_px) in src_premul.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        let remainder = 255 - u16::from(px[3]);
        out_px[0] = (u16::from(px[0]) + mul_div255_u16(bg_r, remainder)).min(255) as u8;
        out_px[1] = (u16::from(px[1]) + mul_div255_u16(bg_g, remainder)).min(255) as u8;
        out_px[2] = (u16::from(px[2]) + mul_div255_u16(bg_b, remainder)).min(255) as u8;
        out_px[3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> EncodeConfig {
        EncodeConfig {
            canvas: Canvas {
                width: 4,
                height: 2,
            },
            fps: Fps { num: 24, den: 1 },
            audio: None,
        }
    }

    #[test]
    fn transparent_pixels_flatten_to_the_backdrop() {
        let backdrop = Rgba8::new(200, 100, 50, 255);
        let src = [0u8, 0, 0, 0];
        let mut out = [0u8; 4];
        flatten_over_backdrop(&src, backdrop, &mut out);
        assert_eq!(out, [200, 100, 50, 255]);
    }

    #[test]
    fn opaque_pixels_pass_through_unchanged() {
        let src = [7u8, 8, 9, 255];
        let mut out = [0u8; 4];
        flatten_over_backdrop(&src, Rgba8::new(200, 100, 50, 255), &mut out);
        assert_eq!(out, src);
    }

    #[test]
    fn half_covered_pixels_blend_toward_the_backdrop() {
        // Premultiplied mid-gray at alpha 128 over (200, 100, 50).
        let src = [64u8, 64, 64, 128];
        let mut out = [0u8; 4];
        flatten_over_backdrop(&src, Rgba8::new(200, 100, 50, 255), &mut out);
        assert_eq!(out, [164, 114, 89, 255]);
    }

    #[test]
    fn in_memory_sink_rejects_out_of_order_frames() {
        let config = small_config();
        let frame = vec![0u8; config.frame_bytes()];
        let mut sink = InMemorySink::new();
        sink.begin(&config).unwrap();
        sink.push_frame(FrameIndex(0), &frame).unwrap();
        let err = sink.push_frame(FrameIndex(2), &frame).unwrap_err();
        assert!(err.to_string().contains("expected frame 1"));
    }

    #[test]
    fn in_memory_sink_rejects_wrong_sized_frames() {
        let config = small_config();
        let mut sink = InMemorySink::new();
        sink.begin(&config).unwrap();
        let err = sink.push_frame(FrameIndex(0), &[0u8; 4]).unwrap_err();
        assert!(err.to_string().contains("configured canvas"));
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let mut config = small_config();
        config.canvas.width = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_rate_audio_track_is_rejected() {
        let mut config = small_config();
        config.audio = Some(PcmTrack {
            path: "mix.f32le".into(),
            sample_rate: 0,
            channels: 2,
        });
        assert!(config.validate().is_err());
    }
}
