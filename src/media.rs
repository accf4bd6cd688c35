use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::{CardreelError, CardreelResult};

/// Internal audio sample rate used across decode/loop/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Basic metadata about a source video file.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    /// Source path used for probing/decoding.
    pub source_path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Container duration in seconds.
    pub duration_sec: f64,
    /// Whether ffprobe detected at least one audio stream.
    pub has_audio: bool,
}

/// Decoded interleaved floating-point PCM.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels.max(1))
    }
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from PATH.
pub fn ffmpeg_tools_available() -> bool {
    let probe = |bin: &str| {
        std::process::Command::new(bin)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    probe("ffmpeg") && probe("ffprobe")
}

/// Probe source video metadata through `ffprobe`.
pub fn probe_video(source_path: &Path) -> CardreelResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| CardreelError::encode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(CardreelError::encode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| CardreelError::encode(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| CardreelError::encode("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| CardreelError::encode("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| CardreelError::encode("missing video height from ffprobe"))?;
    let duration_sec = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| CardreelError::encode("missing or invalid video duration from ffprobe"))?;
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        duration_sec,
        has_audio,
    })
}

/// Decode a single straight-alpha RGBA frame from source video at `source_time_sec`.
pub fn decode_video_frame_rgba8(
    source: &VideoSourceInfo,
    source_time_sec: f64,
) -> CardreelResult<Vec<u8>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{source_time_sec:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| CardreelError::encode(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(CardreelError::encode(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = source.width as usize * source.height as usize * 4;
    if expected_len == 0 || out.stdout.len() < expected_len {
        return Err(CardreelError::encode(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }
    Ok(out.stdout[..expected_len].to_vec())
}

/// Decode audio from a media source to stereo interleaved `f32` PCM.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> CardreelResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| CardreelError::encode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(CardreelError::encode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(CardreelError::encode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: pcm,
    })
}

/// Small LRU cache of decoded background frames keyed by millisecond timestamps.
pub struct VideoFrameCache {
    info: VideoSourceInfo,
    frames: HashMap<u64, Vec<u8>>,
    lru: VecDeque<u64>,
    capacity: usize,
}

impl VideoFrameCache {
    pub fn new(info: VideoSourceInfo) -> Self {
        let capacity = std::env::var("CARDREEL_VIDEO_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(64);
        Self {
            info,
            frames: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
        }
    }

    pub fn info(&self) -> &VideoSourceInfo {
        &self.info
    }

    /// Decode (or fetch cached) the frame at `source_time_s`, straight RGBA8.
    pub fn frame_at(&mut self, source_time_s: f64) -> CardreelResult<&[u8]> {
        let key = ((source_time_s.max(0.0)) * 1000.0).round() as u64;
        if !self.frames.contains_key(&key) {
            let rgba = decode_video_frame_rgba8(&self.info, source_time_s)?;
            self.frames.insert(key, rgba);
            self.lru.push_back(key);
            while self.lru.len() > self.capacity {
                if let Some(old) = self.lru.pop_front() {
                    self.frames.remove(&old);
                }
            }
        } else if let Some(pos) = self.lru.iter().position(|k| *k == key) {
            self.lru.remove(pos);
            self.lru.push_back(key);
        }
        Ok(self.frames.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }
}

// No unit tests here: these functions shell out to `ffprobe`/`ffmpeg` and are best
// validated via integration tests that are skipped when the tools are unavailable.
