//! Background audio preparation.
//!
//! The audio track must exactly cover the output video: shorter sources are looped by
//! concatenation, longer sources are trimmed. The result is written as raw `f32le` PCM
//! for the encoder's second ffmpeg input.

use std::path::Path;

use crate::error::{CardreelError, CardreelResult};
use crate::media::AudioPcm;

/// Loop or trim `source` so it covers exactly `total_frames` sample frames.
///
/// Looping is plain concatenation with no crossfade. A source with zero frames is
/// rejected rather than producing silence.
pub fn fit_audio_to_frames(source: &AudioPcm, total_frames: u64) -> CardreelResult<AudioPcm> {
    let src_frames = source.frames();
    if src_frames == 0 {
        return Err(CardreelError::validation(
            "background audio decoded to zero samples",
        ));
    }

    let channels = usize::from(source.channels);
    let total = usize::try_from(total_frames)
        .map_err(|_| CardreelError::validation("audio frame count too large"))?;

    let mut out = Vec::with_capacity(total * channels);
    while out.len() < total * channels {
        let remaining = total * channels - out.len();
        let take = remaining.min(source.interleaved_f32.len());
        out.extend_from_slice(&source.interleaved_f32[..take]);
    }

    Ok(AudioPcm {
        sample_rate: source.sample_rate,
        channels: source.channels,
        interleaved_f32: out,
    })
}

/// Number of audio sample frames covering `duration_sec` at `sample_rate`.
pub fn frames_for_duration(duration_sec: f64, sample_rate: u32) -> u64 {
    (duration_sec * f64::from(sample_rate)).round().max(0.0) as u64
}

/// Write interleaved `f32` PCM samples as raw little-endian bytes.
pub fn write_f32le_file(pcm: &AudioPcm, out_path: &Path) -> CardreelResult<()> {
    let mut bytes = Vec::<u8>::with_capacity(pcm.interleaved_f32.len() * 4);
    for &sample in &pcm.interleaved_f32 {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        CardreelError::encode(format!(
            "failed to write audio pcm file '{}': {e}",
            out_path.display()
        ))
    })
}
