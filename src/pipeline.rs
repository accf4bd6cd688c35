//! End-to-end generation: decision card in, MP4 out.

use std::path::PathBuf;

use crate::assemble::{Assembler, Background, SequencePlan};
use crate::audio::{fit_audio_to_frames, frames_for_duration, write_f32le_file};
use crate::core::Rgba8;
use crate::encode_ffmpeg::{FfmpegSink, PcmTrack};
use crate::error::CardreelResult;
use crate::media::{self, MIX_SAMPLE_RATE, VideoFrameCache};
use crate::model::DecisionCard;
use crate::render_cpu::{CardRenderer, CpuCardRenderer, RenderedCard};
use crate::render_html::HtmlCardRenderer;
use crate::temp::TempFiles;
use crate::text::TextEngine;

/// Which card renderer to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RendererKind {
    /// Direct drawing, the primary path.
    #[default]
    Cpu,
    /// External HTML-to-image tool.
    Html,
}

/// Everything one video generation needs, captured up front.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub card: DecisionCard,
    /// Optional caption shown for the full duration.
    pub caption: Option<String>,
    /// Optional background audio source.
    pub audio_path: Option<PathBuf>,
    /// Optional background video source.
    pub bg_video_path: Option<PathBuf>,
    /// Background fill when no video is used (or when the video fails to probe).
    pub bg_color: Rgba8,
    /// Seconds each card stays on screen.
    pub duration_per_card: f64,
    /// Output MP4 path.
    pub out_path: PathBuf,
    /// Optional font file; otherwise resolved from env/system.
    pub font: Option<PathBuf>,
    pub renderer: RendererKind,
}

impl GenerateRequest {
    /// Request with defaults for everything but the card and output path.
    pub fn new(card: DecisionCard, out_path: impl Into<PathBuf>) -> Self {
        Self {
            card,
            caption: None,
            audio_path: None,
            bg_video_path: None,
            bg_color: Rgba8::BLACK,
            duration_per_card: crate::assemble::DEFAULT_DURATION_PER_CARD,
            out_path: out_path.into(),
            font: None,
            renderer: RendererKind::default(),
        }
    }
}

/// Run the full pipeline: validate, render one card per choice, composite, encode.
///
/// The card is validated before any temp file is created. A background video that
/// fails to probe downgrades to the solid background with a warning; renderer and
/// encoder failures abort.
#[tracing::instrument(skip(request), fields(out = %request.out_path.display()))]
pub fn generate(request: &GenerateRequest) -> CardreelResult<()> {
    request.card.validate()?;
    let plan = SequencePlan::with_duration_per_card(request.duration_per_card)?;

    let mut renderer: Box<dyn CardRenderer> = match request.renderer {
        RendererKind::Cpu => Box::new(CpuCardRenderer::new(TextEngine::from_system_font(
            request.font.as_deref(),
        )?)),
        RendererKind::Html => Box::new(HtmlCardRenderer::new(None)),
    };
    let cards = render_cards(&request.card, renderer.as_mut())?;

    let mut background = match request.bg_video_path.as_deref() {
        Some(path) => match media::probe_video(path) {
            Ok(info) => Background::Video(VideoFrameCache::new(info)),
            Err(e) => {
                tracing::warn!(
                    video = %path.display(),
                    error = %e,
                    "background video unusable, falling back to solid color"
                );
                Background::Solid(request.bg_color)
            }
        },
        None => Background::Solid(request.bg_color),
    };

    let mut temp = TempFiles::new();
    let audio = match request.audio_path.as_deref() {
        Some(path) => {
            let source = media::decode_audio_f32_stereo(path, MIX_SAMPLE_RATE)?;
            let card_count = plan.card_count(cards.len());
            let frames =
                frames_for_duration(plan.total_duration(card_count), MIX_SAMPLE_RATE);
            let fitted = fit_audio_to_frames(&source, frames)?;
            let pcm_path = temp.reserve("audio_mix", "f32le");
            write_f32le_file(&fitted, &pcm_path)?;
            Some(PcmTrack {
                path: pcm_path,
                sample_rate: MIX_SAMPLE_RATE,
                channels: 2,
            })
        }
        None => None,
    };

    let mut sink = FfmpegSink::new(request.out_path.clone(), request.bg_color);
    // The assembler only shapes text for the caption; skip font resolution otherwise.
    let mut assembler = match &request.caption {
        Some(_) => Assembler::with_text(
            plan,
            TextEngine::from_system_font(request.font.as_deref())?,
        ),
        None => Assembler::new(plan),
    };
    assembler.assemble(
        &cards,
        &mut background,
        request.caption.as_deref(),
        audio,
        &mut sink,
    )?;

    temp.cleanup();
    Ok(())
}

/// Render one still per choice, each with that choice active.
pub fn render_cards(
    card: &DecisionCard,
    renderer: &mut dyn CardRenderer,
) -> CardreelResult<Vec<RenderedCard>> {
    (0..card.choices.len())
        .map(|i| renderer.render(card, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Choice;

    #[test]
    fn invalid_card_is_rejected_before_any_work() {
        let card = DecisionCard {
            category: "Pets".into(),
            title: "What pet should I get?".into(),
            description: "Tough call".into(),
            choices: vec![Choice::from_free_text("  ", "", "")],
        };
        let request = GenerateRequest::new(card, "/nonexistent/out.mp4");
        let err = generate(&request).unwrap_err();
        assert!(err.to_string().contains("validation"));
    }

    #[test]
    fn request_defaults_are_sane() {
        let card = DecisionCard {
            category: "Pets".into(),
            title: "t".into(),
            description: "d".into(),
            choices: vec![Choice::from_free_text("Dog", "loyal", "")],
        };
        let request = GenerateRequest::new(card, "out.mp4");
        assert_eq!(request.duration_per_card, 1.5);
        assert_eq!(request.bg_color, Rgba8::BLACK);
        assert_eq!(request.renderer, RendererKind::Cpu);
        assert!(request.caption.is_none());
    }
}
