//! Per-frame composition of card stills into the output video.
//!
//! The assembler owns the timeline: each choice card occupies its own window of the
//! output, the background (solid color or cover-cropped looping video) runs underneath
//! for the full duration, and an optional caption sits on top throughout. Frames are
//! composited with `vello_cpu` and pushed into a [`FrameSink`] in timeline order.

use std::sync::Arc;

use crate::core::{Canvas, Fps, FrameIndex, Rgba8, premul_rgba8};
use crate::encode_ffmpeg::{EncodeConfig, FrameSink, PcmTrack};
use crate::error::{CardreelError, CardreelResult};
use crate::media::VideoFrameCache;
use crate::render_cpu::{RenderedCard, draw_parley_layout};
use crate::text::{TextBrushRgba8, TextEngine};

/// Seconds each card stays on screen.
pub const DEFAULT_DURATION_PER_CARD: f64 = 1.5;
/// At most this many choice cards make it into the video.
pub const MAX_CARDS: usize = 3;
/// The first card appears this long after the video starts.
pub const FIRST_CARD_DELAY_SEC: f64 = 0.5;
/// Once shown, the first card fades in over this long.
pub const FIRST_CARD_FADE_SEC: f64 = 0.8;

/// Output canvas, portrait 9:16.
pub const OUTPUT_CANVAS: Canvas = Canvas {
    width: 1080,
    height: 1920,
};
/// Output frame rate.
pub const OUTPUT_FPS: Fps = Fps { num: 24, den: 1 };

const CARD_TOP_Y: f64 = 400.0;
const CAPTION_SIZE_PX: f32 = 55.0;
const CAPTION_Y: f64 = 375.0;
const CAPTION_WRAP_MARGIN: f64 = 150.0;

/// Timing and geometry of one output video.
#[derive(Clone, Copy, Debug)]
pub struct SequencePlan {
    pub duration_per_card: f64,
    pub fps: Fps,
    pub canvas: Canvas,
}

impl Default for SequencePlan {
    fn default() -> Self {
        Self {
            duration_per_card: DEFAULT_DURATION_PER_CARD,
            fps: OUTPUT_FPS,
            canvas: OUTPUT_CANVAS,
        }
    }
}

impl SequencePlan {
    /// Plan with a custom per-card duration, validated.
    pub fn with_duration_per_card(duration_per_card: f64) -> CardreelResult<Self> {
        if !duration_per_card.is_finite() || duration_per_card <= 0.0 {
            return Err(CardreelError::validation(
                "duration per card must be finite and > 0",
            ));
        }
        Ok(Self {
            duration_per_card,
            ..Self::default()
        })
    }

    /// Number of cards that make it into the video.
    pub fn card_count(&self, choices: usize) -> usize {
        choices.min(MAX_CARDS)
    }

    /// Total output duration in seconds.
    pub fn total_duration(&self, card_count: usize) -> f64 {
        self.duration_per_card * card_count as f64
    }

    /// Total output frame count.
    pub fn total_frames(&self, card_count: usize) -> u64 {
        self.fps.secs_to_frames_round(self.total_duration(card_count))
    }

    /// Which card is on screen at `t`. Card `i` owns exactly `[i*d, (i+1)*d)`.
    pub fn card_index_at(&self, t: f64, card_count: usize) -> usize {
        let idx = (t / self.duration_per_card).floor().max(0.0) as usize;
        idx.min(card_count.saturating_sub(1))
    }

    /// Opacity of the card at `card_index` at absolute time `t`.
    ///
    /// The first card is held back briefly and then fades in; subsequent cards cut in
    /// at full opacity.
    pub fn card_opacity_at(&self, card_index: usize, t: f64) -> f32 {
        if card_index > 0 {
            return 1.0;
        }
        if t < FIRST_CARD_DELAY_SEC {
            return 0.0;
        }
        (((t - FIRST_CARD_DELAY_SEC) / FIRST_CARD_FADE_SEC).clamp(0.0, 1.0)) as f32
    }
}

/// Background layer for the full duration of the video.
pub enum Background {
    /// Flat fill.
    Solid(Rgba8),
    /// Cover-cropped video, looped by modular source time.
    Video(VideoFrameCache),
}

/// Composites rendered cards over a background and streams frames to a sink.
pub struct Assembler {
    plan: SequencePlan,
    text: Option<TextEngine>,
    ctx: Option<vello_cpu::RenderContext>,
}

impl Assembler {
    /// Assembler without a text engine; captions cannot be drawn.
    pub fn new(plan: SequencePlan) -> Self {
        Self {
            plan,
            text: None,
            ctx: None,
        }
    }

    /// Assembler that can lay out and draw a caption with `text`.
    pub fn with_text(plan: SequencePlan, text: TextEngine) -> Self {
        Self {
            plan,
            text: Some(text),
            ctx: None,
        }
    }

    pub fn plan(&self) -> &SequencePlan {
        &self.plan
    }

    /// Compose the full video and push every frame into `sink`.
    ///
    /// `cards[i]` is shown during window `i`; at most [`MAX_CARDS`] entries are used.
    pub fn assemble(
        &mut self,
        cards: &[RenderedCard],
        background: &mut Background,
        caption: Option<&str>,
        audio: Option<PcmTrack>,
        sink: &mut dyn FrameSink,
    ) -> CardreelResult<()> {
        if cards.is_empty() {
            return Err(CardreelError::validation(
                "at least one rendered card is required",
            ));
        }
        let card_count = self.plan.card_count(cards.len());
        let total_frames = self.plan.total_frames(card_count);
        let canvas = self.plan.canvas;

        let card_paints = cards[..card_count]
            .iter()
            .map(card_to_image_paint)
            .collect::<CardreelResult<Vec<_>>>()?;

        let caption_layout = match caption.map(str::trim).filter(|c| !c.is_empty()) {
            Some(text) => {
                let engine = self.text.as_mut().ok_or_else(|| {
                    CardreelError::render(
                        "a caption requires an assembler built with a text engine",
                    )
                })?;
                let wrap = (f64::from(canvas.width) - CAPTION_WRAP_MARGIN) as f32;
                let brush = TextBrushRgba8 {
                    r: 255,
                    g: 255,
                    b: 255,
                    a: 255,
                };
                Some(engine.layout_plain(text, CAPTION_SIZE_PX, brush, Some(wrap))?)
            }
            None => None,
        };
        // Center the caption block on the canvas.
        let caption_x = caption_layout
            .as_ref()
            .map(|l| (f64::from(canvas.width) - f64::from(l.width())) / 2.0)
            .unwrap_or_default();
        let font = self.text.as_ref().map(|t| t.font().clone());

        let w: u16 = canvas
            .width
            .try_into()
            .map_err(|_| CardreelError::render("output width exceeds u16"))?;
        let h: u16 = canvas
            .height
            .try_into()
            .map_err(|_| CardreelError::render("output height exceeds u16"))?;

        sink.begin(&EncodeConfig {
            canvas,
            fps: self.plan.fps,
            audio,
        })?;

        let frame_duration = self.plan.fps.frame_duration_secs();
        let plan = self.plan;
        for frame in 0..total_frames {
            let t = frame as f64 * frame_duration;
            let card_index = plan.card_index_at(t, card_count);
            let opacity = plan.card_opacity_at(card_index, t);

            let bg_frame = match background {
                Background::Solid(color) => BgFrame::Solid(*color),
                Background::Video(cache) => {
                    let info = cache.info().clone();
                    let src_t = t % info.duration_sec;
                    let rgba = cache.frame_at(src_t)?;
                    BgFrame::Image {
                        paint: straight_rgba_to_image_paint(rgba, info.width, info.height)?,
                        width: info.width,
                        height: info.height,
                    }
                }
            };

            let mut pixmap = vello_cpu::Pixmap::new(w, h);
            self.with_ctx_mut(w, h, |ctx| {
                // Background layer.
                match &bg_frame {
                    BgFrame::Solid(color) => {
                        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                            color.r, color.g, color.b, color.a,
                        ));
                        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                            0.0,
                            0.0,
                            f64::from(canvas.width),
                            f64::from(canvas.height),
                        ));
                    }
                    BgFrame::Image {
                        paint,
                        width,
                        height,
                    } => {
                        let transform =
                            cover_transform(*width, *height, canvas.width, canvas.height);
                        ctx.set_transform(transform);
                        ctx.set_paint(paint.clone());
                        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                            0.0,
                            0.0,
                            f64::from(*width),
                            f64::from(*height),
                        ));
                    }
                }

                // Active card, horizontally centered.
                if opacity > 0.0 {
                    let card = &cards[card_index];
                    let card_x = (f64::from(canvas.width) - f64::from(card.width)) / 2.0;
                    ctx.set_transform(vello_cpu::kurbo::Affine::translate((card_x, CARD_TOP_Y)));
                    ctx.set_paint(card_paints[card_index].clone());
                    if opacity < 1.0 {
                        ctx.push_opacity_layer(opacity);
                    }
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        0.0,
                        0.0,
                        f64::from(card.width),
                        f64::from(card.height),
                    ));
                    if opacity < 1.0 {
                        ctx.pop_layer();
                    }
                }

                // Caption above everything, for the full duration.
                if let (Some(layout), Some(font)) = (&caption_layout, &font) {
                    draw_parley_layout(ctx, layout, font.clone(), caption_x, CAPTION_Y);
                }

                ctx.flush();
                ctx.render_to_pixmap(&mut pixmap);
                Ok(())
            })?;

            sink.push_frame(FrameIndex(frame), pixmap.data_as_u8_slice())?;
        }

        sink.end()
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> CardreelResult<R>,
    ) -> CardreelResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(&mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }
}

/// One frame's resolved background paint.
enum BgFrame {
    Solid(Rgba8),
    Image {
        paint: vello_cpu::Image,
        width: u32,
        height: u32,
    },
}

/// Scale-to-cover plus center for a `src` layer filling `dst` with no letterboxing.
fn cover_transform(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> vello_cpu::kurbo::Affine {
    let sx = f64::from(dst_w) / f64::from(src_w.max(1));
    let sy = f64::from(dst_h) / f64::from(src_h.max(1));
    let scale = sx.max(sy);
    let tx = (f64::from(dst_w) - f64::from(src_w) * scale) / 2.0;
    let ty = (f64::from(dst_h) - f64::from(src_h) * scale) / 2.0;
    vello_cpu::kurbo::Affine::translate((tx, ty)) * vello_cpu::kurbo::Affine::scale(scale)
}

fn card_to_image_paint(card: &RenderedCard) -> CardreelResult<vello_cpu::Image> {
    premul_bytes_to_image_paint(&card.rgba8_premul, card.width, card.height)
}

fn straight_rgba_to_image_paint(
    rgba: &[u8],
    width: u32,
    height: u32,
) -> CardreelResult<vello_cpu::Image> {
    let mut premul = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        premul.extend_from_slice(&premul_rgba8([px[0], px[1], px[2], px[3]]));
    }
    premul_bytes_to_image_paint(&premul, width, height)
}

fn premul_bytes_to_image_paint(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> CardreelResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CardreelError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CardreelError::render("image height exceeds u16"))?;
    if bytes.len() != (width as usize).saturating_mul(height as usize).saturating_mul(4) {
        return Err(CardreelError::render("image byte length mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}
