//! Direct CPU card renderer.
//!
//! Consumes a [`CardLayout`] and draws it onto a transparent canvas with `vello_cpu`.
//! This is the primary rendering path; `render_html` provides the same contract
//! through an external HTML-to-image tool as a documented fallback.

use crate::error::{CardreelError, CardreelResult};
use crate::layout::{
    BlockKind, CANVAS_WIDTH, CARD_CORNER_RADIUS, CARD_WIDTH, CARD_X, CARD_Y, CHIP_CORNER_RADIUS,
    FontMetrics as _, FontRole, LayoutBlock, layout_card,
};
use crate::model::DecisionCard;
use crate::text::{TextBrushRgba8, TextEngine};

use kurbo::Shape as _;

/// Card panel background, `#16171a`.
pub const CARD_BG: [u8; 4] = [22, 23, 26, 255];
/// Accent color for the category label and active chip border, `#5d89e2`.
pub const ACCENT: [u8; 4] = [93, 137, 226, 255];
/// Body text color, `#95a1ac`.
pub const BODY: [u8; 4] = [149, 161, 172, 255];
/// Chip background, `#1b1a2f`.
pub const CHIP_BG: [u8; 4] = [27, 26, 47, 255];
/// Title and badge color.
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

const ACTIVE_BORDER_WIDTH: f64 = 2.0;
const CHIP_TEXT_INSET: f64 = 24.0;
const BADGE_OUTLINE_WIDTH: f64 = 2.0;

/// A rendered still image for one choice, premultiplied RGBA8 with alpha.
#[derive(Clone, Debug)]
pub struct RenderedCard {
    pub width: u32,
    pub height: u32,
    /// Row-major premultiplied RGBA8 pixels.
    pub rgba8_premul: Vec<u8>,
    /// Final card panel height within the canvas.
    pub card_height: i32,
}

/// Renders one choice of a decision card to a transparent still image.
///
/// Implementations must be pure with respect to their inputs: rendering the same card
/// and choice index twice yields pixel-identical output.
pub trait CardRenderer {
    fn render(&mut self, card: &DecisionCard, active_index: usize) -> CardreelResult<RenderedCard>;
}

/// Primary renderer: direct drawing with `vello_cpu`.
pub struct CpuCardRenderer {
    text: TextEngine,
    ctx: Option<vello_cpu::RenderContext>,
}

impl CpuCardRenderer {
    pub fn new(text: TextEngine) -> Self {
        Self { text, ctx: None }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> CardreelResult<R>,
    ) -> CardreelResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        role: FontRole,
        color: [u8; 4],
        x: f64,
        y: f64,
    ) -> CardreelResult<()> {
        let brush = TextBrushRgba8 {
            r: color[0],
            g: color[1],
            b: color[2],
            a: color[3],
        };
        let layout = self.text.layout_plain(text, role.size_px(), brush, None)?;
        draw_parley_layout(ctx, &layout, self.text.font().clone(), x, y);
        Ok(())
    }

    fn draw_block(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        block: &LayoutBlock,
    ) -> CardreelResult<()> {
        let x = f64::from(CARD_X + block.x);
        let y = f64::from(CARD_Y + block.y);
        let text = block.text.as_deref().unwrap_or_default();

        match block.kind {
            BlockKind::Header => self.draw_text(ctx, text, FontRole::Category, ACCENT, x, y),
            BlockKind::Badge => {
                // Outline drawn as two concentric fills; the inner disc restores the
                // card background.
                let r = f64::from(block.width) / 2.0;
                let center = (x + r, y + r);
                fill_circle(ctx, center, r, WHITE);
                fill_circle(ctx, center, r - BADGE_OUTLINE_WIDTH, CARD_BG);
                Ok(())
            }
            BlockKind::Title => self.draw_text(ctx, text, FontRole::Title, WHITE, x, y),
            BlockKind::DescriptionLine => {
                self.draw_text(ctx, text, FontRole::Description, BODY, x, y)
            }
            BlockKind::ChoiceChip => {
                let rect = kurbo::Rect::new(
                    x,
                    y,
                    x + f64::from(block.width),
                    y + f64::from(block.height),
                );
                if block.active {
                    fill_rounded_rect(ctx, rect, CHIP_CORNER_RADIUS, ACCENT);
                    fill_rounded_rect(
                        ctx,
                        rect.inset(-ACTIVE_BORDER_WIDTH),
                        CHIP_CORNER_RADIUS - ACTIVE_BORDER_WIDTH,
                        CHIP_BG,
                    );
                } else {
                    fill_rounded_rect(ctx, rect, CHIP_CORNER_RADIUS, CHIP_BG);
                }

                // Chip height is text height + padding; center the text vertically.
                let text_h = self.text.text_height(FontRole::Chip, text);
                let text_y = y + (f64::from(block.height) - text_h) / 2.0;
                self.draw_text(
                    ctx,
                    text,
                    FontRole::Chip,
                    BODY,
                    x + CHIP_TEXT_INSET,
                    text_y,
                )
            }
            BlockKind::ProsLabel | BlockKind::ConsLabel => {
                self.draw_text(ctx, text, FontRole::Label, BODY, x, y)
            }
            BlockKind::ProsBullet
            | BlockKind::ConsBullet
            | BlockKind::ProsItemLine
            | BlockKind::ConsItemLine => self.draw_text(ctx, text, FontRole::Item, BODY, x, y),
        }
    }
}

impl CardRenderer for CpuCardRenderer {
    fn render(&mut self, card: &DecisionCard, active_index: usize) -> CardreelResult<RenderedCard> {
        if active_index >= card.choices.len() {
            return Err(CardreelError::validation(format!(
                "active choice index {active_index} out of range (card has {} choices)",
                card.choices.len()
            )));
        }

        let layout = layout_card(card, active_index, &mut self.text);
        let width = CANVAS_WIDTH;
        let height = layout.canvas_height();
        let w: u16 = width
            .try_into()
            .map_err(|_| CardreelError::render("card canvas width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| CardreelError::render("card canvas height exceeds u16"))?;

        let card_height = layout.card_height;
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        self.with_ctx_mut(w, h, |this, ctx| {
            let card_rect = kurbo::Rect::new(
                f64::from(CARD_X),
                f64::from(CARD_Y),
                f64::from(CARD_X + CARD_WIDTH),
                f64::from(CARD_Y + card_height),
            );
            fill_rounded_rect(ctx, card_rect, CARD_CORNER_RADIUS, CARD_BG);

            for block in &layout.blocks {
                this.draw_block(ctx, block)?;
            }

            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;

        Ok(RenderedCard {
            width,
            height,
            rgba8_premul: pixmap.data_as_u8_slice().to_vec(),
            card_height,
        })
    }
}

/// Draw an already-shaped parley layout with its top-left corner at `(x, y)`.
pub(crate) fn draw_parley_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: vello_cpu::peniko::FontData,
    x: f64,
    y: f64,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(&font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

fn fill_rounded_rect(
    ctx: &mut vello_cpu::RenderContext,
    rect: kurbo::Rect,
    radius: f64,
    color: [u8; 4],
) {
    let rr = kurbo::RoundedRect::from_rect(rect, radius.max(0.0));
    fill_kurbo_shape(ctx, rr.path_elements(0.1), color);
}

fn fill_circle(ctx: &mut vello_cpu::RenderContext, center: (f64, f64), radius: f64, color: [u8; 4]) {
    let circle = kurbo::Circle::new(center, radius.max(0.0));
    fill_kurbo_shape(ctx, circle.path_elements(0.1), color);
}

fn fill_kurbo_shape(
    ctx: &mut vello_cpu::RenderContext,
    elements: impl Iterator<Item = kurbo::PathEl>,
    color: [u8; 4],
) {
    let mut path = vello_cpu::kurbo::BezPath::new();
    for el in elements {
        path.push(el);
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        color[0], color[1], color[2], color[3],
    ));
    ctx.fill_path(&path);
}
