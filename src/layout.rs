//! Card layout engine.
//!
//! Computes the vertical placement of every visual block on a decision card. Layout is
//! sequential: each block's y-origin depends on the cumulative height of everything
//! placed before it, threaded through a single mutable y-cursor. The engine is a pure
//! function of its inputs; drawing happens elsewhere.

use crate::model::DecisionCard;
use crate::wrap::wrap_text;

/// Nominal card canvas width in pixels.
pub const CANVAS_WIDTH: u32 = 800;
/// Nominal card canvas height in pixels. Grown downward when content needs it.
pub const CANVAS_HEIGHT: u32 = 1200;

/// Card panel width (85% of the canvas).
pub const CARD_WIDTH: i32 = (CANVAS_WIDTH as i32 * 85) / 100;
/// Card panel left edge within the canvas.
pub const CARD_X: i32 = (CANVAS_WIDTH as i32 - CARD_WIDTH) / 2;
/// Card panel top edge within the canvas.
pub const CARD_Y: i32 = 250;
/// Pre-allocated card panel height; the layout may exceed it.
pub const NOMINAL_CARD_HEIGHT: i32 = 850;
/// Card corner radius.
pub const CARD_CORNER_RADIUS: f64 = 20.0;

const SIDE_PADDING: i32 = 32;
const RIGHT_MARGIN: i32 = 32;
const HEADER_Y: i32 = 32;
const BADGE_SIZE: i32 = 52;
const BADGE_X: i32 = CARD_WIDTH - 84;
const TITLE_Y: i32 = 100;
const DESC_Y: i32 = 170;
const LINE_ADVANCE: i32 = 40;
const DESC_WRAP_INSET: i32 = 64;
const CHIP_TEXT_PAD: i32 = 48;
const CHIP_HEIGHT_PAD: i32 = 24;
const CHIP_GAP: i32 = 12;
/// Chip corner radius.
pub const CHIP_CORNER_RADIUS: f64 = 16.0;
const SECTION_GAP: i32 = 40;
const ITEM_STEP: i32 = 50;
const BULLET_X: i32 = 152;
const ITEM_X: i32 = 180;
const ITEM_WRAP_INSET: i32 = 250;
const CONS_GAP: i32 = 80;
const BOTTOM_PADDING: i32 = 80;

/// Font roles used on a card. Sizes are fixed design constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontRole {
    Category,
    Title,
    Description,
    Chip,
    Label,
    Item,
}

impl FontRole {
    /// Fixed pixel size for this role.
    pub fn size_px(self) -> f32 {
        match self {
            FontRole::Category => 36.0,
            FontRole::Title => 44.0,
            FontRole::Description => 36.0,
            FontRole::Chip => 28.0,
            FontRole::Label => 32.0,
            FontRole::Item => 32.0,
        }
    }
}

/// Pixel measurement of text for layout purposes.
///
/// Methods take `&mut self` so implementations can keep shaping contexts and caches.
pub trait FontMetrics {
    fn text_width(&mut self, role: FontRole, text: &str) -> f64;
    fn text_height(&mut self, role: FontRole, text: &str) -> f64;
}

/// Kind of a positioned layout block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Header,
    Badge,
    Title,
    DescriptionLine,
    ChoiceChip,
    ProsLabel,
    ProsBullet,
    ProsItemLine,
    ConsLabel,
    ConsBullet,
    ConsItemLine,
}

/// One positioned visual block, in card-relative coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutBlock {
    pub kind: BlockKind,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Text content for text-bearing kinds; `None` for the badge.
    pub text: Option<String>,
    /// Whether this chip belongs to the active choice. Only set on chips.
    pub active: bool,
}

impl LayoutBlock {
    fn text_block(kind: BlockKind, x: i32, y: i32, width: i32, height: i32, text: &str) -> Self {
        Self {
            kind,
            x,
            y,
            width,
            height,
            text: Some(text.to_string()),
            active: false,
        }
    }
}

/// Full layout plan for one rendered card.
#[derive(Clone, Debug)]
pub struct CardLayout {
    pub blocks: Vec<LayoutBlock>,
    /// Final card panel height, including bottom padding. At least
    /// [`NOMINAL_CARD_HEIGHT`]; never shrinks content that was already placed.
    pub card_height: i32,
}

impl CardLayout {
    /// Canvas height needed to hold the card panel without clipping.
    pub fn canvas_height(&self) -> u32 {
        (CANVAS_HEIGHT as i32).max(CARD_Y + self.card_height) as u32
    }
}

/// Compute the layout for the card with `active_index` highlighted.
///
/// Blocks are produced top-to-bottom; the wrapped pros/cons of the active choice
/// determine the final card height.
pub fn layout_card(
    card: &DecisionCard,
    active_index: usize,
    metrics: &mut dyn FontMetrics,
) -> CardLayout {
    let mut blocks = Vec::new();

    // Header row: category label left, decorative badge right. Fixed y.
    let cat_w = metrics.text_width(FontRole::Category, &card.category).ceil() as i32;
    let cat_h = metrics
        .text_height(FontRole::Category, &card.category)
        .ceil() as i32;
    blocks.push(LayoutBlock::text_block(
        BlockKind::Header,
        SIDE_PADDING,
        HEADER_Y,
        cat_w,
        cat_h,
        &card.category,
    ));
    blocks.push(LayoutBlock {
        kind: BlockKind::Badge,
        x: BADGE_X,
        y: HEADER_Y,
        width: BADGE_SIZE,
        height: BADGE_SIZE,
        text: None,
        active: false,
    });

    // Title: single line at a fixed offset, never wrapped (titles are assumed short).
    let title_w = metrics.text_width(FontRole::Title, &card.title).ceil() as i32;
    let title_h = metrics.text_height(FontRole::Title, &card.title).ceil() as i32;
    blocks.push(LayoutBlock::text_block(
        BlockKind::Title,
        SIDE_PADDING,
        TITLE_Y,
        title_w,
        title_h,
        &card.title,
    ));

    // Description: greedy-wrapped, fixed 40px line advance.
    let desc_lines = wrap_text(
        &card.description,
        f64::from(CARD_WIDTH - DESC_WRAP_INSET),
        |s| metrics.text_width(FontRole::Description, s),
    );
    for (i, line) in desc_lines.iter().enumerate() {
        let w = metrics.text_width(FontRole::Description, line).ceil() as i32;
        blocks.push(LayoutBlock::text_block(
            BlockKind::DescriptionLine,
            SIDE_PADDING,
            DESC_Y + (i as i32) * LINE_ADVANCE,
            w,
            LINE_ADVANCE,
            line,
        ));
    }

    // Choice chips: first-fit row packing against the right margin.
    let mut cursor = DESC_Y + (desc_lines.len() as i32) * LINE_ADVANCE + SECTION_GAP;
    let mut chip_x = SIDE_PADDING;
    let mut row_y = cursor;
    let mut max_chip_bottom = cursor;
    for (i, choice) in card.choices.iter().enumerate() {
        let text_w = metrics.text_width(FontRole::Chip, &choice.name).ceil() as i32;
        let text_h = metrics.text_height(FontRole::Chip, &choice.name).ceil() as i32;
        let chip_w = text_w + CHIP_TEXT_PAD;
        let chip_h = text_h + CHIP_HEIGHT_PAD;

        if chip_x + chip_w > CARD_WIDTH - RIGHT_MARGIN {
            chip_x = SIDE_PADDING;
            row_y += chip_h + CHIP_GAP;
        }

        blocks.push(LayoutBlock {
            kind: BlockKind::ChoiceChip,
            x: chip_x,
            y: row_y,
            width: chip_w,
            height: chip_h,
            text: Some(choice.name.clone()),
            active: i == active_index,
        });

        chip_x += chip_w + CHIP_GAP;
        max_chip_bottom = max_chip_bottom.max(row_y + chip_h);
    }

    // Pros, then cons, for the active choice only.
    cursor = max_chip_bottom + SECTION_GAP;
    let active = &card.choices[active_index];

    cursor = push_item_section(
        &mut blocks,
        metrics,
        cursor,
        "Pros:",
        &active.pros,
        BlockKind::ProsLabel,
        BlockKind::ProsBullet,
        BlockKind::ProsItemLine,
    );

    cursor = push_item_section(
        &mut blocks,
        metrics,
        cursor + CONS_GAP,
        "Cons:",
        &active.cons,
        BlockKind::ConsLabel,
        BlockKind::ConsBullet,
        BlockKind::ConsItemLine,
    );

    let card_height = NOMINAL_CARD_HEIGHT.max(cursor + BOTTOM_PADDING);
    CardLayout {
        blocks,
        card_height,
    }
}

/// Lay out one labeled bullet section starting at `label_y`. Returns the y-cursor
/// after the last entry (the label's own y when the section has no items).
#[allow(clippy::too_many_arguments)]
fn push_item_section(
    blocks: &mut Vec<LayoutBlock>,
    metrics: &mut dyn FontMetrics,
    label_y: i32,
    label: &str,
    items: &[String],
    label_kind: BlockKind,
    bullet_kind: BlockKind,
    line_kind: BlockKind,
) -> i32 {
    let label_w = metrics.text_width(FontRole::Label, label).ceil() as i32;
    let label_h = metrics.text_height(FontRole::Label, label).ceil() as i32;
    blocks.push(LayoutBlock::text_block(
        label_kind,
        SIDE_PADDING,
        label_y,
        label_w,
        label_h,
        label,
    ));

    let mut item_y = label_y;
    for item in items {
        item_y += ITEM_STEP;

        let bullet_w = metrics.text_width(FontRole::Item, "\u{2022}").ceil() as i32;
        let bullet_h = metrics.text_height(FontRole::Item, "\u{2022}").ceil() as i32;
        blocks.push(LayoutBlock::text_block(
            bullet_kind,
            BULLET_X,
            item_y,
            bullet_w,
            bullet_h,
            "\u{2022}",
        ));

        let lines = wrap_text(item, f64::from(CARD_WIDTH - ITEM_WRAP_INSET), |s| {
            metrics.text_width(FontRole::Item, s)
        });
        for (j, line) in lines.iter().enumerate() {
            let w = metrics.text_width(FontRole::Item, line).ceil() as i32;
            blocks.push(LayoutBlock::text_block(
                line_kind,
                ITEM_X,
                item_y + (j as i32) * LINE_ADVANCE,
                w,
                LINE_ADVANCE,
                line,
            ));
        }

        // Multi-line entries push the cursor past the base 50px step.
        item_y += (lines.len().saturating_sub(1) as i32) * LINE_ADVANCE;
    }
    item_y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Choice;

    /// Deterministic metrics: 10px per char, 28px tall. Keeps tests font-free.
    struct FixedMetrics;

    impl FontMetrics for FixedMetrics {
        fn text_width(&mut self, _role: FontRole, text: &str) -> f64 {
            text.chars().count() as f64 * 10.0
        }
        fn text_height(&mut self, _role: FontRole, _text: &str) -> f64 {
            28.0
        }
    }

    fn pet_card() -> DecisionCard {
        DecisionCard {
            category: "Lifestyle".into(),
            title: "What pet should I get?".into(),
            description: "I want to have a lil companion".into(),
            choices: vec![
                Choice::from_free_text("Dog", "Loyal\nFun", "Needs walks"),
                Choice::from_free_text("Cat", "Independent", "Litter box\nScratches furniture"),
            ],
        }
    }

    fn chips(layout: &CardLayout) -> Vec<&LayoutBlock> {
        layout
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::ChoiceChip)
            .collect()
    }

    #[test]
    fn blocks_are_produced_top_to_bottom_by_section() {
        let layout = layout_card(&pet_card(), 0, &mut FixedMetrics);
        let y_of = |kind: BlockKind| {
            layout
                .blocks
                .iter()
                .find(|b| b.kind == kind)
                .map(|b| b.y)
                .unwrap()
        };
        assert!(y_of(BlockKind::Header) < y_of(BlockKind::Title));
        assert!(y_of(BlockKind::Title) < y_of(BlockKind::DescriptionLine));
        assert!(y_of(BlockKind::DescriptionLine) < y_of(BlockKind::ChoiceChip));
        assert!(y_of(BlockKind::ChoiceChip) < y_of(BlockKind::ProsLabel));
        assert!(y_of(BlockKind::ProsLabel) < y_of(BlockKind::ConsLabel));
    }

    #[test]
    fn exactly_one_chip_is_active() {
        let card = pet_card();
        for idx in 0..card.choices.len() {
            let layout = layout_card(&card, idx, &mut FixedMetrics);
            let chips = chips(&layout);
            assert_eq!(chips.len(), 2);
            assert_eq!(chips.iter().filter(|c| c.active).count(), 1);
            assert!(chips[idx].active);
        }
    }

    #[test]
    fn chips_never_cross_the_right_margin() {
        let mut card = pet_card();
        card.choices = (0..5)
            .map(|i| Choice::from_free_text(format!("choice number {i}"), "", ""))
            .collect();
        let layout = layout_card(&card, 0, &mut FixedMetrics);
        for chip in chips(&layout) {
            assert!(
                chip.x + chip.width <= CARD_WIDTH - 32,
                "chip at x={} width={} crosses the margin",
                chip.x,
                chip.width
            );
        }
    }

    #[test]
    fn chip_wraps_to_new_row_iff_it_would_overflow() {
        // Two wide chips: the second must start a new row at the left margin.
        let mut card = pet_card();
        card.choices = vec![
            Choice::from_free_text("a".repeat(30), "", ""),
            Choice::from_free_text("b".repeat(30), "", ""),
        ];
        let layout = layout_card(&card, 0, &mut FixedMetrics);
        let c = chips(&layout);
        assert_eq!(c[0].x, 32);
        assert_eq!(c[1].x, 32);
        assert!(c[1].y > c[0].y);

        // Two narrow chips share a row.
        card.choices = vec![
            Choice::from_free_text("a", "", ""),
            Choice::from_free_text("b", "", ""),
        ];
        let layout = layout_card(&card, 0, &mut FixedMetrics);
        let c = chips(&layout);
        assert_eq!(c[0].y, c[1].y);
        assert!(c[1].x > c[0].x);
    }

    #[test]
    fn card_height_is_monotone_in_content() {
        let mut card = pet_card();
        // Stretch the description so content overflows the nominal height and growth
        // becomes observable.
        card.description = "word ".repeat(80).trim_end().to_string();
        let base = layout_card(&card, 0, &mut FixedMetrics).card_height;

        let mut more_pros = card.clone();
        more_pros.choices[0].pros.push("Another upside".into());
        assert!(layout_card(&more_pros, 0, &mut FixedMetrics).card_height > base);

        let mut more_cons = card.clone();
        more_cons.choices[0].cons.push("Another downside".into());
        assert!(layout_card(&more_cons, 0, &mut FixedMetrics).card_height > base);

        let mut longer_desc = card.clone();
        longer_desc.description.push_str(&" word".repeat(20));
        assert!(layout_card(&longer_desc, 0, &mut FixedMetrics).card_height >= base);

        let mut more_choices = card.clone();
        more_choices
            .choices
            .push(Choice::from_free_text("a longer extra choice name", "", ""));
        assert!(layout_card(&more_choices, 0, &mut FixedMetrics).card_height >= base);
    }

    #[test]
    fn empty_pros_and_cons_render_only_labels() {
        let mut card = pet_card();
        card.choices = vec![Choice::from_free_text("Dog", "", "")];
        let layout = layout_card(&card, 0, &mut FixedMetrics);
        assert!(
            layout
                .blocks
                .iter()
                .any(|b| b.kind == BlockKind::ProsLabel)
        );
        assert!(
            layout
                .blocks
                .iter()
                .any(|b| b.kind == BlockKind::ConsLabel)
        );
        assert!(
            !layout
                .blocks
                .iter()
                .any(|b| matches!(b.kind, BlockKind::ProsBullet | BlockKind::ConsBullet))
        );
        assert_eq!(layout.card_height, NOMINAL_CARD_HEIGHT);
    }

    #[test]
    fn multiline_item_advances_cursor_by_extra_lines() {
        let mut short = pet_card();
        short.choices = vec![Choice::from_free_text("Dog", "short", "")];
        let mut long = pet_card();
        long.choices = vec![Choice::from_free_text(
            "Dog",
            // Wraps to several lines at the item wrap width (430px -> 43 chars).
            "this pro line is long enough that it must wrap onto multiple lines",
            "",
        )];

        let y_cons = |card: &DecisionCard| {
            layout_card(card, 0, &mut FixedMetrics)
                .blocks
                .iter()
                .find(|b| b.kind == BlockKind::ConsLabel)
                .map(|b| b.y)
                .unwrap()
        };
        assert!(y_cons(&long) > y_cons(&short));
    }

    #[test]
    fn canvas_grows_only_downward_past_nominal_height() {
        let mut card = pet_card();
        card.choices[0].pros = (0..30).map(|i| format!("pro number {i}")).collect();
        let layout = layout_card(&card, 0, &mut FixedMetrics);
        assert!(layout.card_height > NOMINAL_CARD_HEIGHT);
        assert_eq!(
            layout.canvas_height(),
            (CARD_Y + layout.card_height) as u32
        );

        let small = layout_card(&pet_card(), 0, &mut FixedMetrics);
        assert_eq!(small.canvas_height(), CANVAS_HEIGHT);
    }

    #[test]
    fn layout_is_deterministic() {
        let card = pet_card();
        let a = layout_card(&card, 1, &mut FixedMetrics);
        let b = layout_card(&card, 1, &mut FixedMetrics);
        assert_eq!(a.blocks, b.blocks);
        assert_eq!(a.card_height, b.card_height);
    }
}
