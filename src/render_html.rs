//! Fallback card renderer: HTML + external image conversion.
//!
//! Writes the card as a standalone HTML page on a chroma-key green background, shells
//! out to `wkhtmltoimage` for the screenshot, then keys the green out to transparency.
//! Same [`CardRenderer`] contract as the primary CPU path; used when a real browser
//! engine's text layout is preferred over the built-in one.

use std::path::PathBuf;
use std::process::Command;

use crate::core::premul_rgba8;
use crate::error::{CardreelError, CardreelResult};
use crate::layout::{CANVAS_HEIGHT, CANVAS_WIDTH, NOMINAL_CARD_HEIGHT};
use crate::model::DecisionCard;
use crate::render_cpu::{CardRenderer, RenderedCard};
use crate::temp::TempFiles;

/// Environment override for the HTML-to-image binary path.
pub const WKHTMLTOIMAGE_ENV_VAR: &str = "CARDREEL_WKHTMLTOIMAGE";

/// Fallback renderer shelling out to an HTML-to-image tool.
pub struct HtmlCardRenderer {
    binary: PathBuf,
    temp: TempFiles,
}

impl HtmlCardRenderer {
    /// Use `binary` as the conversion tool, or resolve it from the
    /// `CARDREEL_WKHTMLTOIMAGE` environment variable, falling back to
    /// `wkhtmltoimage` on PATH.
    pub fn new(binary: Option<PathBuf>) -> Self {
        let binary = binary
            .or_else(|| std::env::var(WKHTMLTOIMAGE_ENV_VAR).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("wkhtmltoimage"));
        Self {
            binary,
            temp: TempFiles::new(),
        }
    }
}

impl CardRenderer for HtmlCardRenderer {
    fn render(&mut self, card: &DecisionCard, active_index: usize) -> CardreelResult<RenderedCard> {
        if active_index >= card.choices.len() {
            return Err(CardreelError::validation(format!(
                "active choice index {active_index} out of range (card has {} choices)",
                card.choices.len()
            )));
        }

        let html = card_page_html(card, active_index);
        let html_path = self
            .temp
            .stage_bytes("card", "html", html.as_bytes())
            .map_err(|e| CardreelError::render(format!("failed to stage card html: {e}")))?;
        let png_path = self.temp.reserve("card", "png");

        let status = Command::new(&self.binary)
            .args([
                "--width",
                &CANVAS_WIDTH.to_string(),
                "--height",
                &CANVAS_HEIGHT.to_string(),
            ])
            .arg(&html_path)
            .arg(&png_path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CardreelError::render(format!(
                        "html-to-image tool '{}' not found; install wkhtmltoimage or set {}",
                        self.binary.display(),
                        WKHTMLTOIMAGE_ENV_VAR
                    ))
                } else {
                    CardreelError::render(format!(
                        "failed to run '{}': {e}",
                        self.binary.display()
                    ))
                }
            })?;
        if !status.status.success() {
            return Err(CardreelError::render(format!(
                "'{}' exited with status {}: {}",
                self.binary.display(),
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }

        let img = image::open(&png_path)
            .map_err(|e| CardreelError::render(format!("failed to read rendered card png: {e}")))?
            .into_rgba8();
        let (width, height) = img.dimensions();
        let mut rgba8_premul = Vec::with_capacity((width * height * 4) as usize);
        for px in img.pixels() {
            let [r, g, b, a] = px.0;
            rgba8_premul.extend_from_slice(&premul_rgba8(chroma_key_green([r, g, b, a])));
        }

        self.temp.cleanup();
        Ok(RenderedCard {
            width,
            height,
            rgba8_premul,
            // The HTML path renders at the fixed page size; overflow is clipped by the
            // page, so the nominal panel height is reported.
            card_height: NOMINAL_CARD_HEIGHT,
        })
    }
}

/// Map the screenshot's green backdrop to transparency, leaving card pixels alone.
fn chroma_key_green(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b, _] = px;
    if r < 50 && g > 200 && b < 50 {
        [0, 0, 0, 0]
    } else {
        px
    }
}

fn card_page_html(card: &DecisionCard, active_index: usize) -> String {
    format!(
        r#"<html>
<head>
<meta charset="UTF-8">
<style>
body {{ margin: 0; padding: 0; background-color: rgb(0, 255, 0); overflow: hidden; }}
* {{ -webkit-font-smoothing: antialiased; }}
</style>
</head>
<body>
{}
</body>
</html>
"#,
        card_body_html(card, active_index)
    )
}

fn card_body_html(card: &DecisionCard, active_index: usize) -> String {
    let active = &card.choices[active_index];
    let chips = card
        .choices
        .iter()
        .enumerate()
        .map(|(i, choice)| {
            let border = if i == active_index {
                "2px solid #5d89e2"
            } else {
                "none"
            };
            format!(
                r#"<div style="padding: 12px 24px; border-radius: 16px; font-size: 28px; background: #1b1a2f; border: {border}; color: #95a1ac;">{}</div>"#,
                escape_html(&choice.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let items = |items: &[String]| {
        items
            .iter()
            .map(|item| {
                format!(
                    r#"<div style="margin-bottom: 12px; color: #95a1ac; font-size: 32px; display: flex;"><span style="min-width: 20px; margin-right: 16px;">&bull;</span><span style="flex: 1;">{}</span></div>"#,
                    escape_html(item)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"<div style="background: #16171a; width: 85%; border-radius: 30px; padding: 32px; margin: 250px auto 32px auto; font-family: sans-serif;">
  <div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 24px;">
    <div style="color: #5d89e2; font-size: 36px; font-weight: 600;">{category}</div>
    <div style="width: 52px; height: 52px; border-radius: 50%; border: 2px solid #ffffff;"></div>
  </div>
  <div style="color: white; font-size: 44px; font-weight: 600; margin-bottom: 12px;">{title}</div>
  <div style="color: #95a1ac; font-size: 36px; font-weight: 600; margin-bottom: 32px;">{description}</div>
  <div style="display: flex; gap: 12px; margin-bottom: 32px; flex-wrap: wrap;">
{chips}
  </div>
  <div style="display: flex; margin-bottom: 24px;">
    <div style="font-size: 32px; color: #95a1ac; min-width: 120px; font-weight: 600;">Pros:</div>
    <div style="flex: 1;">
{pros}
    </div>
  </div>
  <div style="display: flex;">
    <div style="font-size: 32px; color: #95a1ac; min-width: 120px; font-weight: 600;">Cons:</div>
    <div style="flex: 1;">
{cons}
    </div>
  </div>
</div>
"#,
        category = escape_html(&card.category),
        title = escape_html(&card.title),
        description = escape_html(&card.description),
        chips = chips,
        pros = items(&active.pros),
        cons = items(&active.cons),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Choice;

    #[test]
    fn chroma_key_hits_only_backdrop_green() {
        assert_eq!(chroma_key_green([0, 255, 0, 255]), [0, 0, 0, 0]);
        assert_eq!(chroma_key_green([10, 230, 40, 255]), [0, 0, 0, 0]);
        // White text and card grey must survive.
        assert_eq!(
            chroma_key_green([255, 255, 255, 255]),
            [255, 255, 255, 255]
        );
        assert_eq!(chroma_key_green([22, 23, 26, 255]), [22, 23, 26, 255]);
    }

    #[test]
    fn html_escapes_user_text() {
        let card = DecisionCard {
            category: "<b>cat</b>".into(),
            title: "a & b".into(),
            description: "d".into(),
            choices: vec![Choice::from_free_text("x\"y\"", "", "")],
        };
        let html = card_page_html(&card, 0);
        assert!(html.contains("&lt;b&gt;cat&lt;/b&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(html.contains("x&quot;y&quot;"));
        assert!(!html.contains("<b>cat</b>"));
    }

    #[test]
    fn only_the_active_chip_carries_a_border() {
        let card = DecisionCard {
            category: "c".into(),
            title: "t".into(),
            description: "d".into(),
            choices: vec![
                Choice::from_free_text("Dog", "", ""),
                Choice::from_free_text("Cat", "", ""),
            ],
        };
        let html = card_body_html(&card, 1);
        assert_eq!(html.matches("2px solid #5d89e2").count(), 1);
    }
}
