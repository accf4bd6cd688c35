/// Greedy word-packing line wrap against a pixel width bound.
///
/// Words are taken in order; a word joins the current line when the joined line still
/// measures within `max_width`, otherwise the line is flushed and the word starts a
/// new one. A single word wider than `max_width` is emitted as its own oversized line
/// rather than split mid-word.
pub fn wrap_text(text: &str, max_width: f64, mut measure: impl FnMut(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure(&candidate) <= max_width {
            current = candidate;
        } else if current.is_empty() {
            // Oversized single word: emit unsplit.
            lines.push(word.to_string());
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_width(s: &str) -> f64 {
        s.chars().count() as f64 * 10.0
    }

    #[test]
    fn empty_text_gives_no_lines() {
        assert!(wrap_text("", 100.0, char_width).is_empty());
        assert!(wrap_text("   \n\t ", 100.0, char_width).is_empty());
    }

    #[test]
    fn short_text_stays_on_one_line() {
        assert_eq!(wrap_text("a lil pet", 100.0, char_width), vec!["a lil pet"]);
    }

    #[test]
    fn every_line_fits_or_is_a_single_word() {
        let text = "I want to have a lil companion around the apartment";
        let max = 120.0;
        for line in wrap_text(text, max, char_width) {
            assert!(
                char_width(&line) <= max || !line.contains(' '),
                "line '{line}' violates the width bound"
            );
        }
    }

    #[test]
    fn oversized_word_is_emitted_unsplit() {
        let lines = wrap_text("ok incomprehensibilities ok", 100.0, char_width);
        assert_eq!(lines, vec!["ok", "incomprehensibilities", "ok"]);
    }

    #[test]
    fn rejoining_lines_reproduces_normalized_input() {
        let text = "  I   want\tto have \n a lil companion  ";
        let lines = wrap_text(text, 80.0, char_width);
        let rejoined = lines.join(" ");
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined, normalized);
    }

    #[test]
    fn greedy_packing_fills_each_line() {
        // 4-char words, 2 per line at width 90 ("word word" = 9 chars).
        let lines = wrap_text("aaaa bbbb cccc dddd eeee", 90.0, char_width);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc dddd", "eeee"]);
    }
}
