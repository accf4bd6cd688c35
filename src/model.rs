use crate::error::{CardreelError, CardreelResult};

/// One labeled choice on a decision card.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Choice {
    /// Display name shown in the chip row.
    pub name: String,
    /// Bulleted arguments in favor.
    #[serde(default)]
    pub pros: Vec<String>,
    /// Bulleted arguments against.
    #[serde(default)]
    pub cons: Vec<String>,
}

impl Choice {
    /// Build a choice from free-form multi-line pros/cons text.
    ///
    /// Lines are split on `\n`, trimmed, and blank lines are discarded.
    pub fn from_free_text(name: impl Into<String>, pros_text: &str, cons_text: &str) -> Self {
        Self {
            name: name.into(),
            pros: split_nonempty_lines(pros_text),
            cons: split_nonempty_lines(cons_text),
        }
    }
}

fn split_nonempty_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// A user-authored decision card: a question with 1-5 choices.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DecisionCard {
    pub category: String,
    pub title: String,
    pub description: String,
    pub choices: Vec<Choice>,
}

impl DecisionCard {
    /// Maximum number of choices a card may carry.
    pub const MAX_CHOICES: usize = 5;

    /// Validate card invariants before any rendering or file work begins.
    ///
    /// A card must have 1-5 choices and every choice must have a non-empty name.
    pub fn validate(&self) -> CardreelResult<()> {
        if self.choices.is_empty() {
            return Err(CardreelError::validation(
                "a decision card needs at least one choice",
            ));
        }
        if self.choices.len() > Self::MAX_CHOICES {
            return Err(CardreelError::validation(format!(
                "a decision card supports at most {} choices, got {}",
                Self::MAX_CHOICES,
                self.choices.len()
            )));
        }
        for (i, choice) in self.choices.iter().enumerate() {
            if choice.name.trim().is_empty() {
                return Err(CardreelError::validation(format!(
                    "choice {} has an empty name; all choices must be named",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}
