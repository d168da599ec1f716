use super::Question;

/// A single-question knowledge check. Unlike a quiz attempt there is no
/// submit step: the first selection locks in and reveals the answer and its
/// explanation straight away. `reset` puts the same question back up for
/// another go.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuickCheck {
    question: Question,
    picked: Option<usize>,
}

impl QuickCheck {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            picked: None,
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn revealed(&self) -> bool {
        self.picked.is_some()
    }

    pub fn picked(&self) -> Option<usize> {
        self.picked
    }

    /// Lock in a choice and reveal. Refused once revealed or for an option
    /// index the question does not have.
    pub fn select(&mut self, option_index: usize) -> bool {
        if self.picked.is_some() {
            return false;
        }
        if option_index >= self.question.options.len() {
            return false;
        }
        self.picked = Some(option_index);
        true
    }

    /// None until revealed, then whether the locked-in choice was right.
    pub fn is_correct(&self) -> Option<bool> {
        self.picked
            .map(|picked| self.question.is_scoreable() && picked == self.question.correct_index)
    }

    pub fn reset(&mut self) {
        self.picked = None;
    }
}
