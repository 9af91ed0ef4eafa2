use std::collections::BTreeMap;

/// Outcome of tapping an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answered {
    /// The question already had an answer; nothing changed.
    AlreadyAnswered,
    Correct,
    Incorrect,
}

/// First-answer-wins record of a quiz attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnswerSheet {
    selected: BTreeMap<usize, String>,
    score: usize,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&mut self, question: usize, option: &str, correct: &str) -> Answered {
        if self.selected.contains_key(&question) {
            return Answered::AlreadyAnswered;
        }
        self.selected.insert(question, option.to_string());

        if option == correct {
            self.score += 1;
            Answered::Correct
        } else {
            Answered::Incorrect
        }
    }

    pub fn selected(&self, question: usize) -> Option<&str> {
        self.selected.get(&question).map(String::as_str)
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn answered(&self) -> usize {
        self.selected.len()
    }

    /// True once every one of `total` questions has an answer.
    pub fn is_complete(&self, total: usize) -> bool {
        (0..total).all(|question| self.selected.contains_key(&question))
    }
}
