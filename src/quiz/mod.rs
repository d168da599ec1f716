pub mod bank;
pub mod check;

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
}

/// One multiple-choice question. Authored in the bank files and treated as
/// read-only everywhere: the engine records selections against it but never
/// changes it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: u32,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl Question {
    pub fn new(
        id: u32,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            options,
            correct_index,
            explanation: explanation.into(),
            difficulty: None,
        }
    }

    // A question with an empty options list, or a correct_index pointing
    // outside it, is an authoring defect. It still renders and accepts
    // selections, but nothing can ever be marked correct against it.
    pub fn is_scoreable(&self) -> bool {
        self.correct_index < self.options.len()
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    Answering,
    Graded,
}

/// How a single question stands once the attempt is graded. Skipped
/// questions score nothing but are reported apart from wrong answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Outcome {
    Correct,
    Incorrect,
    Unanswered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.correct as f64 / self.total as f64 * 100.0).round() as u32
    }

    pub fn grade(&self) -> Grade {
        Grade::from_percentage(self.percentage())
    }
}

// The bands the mock exams use: 70% to pass outright, 60% is a marginal
// result worth revising, anything lower is a fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    Pass,
    Marginal,
    Fail,
}

impl Grade {
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= 70 {
            Grade::Pass
        } else if percentage >= 60 {
            Grade::Marginal
        } else {
            Grade::Fail
        }
    }
}

/// One sitting of a quiz: the sampled questions plus the user's selections.
///
/// Selections are radio-button style, keyed by question id, and stay open to
/// change until `submit` flips the attempt to `Graded`; after that they are
/// read-only until `reset`. The score is always derived from the selections,
/// never stored, so the two cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attempt {
    questions: Vec<Question>,
    selections: BTreeMap<u32, usize>,
    phase: Phase,
}

impl Attempt {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            selections: BTreeMap::new(),
            phase: Phase::Answering,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_graded(&self) -> bool {
        self.phase == Phase::Graded
    }

    pub fn selection(&self, question_id: u32) -> Option<usize> {
        self.selections.get(&question_id).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.selections.len()
    }

    /// Record a choice for one question, replacing any earlier choice for
    /// that question only. Refused (returning false, changing nothing) once
    /// the attempt is graded, for an id not in this attempt, or for an
    /// option index outside the question's real options.
    pub fn select(&mut self, question_id: u32, option_index: usize) -> bool {
        if self.phase == Phase::Graded {
            return false;
        }
        let question = match self.questions.iter().find(|q| q.id == question_id) {
            Some(question) => question,
            None => return false,
        };
        if option_index >= question.options.len() {
            return false;
        }
        self.selections.insert(question_id, option_index);
        true
    }

    /// Lock the selections and grade them. Submitting again without touching
    /// anything in between yields the same score.
    pub fn submit(&mut self) -> Score {
        self.phase = Phase::Graded;
        self.score()
    }

    /// Back to a blank answer sheet over the same questions.
    pub fn reset(&mut self) {
        self.selections.clear();
        self.phase = Phase::Answering;
    }

    pub fn score(&self) -> Score {
        let correct = self
            .questions
            .iter()
            .filter(|question| question.is_scoreable())
            .filter(|question| self.selections.get(&question.id) == Some(&question.correct_index))
            .count();
        Score {
            correct,
            total: self.questions.len(),
        }
    }

    pub fn outcome(&self, question: &Question) -> Outcome {
        match self.selections.get(&question.id) {
            None => Outcome::Unanswered,
            Some(&picked) => {
                if question.is_scoreable() && picked == question.correct_index {
                    Outcome::Correct
                } else {
                    Outcome::Incorrect
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u32, correct_index: usize) -> Question {
        Question::new(
            id,
            format!("Question {}", id),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            correct_index,
            "Because.",
        )
    }

    fn three_question_attempt() -> Attempt {
        // Correct answers at indices 1, 0, 2.
        Attempt::new(vec![question(1, 1), question(2, 0), question(3, 2)])
    }

    #[test]
    fn test_score_counts_only_matching_selections() {
        let mut attempt = three_question_attempt();
        assert!(attempt.select(1, 1));
        assert!(attempt.select(2, 1));
        assert!(attempt.select(3, 2));

        let score = attempt.submit();
        assert_eq!(score, Score { correct: 2, total: 3 });
        assert_eq!(attempt.outcome(&attempt.questions()[0]), Outcome::Correct);
        assert_eq!(attempt.outcome(&attempt.questions()[1]), Outcome::Incorrect);
        assert_eq!(attempt.outcome(&attempt.questions()[2]), Outcome::Correct);
    }

    #[test]
    fn test_unanswered_questions_count_zero_but_report_distinctly() {
        let mut attempt = Attempt::new(vec![question(1, 1), question(2, 0)]);
        assert!(attempt.select(1, 1));

        let score = attempt.submit();
        assert_eq!(score, Score { correct: 1, total: 2 });
        assert_eq!(attempt.outcome(&attempt.questions()[1]), Outcome::Unanswered);
    }

    #[test]
    fn test_select_rejects_out_of_range_option() {
        let mut attempt = three_question_attempt();
        assert!(!attempt.select(1, 3));
        assert!(!attempt.select(1, usize::MAX));
        assert_eq!(attempt.selection(1), None);
    }

    #[test]
    fn test_select_rejects_unknown_question_id() {
        let mut attempt = three_question_attempt();
        assert!(!attempt.select(99, 0));
        assert_eq!(attempt.answered_count(), 0);
    }

    #[test]
    fn test_selections_lock_after_submit() {
        let mut attempt = three_question_attempt();
        assert!(attempt.select(1, 0));
        attempt.submit();

        assert!(!attempt.select(1, 1));
        assert!(!attempt.select(2, 0));
        assert_eq!(attempt.selection(1), Some(0));
    }

    #[test]
    fn test_submit_is_idempotent() {
        let mut attempt = three_question_attempt();
        attempt.select(1, 1);

        let first = attempt.submit();
        let second = attempt.submit();
        assert_eq!(first, second);
        assert!(attempt.is_graded());
    }

    #[test]
    fn test_reselecting_overwrites_only_that_question() {
        let mut attempt = three_question_attempt();
        assert!(attempt.select(1, 0));
        assert!(attempt.select(2, 0));
        assert!(attempt.select(1, 2));

        assert_eq!(attempt.selection(1), Some(2));
        assert_eq!(attempt.selection(2), Some(0));
        assert_eq!(attempt.answered_count(), 2);
    }

    #[test]
    fn test_reset_clears_selections_and_reopens_answering() {
        let mut attempt = three_question_attempt();
        attempt.select(1, 1);
        attempt.submit();

        attempt.reset();
        assert_eq!(attempt.phase(), Phase::Answering);
        assert_eq!(attempt.answered_count(), 0);
        assert_eq!(attempt.submit(), Score { correct: 0, total: 3 });
    }

    #[test]
    fn test_malformed_question_renders_but_never_scores() {
        // correct_index 5 with only 3 options; every selection stays wrong.
        let mut attempt = Attempt::new(vec![question(1, 5)]);
        assert!(!attempt.questions()[0].is_scoreable());
        assert_eq!(attempt.questions()[0].correct_option(), None);

        for option in 0..3 {
            assert!(attempt.select(1, option));
        }
        let score = attempt.submit();
        assert_eq!(score, Score { correct: 0, total: 1 });
        assert_eq!(attempt.outcome(&attempt.questions()[0]), Outcome::Incorrect);
    }

    #[test]
    fn test_question_with_no_options_is_tolerated() {
        let bare = Question::new(7, "Empty", Vec::new(), 0, "n/a");
        let mut attempt = Attempt::new(vec![bare]);

        assert!(!attempt.select(7, 0));
        let score = attempt.submit();
        assert_eq!(score, Score { correct: 0, total: 1 });
        assert_eq!(attempt.outcome(&attempt.questions()[0]), Outcome::Unanswered);
    }

    #[test]
    fn test_duplicate_ids_share_one_selection_last_write_wins() {
        let mut attempt = Attempt::new(vec![question(5, 0), question(5, 1)]);
        assert!(attempt.select(5, 1));
        assert_eq!(attempt.answered_count(), 1);

        // Both copies read the same entry: wrong for the first, right for
        // the second.
        let score = attempt.submit();
        assert_eq!(score, Score { correct: 1, total: 2 });
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(Score { correct: 2, total: 3 }.percentage(), 67);
        assert_eq!(Score { correct: 1, total: 3 }.percentage(), 33);
        assert_eq!(Score { correct: 1, total: 8 }.percentage(), 13);
        assert_eq!(Score { correct: 0, total: 0 }.percentage(), 0);
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(Grade::from_percentage(100), Grade::Pass);
        assert_eq!(Grade::from_percentage(70), Grade::Pass);
        assert_eq!(Grade::from_percentage(69), Grade::Marginal);
        assert_eq!(Grade::from_percentage(60), Grade::Marginal);
        assert_eq!(Grade::from_percentage(59), Grade::Fail);
        assert_eq!(Grade::from_percentage(0), Grade::Fail);
    }

    #[test]
    fn test_score_of_untouched_attempt_is_zero() {
        let mut attempt = three_question_attempt();
        assert_eq!(attempt.submit(), Score { correct: 0, total: 3 });
    }
}
