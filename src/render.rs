use std::time::Duration;

use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

use crate::quiz::bank::QuestionBank;
use crate::quiz::check::QuickCheck;
use crate::quiz::{Attempt, Grade, Outcome, Question};

pub const BROWSE_COURSES: &str = "Browse courses";
pub const QUICK_CHECK: &str = "Quick check";
pub const SKIP_QUESTION: &str = "Skip";
pub const SUBMIT_ANSWERS: &str = "Submit answers";
pub const CHANGE_ANSWER: &str = "Change an answer";
pub const KEEP_ANSWER: &str = "Keep as is";
pub const BACK_TO_SUMMARY: &str = "Back to summary";
pub const REVIEW_MISTAKES: &str = "Review mistakes";
pub const RETAKE_QUIZ: &str = "Retake this quiz";
pub const NEW_TOPIC: &str = "New topic";
pub const MAIN_MENU: &str = "Main menu";
pub const TRY_AGAIN: &str = "Try again";
pub const ANOTHER_CHECK: &str = "Another question";

// One reply-keyboard letter per option.
const MAX_OPTIONS: usize = 26;

// Telegram rejects messages over 4096 characters; leave headroom for the
// HTML entities escaping adds.
const MESSAGE_BUDGET: usize = 3500;

pub fn option_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Reads a keyboard press or a typed answer like "b", "B)" or "c." back
/// into an option index, refusing anything outside the question's options.
pub fn parse_option_letter(text: &str, option_count: usize) -> Option<usize> {
    let mut chars = text.trim().chars();
    let first = chars.next()?;
    let rest = chars.as_str().trim();
    if !(rest.is_empty() || rest == ")" || rest == ".") {
        return None;
    }
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let index = (first.to_ascii_uppercase() as u8 - b'A') as usize;
    if index < option_count {
        Some(index)
    } else {
        None
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn lettered_options(question: &Question) -> String {
    let mut lines = String::new();
    for (index, option) in question.options.iter().take(MAX_OPTIONS).enumerate() {
        lines.push_str(&format!("{}) {}\n", option_letter(index), escape(option)));
    }
    lines
}

pub fn question_message(position: usize, total: usize, question: &Question) -> String {
    format!(
        "Question {} of {}\n<b>{}</b>\n\n{}",
        position,
        total,
        escape(&question.prompt),
        lettered_options(question)
    )
}

pub fn options_keyboard(question: &Question, extra_rows: &[&str]) -> KeyboardMarkup {
    let letters: Vec<KeyboardButton> = (0..question.options.len().min(MAX_OPTIONS))
        .map(|index| KeyboardButton::new(option_letter(index).to_string()))
        .collect();
    let mut rows = vec![letters];
    for label in extra_rows {
        rows.push(vec![KeyboardButton::new(label.to_string())]);
    }
    KeyboardMarkup::new(rows)
}

pub fn summary_message(attempt: &Attempt) -> String {
    let unanswered: Vec<String> = attempt
        .questions()
        .iter()
        .enumerate()
        .filter(|(_, question)| attempt.selection(question.id).is_none())
        .map(|(index, _)| (index + 1).to_string())
        .collect();

    let mut message = format!(
        "That is every question. You answered {} of {}.\n",
        attempt.answered_count(),
        attempt.len()
    );
    if !unanswered.is_empty() {
        message.push_str(&format!("Not answered: {}.\n", unanswered.join(", ")));
    }
    message.push_str("Submit now, or change an answer first.");
    message
}

pub fn summary_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(SUBMIT_ANSWERS)],
        vec![KeyboardButton::new(CHANGE_ANSWER)],
    ])
}

pub fn results_message(attempt: &Attempt, topic: &str, elapsed: Duration) -> String {
    let score = attempt.score();
    let (mut correct, mut wrong, mut unanswered) = (0, 0, 0);
    for question in attempt.questions() {
        match attempt.outcome(question) {
            Outcome::Correct => correct += 1,
            Outcome::Incorrect => wrong += 1,
            Outcome::Unanswered => unanswered += 1,
        }
    }
    let verdict = match score.grade() {
        Grade::Pass => "✓ Pass",
        Grade::Marginal => "⚠ Marginal",
        Grade::Fail => "✗ Fail",
    };
    format!(
        "<b>{}</b>\nScore: {}/{} ({}%)\n{}\nCorrect: {}, wrong: {}, not answered: {}\nTime: {}",
        escape(topic),
        score.correct,
        score.total,
        score.percentage(),
        verdict,
        correct,
        wrong,
        unanswered,
        format_elapsed(elapsed)
    )
}

pub fn results_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(REVIEW_MISTAKES)],
        vec![KeyboardButton::new(RETAKE_QUIZ)],
        vec![
            KeyboardButton::new(NEW_TOPIC),
            KeyboardButton::new(MAIN_MENU),
        ],
    ])
}

fn breakdown_block(attempt: &Attempt, index: usize, question: &Question) -> String {
    let glyph = match attempt.outcome(question) {
        Outcome::Correct => "✓",
        Outcome::Incorrect => "✗",
        Outcome::Unanswered => "○",
    };
    let mut block = format!(
        "<b>{}.</b> {} {}\n",
        index + 1,
        glyph,
        escape(&question.prompt)
    );
    match attempt.selection(question.id) {
        Some(picked) => {
            let text = question.options.get(picked).map(String::as_str).unwrap_or("");
            block.push_str(&format!(
                "Your answer: {}) {}\n",
                option_letter(picked),
                escape(text)
            ));
        }
        None => block.push_str("Not answered.\n"),
    }
    if attempt.outcome(question) != Outcome::Correct {
        if let Some(correct) = question.correct_option() {
            block.push_str(&format!(
                "Correct answer: {}) {}\n",
                option_letter(question.correct_index),
                escape(correct)
            ));
        }
    }
    if !question.explanation.is_empty() {
        block.push_str(&format!("<i>{}</i>\n", escape(&question.explanation)));
    }
    block
}

// A block that alone exceeds the budget splits at line boundaries; the
// builders never let a tag span lines, so the HTML stays balanced.
fn split_oversized(block: String) -> Vec<String> {
    if block.len() <= MESSAGE_BUDGET {
        return vec![block];
    }
    let mut parts: Vec<String> = Vec::new();
    let mut part = String::new();
    for line in block.lines() {
        if !part.is_empty() && part.len() + line.len() > MESSAGE_BUDGET {
            parts.push(std::mem::take(&mut part));
        }
        part.push_str(line);
        part.push('\n');
    }
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

fn chunk_blocks(blocks: Vec<String>) -> Vec<String> {
    let mut messages: Vec<String> = Vec::new();
    let mut current = String::new();
    for piece in blocks.into_iter().flat_map(split_oversized) {
        if !current.is_empty() && current.len() + piece.len() > MESSAGE_BUDGET {
            messages.push(current.trim_end().to_string());
            current = String::new();
        }
        current.push_str(&piece);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        messages.push(current.trim_end().to_string());
    }
    messages
}

/// The full question-by-question breakdown, split across as many messages
/// as Telegram needs.
pub fn breakdown_messages(attempt: &Attempt) -> Vec<String> {
    let blocks: Vec<String> = attempt
        .questions()
        .iter()
        .enumerate()
        .map(|(index, question)| breakdown_block(attempt, index, question))
        .collect();
    chunk_blocks(blocks)
}

/// Like the breakdown, but only the questions that went wrong or were
/// skipped.
pub fn mistakes_messages(attempt: &Attempt) -> Vec<String> {
    let blocks: Vec<String> = attempt
        .questions()
        .iter()
        .enumerate()
        .filter(|(_, question)| attempt.outcome(question) != Outcome::Correct)
        .map(|(index, question)| breakdown_block(attempt, index, question))
        .collect();
    if blocks.is_empty() {
        return vec!["Nothing to review: every answer was correct.".to_string()];
    }
    chunk_blocks(blocks)
}

pub fn quick_check_message(topic: &str, question: &Question) -> String {
    format!(
        "Quick check from <b>{}</b>.\n\n<b>{}</b>\n\n{}",
        escape(topic),
        escape(&question.prompt),
        lettered_options(question)
    )
}

pub fn reveal_message(check: &QuickCheck) -> String {
    let question = check.question();
    let mut message = match check.is_correct() {
        Some(true) => "✓ Correct!\n".to_string(),
        _ => "✗ Not quite.\n".to_string(),
    };
    if let Some(picked) = check.picked() {
        let text = question.options.get(picked).map(String::as_str).unwrap_or("");
        message.push_str(&format!(
            "You picked {}) {}\n",
            option_letter(picked),
            escape(text)
        ));
    }
    if check.is_correct() != Some(true) {
        if let Some(correct) = question.correct_option() {
            message.push_str(&format!(
                "Correct answer: {}) {}\n",
                option_letter(question.correct_index),
                escape(correct)
            ));
        }
    }
    if !question.explanation.is_empty() {
        message.push_str(&format!("\n<i>{}</i>", escape(&question.explanation)));
    }
    message
}

pub fn reveal_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(TRY_AGAIN),
            KeyboardButton::new(ANOTHER_CHECK),
        ],
        vec![KeyboardButton::new(MAIN_MENU)],
    ])
}

pub fn main_menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(BROWSE_COURSES),
        KeyboardButton::new(QUICK_CHECK),
    ]])
}

pub fn courses_keyboard(courses: &[&str]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = courses
        .iter()
        .map(|course| vec![KeyboardButton::new(course.to_string())])
        .collect();
    rows.push(vec![KeyboardButton::new(MAIN_MENU)]);
    KeyboardMarkup::new(rows)
}

pub fn topics_keyboard(banks: &[&QuestionBank]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = banks
        .iter()
        .map(|bank| vec![KeyboardButton::new(bank.title.clone())])
        .collect();
    rows.push(vec![KeyboardButton::new(MAIN_MENU)]);
    KeyboardMarkup::new(rows)
}

pub fn count_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("5")],
        vec![KeyboardButton::new("10")],
        vec![KeyboardButton::new("15")],
        vec![KeyboardButton::new("30")],
    ])
}

pub fn question_number_keyboard(total: usize) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Vec::new();
    let mut row: Vec<KeyboardButton> = Vec::new();
    for number in 1..=total {
        row.push(KeyboardButton::new(number.to_string()));
        if row.len() == 5 {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows.push(vec![KeyboardButton::new(BACK_TO_SUMMARY)]);
    KeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u32, correct_index: usize) -> Question {
        Question::new(
            id,
            format!("Prompt {}", id),
            vec![
                "First".to_string(),
                "Second".to_string(),
                "Third".to_string(),
            ],
            correct_index,
            "Explanation.",
        )
    }

    #[test]
    fn test_option_letters_parse_back() {
        assert_eq!(parse_option_letter("B", 4), Some(1));
        assert_eq!(parse_option_letter("b)", 4), Some(1));
        assert_eq!(parse_option_letter(" c. ", 4), Some(2));
        assert_eq!(parse_option_letter("E", 4), None);
        assert_eq!(parse_option_letter("1", 4), None);
        assert_eq!(parse_option_letter("", 4), None);
        assert_eq!(parse_option_letter("BB", 4), None);
    }

    #[test]
    fn test_format_elapsed_pads_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2:05");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "62:05");
    }

    #[test]
    fn test_question_message_positions_and_letters() {
        let question = Question::new(
            1,
            "Earth & bonding?",
            vec!["Yes".to_string(), "No".to_string()],
            0,
            ".",
        );
        let message = question_message(3, 10, &question);
        assert!(message.contains("Question 3 of 10"));
        assert!(message.contains("Earth &amp; bonding?"));
        assert!(message.contains("A) Yes"));
        assert!(message.contains("B) No"));
    }

    #[test]
    fn test_summary_counts_answers_and_lists_open_questions() {
        let mut attempt = Attempt::new(vec![question(1, 0), question(2, 0), question(3, 0)]);
        attempt.select(2, 1);

        let message = summary_message(&attempt);
        assert!(message.contains("You answered 1 of 3"));
        assert!(message.contains("Not answered: 1, 3."));

        attempt.select(1, 0);
        attempt.select(3, 0);
        let message = summary_message(&attempt);
        assert!(message.contains("You answered 3 of 3"));
        assert!(!message.contains("Not answered"));
    }

    #[test]
    fn test_breakdown_marks_each_outcome() {
        let mut attempt = Attempt::new(vec![question(1, 0), question(2, 0), question(3, 0)]);
        attempt.select(1, 0);
        attempt.select(2, 1);
        attempt.submit();

        let text = breakdown_messages(&attempt).join("\n");
        assert!(text.contains("✓ Prompt 1"));
        assert!(text.contains("✗ Prompt 2"));
        assert!(text.contains("○ Prompt 3"));
        assert!(text.contains("Not answered."));
        assert!(text.contains("Correct answer: A) First"));
        assert!(text.contains("<i>Explanation.</i>"));
    }

    #[test]
    fn test_breakdown_omits_answer_key_for_malformed_question() {
        let broken = Question::new(9, "Broken", vec!["Only".to_string()], 7, "Oops.");
        let mut attempt = Attempt::new(vec![broken]);
        attempt.select(9, 0);
        attempt.submit();

        let text = breakdown_messages(&attempt).join("\n");
        assert!(text.contains("✗ Broken"));
        assert!(!text.contains("Correct answer:"));
    }

    #[test]
    fn test_breakdown_chunks_long_papers() {
        let questions: Vec<Question> = (0..40)
            .map(|id| {
                Question::new(
                    id,
                    "x".repeat(200),
                    vec!["y".repeat(120), "z".repeat(120)],
                    0,
                    "w".repeat(200),
                )
            })
            .collect();
        let mut attempt = Attempt::new(questions);
        attempt.submit();

        let messages = breakdown_messages(&attempt);
        assert!(messages.len() > 1);
        for message in &messages {
            assert!(message.len() <= 4000);
        }
    }

    #[test]
    fn test_breakdown_splits_a_single_oversized_question() {
        let long = Question::new(
            1,
            "x".repeat(1500),
            vec!["y".repeat(1200), "z".repeat(1200)],
            1,
            "w".repeat(1500),
        );
        let mut attempt = Attempt::new(vec![long]);
        attempt.select(1, 0);
        attempt.submit();

        let messages = breakdown_messages(&attempt);
        assert!(messages.len() >= 2);
        for message in &messages {
            assert!(message.len() <= 4000);
        }
        let joined = messages.join("\n");
        assert!(joined.contains("Your answer: A)"));
        assert!(joined.contains("Correct answer: B)"));
        assert!(joined.contains("</i>"));
    }

    #[test]
    fn test_mistakes_skip_correct_answers() {
        let mut attempt = Attempt::new(vec![question(1, 0), question(2, 0)]);
        attempt.select(1, 0);
        attempt.select(2, 1);
        attempt.submit();

        let text = mistakes_messages(&attempt).join("\n");
        assert!(!text.contains("Prompt 1"));
        assert!(text.contains("Prompt 2"));
    }

    #[test]
    fn test_mistakes_on_full_marks_say_so() {
        let mut attempt = Attempt::new(vec![question(1, 0)]);
        attempt.select(1, 0);
        attempt.submit();

        assert_eq!(
            mistakes_messages(&attempt),
            vec!["Nothing to review: every answer was correct.".to_string()]
        );
    }

    #[test]
    fn test_results_message_reports_band_and_tallies() {
        let mut attempt =
            Attempt::new(vec![question(1, 0), question(2, 0), question(3, 0), question(4, 0)]);
        attempt.select(1, 0);
        attempt.select(2, 0);
        attempt.select(3, 0);
        attempt.submit();

        let message = results_message(&attempt, "Fault Finding", Duration::from_secs(601));
        assert!(message.contains("Score: 3/4 (75%)"));
        assert!(message.contains("✓ Pass"));
        assert!(message.contains("Correct: 3, wrong: 0, not answered: 1"));
        assert!(message.contains("Time: 10:01"));
    }

    #[test]
    fn test_reveal_message_for_both_outcomes() {
        let mut right = QuickCheck::new(question(1, 0));
        right.select(0);
        let message = reveal_message(&right);
        assert!(message.contains("✓ Correct!"));
        assert!(message.contains("You picked A) First"));
        assert!(!message.contains("Correct answer:"));

        let mut wrong = QuickCheck::new(question(1, 0));
        wrong.select(2);
        let message = reveal_message(&wrong);
        assert!(message.contains("✗ Not quite."));
        assert!(message.contains("Correct answer: A) First"));
        assert!(message.contains("<i>Explanation.</i>"));
    }
}
