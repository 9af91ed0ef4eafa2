use std::fmt;
use std::str::FromStr;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::session::Session;
use crate::tutor::{Mode, Question};

pub const GREETING_TEXT: &str = "🧠 NeuroAlly, the AI tutor.\n\n\
1. Send me an image (a photo, or an image file).\n\
2. Tell me what you're into, e.g. \"Explain using Minecraft\".\n\
3. Tap 📖 Explain It or 📝 Generate Quiz.";

pub const BUSY_TEXT: &str = "Still working on your last request, hang on.";
pub const EXPIRED_TEXT: &str = "This session has ended. Send /start to begin again.";
pub const NOT_AN_IMAGE_TEXT: &str = "That file isn't an image. Send a photo or an image file.";
pub const UNSUPPORTED_TEXT: &str = "Send me an image or some text about what you're into.";
pub const OUTDATED_TEXT: &str = "That belongs to an older result.";
pub const ALREADY_ANSWERED_TEXT: &str = "You already answered this one.";
pub const CORRECT_TEXT: &str = "Correct!";
pub const INCORRECT_TEXT: &str = "Not quite.";

/// Payload of an inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send(Mode),
    Speak { seq: u32 },
    Answer { seq: u32, question: usize, option: usize },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Send(mode) => f.write_str(mode.as_str()),
            Action::Speak { seq } => write!(f, "speak:{}", seq),
            Action::Answer {
                seq,
                question,
                option,
            } => write!(f, "answer:{}:{}:{}", seq, question, option),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownAction(data.to_string());
        let mut fields = data.split(':');

        let action = match fields.next() {
            Some("explain") => Action::Send(Mode::Explain),
            Some("quiz") => Action::Send(Mode::Quiz),
            Some("speak") => Action::Speak {
                seq: parse_field(fields.next()).ok_or_else(unknown)?,
            },
            Some("answer") => Action::Answer {
                seq: parse_field(fields.next()).ok_or_else(unknown)?,
                question: parse_field(fields.next()).ok_or_else(unknown)?,
                option: parse_field(fields.next()).ok_or_else(unknown)?,
            },
            _ => return Err(unknown()),
        };

        if fields.next().is_some() {
            return Err(unknown());
        }
        Ok(action)
    }
}

fn parse_field<T: FromStr>(field: Option<&str>) -> Option<T> {
    field?.parse().ok()
}

pub fn trigger_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("📖 Explain It", Action::Send(Mode::Explain).to_string()),
        InlineKeyboardButton::callback("📝 Generate Quiz", Action::Send(Mode::Quiz).to_string()),
    ]])
}

/// Echoes back what the next request will be built from.
pub fn input_summary(session: &Session) -> String {
    let image = if session.image.is_some() {
        "attached"
    } else {
        "none"
    };
    let interest = if session.interest.is_empty() {
        "(none yet)".to_string()
    } else {
        format!("\"{}\"", session.interest)
    };
    format!("Image: {}\nInterest: {}", image, interest)
}

pub fn explanation_text(content: &str) -> String {
    format!("💡 Explanation\n\n{}", content)
}

pub fn speak_keyboard(seq: u32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🔊",
        Action::Speak { seq }.to_string(),
    )]])
}

pub fn score_text(score: usize, total: usize) -> String {
    format!("📝 Quiz\nScore: {}/{}", score, total)
}

pub fn final_score_text(score: usize, total: usize) -> String {
    format!("Quiz finished! You got {} out of {} right.", score, total)
}

pub fn question_text(index: usize, question: &Question, selected: Option<&str>) -> String {
    let mut text = format!("{}. {}", index + 1, question.text);
    if selected.is_some() {
        text.push_str(&format!("\n\nℹ️ {}", question.hint));
    }
    text
}

/// Two options per row. Once answered, only the picked option is marked.
pub fn question_keyboard(
    seq: u32,
    index: usize,
    question: &Question,
    selected: Option<&str>,
) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = question
        .options
        .iter()
        .enumerate()
        .map(|(option, label)| {
            let label = match selected {
                Some(picked) if picked == label && *label == question.answer => format!("✅ {}", label),
                Some(picked) if picked == label => format!("❌ {}", label),
                _ => label.clone(),
            };
            let action = Action::Answer {
                seq,
                question: index,
                option,
            };
            InlineKeyboardButton::callback(label, action.to_string())
        })
        .collect();

    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()))
}
