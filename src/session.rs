use crate::tutor::scoring::{AnswerSheet, Answered};
use crate::tutor::{Mode, Question, TutorResult};

/// Where to fetch the user's image from once a request needs it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageRef {
    pub file_id: String,
    pub mime_type: String,
}

/// Per-chat tutor state: the inputs collected so far and the latest result.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub interest: String,
    pub image: Option<ImageRef>,
    pub mode: Mode,
    pub result: Option<TutorResult>,
    pub answers: AnswerSheet,
    /// Bumped by every request; results and quiz taps from older requests are dropped.
    pub request_seq: u32,
    pub score_message: Option<i32>,
}

/// What happened to a quiz tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerEvent {
    /// The tap belongs to an earlier request.
    Stale,
    NoQuiz,
    OutOfRange,
    Recorded(Answered),
}

impl Session {
    pub fn set_interest(&mut self, interest: impl Into<String>) {
        self.interest = interest.into();
    }

    pub fn set_image(&mut self, image: ImageRef) {
        self.image = Some(image);
    }

    /// Clears the previous result and answers and returns the new request's sequence number.
    pub fn begin_request(&mut self, mode: Mode) -> u32 {
        self.request_seq = self.request_seq.wrapping_add(1);
        self.mode = mode;
        self.result = None;
        self.answers = AnswerSheet::new();
        self.score_message = None;
        self.request_seq
    }

    /// A fresh session whose next request still outranks every earlier one.
    pub fn restart(&self) -> Session {
        Session {
            request_seq: self.request_seq.wrapping_add(1),
            ..Session::default()
        }
    }

    /// Stores `result` if it answers the latest request. Returns whether it was kept.
    pub fn complete_request(&mut self, seq: u32, result: TutorResult) -> bool {
        if seq != self.request_seq {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Forgets the result of request `seq` if it is still the latest one.
    pub fn discard_result(&mut self, seq: u32) -> bool {
        if seq != self.request_seq {
            return false;
        }
        self.result = None;
        self.answers = AnswerSheet::new();
        self.score_message = None;
        true
    }

    pub fn questions(&self) -> &[Question] {
        self.result
            .as_ref()
            .and_then(TutorResult::questions)
            .unwrap_or_default()
    }

    pub fn explanation(&self) -> Option<&str> {
        match &self.result {
            Some(TutorResult::Explanation { content }) => Some(content),
            _ => None,
        }
    }

    pub fn answer(&mut self, seq: u32, question: usize, option: usize) -> AnswerEvent {
        if seq != self.request_seq {
            return AnswerEvent::Stale;
        }
        let Some(questions) = self.result.as_ref().and_then(TutorResult::questions) else {
            return AnswerEvent::NoQuiz;
        };
        let Some(asked) = questions.get(question) else {
            return AnswerEvent::OutOfRange;
        };
        let Some(picked) = asked.options.get(option) else {
            return AnswerEvent::OutOfRange;
        };

        AnswerEvent::Recorded(self.answers.answer(question, picked, &asked.answer))
    }

    pub fn quiz_complete(&self) -> bool {
        let total = self.questions().len();
        total > 0 && self.answers.is_complete(total)
    }
}
