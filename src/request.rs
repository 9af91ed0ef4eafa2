//! One tutor request from claim to stored result.
//!
//! Handlers run one at a time per chat, but a request finishes on its own
//! task. Every read-modify-write of a chat's [`Session`] therefore goes
//! through [`modify`], which holds that chat's lock in [`SessionLocks`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use teloxide::types::ChatId;
use tokio::sync::OwnedMutexGuard;

use crate::error::TutorError;
use crate::in_flight::RequestGuard;
use crate::session::Session;
use crate::tutor::ai_helper::TutorHelper;
use crate::tutor::{Mode, SessionInput, TutorResult};
use crate::{ChatSlots, HandlerError, State, TutorDialogue};

#[derive(Default)]
pub struct SessionLocks {
    chats: Mutex<HashMap<ChatId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let chat = {
            let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
            // nobody holds or waits on these
            chats.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(chats.entry(chat_id).or_default())
        };
        chat.lock_owned().await
    }
}

/// The chat's current session, or a fresh one before the first `/start`.
pub async fn load(dialogue: &TutorDialogue) -> Result<Session, HandlerError> {
    Ok(match dialogue.get().await? {
        Some(State::Tutoring { session }) => session,
        _ => Session::default(),
    })
}

/// Applies `f` to the chat's current session and stores the outcome.
pub async fn modify<T>(
    dialogue: &TutorDialogue,
    locks: &SessionLocks,
    f: impl FnOnce(&mut Session) -> T,
) -> Result<T, HandlerError> {
    let _held = locks.lock(dialogue.chat_id()).await;
    let mut session = load(dialogue).await?;
    let out = f(&mut session);
    dialogue.update(State::Tutoring { session }).await?;
    Ok(out)
}

/// A request that owns the chat's slot.
pub struct Claimed {
    pub guard: RequestGuard<ChatId>,
    pub seq: u32,
    /// The session as it was when the request started.
    pub session: Session,
}

#[derive(Debug)]
pub enum Finished {
    Cancelled,
    Failed(TutorError),
    /// A newer request or a restart superseded this one.
    Stale,
    Stored(TutorResult),
}

/// Claims the chat's slot and starts a new request in its session.
/// Returns `None` while another request is pending.
pub async fn claim(
    dialogue: &TutorDialogue,
    locks: &SessionLocks,
    slots: &ChatSlots,
    mode: Mode,
) -> Result<Option<Claimed>, HandlerError> {
    let Some(guard) = slots.try_claim(dialogue.chat_id()) else {
        return Ok(None);
    };
    let session = modify(dialogue, locks, |session| {
        session.begin_request(mode);
        session.clone()
    })
    .await?;

    Ok(Some(Claimed {
        guard,
        seq: session.request_seq,
        session,
    }))
}

/// Asks the tutor with the input `read` produces and stores the result if
/// the request is still the latest. The slot is freed on return.
pub async fn finish<F>(
    dialogue: &TutorDialogue,
    locks: &SessionLocks,
    helper: &TutorHelper,
    claimed: Claimed,
    read: F,
) -> Result<Finished, HandlerError>
where
    F: Future<Output = Result<SessionInput, TutorError>>,
{
    let outcome = tokio::select! {
        _ = claimed.guard.cancelled() => return Ok(Finished::Cancelled),
        outcome = ask(helper, read) => outcome,
    };
    if claimed.guard.is_cancelled() {
        return Ok(Finished::Cancelled);
    }

    let result = match outcome {
        Ok(result) => result,
        Err(err) => return Ok(Finished::Failed(err)),
    };
    let seq = claimed.seq;
    let kept = modify(dialogue, locks, |session| {
        session.complete_request(seq, result.clone())
    })
    .await?;

    Ok(if kept {
        Finished::Stored(result)
    } else {
        Finished::Stale
    })
}

async fn ask<F>(helper: &TutorHelper, read: F) -> Result<TutorResult, TutorError>
where
    F: Future<Output = Result<SessionInput, TutorError>>,
{
    let input = read.await?;
    helper.ask(&input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::in_flight::RequestSlots;
    use crate::tutor::fake::{FakeClient, FIVE_QUESTIONS};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use teloxide::dispatching::dialogue::{InMemStorage, Storage};

    const CHAT: ChatId = ChatId(42);

    fn dialogue() -> TutorDialogue {
        TutorDialogue::new(InMemStorage::<State>::new().erase(), CHAT)
    }

    fn input_of(session: &Session) -> impl Future<Output = Result<SessionInput, TutorError>> {
        let input = SessionInput::new(session.mode, session.interest.clone(), None);
        async move { Ok(input) }
    }

    async fn run(
        dialogue: &TutorDialogue,
        locks: &SessionLocks,
        slots: &ChatSlots,
        reply: &str,
        mode: Mode,
    ) -> Finished {
        let helper = TutorHelper::new(FakeClient::replying(reply));
        let claimed = claim(dialogue, locks, slots, mode)
            .await
            .expect("storage")
            .expect("free slot");
        let read = input_of(&claimed.session);
        finish(dialogue, locks, &helper, claimed, read)
            .await
            .expect("storage")
    }

    #[tokio::test]
    async fn malformed_reply_leaves_no_result_and_frees_the_slot() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());

        let finished = run(&dialogue, &locks, &slots, "Sure! Here you go:", Mode::Quiz).await;

        assert!(matches!(
            finished,
            Finished::Failed(TutorError::Parse(ParseError::InvalidJson(_)))
        ));
        let session = load(&dialogue).await.expect("storage");
        assert_eq!(session.result, None);
        assert_eq!(session.request_seq, 1);
        assert!(!slots.is_busy(&CHAT));
    }

    #[tokio::test]
    async fn quiz_is_stored_with_nothing_answered() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());

        let finished = run(&dialogue, &locks, &slots, FIVE_QUESTIONS, Mode::Quiz).await;

        assert!(matches!(finished, Finished::Stored(TutorResult::Quiz { .. })));
        let session = load(&dialogue).await.expect("storage");
        assert_eq!(session.questions().len(), 5);
        assert_eq!(session.answers.score(), 0);
        assert_eq!(session.answers.answered(), 0);
        assert!((0..5).all(|i| session.answers.selected(i).is_none()));
        assert!(!slots.is_busy(&CHAT));
    }

    #[tokio::test]
    async fn second_claim_is_refused_while_pending() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());

        let first = claim(&dialogue, &locks, &slots, Mode::Explain)
            .await
            .expect("storage");
        assert!(first.is_some());
        let second = claim(&dialogue, &locks, &slots, Mode::Quiz)
            .await
            .expect("storage");
        assert!(second.is_none());
        assert_eq!(load(&dialogue).await.expect("storage").mode, Mode::Explain);
    }

    #[tokio::test]
    async fn input_sent_during_a_request_survives_the_result() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());
        let helper = TutorHelper::new(FakeClient::replying(FIVE_QUESTIONS));

        let claimed = claim(&dialogue, &locks, &slots, Mode::Quiz)
            .await
            .expect("storage")
            .expect("free slot");
        modify(&dialogue, &locks, |session| session.set_interest("tennis"))
            .await
            .expect("storage");
        let read = input_of(&claimed.session);
        let finished = finish(&dialogue, &locks, &helper, claimed, read)
            .await
            .expect("storage");

        assert!(matches!(finished, Finished::Stored(_)));
        let session = load(&dialogue).await.expect("storage");
        assert_eq!(session.interest, "tennis");
        assert_eq!(session.questions().len(), 5);
    }

    #[tokio::test]
    async fn result_arriving_after_a_restart_is_stale() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());
        let helper = TutorHelper::new(FakeClient::replying(FIVE_QUESTIONS));

        let claimed = claim(&dialogue, &locks, &slots, Mode::Quiz)
            .await
            .expect("storage")
            .expect("free slot");
        modify(&dialogue, &locks, |session| *session = session.restart())
            .await
            .expect("storage");
        let read = input_of(&claimed.session);
        let finished = finish(&dialogue, &locks, &helper, claimed, read)
            .await
            .expect("storage");

        assert!(matches!(finished, Finished::Stale));
        assert_eq!(load(&dialogue).await.expect("storage").result, None);
    }

    #[tokio::test]
    async fn cancelled_request_stores_nothing() {
        let (dialogue, locks, slots) = (dialogue(), SessionLocks::new(), RequestSlots::new());
        let helper = TutorHelper::new(FakeClient::replying(FIVE_QUESTIONS));

        let claimed = claim(&dialogue, &locks, &slots, Mode::Quiz)
            .await
            .expect("storage")
            .expect("free slot");
        assert!(slots.cancel(&CHAT));
        let read = input_of(&claimed.session);
        let finished = finish(&dialogue, &locks, &helper, claimed, read)
            .await
            .expect("storage");

        assert!(matches!(finished, Finished::Cancelled));
        assert_eq!(load(&dialogue).await.expect("storage").result, None);
    }

    #[tokio::test]
    async fn session_lock_is_per_chat() {
        let locks = SessionLocks::new();
        let held = locks.lock(ChatId(1)).await;

        let other = tokio::time::timeout(Duration::from_millis(100), locks.lock(ChatId(2))).await;
        assert!(other.is_ok());
        let same = tokio::time::timeout(Duration::from_millis(100), locks.lock(ChatId(1))).await;
        assert!(same.is_err());

        drop(held);
        let same = tokio::time::timeout(Duration::from_millis(100), locks.lock(ChatId(1))).await;
        assert!(same.is_ok());
    }
}
