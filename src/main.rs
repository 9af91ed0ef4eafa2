mod config;
mod error;
mod in_flight;
mod request;
mod session;
mod speech;
mod tutor;
mod ui;

use std::sync::Arc;

use dotenv::dotenv;
use log::{error, info, warn};
use teloxide::{
    dispatching::{
        dialogue::{ErasedStorage, InMemStorage, Storage},
        UpdateHandler,
    },
    net::Download,
    prelude::*,
    types::{ChatAction, MessageId},
    utils::command::BotCommands,
};

use config::Config;
use error::TutorError;
use in_flight::RequestSlots;
use request::{Finished, SessionLocks};
use session::{AnswerEvent, ImageRef, Session};
use speech::Speaker;
use tutor::{
    ai_helper::TutorHelper, gemini::GeminiClient, scoring::Answered, InlineImage, Mode,
    SessionInput, TutorResult,
};
use ui::Action;

type TutorDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;
type TutorStorage = Arc<ErasedStorage<State>>;
type ChatSlots = RequestSlots<ChatId>;

/// Telegram re-encodes every photo as JPEG.
const TELEGRAM_PHOTO_MIME: &str = "image/jpeg";

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Tutoring {
        session: Session,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start over with a fresh session.")]
    Start,
    #[command(description = "show how to use the tutor.")]
    Help,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    info!("Starting tutor bot...");
    let bot = Bot::from_env();
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", err);
    }

    // sessions live only as long as the process
    let storage: TutorStorage = InMemStorage::<State>::new().erase();
    let helper = Arc::new(TutorHelper::new(Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_api_base,
    ))));
    let slots: Arc<ChatSlots> = Arc::new(RequestSlots::new());
    let locks = Arc::new(SessionLocks::new());
    let speaker = Arc::new(Speaker::new(config.speech_command.clone()));

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![storage, helper, slots, locks, speaker])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<HandlerError> {
    use dptree::case;

    let commands = teloxide::filter_command::<Command, _>().endpoint(command);

    let messages = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(commands)
        .branch(case![State::Start].endpoint(start))
        .branch(case![State::Tutoring { session }].endpoint(receive_input));

    let callbacks = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, ErasedStorage<State>, State>()
        .branch(case![State::Tutoring { session }].endpoint(receive_action))
        .branch(dptree::endpoint(expired_action));

    dptree::entry().branch(messages).branch(callbacks)
}

async fn command(
    bot: Bot,
    dialogue: TutorDialogue,
    slots: Arc<ChatSlots>,
    locks: Arc<SessionLocks>,
    cmd: Command,
    msg: Message,
) -> HandlerResult {
    match cmd {
        Command::Start => start(bot, dialogue, slots, locks, msg).await,
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                format!("{}\n\n{}", ui::GREETING_TEXT, Command::descriptions()),
            )
            .await?;
            Ok(())
        }
    }
}

async fn start(
    bot: Bot,
    dialogue: TutorDialogue,
    slots: Arc<ChatSlots>,
    locks: Arc<SessionLocks>,
    msg: Message,
) -> HandlerResult {
    if slots.cancel(&msg.chat.id) {
        info!("Cancelled the pending request of chat {}", msg.chat.id);
    }

    request::modify(&dialogue, &locks, |session| *session = session.restart()).await?;
    bot.send_message(msg.chat.id, ui::GREETING_TEXT).await?;
    Ok(())
}

async fn receive_input(
    bot: Bot,
    dialogue: TutorDialogue,
    slots: Arc<ChatSlots>,
    locks: Arc<SessionLocks>,
    msg: Message,
) -> HandlerResult {
    let (image, interest) = if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        let image = ImageRef {
            file_id: photo.file.id.clone(),
            mime_type: TELEGRAM_PHOTO_MIME.to_string(),
        };
        (Some(image), msg.caption())
    } else if let Some(document) = msg.document() {
        let mime = document
            .mime_type
            .as_ref()
            .filter(|mime| mime.type_().as_str() == "image");
        let Some(mime) = mime else {
            bot.send_message(msg.chat.id, ui::NOT_AN_IMAGE_TEXT).await?;
            return Ok(());
        };
        let image = ImageRef {
            file_id: document.file.id.clone(),
            mime_type: mime.essence_str().to_string(),
        };
        (Some(image), msg.caption())
    } else if let Some(text) = msg.text() {
        (None, Some(text))
    } else {
        bot.send_message(msg.chat.id, ui::UNSUPPORTED_TEXT).await?;
        return Ok(());
    };

    let mut summary = request::modify(&dialogue, &locks, |session| {
        if let Some(image) = image {
            session.set_image(image);
        }
        if let Some(interest) = interest {
            session.set_interest(interest);
        }
        ui::input_summary(session)
    })
    .await?;
    if slots.is_busy(&msg.chat.id) {
        summary.push_str("\n\n");
        summary.push_str(ui::BUSY_TEXT);
    }

    bot.send_message(msg.chat.id, summary)
        .reply_markup(ui::trigger_keyboard())
        .await?;
    Ok(())
}

async fn receive_action(
    bot: Bot,
    dialogue: TutorDialogue,
    q: CallbackQuery,
    helper: Arc<TutorHelper>,
    slots: Arc<ChatSlots>,
    locks: Arc<SessionLocks>,
    speaker: Arc<Speaker>,
) -> HandlerResult {
    let action = match q.data.as_deref().map(str::parse::<Action>) {
        Some(Ok(action)) => action,
        other => {
            warn!("Ignoring callback data {:?}", other);
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };

    match action {
        Action::Send(mode) => send_request(bot, dialogue, q, mode, helper, slots, locks).await,
        Action::Speak { seq } => speak(bot, dialogue, q, seq, speaker).await,
        Action::Answer {
            seq,
            question,
            option,
        } => answer(bot, dialogue, locks, q, seq, question, option).await,
    }
}

async fn expired_action(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text(ui::EXPIRED_TEXT)
        .show_alert(true)
        .await?;
    Ok(())
}

async fn send_request(
    bot: Bot,
    dialogue: TutorDialogue,
    q: CallbackQuery,
    mode: Mode,
    helper: Arc<TutorHelper>,
    slots: Arc<ChatSlots>,
    locks: Arc<SessionLocks>,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let Some(claimed) = request::claim(&dialogue, &locks, &slots, mode).await? else {
        bot.answer_callback_query(q.id).text(ui::BUSY_TEXT).await?;
        return Ok(());
    };
    bot.answer_callback_query(q.id).await?;
    bot.send_message(chat_id, mode.pending_label()).await?;
    // purely cosmetic
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    tokio::spawn(async move {
        let seq = claimed.seq;
        let session = claimed.session.clone();
        let read = read_input(&bot, &session);
        let finished = match request::finish(&dialogue, &locks, &helper, claimed, read).await {
            Ok(finished) => finished,
            Err(err) => {
                error!("Could not store request {} of chat {}: {}", seq, chat_id, err);
                return;
            }
        };

        if let Err(err) = deliver(&bot, &dialogue, &locks, seq, finished).await {
            error!("Could not deliver request {} to chat {}: {}", seq, chat_id, err);
        }
    });
    Ok(())
}

async fn read_input(bot: &Bot, session: &Session) -> Result<SessionInput, TutorError> {
    let image = match &session.image {
        Some(image) => Some(download_image(bot, image).await?),
        None => None,
    };
    Ok(SessionInput::new(session.mode, session.interest.clone(), image))
}

async fn download_image(bot: &Bot, image: &ImageRef) -> Result<InlineImage, TutorError> {
    let file = bot
        .get_file(image.file_id.clone())
        .await
        .map_err(|err| TutorError::FileRead(err.to_string()))?;

    let mut bytes = Vec::new();
    bot.download_file(&file.path, &mut bytes)
        .await
        .map_err(|err| TutorError::FileRead(err.to_string()))?;

    Ok(InlineImage::new(image.mime_type.clone(), bytes))
}

async fn deliver(
    bot: &Bot,
    dialogue: &TutorDialogue,
    locks: &SessionLocks,
    seq: u32,
    finished: Finished,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let result = match finished {
        Finished::Stored(result) => result,
        Finished::Cancelled => {
            info!("Request {} of chat {} was cancelled", seq, chat_id);
            return Ok(());
        }
        Finished::Stale => {
            info!("Dropping stale result {} of chat {}", seq, chat_id);
            return Ok(());
        }
        Finished::Failed(err) => {
            warn!("Request {} of chat {} failed: {}", seq, chat_id, err);
            bot.send_message(chat_id, format!("Error: {}", err)).await?;
            return Ok(());
        }
    };

    match result {
        TutorResult::Explanation { content } => {
            bot.send_message(chat_id, ui::explanation_text(&content))
                .reply_markup(ui::speak_keyboard(seq))
                .await?;
        }
        TutorResult::Quiz { questions } => {
            let score = bot
                .send_message(chat_id, ui::score_text(0, questions.len()))
                .await?;
            request::modify(dialogue, locks, |session| {
                if session.request_seq == seq {
                    session.score_message = Some(score.id.0);
                }
            })
            .await?;

            for (index, question) in questions.iter().enumerate() {
                let sent = bot
                    .send_message(chat_id, ui::question_text(index, question, None))
                    .reply_markup(ui::question_keyboard(seq, index, question, None))
                    .await;
                if let Err(err) = sent {
                    warn!(
                        "Question {} of request {} could not be sent to chat {}: {}",
                        index + 1,
                        seq,
                        chat_id,
                        err
                    );
                    request::modify(dialogue, locks, |session| session.discard_result(seq))
                        .await?;
                    bot.send_message(chat_id, format!("Error: {}", err)).await?;
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

async fn speak(
    bot: Bot,
    dialogue: TutorDialogue,
    q: CallbackQuery,
    seq: u32,
    speaker: Arc<Speaker>,
) -> HandlerResult {
    let session = request::load(&dialogue).await?;
    let content = session
        .explanation()
        .filter(|_| session.request_seq == seq);

    match content {
        Some(content) => {
            bot.answer_callback_query(q.id).text("🔊").await?;
            speaker
                .speak(bot.clone(), dialogue.chat_id(), content.to_string())
                .await;
        }
        None => {
            bot.answer_callback_query(q.id)
                .text(ui::OUTDATED_TEXT)
                .await?;
        }
    }
    Ok(())
}

async fn answer(
    bot: Bot,
    dialogue: TutorDialogue,
    locks: Arc<SessionLocks>,
    q: CallbackQuery,
    seq: u32,
    question: usize,
    option: usize,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let (event, session) = request::modify(&dialogue, &locks, |session| {
        (session.answer(seq, question, option), session.clone())
    })
    .await?;
    let outcome = match event {
        AnswerEvent::Recorded(Answered::AlreadyAnswered) => {
            bot.answer_callback_query(q.id)
                .text(ui::ALREADY_ANSWERED_TEXT)
                .await?;
            return Ok(());
        }
        AnswerEvent::Recorded(outcome) => outcome,
        AnswerEvent::Stale | AnswerEvent::NoQuiz | AnswerEvent::OutOfRange => {
            bot.answer_callback_query(q.id)
                .text(ui::OUTDATED_TEXT)
                .await?;
            return Ok(());
        }
    };

    let verdict = if outcome == Answered::Correct {
        ui::CORRECT_TEXT
    } else {
        ui::INCORRECT_TEXT
    };
    bot.answer_callback_query(q.id).text(verdict).await?;

    let total = session.questions().len();
    let score = session.answers.score();
    info!(
        "Chat {} answered {}/{} questions, score {}",
        chat_id,
        session.answers.answered(),
        total,
        score
    );

    if let (Some(message), Some(asked)) = (q.message.as_ref(), session.questions().get(question)) {
        let selected = session.answers.selected(question);
        bot.edit_message_text(chat_id, message.id, ui::question_text(question, asked, selected))
            .reply_markup(ui::question_keyboard(seq, question, asked, selected))
            .await?;
    }
    if let Some(id) = session.score_message {
        bot.edit_message_text(chat_id, MessageId(id), ui::score_text(score, total))
            .await?;
    }
    if session.quiz_complete() {
        bot.send_message(chat_id, ui::final_score_text(score, total))
            .await?;
    }
    Ok(())
}
