use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::io;
use std::process::Stdio;

use log::{debug, warn};
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// One queued or playing utterance per key. Queueing a new one aborts the old.
pub struct Utterances<K> {
    playing: Mutex<HashMap<K, JoinHandle<()>>>,
}

impl<K: Eq + Hash> Utterances<K> {
    pub fn new() -> Self {
        Self {
            playing: Mutex::new(HashMap::new()),
        }
    }

    pub async fn replace<F>(&self, key: K, utterance: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut playing = self.playing.lock().await;
        if let Some(previous) = playing.remove(&key) {
            previous.abort();
        }
        playing.retain(|_, handle| !handle.is_finished());
        playing.insert(key, tokio::spawn(utterance));
    }
}

/// Reads explanations aloud by piping them through a TTS command and sending
/// the audio back to the chat.
pub struct Speaker {
    command: Vec<String>,
    utterances: Utterances<ChatId>,
}

impl Speaker {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            utterances: Utterances::new(),
        }
    }

    pub async fn speak(&self, bot: Bot, chat_id: ChatId, text: String) {
        let command = self.command.clone();
        self.utterances
            .replace(chat_id, async move {
                let audio = match synthesize(&command, &text).await {
                    Ok(audio) => audio,
                    Err(err) => {
                        warn!("Speech synthesis failed for chat {}: {}", chat_id, err);
                        return;
                    }
                };
                debug!("Sending {} bytes of speech to chat {}", audio.len(), chat_id);

                let file = InputFile::memory(audio).file_name("explanation.wav");
                if let Err(err) = bot.send_audio(chat_id, file).await {
                    warn!("Could not send speech to chat {}: {}", chat_id, err);
                }
            })
            .await;
    }
}

/// Runs `command` with `text` on stdin and returns whatever it writes to stdout.
/// The child is killed if the returned future is dropped.
pub async fn synthesize(command: &[String], text: &str) -> io::Result<Vec<u8>> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty speech command"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "speech command has no stdin"))?;
    let input = text.as_bytes().to_vec();
    let feed = async move {
        let written = stdin.write_all(&input).await;
        drop(stdin);
        written
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    fed?;

    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("speech command exited with {}", output.status),
        ));
    }
    Ok(output.stdout)
}
