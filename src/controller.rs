//! Turns user input into analysis requests and their outcomes into messages.
//!
//! A submission stages the user's message immediately (shown as pending),
//! spawns the gateway call, and records the outcome once it settles. On success
//! the staged message is appended together with the reply. On failure the
//! staged message is discarded and a single system notice is appended; a
//! failed text draft is put back into the input box.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::downloads::{analyzed_file_name, DownloadSink};
use crate::error::AnalysisError;
use crate::gateway::{AnalysisGateway, Artifact, CsvUpload, SentimentResult};
use crate::state::{AnalysisMode, Message};
use crate::store::ConversationStore;

pub const CSV_SUCCESS_NOTICE: &str = "✓ CSV analyzed successfully. File downloaded.";
pub const CSV_COMPLETE_REPLY: &str =
    "CSV analysis complete. The processed file has been downloaded.";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Why a submission did not start a request. Never shown in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyInput,
    NoFileSelected,
    Busy,
    WrongMode,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::EmptyInput => "input is empty",
            SkipReason::NoFileSelected => "no file selected",
            SkipReason::Busy => "an analysis is already in progress",
            SkipReason::WrongMode => "input is not active in the current mode",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Started,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Submitting,
}

/// A gateway call that has finished, with what is needed to apply it.
#[derive(Debug)]
enum Settled {
    Text {
        draft: String,
        outcome: Result<SentimentResult, AnalysisError>,
    },
    Csv {
        file_name: String,
        outcome: Result<Artifact, AnalysisError>,
    },
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn failure_notice(subject: &str, err: &AnalysisError) -> String {
    let message = err.to_string();
    let message = if message.trim().is_empty() {
        UNKNOWN_ERROR
    } else {
        message.as_str()
    };
    format!("✗ Error analyzing {}: {}", subject, message)
}

pub struct InputController {
    gateway: AnalysisGateway,
    store: ConversationStore,
    downloads: Box<dyn DownloadSink>,
    mode: AnalysisMode,

    // Text draft and the CSV path prompt, each with a char-indexed cursor
    input: String,
    cursor: usize,
    file_path: String,
    file_cursor: usize,

    // Staged user message of the request in flight
    pending: Option<Message>,
    last_download: Option<PathBuf>,

    settled_tx: mpsc::UnboundedSender<Settled>,
    settled_rx: mpsc::UnboundedReceiver<Settled>,
}

impl InputController {
    pub fn new(gateway: AnalysisGateway, downloads: Box<dyn DownloadSink>) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            store: ConversationStore::new(),
            downloads,
            mode: AnalysisMode::default(),
            input: String::new(),
            cursor: 0,
            file_path: String::new(),
            file_cursor: 0,
            pending: None,
            last_download: None,
            settled_tx,
            settled_rx,
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AnalysisMode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode switched");
            self.mode = mode;
        }
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.mode.toggle());
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// User message of the request in flight, shown before the reply arrives.
    pub fn pending_message(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.gateway.is_busy()
    }

    pub fn request_state(&self) -> RequestState {
        if self.is_busy() {
            RequestState::Submitting
        } else {
            RequestState::Idle
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn file_cursor(&self) -> usize {
        self.file_cursor
    }

    /// Where the last analyzed CSV was saved.
    pub fn last_download(&self) -> Option<&Path> {
        self.last_download.as_deref()
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
    }

    pub fn set_file_path(&mut self, path: &str) {
        self.file_path = path.to_string();
        self.file_cursor = self.file_path.chars().count();
    }

    // Editing. Applies to the field of the active mode and is disabled while a
    // request is in flight.

    fn active_field(&mut self) -> Option<(&mut String, &mut usize)> {
        if self.is_busy() {
            return None;
        }
        Some(match self.mode {
            AnalysisMode::Text => (&mut self.input, &mut self.cursor),
            AnalysisMode::Csv => (&mut self.file_path, &mut self.file_cursor),
        })
    }

    pub fn insert_char(&mut self, c: char) {
        if let Some((field, cursor)) = self.active_field() {
            let byte_pos = char_to_byte_index(field, *cursor);
            field.insert(byte_pos, c);
            *cursor += 1;
        }
    }

    /// Literal line break in the text draft. Paths are single-line.
    pub fn insert_newline(&mut self) {
        if self.mode == AnalysisMode::Text {
            self.insert_char('\n');
        }
    }

    pub fn backspace(&mut self) {
        if let Some((field, cursor)) = self.active_field() {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(field, *cursor);
                field.remove(byte_pos);
            }
        }
    }

    pub fn delete(&mut self) {
        if let Some((field, cursor)) = self.active_field() {
            if *cursor < field.chars().count() {
                let byte_pos = char_to_byte_index(field, *cursor);
                field.remove(byte_pos);
            }
        }
    }

    pub fn move_left(&mut self) {
        if let Some((_, cursor)) = self.active_field() {
            *cursor = cursor.saturating_sub(1);
        }
    }

    pub fn move_right(&mut self) {
        if let Some((field, cursor)) = self.active_field() {
            *cursor = (*cursor + 1).min(field.chars().count());
        }
    }

    pub fn move_home(&mut self) {
        if let Some((_, cursor)) = self.active_field() {
            *cursor = 0;
        }
    }

    pub fn move_end(&mut self) {
        if let Some((field, cursor)) = self.active_field() {
            *cursor = field.chars().count();
        }
    }

    /// Clear the transcript. Mode, drafts and any request in flight are kept.
    pub fn new_chat(&mut self) {
        info!(cleared = self.store.len(), "new chat");
        self.store.clear();
    }

    fn skip(&self, reason: SkipReason) -> Submission {
        debug!(%reason, mode = ?self.mode, "submission skipped");
        Submission::Skipped(reason)
    }

    /// Submit the text draft for analysis.
    pub fn submit_text(&mut self) -> Submission {
        if self.mode != AnalysisMode::Text {
            return self.skip(SkipReason::WrongMode);
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return self.skip(SkipReason::EmptyInput);
        }
        if self.is_busy() {
            return self.skip(SkipReason::Busy);
        }

        let draft = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.pending = Some(Message::user(text.clone()));

        let gateway = self.gateway.clone();
        let tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let outcome = gateway.analyze_text(&text).await;
            if tx.send(Settled::Text { draft, outcome }).is_err() {
                debug!("conversation closed before text analysis settled");
            }
        });

        Submission::Started
    }

    /// Submit the path typed in the CSV prompt.
    pub fn submit_file_path(&mut self) -> Submission {
        let path = self.file_path.trim().to_string();
        self.select_file(path)
    }

    /// Upload a chosen CSV file for batch analysis.
    pub fn select_file(&mut self, path: impl Into<PathBuf>) -> Submission {
        if self.mode != AnalysisMode::Csv {
            return self.skip(SkipReason::WrongMode);
        }
        let path = path.into();
        if path.as_os_str().is_empty() {
            return self.skip(SkipReason::NoFileSelected);
        }
        if self.is_busy() {
            return self.skip(SkipReason::Busy);
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.file_path.clear();
        self.file_cursor = 0;
        self.pending = Some(Message::user(format!("Uploaded CSV file: {}", file_name)));

        let gateway = self.gateway.clone();
        let tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let outcome = match CsvUpload::from_path(&path).await {
                Ok(upload) => gateway.analyze_csv(upload).await,
                Err(e) => Err(e),
            };
            if tx.send(Settled::Csv { file_name, outcome }).is_err() {
                debug!("conversation closed before csv analysis settled");
            }
        });

        Submission::Started
    }

    /// Apply every outcome that has settled so far without waiting.
    /// Returns how many were applied.
    pub fn poll_settled(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(settled) = self.settled_rx.try_recv() {
            self.apply(settled);
            applied += 1;
        }
        applied
    }

    /// Wait for the request in flight to settle and apply it.
    /// Returns immediately when nothing is pending.
    pub async fn wait_settled(&mut self) {
        if self.pending.is_none() {
            return;
        }
        if let Some(settled) = self.settled_rx.recv().await {
            self.apply(settled);
        }
    }

    fn apply(&mut self, settled: Settled) {
        let Some(user_message) = self.pending.take() else {
            warn!("settled outcome without a pending request");
            return;
        };

        match settled {
            Settled::Text {
                outcome: Ok(result),
                ..
            } => {
                let reply = Message::sentiment_reply(result.into());
                self.store.append([user_message, reply]);
            }
            Settled::Text {
                draft,
                outcome: Err(e),
            } => {
                warn!(error = %e, "text analysis failed");
                if self.input.is_empty() {
                    self.set_input(&draft);
                }
                self.store.append([Message::system(failure_notice("text", &e))]);
            }
            Settled::Csv {
                file_name,
                outcome: Ok(artifact),
            } => {
                let target = analyzed_file_name(&file_name);
                let saved = self.downloads.save(&target, artifact.bytes());
                artifact.release();

                match saved {
                    Ok(path) => {
                        self.last_download = Some(path);
                        self.store.append([Message::system(CSV_SUCCESS_NOTICE)]);
                        self.store
                            .append([user_message, Message::assistant(CSV_COMPLETE_REPLY)]);
                    }
                    Err(e) => {
                        warn!(error = %e, file = %target, "saving analyzed csv failed");
                        let err = AnalysisError::request_failed(format!("{:#}", e));
                        self.store.append([Message::system(failure_notice("CSV", &err))]);
                    }
                }
            }
            Settled::Csv {
                outcome: Err(e), ..
            } => {
                warn!(error = %e, "csv analysis failed");
                self.store.append([Message::system(failure_notice("CSV", &e))]);
            }
        }
    }
}
