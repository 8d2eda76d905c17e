use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::error::{CommunicationError, CompletionResult};
use crate::events::{Turn, TurnId};
use crate::llm::CompletionBackend;
use crate::prompts::WELCOME_MESSAGE;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a submission was ignored. Not an error: the UI already guards both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BlankInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The user turn was appended and a completion is in flight
    Accepted(TurnId),
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

/// How an accepted submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant turn with this id was appended
    Replied(TurnId),
    /// Nothing was appended; the message is now `last_error`
    Failed(String),
}

/// Read-only view handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub transcript: Vec<Turn>,
    pub is_busy: bool,
    pub last_error: Option<String>,
}

struct PendingCompletion {
    reply: oneshot::Receiver<CompletionResult>,
    task: JoinHandle<()>,
}

/// Live conversation state of one widget instance.
///
/// The transcript only ever grows, and at most one completion is outstanding:
/// `is_busy` is the guard that serialises every mutation.
pub struct ConversationSession {
    backend: Arc<dyn CompletionBackend>,
    transcript: Vec<Turn>,
    is_busy: bool,
    last_error: Option<String>,
    pending: Option<PendingCompletion>,
    request_timeout: Duration,
}

impl ConversationSession {
    /// New session seeded with the default greeting
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_welcome(backend, WELCOME_MESSAGE)
    }

    pub fn with_welcome(backend: Arc<dyn CompletionBackend>, welcome: impl Into<String>) -> Self {
        Self {
            backend,
            transcript: vec![Turn::welcome(welcome)],
            is_busy: false,
            last_error: None,
            pending: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            transcript: self.transcript.clone(),
            is_busy: self.is_busy,
            last_error: self.last_error.clone(),
        }
    }

    /// Append the user's turn and start the completion.
    ///
    /// Blank input and submissions while busy are ignored. The backend gets
    /// every turn that preceded this one, greeting included, plus the new text;
    /// the new text is not repeated inside the history. Must be called from
    /// within a Tokio runtime.
    pub fn submit(&mut self, user_text: &str) -> SubmitOutcome {
        if user_text.trim().is_empty() {
            tracing::debug!("ignoring blank submission");
            return SubmitOutcome::Rejected(Rejection::BlankInput);
        }
        if self.is_busy {
            tracing::debug!("ignoring submission while a completion is outstanding");
            return SubmitOutcome::Rejected(Rejection::Busy);
        }

        let prior_turns = self.transcript.clone();
        let turn = Turn::user(user_text);
        let turn_id = turn.id().clone();
        self.transcript.push(turn);
        self.is_busy = true;
        self.last_error = None;

        let (reply_tx, reply_rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let new_user_text = user_text.to_string();
        let timeout = self.request_timeout;

        let task = tokio::spawn(async move {
            let completion = backend.complete(&prior_turns, &new_user_text);
            let result = match tokio::time::timeout(timeout, completion).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "completion timed out");
                    Err(CommunicationError::generic())
                }
            };
            let _ = reply_tx.send(result);
        });

        tracing::debug!(turn_id = %turn_id, history_len = self.transcript.len(), "submitted user turn");
        self.pending = Some(PendingCompletion {
            reply: reply_rx,
            task,
        });
        SubmitOutcome::Accepted(turn_id)
    }

    /// Apply the outstanding completion if it has finished, without waiting
    pub fn poll_completion(&mut self) -> Option<TurnOutcome> {
        let pending = self.pending.as_mut()?;
        let result = match pending.reply.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(CommunicationError::interrupted()),
        };
        self.pending = None;
        Some(self.finish(result))
    }

    /// Wait for the outstanding completion and apply it
    pub async fn wait_for_completion(&mut self) -> Option<TurnOutcome> {
        let pending = self.pending.as_mut()?;
        let result = (&mut pending.reply)
            .await
            .unwrap_or_else(|_| Err(CommunicationError::interrupted()));
        self.pending = None;
        Some(self.finish(result))
    }

    fn finish(&mut self, result: CompletionResult) -> TurnOutcome {
        self.is_busy = false;
        match result {
            Ok(reply) => {
                let turn = Turn::assistant(reply);
                let turn_id = turn.id().clone();
                self.transcript.push(turn);
                TurnOutcome::Replied(turn_id)
            }
            Err(error) => {
                let message = error.user_message();
                tracing::warn!(error = %message, "completion failed");
                self.last_error = Some(message.clone());
                TurnOutcome::Failed(message)
            }
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}
