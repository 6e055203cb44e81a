//! Chat session
//!
//! A session owns its transcript and its state. Each user turn runs strictly
//! in sequence: retrieve, generate, display, then wait for the next input.
//! Failures become visible error turns and leave the session usable.

use crate::synthesizer::Synthesizer;
use chrono::{DateTime, Utc};
use docchat_common::errors::{AppError, Result};
use docchat_common::metrics;
use docchat_search::QueryEngine;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// First assistant turn of every session
pub const GREETING: &str = "Ask me something...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Assistant,
    User,
    Error,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Assistant => "assistant",
            Role::User => "user",
            Role::Error => "error",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// `role> text`
    pub fn render(&self) -> String {
        format!("{}> {}", self.role, self.text)
    }
}

/// Ordered turns of one session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn with_greeting() -> Self {
        Self {
            turns: vec![Turn::new(Role::Assistant, GREETING)],
        }
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Retrieving,
    Generating,
    Displaying,
}

impl SessionState {
    /// Legal successor states; any active state may jump to Displaying on failure
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (AwaitingInput, Retrieving)
                | (Retrieving, Generating)
                | (Retrieving, Displaying)
                | (Generating, Displaying)
                | (Displaying, AwaitingInput)
        )
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered,
    Failed,
}

impl TurnOutcome {
    fn as_str(self) -> &'static str {
        match self {
            TurnOutcome::Answered => "answered",
            TurnOutcome::Failed => "error",
        }
    }
}

pub struct ChatSession {
    id: Uuid,
    transcript: Transcript,
    state: SessionState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "Chat session started");
        Self {
            id,
            transcript: Transcript::with_greeting(),
            state: SessionState::AwaitingInput,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::Internal {
                message: format!("illegal session transition {:?} -> {:?}", self.state, next),
            });
        }
        debug!(session = %self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
        Ok(())
    }

    /// Run one user turn and return the turns it appended.
    ///
    /// Blank input is ignored and appends nothing.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn handle_turn(
        &mut self,
        input: &str,
        engine: &QueryEngine,
        synthesizer: &Synthesizer,
    ) -> Result<&[Turn]> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(&[]);
        }

        let first_new = self.transcript.len();
        self.transition(SessionState::Retrieving)?;
        self.transcript.push(Turn::new(Role::User, query));

        let reply = match engine.retrieve(query).await {
            Ok(context) => {
                if let Some(reason) = &context.fallback {
                    warn!(reason = %reason, "Answering from unranked context");
                }
                self.transition(SessionState::Generating)?;
                synthesizer.synthesize(query, &context).await
            }
            Err(e) => Err(e),
        };

        self.transition(SessionState::Displaying)?;
        let outcome = match reply {
            Ok(answer) => {
                self.transcript.push(Turn::new(Role::Assistant, answer));
                TurnOutcome::Answered
            }
            Err(e) if e.is_recoverable_in_session() => {
                warn!(error = %e, code = e.code().as_code(), "Turn failed");
                self.transcript
                    .push(Turn::new(Role::Error, format!("Sorry, I could not answer that: {}", e)));
                TurnOutcome::Failed
            }
            Err(e) => {
                self.state = SessionState::AwaitingInput;
                return Err(e);
            }
        };
        metrics::record_turn(outcome.as_str());

        self.transition(SessionState::AwaitingInput)?;
        Ok(&self.transcript.turns()[first_new..])
    }
}
