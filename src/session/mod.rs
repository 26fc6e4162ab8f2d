//! Practice session state machine
//!
//! A session moves through recording, transcription, reply generation, and
//! playback one stage at a time. The [`SessionController`] owns the session,
//! exposes one method per user action, and consumes service completions on
//! the same task, so only one stage is ever active.
//!
//! ```text
//! Idle ──start──▶ GeneratingReply ──▶ Speaking ──▶ AwaitingInput
//!                      ▲                              │ begin_capture
//!                      │                              ▼
//!                 Transcribing ◀──end/cancel_capture── Recording
//! ```

mod controller;
mod state;
mod transcript;
mod turn;

pub use controller::{Completion, Session, SessionController, SessionEvent, SessionSettings};
pub use state::{
    Affordances, SessionState, SessionToggle, Stage, TALK_LABEL_HOLD, TALK_LABEL_SPEAK_NOW,
    TALK_LABEL_TEACHER_SPEAKING, TalkControl,
};
pub use transcript::{Speaker, Transcript, TranscriptEntry};
pub use turn::{Role, Turn};
