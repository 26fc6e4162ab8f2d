//! Session controller

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::state::{Affordances, SessionState, Stage};
use super::transcript::{Speaker, Transcript, TranscriptEntry};
use super::turn::{Role, Turn};
use crate::config::Config;
use crate::credentials::Credential;
use crate::services::Services;
use crate::voice::{AudioArtifact, CaptureHandle, SpeechCapture, StopSignal};
use crate::{Error, Result};

/// Settings the controller needs from [`Config`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Instructions seeded as the first turn
    pub system_prompt: String,
    /// Upper bound on each remote call
    pub stage_timeout: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            system_prompt: config.llm.system_prompt.clone(),
            stage_timeout: config.stage_timeout,
        }
    }
}

/// Notifications for the user interface
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session moved to a new state
    StateChanged {
        state: SessionState,
        affordances: Affordances,
    },
    /// A line was added to the transcript
    Transcript(TranscriptEntry),
    /// A stage failed and the chain was abandoned
    Failed {
        stage: Option<Stage>,
        message: String,
    },
}

/// Result of a service call, tagged with the session epoch that issued it
#[derive(Debug)]
pub struct Completion {
    epoch: u64,
    outcome: Outcome,
}

#[derive(Debug)]
enum Outcome {
    Transcribed(Result<String>),
    Generated(Result<String>),
    Synthesized(Result<AudioArtifact>),
    Played(Result<()>),
}

impl Outcome {
    const fn stage(&self) -> Stage {
        match self {
            Self::Transcribed(_) => Stage::Transcribing,
            Self::Generated(_) => Stage::GeneratingReply,
            Self::Synthesized(_) | Self::Played(_) => Stage::Speaking,
        }
    }
}

/// One practice conversation
#[derive(Debug, Default)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    scenario: String,
    turns: Vec<Turn>,
    transcript: Transcript,
    credential: Option<Credential>,
}

impl Session {
    /// Identifier used to correlate log lines
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Scenario text the session was started with
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Full conversation history, system instruction first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Text of the most recent assistant turn
    #[must_use]
    pub fn last_reply(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }
}

/// Coordinates capture and the remote stages of a practice session
///
/// User actions are methods; service results arrive as [`Completion`]s on
/// an internal channel and are applied with
/// [`handle_completion`](Self::handle_completion). Results issued before the
/// latest `start`/`stop` are discarded on arrival.
///
/// Remote calls are spawned onto the ambient Tokio runtime, so every method
/// that starts one must run inside it.
pub struct SessionController {
    capture: Box<dyn SpeechCapture>,
    services: Services,
    settings: SessionSettings,
    session: Session,
    affordances: Affordances,
    open_capture: Option<Box<dyn CaptureHandle>>,
    playback: Option<StopSignal>,
    epoch: u64,
    in_flight: bool,
    opening: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Create an idle controller and the receiver for its events
    #[must_use]
    pub fn new(
        capture: Box<dyn SpeechCapture>,
        services: Services,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            capture,
            services,
            settings,
            session: Session::default(),
            affordances: Affordances::for_state(SessionState::Idle, false),
            open_capture: None,
            playback: None,
            epoch: 0,
            in_flight: false,
            opening: false,
            completions_tx,
            completions_rx,
            events,
        };

        (controller, events_rx)
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        self.session.turns()
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        self.session.transcript()
    }

    /// Control state for the current session state
    #[must_use]
    pub const fn affordances(&self) -> Affordances {
        self.affordances
    }

    /// Whether a microphone capture is open
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.open_capture.is_some()
    }

    /// Whether a service call or playback is outstanding
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Start a session and request the tutor's opening reply
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the credential or scenario is empty, and
    /// `Error::InvalidTransition` unless idle. The state is unchanged on error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime
    pub fn start(&mut self, scenario: &str, credential: Credential) -> Result<()> {
        self.expect_state(SessionState::Idle, "start")?;

        if credential.is_empty() {
            return Err(Error::Config("an API key is required".to_string()));
        }
        let scenario = scenario.trim();
        if scenario.is_empty() {
            return Err(Error::Config("a scenario is required".to_string()));
        }

        self.epoch += 1;
        self.session.id = Uuid::new_v4();
        self.session.scenario = scenario.to_string();
        self.session.turns = vec![
            Turn::system(self.settings.system_prompt.clone()),
            Turn::user(scenario),
        ];
        self.session.transcript.clear();
        self.session.credential = Some(credential);
        self.opening = true;

        tracing::info!(session = %self.session.id, scenario, "starting conversation");

        self.transition(SessionState::GeneratingReply);
        self.request_reply()
    }

    /// Open the microphone and start recording
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the device is denied or absent,
    /// and `Error::InvalidTransition` unless awaiting input. The state is
    /// unchanged on error.
    pub fn begin_capture(&mut self) -> Result<()> {
        self.expect_state(SessionState::AwaitingInput, "begin capture")?;

        match self.capture.open() {
            Ok(handle) => {
                self.open_capture = Some(handle);
                tracing::debug!(session = %self.session.id, "capture opened");
                self.transition(SessionState::Recording);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = %self.session.id, error = %e, "capture unavailable");
                let e = match e {
                    Error::CaptureUnavailable(_) => e,
                    other => Error::CaptureUnavailable(other.to_string()),
                };
                self.publish(SessionEvent::Failed {
                    stage: None,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop recording and send the speech for transcription
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` unless recording, or the encoding
    /// error if the recording could not be finalized (the session then
    /// returns to awaiting input)
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime
    pub fn end_capture(&mut self) -> Result<()> {
        self.expect_state(SessionState::Recording, "end capture")?;
        self.finish_capture()
    }

    /// End the recording early (focus lost, pointer left the control)
    ///
    /// Same release guarantee and target state as [`end_capture`](Self::end_capture)
    ///
    /// # Errors
    ///
    /// Same as [`end_capture`](Self::end_capture)
    ///
    /// # Panics
    ///
    /// Same as [`end_capture`](Self::end_capture)
    pub fn cancel_capture(&mut self) -> Result<()> {
        self.expect_state(SessionState::Recording, "cancel capture")?;
        tracing::debug!(session = %self.session.id, "capture cancelled");
        self.finish_capture()
    }

    /// Speak the last reply again without touching the conversation
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` unless awaiting input with a reply
    /// to repeat
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime
    pub fn repeat_last(&mut self) -> Result<()> {
        self.expect_state(SessionState::AwaitingInput, "repeat")?;
        let Some(text) = self.session.last_reply().map(ToString::to_string) else {
            return Err(Error::InvalidTransition {
                state: self.session.state,
                action: "repeat without a reply",
            });
        };

        tracing::debug!(session = %self.session.id, "repeating last reply");
        self.transition(SessionState::Speaking);
        self.request_speech(text)
    }

    /// Stop the session from any state
    ///
    /// Releases an open capture, cuts off playback, and abandons outstanding
    /// calls. Turns and
    /// transcript stay readable until the next `start`. Calling it again
    /// has no effect.
    pub fn stop(&mut self) {
        if self.session.state == SessionState::Idle {
            return;
        }

        if self.open_capture.take().is_some() {
            tracing::debug!(session = %self.session.id, "capture released");
        }
        self.silence();
        self.epoch += 1;
        self.in_flight = false;
        self.opening = false;

        tracing::info!(session = %self.session.id, "conversation stopped");
        self.transition(SessionState::Idle);
    }

    /// Wait for the next service completion
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` next to user input
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Apply a service completion and start the next stage
    ///
    /// Completions from an earlier epoch, or that no longer match the
    /// current state, are discarded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Service` when the completed call failed. The session
    /// has already returned to awaiting input (idle for the opening reply).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime
    pub fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        let stage = completion.outcome.stage();

        if completion.epoch != self.epoch || !self.in_flight {
            tracing::debug!(
                session = %self.session.id,
                %stage,
                "discarding stale completion"
            );
            return Ok(());
        }
        if self.session.state.stage() != Some(stage) {
            tracing::warn!(
                session = %self.session.id,
                %stage,
                state = %self.session.state,
                "discarding completion for inactive stage"
            );
            return Ok(());
        }
        self.in_flight = false;

        match completion.outcome {
            Outcome::Transcribed(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(self.fail(Error::service(stage, "no speech recognized")));
                }
                tracing::info!(session = %self.session.id, said = text, "learner turn");
                self.session.turns.push(Turn::user(text));
                self.narrate(Speaker::You, text);
                self.transition(SessionState::GeneratingReply);
                self.request_reply()
            }
            Outcome::Generated(Ok(text)) => {
                tracing::info!(session = %self.session.id, reply = %text, "tutor turn");
                self.session.turns.push(Turn::assistant(text.clone()));
                self.narrate(Speaker::Teacher, &text);
                self.opening = false;
                self.transition(SessionState::Speaking);
                self.request_speech(text)
            }
            Outcome::Synthesized(Ok(audio)) => {
                self.request_playback(audio);
                Ok(())
            }
            Outcome::Played(Ok(())) => {
                self.playback = None;
                tracing::debug!(session = %self.session.id, "playback finished");
                self.transition(SessionState::AwaitingInput);
                Ok(())
            }
            Outcome::Played(Err(e)) => Err(self.fail(e)),
            Outcome::Transcribed(Err(e)) | Outcome::Generated(Err(e)) => {
                Err(self.fail(e.at_stage(stage)))
            }
            Outcome::Synthesized(Err(e)) => Err(self.fail(e.at_stage(stage))),
        }
    }

    /// Apply completions until no call is outstanding
    ///
    /// # Errors
    ///
    /// Returns the first service error encountered
    pub async fn settle(&mut self) -> Result<()> {
        while self.in_flight {
            let Some(completion) = self.completions_rx.recv().await else {
                break;
            };
            self.handle_completion(completion)?;
        }
        Ok(())
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.session.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                state: self.session.state,
                action,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        let previous = self.session.state;
        self.session.state = next;
        self.affordances = Affordances::for_state(next, self.session.last_reply().is_some());

        tracing::debug!(
            session = %self.session.id,
            from = %previous,
            to = %next,
            "state transition"
        );

        self.publish(SessionEvent::StateChanged {
            state: next,
            affordances: self.affordances,
        });
    }

    fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("no event listener");
        }
    }

    fn narrate(&mut self, speaker: Speaker, text: &str) {
        let entry = self.session.transcript.push(speaker, text);
        self.publish(SessionEvent::Transcript(entry));
    }

    /// Abandon the chain after a failure and hand control back to the user
    fn fail(&mut self, error: Error) -> Error {
        let target = if self.opening {
            SessionState::Idle
        } else {
            SessionState::AwaitingInput
        };
        self.opening = false;
        self.in_flight = false;
        self.silence();

        tracing::warn!(
            session = %self.session.id,
            error = %error,
            next = %target,
            "stage failed"
        );

        self.publish(SessionEvent::Failed {
            stage: error.stage(),
            message: error.to_string(),
        });
        self.transition(target);
        error
    }

    fn finish_capture(&mut self) -> Result<()> {
        let Some(handle) = self.open_capture.take() else {
            // Recording without a handle cannot happen through the public API
            self.transition(SessionState::AwaitingInput);
            return Err(Error::CaptureUnavailable("no open capture".to_string()));
        };

        match handle.finish() {
            Ok(audio) => {
                tracing::debug!(
                    session = %self.session.id,
                    audio_bytes = audio.len(),
                    "capture finished"
                );
                self.transition(SessionState::Transcribing);
                self.request_transcription(audio)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn credential(&self) -> Result<Credential> {
        self.session
            .credential
            .clone()
            .ok_or_else(|| Error::Config("session has no credential".to_string()))
    }

    fn request_transcription(&mut self, audio: AudioArtifact) -> Result<()> {
        let credential = self.credential()?;
        let transcriber = Arc::clone(&self.services.transcriber);
        self.spawn_stage(
            Stage::Transcribing,
            async move { transcriber.transcribe(&credential, &audio).await },
            Outcome::Transcribed,
        );
        Ok(())
    }

    fn request_reply(&mut self) -> Result<()> {
        let credential = self.credential()?;
        let generator = Arc::clone(&self.services.generator);
        let turns = self.session.turns.clone();
        self.spawn_stage(
            Stage::GeneratingReply,
            async move { generator.generate(&credential, &turns).await },
            Outcome::Generated,
        );
        Ok(())
    }

    fn request_speech(&mut self, text: String) -> Result<()> {
        let credential = self.credential()?;
        let synthesizer = Arc::clone(&self.services.synthesizer);
        self.spawn_stage(
            Stage::Speaking,
            async move { synthesizer.synthesize(&credential, &text).await },
            Outcome::Synthesized,
        );
        Ok(())
    }

    /// Cut off the current playback, if any
    fn silence(&mut self) {
        if let Some(signal) = self.playback.take() {
            signal.raise();
            tracing::debug!(session = %self.session.id, "playback stopped");
        }
    }

    fn request_playback(&mut self, audio: AudioArtifact) {
        self.silence();
        let stop = StopSignal::new();
        self.playback = Some(stop.clone());

        let player = Arc::clone(&self.services.player);
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        self.in_flight = true;

        tokio::spawn(async move {
            let result = player.play(audio, stop).await;
            if tx
                .send(Completion {
                    epoch,
                    outcome: Outcome::Played(result),
                })
                .is_err()
            {
                tracing::trace!("controller gone before playback finished");
            }
        });
    }

    /// Run one remote call on its own task, bounded by the stage timeout
    fn spawn_stage<T, F>(&mut self, stage: Stage, call: F, wrap: fn(Result<T>) -> Outcome)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        let timeout = self.settings.stage_timeout;
        self.in_flight = true;

        tracing::debug!(session = %self.session.id, %stage, "stage started");

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::service(
                    stage,
                    format!("no response within {timeout:?}"),
                )),
            };
            if tx
                .send(Completion {
                    epoch,
                    outcome: wrap(result),
                })
                .is_err()
            {
                tracing::trace!(%stage, "controller gone before stage completed");
            }
        });
    }
}
