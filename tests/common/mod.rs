//! Shared test utilities: scripted collaborators for the session controller

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use parley::prompt::DEFAULT_SYSTEM_PROMPT;
use parley::voice::{
    AudioArtifact, CaptureHandle, MIME_MPEG, MIME_WAV, Player, SpeechCapture, StopSignal,
};
use parley::{
    Credential, Error, Generator, Result, SessionController, SessionEvent, SessionSettings,
    Services, Stage, Synthesizer, Transcriber, Turn,
};

/// How a fake collaborator answers
#[derive(Clone)]
pub enum Behavior {
    /// Answer immediately
    Reply(String),
    /// Fail with a service error
    Fail(String),
    /// Never answer
    Hang,
    /// Answer once the gate is opened
    Gated(Arc<Notify>, String),
}

/// Scripted stand-in for any remote stage
pub struct FakeStage {
    stage: Stage,
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
    turns: Mutex<Vec<Vec<Turn>>>,
}

impl FakeStage {
    pub fn new(stage: Stage, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            stage,
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            turns: Mutex::new(Vec::new()),
        })
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts passed to `synthesize`
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    /// Turn sequences passed to `generate`
    pub fn turns(&self) -> Vec<Vec<Turn>> {
        self.turns.lock().unwrap().clone()
    }

    async fn respond(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Reply(text) => Ok(text),
            Behavior::Fail(message) => Err(Error::service(self.stage, message)),
            Behavior::Hang => std::future::pending().await,
            Behavior::Gated(gate, text) => {
                gate.notified().await;
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl Transcriber for FakeStage {
    async fn transcribe(&self, _credential: &Credential, _audio: &AudioArtifact) -> Result<String> {
        self.respond().await
    }
}

#[async_trait]
impl Generator for FakeStage {
    async fn generate(&self, _credential: &Credential, turns: &[Turn]) -> Result<String> {
        self.turns.lock().unwrap().push(turns.to_vec());
        self.respond().await
    }
}

#[async_trait]
impl Synthesizer for FakeStage {
    async fn synthesize(&self, _credential: &Credential, text: &str) -> Result<AudioArtifact> {
        self.texts.lock().unwrap().push(text.to_string());
        let reply = self.respond().await?;
        Ok(AudioArtifact::new(reply.into_bytes(), MIME_MPEG))
    }
}

/// Player that finishes instantly, or plays until stopped when held
#[derive(Default)]
pub struct FakePlayer {
    plays: AtomicUsize,
    fail: Mutex<bool>,
    hold: Mutex<bool>,
    /// Stop signals of plays still running, by play index
    running: Mutex<Vec<Option<StopSignal>>>,
    signals: Mutex<Vec<StopSignal>>,
    overlaps: AtomicUsize,
}

impl FakePlayer {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Keep playing until the stop signal is raised
    pub fn hold(&self) {
        *self.hold.lock().unwrap() = true;
    }

    /// Plays still running
    pub fn live(&self) -> usize {
        self.running.lock().unwrap().iter().flatten().count()
    }

    /// Plays that started while an earlier one was still audible
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Signal handed to the `n`th play
    pub fn signal(&self, n: usize) -> Option<StopSignal> {
        self.signals.lock().unwrap().get(n).cloned()
    }
}

#[async_trait]
impl Player for FakePlayer {
    async fn play(&self, _audio: AudioArtifact, stop: StopSignal) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut *self.fail.lock().unwrap()) {
            return Err(Error::Audio("output device vanished".to_string()));
        }

        let index = {
            let mut running = self.running.lock().unwrap();
            if running.iter().flatten().any(|s| !s.is_raised()) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            running.push(Some(stop.clone()));
            self.signals.lock().unwrap().push(stop.clone());
            running.len() - 1
        };

        let held = *self.hold.lock().unwrap();
        while held && !stop.is_raised() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        self.running.lock().unwrap()[index] = None;
        Ok(())
    }
}

/// Counts device acquisitions and releases
#[derive(Clone, Default)]
pub struct MicStats {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl MicStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Captures currently holding the device
    pub fn open_now(&self) -> usize {
        self.opened() - self.released()
    }
}

/// Microphone that records a fixed clip, or refuses like a denied permission
pub struct FakeMicrophone {
    stats: MicStats,
    deny: bool,
}

impl SpeechCapture for FakeMicrophone {
    fn open(&self) -> Result<Box<dyn CaptureHandle>> {
        if self.deny {
            return Err(Error::CaptureUnavailable("permission denied".to_string()));
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeCapture {
            released: Arc::clone(&self.stats.released),
        }))
    }
}

struct FakeCapture {
    released: Arc<AtomicUsize>,
}

impl CaptureHandle for FakeCapture {
    fn finish(self: Box<Self>) -> Result<AudioArtifact> {
        Ok(AudioArtifact::new(b"RIFF....WAVE".to_vec(), MIME_WAV))
    }
}

impl Drop for FakeCapture {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A controller wired to fakes
pub struct Harness {
    pub controller: SessionController,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub mic: MicStats,
    pub transcriber: Arc<FakeStage>,
    pub generator: Arc<FakeStage>,
    pub synthesizer: Arc<FakeStage>,
    pub player: Arc<FakePlayer>,
}

impl Harness {
    /// Drain every event published so far
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn harness() -> Harness {
    build(false, Duration::from_secs(5))
}

pub fn harness_with_denied_mic() -> Harness {
    build(true, Duration::from_secs(5))
}

pub fn harness_with_timeout(stage_timeout: Duration) -> Harness {
    build(false, stage_timeout)
}

fn build(deny: bool, stage_timeout: Duration) -> Harness {
    let mic = MicStats::default();
    let transcriber = FakeStage::new(Stage::Transcribing, Behavior::Reply("我要一杯咖啡".into()));
    let generator = FakeStage::new(Stage::GeneratingReply, Behavior::Reply("你好！你想喝什么？".into()));
    let synthesizer = FakeStage::new(Stage::Speaking, Behavior::Reply("mp3".into()));
    let player = Arc::new(FakePlayer::default());

    let services = Services {
        transcriber: transcriber.clone(),
        generator: generator.clone(),
        synthesizer: synthesizer.clone(),
        player: player.clone(),
    };
    let settings = SessionSettings {
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        stage_timeout,
    };
    let microphone = FakeMicrophone {
        stats: mic.clone(),
        deny,
    };

    let (controller, events) = SessionController::new(Box::new(microphone), services, settings);

    Harness {
        controller,
        events,
        mic,
        transcriber,
        generator,
        synthesizer,
        player,
    }
}

pub fn key() -> Credential {
    Credential::new("key123")
}
