use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley::services::Synthesizer;
use parley::session::{SessionToggle, TalkControl};
use parley::voice::{AudioPlayback, Player, Recording, TextToSpeech};
use parley::{
    Config, Credential, CredentialStore, DevicePlayer, Microphone, SessionController,
    SessionEvent, SessionSettings, SessionState, StopSignal,
};

/// Parley - hold-to-talk conversation practice with an AI language tutor
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Scenario to practice (e.g. "ordering coffee"); prompted for if omitted
    #[arg(short, long, env = "PARLEY_SCENARIO")]
    scenario: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the API key used for all requests
    SetKey,
    /// Remove the stored API key
    ClearKey,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "你好！我是小王老师。")]
        text: String,
    },
}

/// What the input loop should do after a command
enum Flow {
    Continue,
    Exit,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = CredentialStore::default_location();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::SetKey => set_key(&store),
            Command::ClearKey => clear_key(&store),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&store, &text).await,
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let scenario = match cli.scenario {
        Some(s) => s,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Scenario to practice")
            .interact_text()?,
    };

    run_session(&config, &store, &scenario).await
}

/// Interactive session loop
///
/// Commands arrive one line at a time on stdin while service completions
/// arrive from the controller; both are handled on this task
#[allow(clippy::future_not_send)]
async fn run_session(config: &Config, store: &CredentialStore, scenario: &str) -> anyhow::Result<()> {
    let services = parley::openai_services(config);
    let (mut controller, mut events) =
        SessionController::new(Box::new(Microphone), services, SessionSettings::from(config));

    print_help();
    start(&mut controller, store, scenario);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(event) = events.recv() => render(&event),
            Some(completion) = controller.next_completion() => {
                // Failures are rendered from the event stream
                if let Err(e) = controller.handle_completion(completion) {
                    tracing::debug!(error = %e, "exchange abandoned");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if matches!(handle_input(&mut controller, store, scenario, line.trim()), Flow::Exit) {
                    break;
                }
            }
        }
    }

    controller.stop();
    Ok(())
}

fn handle_input(
    controller: &mut SessionController,
    store: &CredentialStore,
    scenario: &str,
    input: &str,
) -> Flow {
    let result = match input {
        "" => match controller.state() {
            SessionState::Recording => controller.end_capture(),
            _ => controller.begin_capture(),
        },
        "c" => controller.cancel_capture(),
        "r" => controller.repeat_last(),
        "q" => {
            controller.stop();
            Ok(())
        }
        "s" => {
            start(controller, store, scenario);
            Ok(())
        }
        "x" => return Flow::Exit,
        "?" | "h" => {
            print_help();
            Ok(())
        }
        other => {
            println!("unknown command: {other:?} (? for help)");
            Ok(())
        }
    };

    // Capture and stage failures are rendered from the event stream
    if let Err(e @ parley::Error::InvalidTransition { .. }) = result {
        println!("! {e}");
    }
    Flow::Continue
}

fn start(controller: &mut SessionController, store: &CredentialStore, scenario: &str) {
    let credential = match store.resolve() {
        Ok(Some(credential)) => credential,
        Ok(None) => Credential::new(""),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read stored credential");
            Credential::new("")
        }
    };

    if let Err(e) = controller.start(scenario, credential) {
        println!("! {e}");
        if matches!(e, parley::Error::Config(_)) {
            println!("  run `parley set-key` or set OPENAI_API_KEY");
        }
    }
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged { state, affordances } => {
            let talk = match affordances.talk {
                TalkControl::Ready => "[Enter]",
                TalkControl::Live => "[Enter ●]",
                TalkControl::Disabled => "[-----]",
            };
            let repeat = if affordances.repeat_enabled { " [r] repeat" } else { "" };
            println!(
                "  ({state}) {talk} {}{repeat}  [{}]",
                affordances.talk_label,
                match affordances.toggle {
                    SessionToggle::Go => "s: Go",
                    SessionToggle::Stop => "q: Stop",
                }
            );
        }
        SessionEvent::Transcript(entry) => println!("{entry}"),
        SessionEvent::Failed { message, .. } => println!("! {message}"),
    }
}

fn print_help() {
    println!("Enter  start / finish speaking");
    println!("c      cancel recording (sends what was captured)");
    println!("r      repeat the teacher's last reply");
    println!("q      stop the conversation");
    println!("s      start a new conversation");
    println!("x      exit");
    println!("---");
}

/// Store the API key
fn set_key(store: &CredentialStore) -> anyhow::Result<()> {
    let key = dialoguer::Password::new()
        .with_prompt("OpenAI API key")
        .interact()?;

    if key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    store.save(&key)?;
    println!("Saved API key to {}", store.path().display());
    Ok(())
}

/// Remove the stored API key
fn clear_key(store: &CredentialStore) -> anyhow::Result<()> {
    store.clear()?;
    println!("Removed stored API key");
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut recording = Recording::start()?;

    println!(
        "Sample rate: {} Hz, channels: {}",
        recording.sample_rate(),
        recording.channels()
    );
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Each drain covers the last second only
        let samples = recording.drain();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    recording.release();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check your input device and its permissions.");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = parley::voice::PLAYBACK_SAMPLE_RATE;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    tokio::task::spawn_blocking(move || playback.play_blocking(samples, &StopSignal::new()))
        .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output
async fn test_tts(store: &CredentialStore, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let credential = store
        .resolve()?
        .ok_or_else(|| anyhow::anyhow!("no API key stored; run `parley set-key`"))?;

    let tts = TextToSpeech::new(reqwest::Client::new(), config.api_base.clone(), &config.voice);

    println!("Synthesizing speech...");
    let audio = tts.synthesize(&credential, text).await?;
    println!("Got {} bytes of {}", audio.len(), audio.mime_type);

    println!("Playing audio...");
    DevicePlayer::new().play(audio, StopSignal::new()).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
