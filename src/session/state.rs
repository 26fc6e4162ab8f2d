//! Session lifecycle states and the user controls they imply

use std::fmt;

/// Label shown on the talk control while input is possible
pub const TALK_LABEL_HOLD: &str = "说话时按住 (Press and hold while speaking)";

/// Label shown on the talk control while recording
pub const TALK_LABEL_SPEAK_NOW: &str = "现在讲 (Speak now)";

/// Label shown on the talk control while the tutor has the floor
pub const TALK_LABEL_TEACHER_SPEAKING: &str = "老师正在讲话 (Teacher is speaking)...";

/// Lifecycle state of a practice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session running
    #[default]
    Idle,
    /// Microphone available, nothing playing
    AwaitingInput,
    /// Capturing learner speech
    Recording,
    /// Waiting on speech-to-text
    Transcribing,
    /// Waiting on the language model
    GeneratingReply,
    /// Synthesizing or playing the tutor's reply
    Speaking,
}

impl SessionState {
    /// Stage bound to this state, if it waits on a remote call
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Transcribing => Some(Stage::Transcribing),
            Self::GeneratingReply => Some(Stage::GeneratingReply),
            Self::Speaking => Some(Stage::Speaking),
            Self::Idle | Self::AwaitingInput | Self::Recording => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingInput => "awaiting input",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::GeneratingReply => "generating reply",
            Self::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Phase bound to exactly one remote service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Speech-to-text
    Transcribing,
    /// Text generation
    GeneratingReply,
    /// Text-to-speech
    Speaking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transcribing => "transcription",
            Self::GeneratingReply => "reply generation",
            Self::Speaking => "speech synthesis",
        };
        f.write_str(name)
    }
}

/// Start/stop toggle label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionToggle {
    /// Starts a session
    Go,
    /// Stops the running session
    Stop,
}

/// State of the hold-to-talk control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkControl {
    /// Not pressable
    Disabled,
    /// Pressable, will start a capture
    Ready,
    /// Held, capture in progress
    Live,
}

/// Enabled state and labels of every user control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    /// Start/stop toggle
    pub toggle: SessionToggle,
    /// Hold-to-talk control
    pub talk: TalkControl,
    /// Text shown on the hold-to-talk control
    pub talk_label: &'static str,
    /// Replay-last-reply control
    pub repeat_enabled: bool,
}

impl Affordances {
    /// Derive control state from the session state
    ///
    /// `has_reply` is whether an assistant turn exists to repeat
    #[must_use]
    pub const fn for_state(state: SessionState, has_reply: bool) -> Self {
        match state {
            SessionState::Idle => Self {
                toggle: SessionToggle::Go,
                talk: TalkControl::Disabled,
                talk_label: TALK_LABEL_HOLD,
                repeat_enabled: false,
            },
            SessionState::AwaitingInput => Self {
                toggle: SessionToggle::Stop,
                talk: TalkControl::Ready,
                talk_label: TALK_LABEL_HOLD,
                repeat_enabled: has_reply,
            },
            SessionState::Recording => Self {
                toggle: SessionToggle::Stop,
                talk: TalkControl::Live,
                talk_label: TALK_LABEL_SPEAK_NOW,
                repeat_enabled: false,
            },
            SessionState::Transcribing
            | SessionState::GeneratingReply
            | SessionState::Speaking => Self {
                toggle: SessionToggle::Stop,
                talk: TalkControl::Disabled,
                talk_label: TALK_LABEL_TEACHER_SPEAKING,
                repeat_enabled: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionState; 6] = [
        SessionState::Idle,
        SessionState::AwaitingInput,
        SessionState::Recording,
        SessionState::Transcribing,
        SessionState::GeneratingReply,
        SessionState::Speaking,
    ];

    #[test]
    fn test_affordance_table() {
        use SessionToggle::{Go, Stop};
        use TalkControl::{Disabled, Live, Ready};

        let rows = [
            (SessionState::Idle, Go, Disabled, TALK_LABEL_HOLD, false),
            (SessionState::AwaitingInput, Stop, Ready, TALK_LABEL_HOLD, true),
            (SessionState::Recording, Stop, Live, TALK_LABEL_SPEAK_NOW, false),
            (SessionState::Transcribing, Stop, Disabled, TALK_LABEL_TEACHER_SPEAKING, false),
            (SessionState::GeneratingReply, Stop, Disabled, TALK_LABEL_TEACHER_SPEAKING, false),
            (SessionState::Speaking, Stop, Disabled, TALK_LABEL_TEACHER_SPEAKING, false),
        ];
        assert_eq!(rows.len(), ALL.len());

        for (state, toggle, talk, label, repeat) in rows {
            let expected = Affordances {
                toggle,
                talk,
                talk_label: label,
                repeat_enabled: repeat,
            };
            assert_eq!(Affordances::for_state(state, true), expected, "{state}");
        }
    }

    #[test]
    fn test_idle_offers_only_go() {
        let a = Affordances::for_state(SessionState::Idle, true);
        assert_eq!(a.toggle, SessionToggle::Go);
        assert_eq!(a.talk, TalkControl::Disabled);
        assert!(!a.repeat_enabled);
    }

    #[test]
    fn test_repeat_requires_reply_and_awaiting_input() {
        assert!(!Affordances::for_state(SessionState::AwaitingInput, false).repeat_enabled);
        assert!(Affordances::for_state(SessionState::AwaitingInput, true).repeat_enabled);
        assert!(!Affordances::for_state(SessionState::Speaking, true).repeat_enabled);
    }

    #[test]
    fn test_recording_is_the_only_live_talk_state() {
        for state in ALL {
            let a = Affordances::for_state(state, true);
            assert_eq!(a.talk == TalkControl::Live, state == SessionState::Recording);
        }
    }

    #[test]
    fn test_repeat_never_offered_while_talk_is_live() {
        for state in ALL {
            for has_reply in [false, true] {
                let a = Affordances::for_state(state, has_reply);
                assert!(!(a.repeat_enabled && a.talk == TalkControl::Live));
                assert_eq!(a.talk == TalkControl::Ready, state == SessionState::AwaitingInput);
            }
        }
    }

    #[test]
    fn test_busy_states_show_teacher_label() {
        for state in [
            SessionState::Transcribing,
            SessionState::GeneratingReply,
            SessionState::Speaking,
        ] {
            let a = Affordances::for_state(state, false);
            assert_eq!(a.talk_label, TALK_LABEL_TEACHER_SPEAKING);
            assert!(state.stage().is_some());
        }
    }
}
