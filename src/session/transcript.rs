//! Display transcript of a session

use std::fmt;

/// Who a transcript line is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The learner
    You,
    /// The tutor
    Teacher,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::You => f.write_str("You"),
            Self::Teacher => f.write_str("Teacher"),
        }
    }
}

/// One line of the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Ordered transcript lines
///
/// Cleared when a session starts, kept after it stops
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Append a line and return it
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        let entry = TranscriptEntry {
            speaker,
            text: text.into(),
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Remove every line
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_renders_one_line_per_entry() {
        let mut transcript = Transcript::default();
        transcript.push(Speaker::Teacher, "你好！你想喝什么？");
        transcript.push(Speaker::You, "我要一杯咖啡");

        assert_eq!(
            transcript.to_string(),
            "Teacher: 你好！你想喝什么？\nYou: 我要一杯咖啡"
        );
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::default();
        transcript.push(Speaker::You, "hi");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.to_string(), "");
    }
}
