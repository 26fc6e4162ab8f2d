//! Conversation turns

use serde::Serialize;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Tutor instructions
    System,
    /// The learner
    User,
    /// The tutor
    Assistant,
}

/// One utterance in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    /// Who said it
    pub role: Role,
    /// What was said
    pub content: String,
}

impl Turn {
    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_as_chat_message() {
        let json = serde_json::to_value(Turn::assistant("你好")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "你好"}));
    }
}
