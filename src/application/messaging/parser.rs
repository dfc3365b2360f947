//! Message parser - Parses raw chat text into structured messages

use crate::domain::entities::{Content, Message, User};

/// Parses incoming text into either a command or a plain text message
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    /// Parse a raw text message
    pub fn parse(
        &self,
        chat_id: impl Into<String>,
        text: impl Into<String>,
        sender: Option<User>,
    ) -> Message {
        let text = text.into();
        let chat_id = chat_id.into();

        if text.starts_with('/') || text.starts_with(&self.command_prefix) {
            return self.parse_command(chat_id, text, sender);
        }

        Message::from_text(chat_id, text).with_sender_opt(sender)
    }

    fn parse_command(&self, chat_id: String, text: String, sender: Option<User>) -> Message {
        let cmd_text = if let Some(stripped) = text.strip_prefix('/') {
            stripped
        } else {
            text.trim_start_matches(&self.command_prefix)
        };

        let mut parts = cmd_text.split_whitespace();
        let name = parts.next().unwrap_or("").to_string();
        // Telegram sends group commands as /name@botname; the suffix is noise.
        let name = name
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        let args: Vec<String> = parts.map(|s| s.to_string()).collect();

        Message::from_command(chat_id, name, args).with_sender_opt(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_args() {
        let parser = MessageParser::new("/");
        let msg = parser.parse("42", "/cmd ls -la", None);
        assert_eq!(
            msg.content,
            Content::Command {
                name: "cmd".to_string(),
                args: vec!["ls".to_string(), "-la".to_string()],
            }
        );
    }

    #[test]
    fn parses_plain_text() {
        let parser = MessageParser::new("/");
        let msg = parser.parse("42", "hello there", None);
        assert_eq!(msg.content, Content::Text("hello there".to_string()));
    }

    #[test]
    fn strips_bot_mention_suffix() {
        let parser = MessageParser::new("/");
        let msg = parser.parse("42", "/Help@opsbot", None);
        assert_eq!(
            msg.content,
            Content::Command {
                name: "help".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn custom_prefix_is_recognized() {
        let parser = MessageParser::new("!");
        let msg = parser.parse("42", "!reload", None);
        assert!(msg.content.is_command());
    }
}
