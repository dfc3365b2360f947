//! Shell execution operation

use tokio::process::Command;

use crate::application::errors::CommandError;
use crate::domain::entities::{CommandBinding, CommandRequest};

#[cfg(unix)]
const SHELL: (&str, &str) = ("sh", "-c");
#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Telegram caps messages at 4096 chars; leave room for the code fence.
const MAX_OUTPUT: usize = 3900;

pub fn binding() -> CommandBinding {
    CommandBinding::new("cmd", "Execute a system command", run)
}

async fn run(req: CommandRequest) -> Result<(), CommandError> {
    if req.args.is_empty() {
        return req.reply("Usage: /cmd [command]").await;
    }

    let command = req.arg_line();
    tracing::info!("Running shell command: {}", command);

    let output = Command::new(SHELL.0)
        .arg(SHELL.1)
        .arg(&command)
        .output()
        .await?;

    let bytes = if output.status.success() {
        &output.stdout
    } else {
        &output.stderr
    };
    let mut text = String::from_utf8_lossy(bytes).trim_end().to_string();
    if text.is_empty() {
        text = format!("(no output, exit {})", output.status.code().unwrap_or(-1));
    }
    if text.len() > MAX_OUTPUT {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < MAX_OUTPUT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        text.truncate(cut);
        text.push_str("\n[truncated]");
    }

    req.reply(format!("```\n{}\n```", text)).await
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ops::testing::RecordingBot;

    #[tokio::test]
    async fn runs_command_and_replies_with_output() {
        let bot = Arc::new(RecordingBot::default());
        let req = CommandRequest::new(
            "42",
            vec!["echo".to_string(), "hello".to_string()],
            bot.clone(),
        );

        run(req).await.unwrap();

        let sent = bot.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("hello"));
        assert!(sent[0].starts_with("```"));
    }

    #[tokio::test]
    async fn missing_arguments_yield_usage() {
        let bot = Arc::new(RecordingBot::default());
        let req = CommandRequest::new("42", vec![], bot.clone());

        run(req).await.unwrap();

        assert_eq!(bot.sent_texts(), vec!["Usage: /cmd [command]".to_string()]);
    }

    #[tokio::test]
    async fn failed_command_reports_stderr() {
        let bot = Arc::new(RecordingBot::default());
        let req = CommandRequest::new(
            "42",
            vec!["ls".to_string(), "/definitely/not/here".to_string()],
            bot.clone(),
        );

        run(req).await.unwrap();

        let sent = bot.sent_texts();
        assert!(sent[0].to_lowercase().contains("no such file"));
    }
}
