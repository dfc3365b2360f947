//! File transfer operation

use std::path::Path;

use crate::application::errors::CommandError;
use crate::domain::entities::{CommandBinding, CommandRequest};

pub fn binding() -> CommandBinding {
    CommandBinding::new("uploadfile", "Send a file from the host filesystem", run)
}

async fn run(req: CommandRequest) -> Result<(), CommandError> {
    if req.args.is_empty() {
        return req.reply("Usage: /uploadfile /path/to/file").await;
    }

    // Paths may contain spaces; the whole argument line is the path.
    let path_text = req.arg_line();
    let path = Path::new(&path_text);
    if !path.is_file() {
        return req.reply(format!("File not found: {}", path_text)).await;
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    let data = tokio::fs::read(path).await?;

    tracing::info!("Uploading {} ({} bytes)", path_text, data.len());
    req.bot
        .send_document(&req.chat_id, &filename, data)
        .await
        .map(|_| ())
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ops::testing::RecordingBot;

    #[tokio::test]
    async fn sends_existing_file_as_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.txt");
        std::fs::write(&path, "payload").unwrap();

        let bot = Arc::new(RecordingBot::default());
        let req = CommandRequest::new(
            "42",
            vec![path.to_str().unwrap().to_string()],
            bot.clone(),
        );

        run(req).await.unwrap();

        let documents = bot.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].1, "report.txt");
        assert_eq!(documents[0].2, "payload".len());
    }

    #[tokio::test]
    async fn missing_file_reports_not_found() {
        let bot = Arc::new(RecordingBot::default());
        let req = CommandRequest::new(
            "42",
            vec!["/no/such/file.bin".to_string()],
            bot.clone(),
        );

        run(req).await.unwrap();

        let sent = bot.sent_texts();
        assert!(sent[0].starts_with("File not found:"));
        assert!(bot.documents.lock().unwrap().is_empty());
    }
}
