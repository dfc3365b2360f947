//! Screen capture operation
//!
//! Shells out to the platform capture tool rather than linking a capture
//! library; the host needs a running display session either way.

use std::path::Path;

use tokio::process::Command;

use crate::application::errors::CommandError;
use crate::domain::entities::{CommandBinding, CommandRequest};

pub fn binding() -> CommandBinding {
    CommandBinding::new("screenshot", "Capture the screen and send it", run)
}

async fn run(req: CommandRequest) -> Result<(), CommandError> {
    let filename = format!(
        "screenshot_{}.png",
        chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let path = std::env::temp_dir().join(&filename);

    let captured = capture(&path).await?;
    if !captured {
        return req
            .reply("Screen capture failed. Is a display session available?")
            .await;
    }

    let data = tokio::fs::read(&path).await?;
    let _ = tokio::fs::remove_file(&path).await;

    tracing::info!("Captured screen ({} bytes)", data.len());
    req.bot
        .send_document(&req.chat_id, &filename, data)
        .await
        .map(|_| ())
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
}

#[cfg(target_os = "linux")]
async fn capture(path: &Path) -> Result<bool, CommandError> {
    let status = Command::new("scrot")
        .arg("--overwrite")
        .arg(path)
        .status()
        .await?;
    Ok(status.success() && path.is_file())
}

#[cfg(target_os = "macos")]
async fn capture(path: &Path) -> Result<bool, CommandError> {
    let status = Command::new("screencapture")
        .arg("-x")
        .arg(path)
        .status()
        .await?;
    Ok(status.success() && path.is_file())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn capture(_path: &Path) -> Result<bool, CommandError> {
    Err(CommandError::ExecutionFailed(
        "screen capture is not supported on this platform".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_filename_is_timestamped_png() {
        let filename = format!(
            "screenshot_{}.png",
            chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S")
        );
        assert!(filename.starts_with("screenshot_"));
        assert!(filename.ends_with(".png"));
    }
}
