//! Stock remote operations bundled with the bot
//!
//! These ship compiled in and are installed by the dispatcher at startup;
//! the units directory is for commands loaded at runtime.

pub mod files;
pub mod screen;
pub mod shell;

use crate::domain::entities::CommandBinding;

/// Every built-in operation binding.
pub fn bindings() -> Vec<CommandBinding> {
    vec![shell::binding(), files::binding(), screen::binding()]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::application::errors::BotError;
    use crate::domain::traits::{Bot, BotInfo};

    /// Bot double that records everything sent through it.
    #[derive(Default)]
    pub struct RecordingBot {
        pub messages: Mutex<Vec<(String, String)>>,
        pub documents: Mutex<Vec<(String, String, usize)>>,
    }

    impl RecordingBot {
        pub fn sent_texts(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Bot for RecordingBot {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
            self.messages
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok("recorded".to_string())
        }

        async fn send_document(
            &self,
            chat_id: &str,
            filename: &str,
            data: Vec<u8>,
        ) -> Result<String, BotError> {
            self.documents.lock().unwrap().push((
                chat_id.to_string(),
                filename.to_string(),
                data.len(),
            ));
            Ok("recorded".to_string())
        }

        fn bot_info(&self) -> BotInfo {
            BotInfo {
                id: "test".to_string(),
                name: "test-bot".to_string(),
                username: "test_bot".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_names_are_unique() {
        let mut names: Vec<String> = bindings().into_iter().map(|b| b.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
    }
}
