use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::domain::traits::Bot;

/// Future returned by a command handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send>>;

/// Invocable command handler. Handlers reply through the request's bot
/// handle; the dispatcher only reports failures.
pub type CommandHandler = Arc<dyn Fn(CommandRequest) -> HandlerFuture + Send + Sync>;

/// One inbound command invocation, as seen by a handler.
#[derive(Clone)]
pub struct CommandRequest {
    pub chat_id: String,
    pub args: Vec<String>,
    pub bot: Arc<dyn Bot>,
}

impl CommandRequest {
    pub fn new(chat_id: impl Into<String>, args: Vec<String>, bot: Arc<dyn Bot>) -> Self {
        Self {
            chat_id: chat_id.into(),
            args,
            bot,
        }
    }

    /// The argument list re-joined as typed, for commands that take free text.
    pub fn arg_line(&self) -> String {
        self.args.join(" ")
    }

    /// Send a text reply to the originating chat.
    pub async fn reply(&self, text: impl Into<String>) -> Result<(), CommandError> {
        self.bot
            .send_message(&self.chat_id, &text.into())
            .await
            .map(|_| ())
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
    }
}

/// A named command exported by a handler unit: the name it is invoked by,
/// its help text, and the handler itself.
#[derive(Clone)]
pub struct CommandBinding {
    pub name: String,
    pub help: String,
    pub handler: CommandHandler,
}

impl CommandBinding {
    pub fn new<F, Fut>(name: impl Into<String>, help: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            help: help.into(),
            handler: Arc::new(move |request| Box::pin(handler(request))),
        }
    }
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}
