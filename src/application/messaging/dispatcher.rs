//! Command dispatcher - routes inbound messages to bound handlers

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::{CommandBinding, CommandRequest, Content, Message};
use crate::domain::traits::Bot;
use crate::infrastructure::units::CommandRegistry;

const GREETING: &str = "Hello! I'm opsbot.\n\n\
    I run commands on the machine I live on and send the results back here.\n\n\
    Use /help to see the list of available commands.";

/// Routes each inbound message: allow/deny gate first, then the reserved
/// commands (start, help, reload), then built-in operations, then the unit
/// registry. Unknown commands are a user error, not a fault.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    builtins: HashMap<String, CommandBinding>,
    /// `None` disables the gate entirely; `Some` allows only the listed ids.
    allowed_users: Option<Vec<String>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, allowed_users: Option<Vec<String>>) -> Self {
        let mut builtins = HashMap::new();
        for binding in crate::ops::bindings() {
            builtins.insert(binding.name.clone(), binding);
        }

        Self {
            registry,
            builtins,
            allowed_users,
        }
    }

    fn is_allowed(&self, user_id: Option<&str>) -> bool {
        match (&self.allowed_users, user_id) {
            (None, _) => true,
            (Some(users), Some(id)) => users.iter().any(|u| u == id),
            (Some(_), None) => false,
        }
    }

    /// Registry help plus one line per built-in operation.
    pub fn help(&self) -> String {
        let mut text = self.registry.help();
        let mut names: Vec<&String> = self.builtins.keys().collect();
        names.sort();
        for name in names {
            let binding = &self.builtins[name];
            text.push_str(&format!(
                "\n/{} - {}",
                name,
                binding.help.lines().next().unwrap_or("")
            ));
        }
        text
    }

    /// `(name, first help line)` pairs for transport-side command menus.
    pub fn menu(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("start".to_string(), "Start the bot".to_string()),
            ("help".to_string(), "Show the command list".to_string()),
            ("reload".to_string(), "Reload handler units".to_string()),
        ];

        let mut names: Vec<&String> = self.builtins.keys().collect();
        names.sort();
        for name in names {
            let binding = &self.builtins[name];
            entries.push((
                name.clone(),
                binding.help.lines().next().unwrap_or("").to_string(),
            ));
        }

        for binding in self.registry.handler_bindings() {
            if entries.iter().any(|(name, _)| *name == binding.name) {
                continue;
            }
            entries.push((binding.name.clone(), binding.help.clone()));
        }
        entries
    }

    pub async fn dispatch(&self, message: &Message, bot: Arc<dyn Bot>) -> Result<(), BotError> {
        let sender = message.sender.as_ref();
        if !self.is_allowed(sender.map(|u| u.id.as_str())) {
            if let Some(user) = sender {
                tracing::warn!("Rejected message from unauthorized user {}", user);
            } else {
                tracing::warn!("Rejected message without sender identity");
            }
            bot.send_message(&message.chat_id, "Unauthorized.").await?;
            return Ok(());
        }

        let Content::Command { name, args } = &message.content else {
            bot.send_message(&message.chat_id, "Send a command, or /help for the list.")
                .await?;
            return Ok(());
        };

        tracing::debug!("Dispatching /{} for chat {}", name, message.chat_id);

        let reserved = match name.as_str() {
            "start" => Some(GREETING.to_string()),
            "help" => Some(self.help()),
            "reload" => Some(match self.registry.reload() {
                Ok(count) => format!("Reloaded. {} commands available.", count),
                Err(e) => {
                    tracing::error!("Reload failed: {}", e);
                    "Reload failed; no unit commands are currently loaded. Check the log."
                        .to_string()
                }
            }),
            _ => None,
        };
        if let Some(text) = reserved {
            bot.send_message(&message.chat_id, &text).await?;
            return Ok(());
        }

        // Built-in operations cannot be shadowed by units.
        let handler = self
            .builtins
            .get(name.as_str())
            .map(|b| b.handler.clone())
            .or_else(|| self.registry.lookup(name));
        let Some(handler) = handler else {
            bot.send_message(
                &message.chat_id,
                &format!("Unknown command: /{}. Try /help.", name),
            )
            .await?;
            return Ok(());
        };

        let request = CommandRequest::new(&message.chat_id, args.clone(), bot.clone());
        if let Err(e) = handler(request).await {
            tracing::error!("Error in /{} command: {}", name, e);
            bot.send_message(&message.chat_id, &format!("/{} failed: {}", name, e))
                .await?;
        }
        Ok(())
    }
}
