//! Command catalogue.
//!
//! Command names and shortcuts are sanitised on the way in and every command
//! token is sanitised again on lookup, so `"Show Status"`, `"show  status"`
//! and `"show-status"` all refer to the same entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use herald_types::ErrorKind;
use thiserror::Error;

use crate::dispatch::CommandHandler;

/// Canonical form of a command name or token.
///
/// Lower-cases the text, trims it and joins internal whitespace runs with a
/// single hyphen. Applying it twice yields the same result.
pub fn sanitize(input: &str) -> String {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Errors raised while registering commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is empty after sanitisation.
    #[error("command name '{name}' is empty after sanitisation")]
    InvalidName { name: String },

    /// The shortcut does not occur in the command name.
    #[error("shortcut '{shortcut}' does not occur in command name '{name}'")]
    InvalidShortcut { name: String, shortcut: String },

    /// A command with the same name is already registered.
    #[error("command '{name}' is already registered")]
    Conflict { name: String },

    /// Another command already uses the shortcut.
    #[error("shortcut '{shortcut}' is already used by command '{existing}'")]
    ShortcutConflict { shortcut: String, existing: String },
}

impl RegistryError {
    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } | Self::InvalidShortcut { .. } => ErrorKind::Validation,
            Self::Conflict { .. } | Self::ShortcutConflict { .. } => ErrorKind::Conflict,
        }
    }
}

/// Registered command metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    name: String,
    shortcut: Option<String>,
    description: String,
    implemented: bool,
}

impl ServiceCommand {
    /// Sanitised command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sanitised shortcut, if any.
    pub fn shortcut(&self) -> Option<&str> {
        self.shortcut.as_deref()
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether invoking the command does anything.
    pub fn implemented(&self) -> bool {
        self.implemented
    }

    /// Name with the first occurrence of the shortcut parenthesised, e.g.
    /// `(h)elp`.
    pub fn help_label(&self) -> String {
        let Some(shortcut) = self.shortcut.as_deref() else {
            return self.name.clone();
        };
        match self.name.split_once(shortcut) {
            Some((head, tail)) => format!("{head}({shortcut}){tail}"),
            None => self.name.clone(),
        }
    }

    /// Description, flagged when the command is not implemented.
    pub fn help_description(&self) -> String {
        if self.implemented {
            self.description.clone()
        } else {
            format!("{} (not implemented)", self.description)
        }
    }
}

/// Request to register a command.
pub struct CommandDeclaration {
    name: String,
    description: String,
    shortcut: Option<String>,
    implemented: bool,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandDeclaration {
    /// Declares an implemented command without a shortcut or handler.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            shortcut: None,
            implemented: true,
            handler: None,
        }
    }

    /// Sets the shortcut; it must occur in the sanitised name.
    #[must_use]
    pub fn shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    /// Marks the command as declared but not implemented.
    #[must_use]
    pub fn not_implemented(mut self) -> Self {
        self.implemented = false;
        self
    }

    /// Attaches the handler invoked on dispatch.
    #[must_use]
    pub fn handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Attaches a shared handler.
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// Entry stored in the registry.
#[derive(Clone)]
pub struct RegisteredCommand {
    command: ServiceCommand,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl RegisteredCommand {
    /// Command metadata.
    pub fn command(&self) -> &ServiceCommand {
        &self.command
    }

    /// Handler, when one was attached.
    pub fn handler(&self) -> Option<&Arc<dyn CommandHandler>> {
        self.handler.as_ref()
    }
}

/// One row of the help table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    /// Label with the shortcut marked.
    pub label: String,
    /// Description, flagged when unimplemented.
    pub description: String,
}

/// Commands keyed by sanitised name.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the name is empty, the shortcut is not
    /// part of the name, or the name or shortcut is already taken.
    pub fn register(
        &mut self,
        declaration: CommandDeclaration,
    ) -> Result<&ServiceCommand, RegistryError> {
        let name = sanitize(&declaration.name);
        if name.is_empty() {
            return Err(RegistryError::InvalidName {
                name: declaration.name,
            });
        }
        let shortcut = declaration
            .shortcut
            .as_deref()
            .map(sanitize)
            .filter(|shortcut| !shortcut.is_empty());
        if let Some(shortcut) = shortcut.as_deref() {
            if !name.contains(shortcut) {
                return Err(RegistryError::InvalidShortcut {
                    name,
                    shortcut: shortcut.to_owned(),
                });
            }
            if let Some(existing) = self.owner_of_shortcut(shortcut) {
                return Err(RegistryError::ShortcutConflict {
                    shortcut: shortcut.to_owned(),
                    existing: existing.to_owned(),
                });
            }
        }
        if self.commands.contains_key(&name) {
            return Err(RegistryError::Conflict { name });
        }

        let entry = RegisteredCommand {
            command: ServiceCommand {
                name: name.clone(),
                shortcut,
                description: declaration.description.trim().to_owned(),
                implemented: declaration.implemented,
            },
            handler: declaration.handler,
        };
        Ok(&self.commands.entry(name).or_insert(entry).command)
    }

    /// Moves every command of `other` into this registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on the first name or shortcut clash; commands
    /// merged before the clash stay registered.
    pub fn merge(&mut self, other: CommandRegistry) -> Result<(), RegistryError> {
        for RegisteredCommand { command, handler } in other.commands.into_values() {
            self.register(CommandDeclaration {
                name: command.name,
                description: command.description,
                shortcut: command.shortcut,
                implemented: command.implemented,
                handler,
            })?;
        }
        Ok(())
    }

    /// Looks a token up by name, then by shortcut.
    pub fn resolve(&self, token: &str) -> Option<&RegisteredCommand> {
        let token = sanitize(token);
        if token.is_empty() {
            return None;
        }
        self.commands.get(&token).or_else(|| {
            self.commands
                .values()
                .find(|entry| entry.command.shortcut() == Some(token.as_str()))
        })
    }

    /// Help rows ordered by command name.
    pub fn help_table(&self) -> Vec<HelpEntry> {
        self.commands
            .values()
            .map(|entry| HelpEntry {
                label: entry.command.help_label(),
                description: entry.command.help_description(),
            })
            .collect()
    }

    /// Registered commands ordered by name.
    pub fn commands(&self) -> impl Iterator<Item = &ServiceCommand> {
        self.commands.values().map(RegisteredCommand::command)
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn owner_of_shortcut(&self, shortcut: &str) -> Option<&str> {
        self.commands()
            .find(|command| command.shortcut() == Some(shortcut))
            .map(ServiceCommand::name)
    }
}
