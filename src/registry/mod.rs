//! Custom command registry
//!
//! Runtime dispatch table for user-defined commands. Each entry pairs the
//! stored definition with a handler closure; adding a command is an insert,
//! removing it is an erase by key. Lookups happen before built-in dispatch.
//!
//! Names are case-normalized and must be unique across both the built-in
//! command set and existing custom commands.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::models::CustomCommand;

// ============================================================================
// Errors
// ============================================================================

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Command already exists: {0}")]
    AlreadyExists(String),

    #[error("Command name is reserved by a built-in: {0}")]
    Reserved(String),

    #[error("Invalid command name: '{0}'")]
    InvalidName(String),

    #[error("Custom command not found: {0}")]
    NotFound(String),
}

// ============================================================================
// Handlers
// ============================================================================

/// Arguments passed to a custom command handler
#[derive(Debug, Clone, Copy)]
pub struct CommandCall<'a> {
    pub user: &'a str,
    pub guild: Option<&'a str>,
    pub args: &'a [String],
}

/// Handler invoked when a custom command runs
pub type CommandHandler = Arc<dyn Fn(&CustomCommand, &CommandCall<'_>) -> String + Send + Sync>;

fn template_handler() -> CommandHandler {
    Arc::new(|cmd: &CustomCommand, call: &CommandCall<'_>| {
        cmd.render(call.user, call.guild, call.args)
    })
}

struct Entry {
    definition: CustomCommand,
    handler: CommandHandler,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Outcome of merging a peer's command map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Names inserted from the peer
    pub inserted: Vec<String>,
    /// Entries skipped because a local command (or built-in) owns the name
    pub skipped: usize,
    /// Entries skipped because their name is unusable
    pub invalid: usize,
}

/// Command result from an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoked {
    pub name: String,
    pub response: String,
    pub usage_count: u64,
}

// ============================================================================
// Registry
// ============================================================================

/// Dispatch table of custom commands
#[derive(Debug, Default)]
pub struct CustomCommandRegistry {
    entries: BTreeMap<String, Entry>,
    reserved: HashSet<String>,
}

impl CustomCommandRegistry {
    /// Create a registry that refuses the given built-in names
    pub fn new<I, S>(builtins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: BTreeMap::new(),
            reserved: builtins
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Lower-case a name and check it is usable
    pub fn normalize_name(name: &str) -> Result<String, RegistryError> {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        Ok(normalized)
    }

    /// Check whether a name belongs to a built-in
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_lowercase())
    }

    /// Register a command with the default template handler
    pub fn add(&mut self, command: CustomCommand) -> Result<(), RegistryError> {
        self.add_with_handler(command, template_handler())
    }

    /// Register a command with a custom handler
    pub fn add_with_handler(
        &mut self,
        mut command: CustomCommand,
        handler: CommandHandler,
    ) -> Result<(), RegistryError> {
        let name = Self::normalize_name(&command.name)?;
        if self.reserved.contains(&name) {
            return Err(RegistryError::Reserved(name));
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }

        command.name = name.clone();
        tracing::info!(command = %name, "Registered custom command");
        self.entries.insert(
            name,
            Entry {
                definition: command,
                handler,
            },
        );
        Ok(())
    }

    /// Remove a command by name
    pub fn remove(&mut self, name: &str) -> Result<CustomCommand, RegistryError> {
        let key = name.trim().to_lowercase();
        self.entries
            .remove(&key)
            .map(|e| {
                tracing::info!(command = %key, "Removed custom command");
                e.definition
            })
            .ok_or(RegistryError::NotFound(key))
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&CustomCommand> {
        self.entries.get(&name.to_lowercase()).map(|e| &e.definition)
    }

    /// Check if a custom command exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Run a command: bump its usage counter and produce the response
    pub fn invoke(&mut self, name: &str, call: &CommandCall<'_>) -> Option<Invoked> {
        let entry = self.entries.get_mut(&name.to_lowercase())?;
        entry.definition.usage_count += 1;
        let response = (entry.handler)(&entry.definition, call);

        Some(Invoked {
            name: entry.definition.name.clone(),
            response,
            usage_count: entry.definition.usage_count,
        })
    }

    /// Definitions in name order
    pub fn list(&self) -> Vec<&CustomCommand> {
        self.entries.values().map(|e| &e.definition).collect()
    }

    /// Number of custom commands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every definition, keyed by name
    pub fn snapshot(&self) -> BTreeMap<String, CustomCommand> {
        self.entries
            .iter()
            .map(|(name, e)| (name.clone(), e.definition.clone()))
            .collect()
    }

    /// Merge a peer's commands. Existing local names always win.
    pub fn merge_from_peer(&mut self, incoming: BTreeMap<String, CustomCommand>) -> MergeReport {
        let mut report = MergeReport::default();

        for (key, mut command) in incoming {
            let name = match Self::normalize_name(&key) {
                Ok(n) => n,
                Err(_) => {
                    report.invalid += 1;
                    continue;
                }
            };

            if self.entries.contains_key(&name) || self.reserved.contains(&name) {
                report.skipped += 1;
                continue;
            }

            command.name = name.clone();
            self.entries.insert(
                name.clone(),
                Entry {
                    definition: command,
                    handler: template_handler(),
                },
            );
            report.inserted.push(name);
        }

        if !report.inserted.is_empty() {
            tracing::info!(
                inserted = ?report.inserted,
                skipped = report.skipped,
                "Merged custom commands from peer"
            );
        }

        report
    }
}
