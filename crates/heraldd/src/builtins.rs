//! Commands every service answers.

use herald_types::{Value, ValueMap, fields};

use crate::dispatch::{CommandContext, CommandError, CommandHandler};
use crate::registry::{CommandDeclaration, CommandRegistry, RegistryError};

/// Registers `help`, `about`, `version` and `status`.
///
/// # Errors
///
/// Returns [`RegistryError::Conflict`] when one of the names is taken.
pub fn register_builtins(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(
        CommandDeclaration::new("help", "List the available commands")
            .shortcut("h")
            .handler(Help),
    )?;
    registry.register(CommandDeclaration::new("about", "Describe this service").handler(About))?;
    registry.register(
        CommandDeclaration::new("version", "Report the service version").handler(Version),
    )?;
    registry.register(
        CommandDeclaration::new("status", "Report the current status").handler(Status),
    )?;
    Ok(())
}

struct Help;

impl CommandHandler for Help {
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError> {
        let table: ValueMap = context
            .registry
            .help_table()
            .into_iter()
            .map(|entry| (entry.label, Value::String(entry.description)))
            .collect();
        let mut output = ValueMap::new();
        output.insert(fields::HELP, table);
        Ok(output)
    }
}

struct About;

impl CommandHandler for About {
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError> {
        let mut output = ValueMap::new();
        output.insert(fields::ABOUT, context.service.about.as_str());
        Ok(output)
    }
}

struct Version;

impl CommandHandler for Version {
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError> {
        let mut output = ValueMap::new();
        output.insert(fields::VERSION, context.service.version.as_str());
        Ok(output)
    }
}

struct Status;

impl CommandHandler for Status {
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError> {
        let snapshot = context.status.snapshot();
        let mut output = ValueMap::new();
        output.insert(fields::STATUS_CODE, snapshot.code);
        output.insert(fields::STATUS_MESSAGE, snapshot.message);
        output.insert(fields::STATUS_DETAILS, snapshot.details);
        output.insert(fields::SERVER_TIME, crate::status::server_time());
        Ok(output)
    }
}
