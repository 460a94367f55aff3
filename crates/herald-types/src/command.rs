//! Command and alert envelopes.
//!
//! A command envelope stores its command token under
//! [`fields::COMMAND`] and an optional argument list under
//! [`fields::ARGUMENTS`]. A missing argument list is equivalent to an empty
//! one.

use serde::de::DeserializeOwned;

use crate::envelope::Envelope;
use crate::errors::EnvelopeError;
use crate::fields;
use crate::kind::EnvelopeType;
use crate::value::Value;

impl Envelope {
    /// Builds a command envelope from a command token and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingCommand`] when `command` is blank.
    pub fn command<I, V>(command: &str, arguments: I) -> Result<Self, EnvelopeError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let command = command.trim();
        if command.is_empty() {
            return Err(EnvelopeError::missing_command("command token is empty"));
        }
        let arguments: Vec<Value> = arguments.into_iter().map(Into::into).collect();
        let mut envelope = Self::new(EnvelopeType::Command);
        envelope.insert(fields::COMMAND, command);
        if !arguments.is_empty() {
            envelope.insert(fields::ARGUMENTS, Value::List(arguments));
        }
        Ok(envelope)
    }

    /// Builds a command envelope from free text such as `"echo a b"`.
    ///
    /// The first word becomes the command and the remaining words become
    /// string arguments. Every word is lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingCommand`] when the text has no words.
    pub fn command_from_text(text: &str) -> Result<Self, EnvelopeError> {
        let mut words = text.split_whitespace().map(str::to_lowercase);
        let Some(command) = words.next() else {
            return Err(EnvelopeError::missing_command("command text is empty"));
        };
        Self::command(&command, words)
    }

    /// Builds an alert envelope whose sub type carries the alert code.
    #[must_use]
    pub fn alert(code: i32, target: Option<&str>) -> Self {
        let mut envelope = Self::request(EnvelopeType::Alert, code);
        if let Some(target) = target {
            envelope.set_target(target);
        }
        envelope
    }

    /// Extracts the command token.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotACommand`] for other envelope types and
    /// [`EnvelopeError::MissingCommand`] when the token is absent, not a
    /// string, or blank.
    pub fn command_name(&self) -> Result<&str, EnvelopeError> {
        self.ensure_command()?;
        let value = self
            .value(fields::COMMAND)
            .ok_or_else(|| EnvelopeError::missing_command("command field is absent"))?;
        let command = value.as_str().ok_or_else(|| {
            EnvelopeError::missing_command(format!(
                "command field is a {}, expected a string",
                value.type_name()
            ))
        })?;
        if command.trim().is_empty() {
            return Err(EnvelopeError::missing_command("command token is empty"));
        }
        Ok(command)
    }

    /// Extracts the argument list; absent arguments yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotACommand`] for other envelope types and
    /// [`EnvelopeError::InvalidArguments`] when the field is not a list.
    pub fn command_arguments(&self) -> Result<Vec<Value>, EnvelopeError> {
        self.ensure_command()?;
        match self.value(fields::ARGUMENTS) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(other) => Err(EnvelopeError::invalid_arguments(format!(
                "arguments field is a {}, expected a list",
                other.type_name()
            ))),
        }
    }

    fn ensure_command(&self) -> Result<(), EnvelopeError> {
        if self.kind() == EnvelopeType::Command {
            Ok(())
        } else {
            Err(EnvelopeError::NotACommand {
                actual: self.kind(),
            })
        }
    }
}

/// Converts the argument at `index` into `T`.
///
/// Returns `Ok(None)` when there is no argument at `index`.
///
/// # Errors
///
/// Returns [`EnvelopeError::InvalidArguments`] when the argument cannot be
/// converted.
pub fn argument<T: DeserializeOwned>(
    arguments: &[Value],
    index: usize,
) -> Result<Option<T>, EnvelopeError> {
    let Some(value) = arguments.get(index) else {
        return Ok(None);
    };
    value.decode().map(Some).map_err(|error| {
        EnvelopeError::invalid_arguments(format!("argument {index} has the wrong type: {error}"))
    })
}

/// Converts the argument at `index` into `T`, falling back to `default`.
///
/// # Errors
///
/// Returns [`EnvelopeError::InvalidArguments`] when an argument is present
/// but cannot be converted.
pub fn argument_or<T: DeserializeOwned>(
    arguments: &[Value],
    index: usize,
    default: T,
) -> Result<T, EnvelopeError> {
    Ok(argument(arguments, index)?.unwrap_or(default))
}
