use std::collections::HashMap;

use crate::types::CommandContext;

/// Source of natural-language descriptions for stored commands.
pub trait Describer {
    /// Explain what `raw_command` does. `None` means no description could be
    /// produced and the command should be skipped.
    fn describe(
        &self,
        raw_command: &str,
        base_command: Option<&str>,
        context: &CommandContext,
    ) -> Option<String>;

    /// A normalised command line written back from a description.
    fn command_from_description(&self, description: &str) -> Option<String>;
}

/// Answers from fixed tables. Commands missing from the table fall back to
/// a template when one is set, otherwise they get no description.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriber {
    descriptions: HashMap<String, String>,
    commands: HashMap<String, String>,
    fallback: Option<String>,
}

impl StaticDescriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, raw: impl Into<String>, description: impl Into<String>) -> Self {
        self.descriptions.insert(raw.into(), description.into());
        self
    }

    pub fn with_command(mut self, description: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.insert(description.into(), command.into());
        self
    }

    /// `{cmd}` and `{base}` are substituted.
    pub fn with_fallback(mut self, template: impl Into<String>) -> Self {
        self.fallback = Some(template.into());
        self
    }
}

impl Describer for StaticDescriber {
    fn describe(
        &self,
        raw_command: &str,
        base_command: Option<&str>,
        _context: &CommandContext,
    ) -> Option<String> {
        if let Some(desc) = self.descriptions.get(raw_command) {
            return Some(desc.clone());
        }
        self.fallback.as_ref().map(|t| {
            t.replace("{cmd}", raw_command)
                .replace("{base}", base_command.unwrap_or(raw_command))
        })
    }

    fn command_from_description(&self, description: &str) -> Option<String> {
        self.commands.get(description).cloned()
    }
}
