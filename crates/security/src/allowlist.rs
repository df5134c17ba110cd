//! Command allowlisting for the test runner.

/// Characters that would let a command line chain or redirect past the
/// allowlisted base command.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '>', '<', '\n', '\r', '(', ')'];

/// Base commands (first word of the command line) that may be executed.
///
/// An empty allowlist permits nothing. Command lines containing shell
/// metacharacters are refused whatever their base command.
#[derive(Debug, Clone, Default)]
pub struct CommandAllowlist {
    allowed: Vec<String>,
}

impl CommandAllowlist {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// The first whitespace-separated word of a command line.
    pub fn base_command(command: &str) -> &str {
        command.split_whitespace().next().unwrap_or("")
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        if command.contains(SHELL_METACHARACTERS) {
            return false;
        }
        let base = Self::base_command(command);
        !base.is_empty() && self.allowed.iter().any(|a| a == base)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}
