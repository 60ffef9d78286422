// Command Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// A program plus its arguments, ready to be launched
///
/// Invariant: the program is never empty. Built once by a CommandSource and
/// consumed by the ProcessLauncher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    program: String,
    args: Vec<String>,
}

impl Command {
    /// Create a command from an explicit program and argument list
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(DomainError::InvalidCommand(
                "Program must not be empty".to_string(),
            ));
        }

        Ok(Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Parse a command line by splitting on whitespace
    ///
    /// The first token is the executable, the rest are its arguments.
    /// No shell quoting is interpreted.
    ///
    /// # Example
    /// ```text
    /// let cmd = Command::parse("upscayl-bin -i in.png -o out.png")?;
    /// assert_eq!(cmd.program(), "upscayl-bin");
    /// ```
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens
            .next()
            .ok_or_else(|| DomainError::InvalidCommand("Command line is empty".to_string()))?;
        Self::new(program, tokens)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_whitespace() {
        let cmd = Command::parse("  upscayl-bin -i  in.png\t-s 4 ").unwrap();

        assert_eq!(cmd.program(), "upscayl-bin");
        assert_eq!(cmd.args(), &["-i", "in.png", "-s", "4"]);
    }

    #[test]
    fn test_parse_program_only() {
        let cmd = Command::parse("true").unwrap();

        assert_eq!(cmd.program(), "true");
        assert!(cmd.args().is_empty());
    }

    #[test]
    fn test_parse_empty_line() {
        let result = Command::parse("   ");
        assert!(matches!(result, Err(DomainError::InvalidCommand(_))));
    }

    #[test]
    fn test_new_rejects_blank_program() {
        let result = Command::new(" ", ["-v"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let cmd = Command::new("sh", ["-c", "exit 3"]).unwrap();
        assert_eq!(cmd.to_string(), "sh -c exit 3");
    }
}
