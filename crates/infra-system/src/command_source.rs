// Command source implementations

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use gpuwatch_core::domain::{Command, DomainError};
use gpuwatch_core::port::CommandSource;
use gpuwatch_core::{AppError, Result};

/// Reads the command line from `<dir>/<number>-tmp.txt`
pub struct NumberedFileSource {
    dir: PathBuf,
    number: u32,
}

impl NumberedFileSource {
    pub fn new(dir: impl Into<PathBuf>, number: u32) -> Self {
        Self {
            dir: dir.into(),
            number,
        }
    }

    /// Path of the command file for this number
    pub fn path(&self) -> PathBuf {
        file_path(&self.dir, self.number)
    }
}

fn file_path(dir: &Path, number: u32) -> PathBuf {
    dir.join(format!("{}-tmp.txt", number))
}

/// Pick the command line from the file contents
///
/// The first non-blank line wins. Further non-blank lines are ignored.
fn select_command_line(contents: &str) -> Option<(&str, usize)> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty());
    let first = lines.next()?;
    Some((first, lines.count()))
}

impl CommandSource for NumberedFileSource {
    fn load(&self) -> Result<Command> {
        let path = self.path();
        info!(number = self.number, path = %path.display(), "Reading command file");

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Cannot read {}: {}", path.display(), e)))?;

        let (line, ignored) = select_command_line(&contents).ok_or_else(|| {
            DomainError::InvalidCommand(format!("{} contains no command line", path.display()))
        })?;

        if ignored > 0 {
            warn!(
                path = %path.display(),
                ignored_lines = ignored,
                "Command file has several lines, using the first"
            );
        }

        Ok(Command::parse(line)?)
    }
}

/// Command passed directly as program + arguments
pub struct ArgsSource {
    args: Vec<String>,
}

impl ArgsSource {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl CommandSource for ArgsSource {
    fn load(&self) -> Result<Command> {
        let (program, args) = self.args.split_first().ok_or_else(|| {
            DomainError::InvalidCommand("No command given".to_string())
        })?;
        Ok(Command::new(program.clone(), args.iter().cloned())?)
    }
}
