// Command Source Port
// Supplies the one command line a run supervises

use crate::domain::Command;
use crate::error::Result;

/// Command source interface
///
/// Implementations:
/// - NumberedFileSource: reads `<dir>/<num>-tmp.txt` (infra-system)
/// - ArgsSource: command given directly on the command line (infra-system)
pub trait CommandSource: Send + Sync {
    /// Load the single command to run
    ///
    /// # Errors
    /// - AppError::Io if the backing file cannot be read
    /// - AppError::Domain if no valid command line is found
    fn load(&self) -> Result<Command>;
}
