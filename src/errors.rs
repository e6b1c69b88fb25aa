use libmacho::MachoError;
use thiserror::Error;

/// Errors surfaced by the command-line tool.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to load Mach-O file: {0}")]
    Macho(#[from] MachoError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type AppResult<T> = Result<T, AppError>;
