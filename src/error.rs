use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    NotInitialized(String),
    InvalidPattern(String),
    InvalidFeedback(String),
    ConfigError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized(msg) => write!(f, "Engine not initialized: {}", msg),
            Self::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            Self::InvalidFeedback(msg) => write!(f, "Invalid feedback: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<regex::Error> for EngineError {
    fn from(error: regex::Error) -> Self {
        EngineError::InvalidPattern(format!("regex failed to compile: {}", error))
    }
}
