use std::fmt;

use crate::orderbook::OrderBookError;

#[derive(Debug)]
pub enum ScenarioError {
    Io(std::io::Error),
    /// A malformed `A`/`M`/`C` line, 1-based
    Validation { line: usize, message: String },
    /// A fatal engine error; rejections never surface here
    Engine(OrderBookError),
}

impl ScenarioError {
    pub fn validation(line: usize, message: impl Into<String>) -> Self {
        ScenarioError::Validation {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(e) => write!(f, "I/O error: {}", e),
            ScenarioError::Validation { line, message } => {
                write!(f, "Line {}: {}", line, message)
            }
            ScenarioError::Engine(e) => write!(f, "Engine failure: {}", e),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Io(e) => Some(e),
            ScenarioError::Validation { .. } => None,
            ScenarioError::Engine(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ScenarioError {
    fn from(e: std::io::Error) -> Self {
        ScenarioError::Io(e)
    }
}

impl From<OrderBookError> for ScenarioError {
    fn from(e: OrderBookError) -> Self {
        ScenarioError::Engine(e)
    }
}
