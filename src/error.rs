use std::error::Error;
use std::fmt;
use std::result;

pub type GenericResult<T> = result::Result<T, Box<dyn Error>>;
pub type ParseResult<T> = result::Result<T, ParseError>;

/// Error produced by the scanner or the parser before any code runs.
#[derive(Debug)]
pub struct ParseError {
    pub description: String,
}

impl ParseError {
    pub fn new(description: &str) -> ParseError {
        ParseError {
            description: description.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Error for ParseError {}

/// An exception that unwound past the program without being caught.
///
/// `stack` holds the names of the functions that were entered when the value
/// was thrown, outermost first.
#[derive(Debug)]
pub struct UncaughtException {
    pub kind: String,
    pub message: String,
    pub stack: Vec<String>,
}

impl fmt::Display for UncaughtException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uncaught {}: {}", self.kind, self.message)?;
        for name in self.stack.iter().rev() {
            write!(f, "\n    at {name}")?;
        }
        Ok(())
    }
}

impl Error for UncaughtException {}
