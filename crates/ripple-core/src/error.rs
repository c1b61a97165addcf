//! The closed error enumeration surfaced to the embedder.
//!
//! Every failure in the runtime is one of these kinds. Each kind has a
//! stable number (readable with `errn`) and a short message (`errm`).

use thiserror::Error;

use crate::pos::Pos;

/// Every error the runtime can raise.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Error)]
#[repr(u16)]
pub enum Error {
    #[error("Not yet implemented")]
    Unimplemented = 1,
    #[error("Interrupted")]
    Interrupted,
    #[error("Too few arguments")]
    MissingArgument,
    #[error("Invalid object")]
    InvalidObject,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Syntax error")]
    Syntax,
    #[error("Infix operator expected")]
    InfixExpected,
    #[error("Prefix operator expected")]
    PrefixExpected,
    #[error("Argument expected")]
    ArgumentExpected,
    #[error("Divide by zero")]
    ZeroDivide,
    #[error("Undefined operation")]
    UndefinedOperation,
    #[error("Bad argument type")]
    Type,
    #[error("Bad argument value")]
    Value,
    #[error("Index out of range")]
    Index,
    #[error("Invalid dimension")]
    Dimension,
    #[error("Malformed mantissa")]
    Mantissa,
    #[error("Malformed exponent")]
    Exponent,
    #[error("Exponent out of range")]
    ExponentRange,
    #[error("Argument outside domain")]
    Domain,
    #[error("Invalid based number")]
    BasedNumber,
    #[error("Invalid digit for base")]
    BasedDigit,
    #[error("Based number out of range")]
    BasedRange,
    #[error("Invalid base")]
    InvalidBase,
    #[error("Unterminated")]
    Unterminated,
    #[error("No such directory")]
    NoDirectory,
    #[error("Name already exists")]
    NameExists,
    #[error("Undefined name")]
    UndefinedName,
    #[error("Recursion limit exceeded")]
    Recursion,
    #[error("Return without caller")]
    ReturnWithoutCaller,
    #[error("Invalid local variable")]
    InvalidLocal,
    #[error("Number is too big")]
    NumberTooBig,
    #[error("Too many rewrites")]
    TooManyRewrites,
    #[error("Constant value")]
    ConstantValue,
    #[error("Bad guess")]
    BadGuess,
    #[error("No solution found")]
    NoSolution,
}

impl Error {
    /// Every kind, in number order. The enumeration is closed: new kinds
    /// are only ever appended.
    pub const ALL: [Error; 35] = [
        Error::Unimplemented,
        Error::Interrupted,
        Error::MissingArgument,
        Error::InvalidObject,
        Error::OutOfMemory,
        Error::Syntax,
        Error::InfixExpected,
        Error::PrefixExpected,
        Error::ArgumentExpected,
        Error::ZeroDivide,
        Error::UndefinedOperation,
        Error::Type,
        Error::Value,
        Error::Index,
        Error::Dimension,
        Error::Mantissa,
        Error::Exponent,
        Error::ExponentRange,
        Error::Domain,
        Error::BasedNumber,
        Error::BasedDigit,
        Error::BasedRange,
        Error::InvalidBase,
        Error::Unterminated,
        Error::NoDirectory,
        Error::NameExists,
        Error::UndefinedName,
        Error::Recursion,
        Error::ReturnWithoutCaller,
        Error::InvalidLocal,
        Error::NumberTooBig,
        Error::TooManyRewrites,
        Error::ConstantValue,
        Error::BadGuess,
        Error::NoSolution,
    ];

    /// Stable error number, as reported by `errn`.
    pub fn number(self) -> u16 {
        self as u16
    }

    /// The kind with a given number, for `doerr`.
    pub fn from_number(number: u16) -> Option<Error> {
        Error::ALL.get(number.checked_sub(1)? as usize).copied()
    }

    /// Human-readable message, as reported by `errm`.
    pub fn message(self) -> String {
        self.to_string()
    }
}

/// The runtime's error slot: the kind plus where and during what it
/// happened. Survives until explicitly cleared.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ErrorState {
    pub kind: Error,
    /// Source position, when the error came out of the parser.
    pub pos: Option<Pos>,
    /// Canonical name of the command that raised the error.
    pub command: Option<&'static str>,
}

impl ErrorState {
    pub fn new(kind: Error) -> Self {
        Self {
            kind,
            pos: None,
            command: None,
        }
    }

    pub fn at(kind: Error, pos: Pos) -> Self {
        Self {
            kind,
            pos: Some(pos),
            command: None,
        }
    }

    pub fn in_command(kind: Error, command: &'static str) -> Self {
        Self {
            kind,
            pos: None,
            command: Some(command),
        }
    }
}

impl std::fmt::Display for ErrorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(cmd) = self.command {
            write!(f, " in {}", cmd)?;
        }
        if let Some(pos) = self.pos {
            write!(f, " at offset {}", pos.offset())?;
        }
        Ok(())
    }
}

/// Result alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;
