//! Errors produced when running JIT code or reading its results.
use crate::value::Kind;
use std::error;
use std::fmt;
use std::str::Utf8Error;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// A value was read as a kind other than the kind it was produced as.
    WrongKind { expected: Kind, found: Kind },

    /// A string value contains bytes that aren't valid UTF-8.
    InvalidUtf8(Utf8Error),

    /// A string value doesn't point to an object.
    NullPointer,

    /// A string is too large to store its length in a boxed string header.
    TooLarge(usize),

    /// The function to run doesn't exist in the module.
    UnknownFunction(String),

    /// The function to run returns a type we can't produce a value for.
    UnsupportedType(String),

    /// The execution engine couldn't be created or used.
    Engine(String),

    /// A module couldn't be parsed from its textual IR.
    InvalidIr(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::WrongKind { expected, found } => write!(
                f,
                "expected a value of type {}, found {}",
                expected, found
            ),
            Error::InvalidUtf8(err) => {
                write!(f, "the string isn't valid UTF-8: {}", err)
            }
            Error::NullPointer => {
                write!(f, "the string value is a NULL pointer")
            }
            Error::TooLarge(size) => write!(
                f,
                "the string is {} bytes, but at most {} bytes are supported",
                size,
                i32::MAX
            ),
            Error::UnknownFunction(name) => {
                write!(f, "the function '{}' is undefined", name)
            }
            Error::UnsupportedType(typ) => {
                write!(f, "values of type '{}' aren't supported", typ)
            }
            Error::Engine(msg) => {
                write!(f, "the execution engine failed: {}", msg)
            }
            Error::InvalidIr(msg) => write!(f, "the IR is invalid: {}", msg),
        }
    }
}

impl error::Error for Error {}

impl From<Utf8Error> for Error {
    fn from(error: Utf8Error) -> Self {
        Error::InvalidUtf8(error)
    }
}
