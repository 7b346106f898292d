use std::fmt;

/// Unified error type for the value engine.
///
/// Every variant renders as the exact message a client would see on the
/// wire, so command handlers can surface errors without reformatting.
/// Invariant violations (corrupted packed buffer, index desynchronisation)
/// are deliberately NOT represented here — those panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation against a key holding the wrong kind of value.
    WrongType,
    /// Malformed arguments.
    Syntax,
    /// Numeric argument did not parse as a 64-bit integer.
    NotAnInteger,
    /// Numeric argument did not parse as a finite float.
    NotAFloat,
    /// Score range bound did not parse (`ZRANGEBYSCORE` and friends).
    NotAScoreRange,
    /// Lexicographic range bound did not parse (`ZRANGEBYLEX` and friends).
    NotALexRange,
    /// Index or range parameter outside the value's bounds.
    IndexOutOfRange,
    /// Write addressed to a key that does not exist (`LSET`).
    NoSuchKey,
    /// Integer overflow in `HINCRBY`.
    Overflow,
    /// Operation would produce a NaN score.
    NanScore,
    /// `HINCRBYFLOAT` against a field that is not a float.
    HashValueNotAFloat,
    /// `HINCRBY` against a field that is not an integer.
    HashValueNotAnInteger,
    /// `HINCRBYFLOAT` result would be NaN or infinite.
    NanOrInfinity,
    /// Blocking command given a negative timeout.
    NegativeTimeout,
    /// Blocking command given an unparsable timeout.
    InvalidTimeout,
    /// Blocking command reached its deadline. Rendered to the client as a
    /// null reply, never as an error string.
    Timeout,
    /// `ZADD` with both NX and XX.
    NxAndXx,
    /// `ZADD INCR` with more than one score-member pair.
    IncrSinglePair,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            Error::Syntax => write!(f, "ERR syntax error"),
            Error::NotAnInteger => write!(f, "ERR value is not an integer or out of range"),
            Error::NotAFloat => write!(f, "ERR value is not a valid float"),
            Error::NotAScoreRange => write!(f, "ERR min or max is not a float"),
            Error::NotALexRange => write!(f, "ERR min or max not valid string range item"),
            Error::IndexOutOfRange => write!(f, "ERR index out of range"),
            Error::NoSuchKey => write!(f, "ERR no such key"),
            Error::Overflow => write!(f, "ERR increment or decrement would overflow"),
            Error::NanScore => write!(f, "ERR resulting score is not a number (NaN)"),
            Error::HashValueNotAFloat => write!(f, "ERR hash value is not a float"),
            Error::HashValueNotAnInteger => write!(f, "ERR hash value is not an integer"),
            Error::NanOrInfinity => write!(f, "ERR increment would produce NaN or Infinity"),
            Error::NegativeTimeout => write!(f, "ERR timeout is negative"),
            Error::InvalidTimeout => write!(f, "ERR timeout is not a float or out of range"),
            Error::Timeout => write!(f, "ERR operation timed out"),
            Error::NxAndXx => {
                write!(f, "ERR XX and NX options at the same time are not compatible")
            }
            Error::IncrSinglePair => {
                write!(f, "ERR INCR option supports a single increment-element pair")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
