use crate::error::Error;
use crate::num::format_double;

/// A typed reply value, as handed to the (external) protocol encoder.
///
/// Doubles stay doubles until the wire: `render` applies the engine's
/// single deterministic formatter, so a score compares numerically in
/// tests and still serialises byte-stably.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Missing value (null bulk on the wire).
    Null,
    /// Null array: the timeout reply of a blocking pop.
    NullArray,
    /// Status line, e.g. OK.
    Simple(&'static str),
    Int(i64),
    Double(f64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
    Error(String),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK")
    }

    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Reply {
        Reply::Bulk(bytes.into())
    }

    pub fn from_error(err: &Error) -> Reply {
        Reply::Error(err.to_string())
    }

    /// Human-readable rendering, used by tests and diagnostics; the real
    /// wire encoding lives with the external protocol layer.
    pub fn render(&self) -> String {
        match self {
            Reply::Null => "(nil)".to_string(),
            Reply::NullArray => "(nil array)".to_string(),
            Reply::Simple(s) => (*s).to_string(),
            Reply::Int(i) => i.to_string(),
            Reply::Double(d) => String::from_utf8_lossy(&format_double(*d)).into_owned(),
            Reply::Bulk(b) => String::from_utf8_lossy(b).into_owned(),
            Reply::Array(items) => {
                let inner: Vec<String> = items.iter().map(Reply::render).collect();
                format!("[{}]", inner.join(", "))
            }
            Reply::Error(e) => format!("({e})"),
        }
    }
}
