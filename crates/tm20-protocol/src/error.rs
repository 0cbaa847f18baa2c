use std::fmt;

/// A malformed or semantically invalid inbound frame.
///
/// Per the protocol's error handling design, every variant here is handled
/// the same way by the caller: log at `warn!` and drop the frame. None of
/// these ever justify closing the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload was not valid JSON, or not a JSON object.
    MalformedJson(String),
    /// Neither `cmd` nor `ret` was present at the root, or both were.
    MissingVerb,
    /// A command verb was not one of the known inbound verbs.
    UnknownCommand(String),
    /// A required field was absent.
    MissingField(&'static str),
    /// A field was present but the wrong JSON type.
    WrongType { field: &'static str, expected: &'static str },
    /// A field's value fell outside its closed set or numeric range.
    OutOfRange { field: &'static str, value: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedJson(e) => write!(f, "malformed JSON: {e}"),
            ProtocolError::MissingVerb => write!(f, "frame has neither `cmd` nor `ret`"),
            ProtocolError::UnknownCommand(v) => write!(f, "unknown command verb: {v}"),
            ProtocolError::MissingField(field) => write!(f, "missing required field `{field}`"),
            ProtocolError::WrongType { field, expected } => {
                write!(f, "field `{field}` must be {expected}")
            }
            ProtocolError::OutOfRange { field, value } => {
                write!(f, "field `{field}` value `{value}` is out of range")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
