/*!
A common error type shared across the whole stack.

Synchronous APIs return one of these; the runtime never panics or
propagates partial state on failure. Asynchronous failures (auto-renewal,
auto-advertise) are instead surfaced through [`crate::callback::Event`]
variants, as described in the crate's event model.
*/
use std::fmt::{self, Display, Formatter};
use std::io::Error as IoError;
use std::str::Utf8Error;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The stable, closed error taxonomy for the runtime.
#[derive(Debug, Error)]
pub enum Error {
    // -- caller input / state --------------------------------------------------------------
    #[error("the handle supplied is not registered, or has already been unregistered")]
    InvalidHandle,

    #[error("a required parameter was missing or out of range: {0}")]
    InvalidParam(String),

    #[error("the URL `{0}` could not be parsed")]
    InvalidUrl(String),

    #[error("the action `{0}` is not understood by this service")]
    InvalidAction(String),

    #[error("the subscription id `{0}` is not known")]
    InvalidSid(String),

    #[error("the device description is malformed or inconsistent: {0}")]
    InvalidDevice(String),

    #[error("no service matches the supplied identifier")]
    InvalidService,

    #[error("no usable network interface was found within the configured wait time")]
    InvalidInterface,

    // -- resource exhaustion -----------------------------------------------------------------
    #[error("the process-wide handle table is full")]
    OutOfHandle,

    #[error("a socket could not be allocated")]
    OutOfSocket,

    #[error("the maximum number of subscriptions for this service has been reached")]
    TooManySubscriptions,

    // -- transport ----------------------------------------------------------------------------
    #[error(transparent)]
    NetworkError(#[from] IoError),

    #[error("a socket write failed: {0}")]
    SocketWrite(String),

    #[error("a socket read failed: {0}")]
    SocketRead(String),

    #[error("binding a socket failed: {0}")]
    SocketBind(String),

    #[error("connecting a socket failed: {0}")]
    SocketConnect(String),

    #[error("the operation timed out")]
    TimedOut,

    #[error(transparent)]
    Messaging(#[from] reqwest::Error),

    // -- protocol -------------------------------------------------------------------------------
    #[error(transparent)]
    MessageFormat(#[from] MessageFormatError),

    #[error("the response did not have the expected shape: {0}")]
    BadResponse(String),

    #[error("the request did not have the expected shape: {0}")]
    BadRequest(String),

    #[error("the message could not be parsed as HTTP: {0}")]
    BadHttpMsg(String),

    // -- peer refusal ------------------------------------------------------------------------
    #[error("the peer refused our SUBSCRIBE (status {0})")]
    SubscribeUnaccepted(u16),

    #[error("the peer refused our UNSUBSCRIBE (status {0})")]
    UnsubscribeUnaccepted(u16),

    #[error("the peer refused our NOTIFY (status {0})")]
    NotifyUnaccepted(u16),

    // -- lifecycle -----------------------------------------------------------------------------
    #[error("the runtime has already been shut down")]
    Finish,

    #[error("the runtime has not been initialised")]
    Init,

    #[error("runtime initialisation failed: {0}")]
    InitFailed(String),

    #[error("a control point is already registered for this runtime")]
    AlreadyRegistered,

    // -- catch-alls ----------------------------------------------------------------------------
    #[error("the operation was cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Where a value that failed validation came from, used to build
/// [`MessageFormatError`] variants with a consistent message shape.
#[derive(Clone, Copy, Debug)]
pub enum ValueSource {
    Socket,
    Header,
    Field,
    Xml,
}

/// Failures specific to parsing or validating a wire-level message (HTTP
/// headers, XML documents, URIs).
#[derive(Debug, Error)]
pub enum MessageFormatError {
    #[error(transparent)]
    XmlFormat(#[from] quick_xml::Error),

    #[error(transparent)]
    SourceEncoding(#[from] Utf8Error),

    #[error("a required {source} `{name}` was either missing or empty")]
    MissingRequiredValue { source: ValueSource, name: String },

    #[error("the {source} `{name}` value did not match the expected type (expected: `{expected}`, found: `{found}`)")]
    ValueTypeMismatch {
        source: ValueSource,
        name: String,
        expected: String,
        found: String,
    },

    #[error("the {source} `{name}` was incorrectly formatted (value: `{value}`)")]
    InvalidValue {
        source: ValueSource,
        name: String,
        value: String,
    },
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn missing_required_header<S: Into<String>>(name: S) -> MessageFormatError {
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Header,
        name: name.into(),
    }
}

pub fn invalid_header_value<S1: Into<String>, S2: Into<String>>(
    name: S1,
    value: S2,
) -> MessageFormatError {
    MessageFormatError::InvalidValue {
        source: ValueSource::Header,
        name: name.into(),
        value: value.into(),
    }
}

pub fn invalid_xml_value<S1: Into<String>, S2: Into<String>>(
    name: S1,
    value: S2,
) -> MessageFormatError {
    MessageFormatError::InvalidValue {
        source: ValueSource::Xml,
        name: name.into(),
        value: value.into(),
    }
}

pub fn missing_xml_value<S: Into<String>>(name: S) -> MessageFormatError {
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Xml,
        name: name.into(),
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Display for ValueSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueSource::Socket => "socket",
                ValueSource::Header => "message header",
                ValueSource::Field => "message field",
                ValueSource::Xml => "xml element",
            }
        )
    }
}

impl<T> From<MessageFormatError> for Result<T, Error> {
    fn from(e: MessageFormatError) -> Self {
        Err(Error::MessageFormat(e))
    }
}
