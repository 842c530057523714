//! Errors surfaced to HTTP clients.

use snafu::Snafu;

/// An error from a portal, admin or contact operation.
///
/// Each variant maps onto the HTTP status the server answers with; see [`Error::status`].
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The caller is not signed in, or does not have the required role.
    #[snafu(display("Unauthorized"))]
    Unauthorized,

    /// The request is missing data or carries data in the wrong shape.
    #[snafu(display("{message}"))]
    Invalid { message: String },

    /// The hosted platform rejected a call.
    #[snafu(display("{message}"))]
    Platform { status: u16, message: String },

    /// Something went wrong that the caller cannot fix.
    #[snafu(display("{message}"))]
    Internal { message: String },
}

impl Error {
    /// A validation failure with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// An unexpected failure with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The HTTP status code for this error.
    ///
    /// Platform errors are reported as `400` regardless of the upstream status, so the client sees
    /// the same status for every rejected write.
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Invalid { .. } | Self::Platform { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("malformed platform data: {err}"))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
