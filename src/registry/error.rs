//! Registry client error definitions.

use thiserror::Error;

use crate::settings::SettingsError;

/// Non-success HTTP status returned by the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpStatusError {
    #[error("registry rejected request syntax (400): {body}")]
    BadRequest { body: String },

    #[error("registry denied access (403): {body}")]
    Forbidden { body: String },

    #[error("registry resource not found (404): {body}")]
    NotFound { body: String },

    #[error("registry internal error (500): {body}")]
    ServerError { body: String },

    #[error("registry returned unexpected status {status}: {body}")]
    Unexpected { status: u16, body: String },
}

impl HttpStatusError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::BadRequest { body },
            403 => Self::Forbidden { body },
            404 => Self::NotFound { body },
            500 => Self::ServerError { body },
            status => Self::Unexpected { status, body },
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::ServerError { .. } => 500,
            Self::Unexpected { status, .. } => *status,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::BadRequest { body }
            | Self::Forbidden { body }
            | Self::NotFound { body }
            | Self::ServerError { body }
            | Self::Unexpected { body, .. } => body,
        }
    }
}

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Login was refused.
    #[error("registry login failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    /// Any other registry call answered with a non-success status.
    #[error(transparent)]
    Http(#[from] HttpStatusError),

    /// Fetched document was rejected; current settings are unchanged.
    #[error("config validation failed: {0}")]
    Validation(String),

    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a body that could not be decoded.
    #[error("malformed registry response: {0}")]
    Decode(String),

    /// Registry address could not be parsed.
    #[error("invalid registry address '{0}'")]
    Address(String),
}

impl RegistryError {
    /// HTTP status carried by the error, if the registry answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => Some(*status),
            Self::Http(e) => Some(e.status()),
            _ => None,
        }
    }
}

impl From<SettingsError> for RegistryError {
    fn from(e: SettingsError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        for (status, expected) in [(400, 400), (403, 403), (404, 404), (500, 500), (502, 502)] {
            let err = HttpStatusError::from_status(status, "body".to_string());
            assert_eq!(err.status(), expected);
            assert_eq!(err.body(), "body");
        }
        assert!(matches!(
            HttpStatusError::from_status(503, String::new()),
            HttpStatusError::Unexpected { status: 503, .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::from(HttpStatusError::from_status(403, "no perm".to_string()));
        assert_eq!(err.to_string(), "registry denied access (403): no perm");
        assert_eq!(err.status(), Some(403));

        let err = RegistryError::Validation("bad".to_string());
        assert_eq!(err.status(), None);
    }
}
