use bridge_traits::error::BridgeError;
use core_runtime::Platform;
use thiserror::Error;

/// Library failures.
///
/// `Display` is the human-readable message stored on a page state, so the
/// variants carrying user-facing text render it verbatim.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("{message}")]
    Unavailable { message: String },

    #[error(
        "Missing {} access token. Please reconnect to {}.",
        .platform.service_name(),
        .platform.service_name()
    )]
    MissingCredential { platform: Platform },

    #[error(
        "{} request failed ({}). {}",
        .platform.service_name(),
        .status,
        .body.as_deref().unwrap_or("Please try again later.")
    )]
    Backend {
        platform: Platform,
        status: u16,
        body: Option<String>,
    },

    #[error("Failed to read {} response: {message}", .platform.service_name())]
    Parse { platform: Platform, message: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_message() {
        let err = LibraryError::MissingCredential {
            platform: Platform::Spotify,
        };
        assert_eq!(
            err.to_string(),
            "Missing Spotify access token. Please reconnect to Spotify."
        );

        let err = LibraryError::MissingCredential {
            platform: Platform::Tidal,
        };
        assert_eq!(
            err.to_string(),
            "Missing TIDAL access token. Please reconnect to TIDAL."
        );
    }

    #[test]
    fn test_backend_message_with_and_without_body() {
        let err = LibraryError::Backend {
            platform: Platform::Spotify,
            status: 502,
            body: Some("Bad gateway".to_string()),
        };
        assert_eq!(err.to_string(), "Spotify request failed (502). Bad gateway");

        let err = LibraryError::Backend {
            platform: Platform::Spotify,
            status: 401,
            body: None,
        };
        assert_eq!(
            err.to_string(),
            "Spotify request failed (401). Please try again later."
        );
    }
}
