use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single backend call.
///
/// Every variant except `Network` carries the message the user should see:
/// the backend's `detail` when it sent one, else the call site's fallback.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed, or its body could not be decoded.
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Bad credentials or an invalid/expired token.
    #[error("{detail}")]
    Auth { status: StatusCode, detail: String },
    /// The backend rejected the request itself.
    #[error("{detail}")]
    Validation { status: StatusCode, detail: String },
    /// The backend failed while handling a well-formed request.
    #[error("{detail}")]
    Server { status: StatusCode, detail: String },
}

impl ApiError {
    pub(crate) fn network(context: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Network { context, source }
    }

    /// Classify a non-success response by status code.
    pub fn from_status(status: StatusCode, detail: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth { status, detail },
            s if s.is_client_error() => Self::Validation { status, detail },
            _ => Self::Server { status, detail },
        }
    }

    /// Re-tag an HTTP failure as an auth failure, keeping its detail.
    pub fn into_auth(self) -> Self {
        match self {
            Self::Validation { status, detail } | Self::Server { status, detail } => {
                Self::Auth { status, detail }
            }
            other => other,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Network { source, .. } => source.status(),
            Self::Auth { status, .. }
            | Self::Validation { status, .. }
            | Self::Server { status, .. } => Some(*status),
        }
    }

    /// The single line shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { context, .. } => context.to_string(),
            Self::Auth { detail, .. }
            | Self::Validation { detail, .. }
            | Self::Server { detail, .. } => detail.clone(),
        }
    }
}

/// Pull the human-readable `detail` out of an error body.
///
/// Accepts `{"detail": "..."}` and the validation shape
/// `{"detail": [{"msg": "..."}, ...]}`. Anything else yields `None`.
pub fn detail_message(body: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(body).ok()?;
    let detail = match json.get("detail")? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };

    if detail.is_empty() {
        None
    } else {
        Some(detail)
    }
}

/// Failure of a session transition.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The durable token store could not be read or written.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Storage(_) => "Session storage is unavailable".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        let body = br#"{"detail": "Invalid credentials"}"#;
        assert_eq!(detail_message(body).as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_detail_validation_list() {
        let body = br#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}, {"msg": "bad password"}]}"#;
        assert_eq!(
            detail_message(body).as_deref(),
            Some("field required; bad password")
        );
    }

    #[test]
    fn test_detail_missing_or_empty() {
        assert_eq!(detail_message(br#"{"error": "nope"}"#), None);
        assert_eq!(detail_message(br#"{"detail": ""}"#), None);
        assert_eq!(detail_message(br#"{"detail": 42}"#), None);
        assert_eq!(detail_message(b"Internal Server Error"), None);
        assert_eq!(detail_message(b""), None);
    }

    #[test]
    fn test_classify_status() {
        let e = ApiError::from_status(StatusCode::UNAUTHORIZED, "x".into());
        assert!(e.is_auth());
        let e = ApiError::from_status(StatusCode::BAD_REQUEST, "x".into());
        assert!(matches!(e, ApiError::Validation { .. }));
        let e = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(matches!(e, ApiError::Server { .. }));
        assert_eq!(e.user_message(), "boom");
        assert_eq!(e.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_into_auth_keeps_detail() {
        let e = ApiError::from_status(StatusCode::BAD_REQUEST, "User already registered".into())
            .into_auth();
        assert!(e.is_auth());
        assert_eq!(e.user_message(), "User already registered");
    }
}
