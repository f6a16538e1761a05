use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use mindmirror_session::SessionError;

/// Everything an API handler can fail with. Each variant maps to one status
/// code and a stable machine-readable code; the message is what clients show
/// the user. Nothing here is retried server-side.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("This doctor code is already in use")]
    DoctorCodeTaken,

    #[error("No doctor with this code exists")]
    UnknownDoctorCode,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Federated sign-in is not configured on this server")]
    OAuthUnavailable,

    #[error("Google sign-in failed: {0}")]
    OAuthRejected(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownDoctorCode => StatusCode::UNPROCESSABLE_ENTITY,
            Self::EmailTaken | Self::DoctorCodeTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized | Self::OAuthRejected(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OAuthUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Session(err) => match err {
                SessionError::ActionInFlight(_) => StatusCode::CONFLICT,
                SessionError::ProfileMissing(_) | SessionError::UnsupportedProvider(_) => {
                    StatusCode::UNAUTHORIZED
                }
                SessionError::ProfileNotYetVisible(_) => StatusCode::SERVICE_UNAVAILABLE,
                SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EmailTaken => "email_taken",
            Self::DoctorCodeTaken => "doctor_code_taken",
            Self::UnknownDoctorCode => "unknown_doctor_code",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::OAuthUnavailable => "oauth_unavailable",
            Self::OAuthRejected(_) => "oauth_rejected",
            Self::Session(err) => match err {
                SessionError::ActionInFlight(_) => "auth_in_flight",
                SessionError::ProfileMissing(_) => "profile_missing",
                SessionError::ProfileNotYetVisible(_) => "profile_not_visible",
                SessionError::UnsupportedProvider(_) => "unsupported_provider",
                SessionError::Store(_) => "store_failure",
            },
            Self::Internal(_) => "internal",
        }
    }
}

/// Flattens a blocking-task join result. A panicked or cancelled task is an
/// internal error like any other.
pub(crate) fn blocking<T>(
    result: Result<anyhow::Result<T>, tokio::task::JoinError>,
) -> Result<T, ApiError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ApiError::Internal(err)),
        Err(err) => Err(ApiError::Internal(anyhow::anyhow!(
            "blocking task failed: {}",
            err
        ))),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            error!("API error ({}): {:#}", code, anyhow::Error::new(self));
            // Internals stay in the log; the client gets a generic message.
            let body = Json(serde_json::json!({
                "error": "internal",
                "message": "Something went wrong. Please try again.",
            }));
            return (status, body).into_response();
        }
        let body = Json(serde_json::json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn statuses_follow_the_failure_taxonomy() {
        assert_eq!(
            ApiError::Validation("too short".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::UnknownDoctorCode.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Session(SessionError::ProfileMissing(Uuid::nil())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Session(SessionError::ActionInFlight(Uuid::nil())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let response =
            ApiError::Internal(anyhow::anyhow!("db path /secret/mind.db missing")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
