use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use requote_core::errors::{CoreError, ValidationError, ValidationIssue};
use requote_db::repositories::RepositoryError;

/// HTTP-facing failure envelope. Validation and state errors map to 4xx;
/// only unexpected store failures become 5xx.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Conflict(String),
    MissingActor,
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
    user_message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<Vec<ValidationIssue>>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Core(CoreError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Core(CoreError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
            Self::Core(CoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MissingActor => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self::Core(error)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::Core(CoreError::Validation(error))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Unavailable(message) => {
                Self::Core(CoreError::StoreUnavailable(message))
            }
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Database(inner) => Self::Internal(inner.to_string()),
            RepositoryError::Decode(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Core(error) => ApiErrorBody {
                user_message: error.user_message().to_string(),
                retryable: error.is_retryable(),
                issues: match &error {
                    CoreError::Validation(validation) => Some(validation.issues.clone()),
                    _ => None,
                },
                error: error.to_string(),
            },
            Self::Conflict(message) => ApiErrorBody {
                error: message,
                user_message: "The request conflicts with existing state.".to_string(),
                retryable: false,
                issues: None,
            },
            Self::MissingActor => ApiErrorBody {
                error: "missing x-actor-id header".to_string(),
                user_message: "A verified caller identity is required.".to_string(),
                retryable: false,
                issues: None,
            },
            Self::Internal(message) => {
                tracing::error!(
                    event_name = "http.internal_error",
                    error = %message,
                    "request failed with an unexpected store error"
                );
                ApiErrorBody {
                    error: "internal error".to_string(),
                    user_message: "An unexpected internal error occurred.".to_string(),
                    retryable: false,
                    issues: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Every mutating endpoint requires the verified subject identifier the
/// excluded auth collaborator attaches to the request.
pub fn require_actor(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingActor)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    use requote_core::domain::review::ReviewStatus;
    use requote_core::errors::{CoreError, ValidationError, ValidationIssue};
    use requote_db::repositories::RepositoryError;

    use super::{require_actor, ApiError};

    #[test]
    fn status_codes_follow_the_error_taxonomy() {
        let validation = ApiError::Core(CoreError::Validation(ValidationError::new(vec![
            ValidationIssue::line("quantity", 0, "quantity must be positive"),
        ])));
        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let transition = ApiError::Core(CoreError::InvalidStateTransition {
            from: ReviewStatus::Approved,
            attempted: ReviewStatus::Rejected,
        });
        assert_eq!(transition.status(), StatusCode::CONFLICT);

        assert_eq!(
            ApiError::Core(CoreError::not_found("material", "MAT-9")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Core(CoreError::StoreUnavailable("pool timed out".to_string())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::MissingActor.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn pool_timeouts_surface_as_retryable_unavailability() {
        let mapped = ApiError::from(RepositoryError::Unavailable("pool timed out".to_string()));
        assert_eq!(mapped.status(), StatusCode::SERVICE_UNAVAILABLE);
        match mapped {
            ApiError::Core(core) => assert!(core.is_retryable()),
            other => panic!("expected core error, got {other:?}"),
        }
    }

    #[test]
    fn decode_failures_are_internal_errors() {
        let mapped = ApiError::from(RepositoryError::Decode("bad timestamp".to_string()));
        assert_eq!(mapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn actor_header_is_required_and_trimmed() {
        let mut headers = HeaderMap::new();
        assert!(matches!(require_actor(&headers), Err(ApiError::MissingActor)));

        headers.insert("x-actor-id", HeaderValue::from_static("  admin-1  "));
        assert_eq!(require_actor(&headers).expect("actor present"), "admin-1");

        headers.insert("x-actor-id", HeaderValue::from_static("   "));
        assert!(matches!(require_actor(&headers), Err(ApiError::MissingActor)));
    }
}
