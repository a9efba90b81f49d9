//! Response envelope shared by every JSON endpoint.
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use perspec_common::{Tweet, UserIdentity};
use perspec_pipeline::PipelineFailure;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Fail,
}

/// `{ status, message?, data? }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub version: &'static str,
    /// LLM provider answered a lightweight request.
    pub llm: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysisData {
    pub analysis: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualData {
    pub first_person: Option<String>,
    pub third_person: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<UserIdentity>,
}

#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub user: UserIdentity,
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Serialize)]
pub struct UserAnalysisData {
    pub user: UserIdentity,
    pub analysis: String,
}

pub const MALFORMED_BODY_MESSAGE: &str = "Malformed request body";

/// A failure rendered as a `fail` envelope.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineFailure),
    /// The body could not be read or is not the expected JSON.
    MalformedBody(String),
}

impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        Self::Pipeline(failure)
    }
}

pub fn status_for(failure: &PipelineFailure) -> StatusCode {
    match failure {
        PipelineFailure::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        PipelineFailure::MissingParameters => StatusCode::BAD_REQUEST,
        PipelineFailure::InvalidUser | PipelineFailure::NoTweets | PipelineFailure::NoUsers => {
            StatusCode::NOT_FOUND
        }
        PipelineFailure::SearchTermsUnavailable => StatusCode::BAD_GATEWAY,
        PipelineFailure::AnalysisUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let failure = match self {
            Self::Pipeline(failure) => failure,
            Self::MalformedBody(detail) => {
                tracing::info!(%detail, "api.malformed_body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(Envelope::fail(MALFORMED_BODY_MESSAGE)),
                )
                    .into_response();
            }
        };
        let status = status_for(&failure);
        let mut response = (status, Json(Envelope::fail(failure.to_string()))).into_response();
        if let Some(secs) = failure.retry_after_secs() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
