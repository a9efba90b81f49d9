//! Request handlers. Each one maps a body or path onto an orchestrator call
//! and renders the result inside an [`Envelope`].
use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use perspec_common::Tweet;
use perspec_llm::TextStream;
use perspec_pipeline::{AnswerBody, AnswerMode, Delivery, QuestionInput};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::app::AppState;
use crate::envelope::{
    AnalysisData, ApiError, DualData, Envelope, HealthData, ProfileData, UserAnalysisData,
    UsersData,
};

pub const EVENT_STREAM: &str = "text/event-stream;charset=utf-8";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub question: Option<String>,
    pub username: Option<String>,
    pub tweets: Option<Vec<Tweet>>,
}

impl From<QuestionRequest> for QuestionInput {
    fn from(req: QuestionRequest) -> Self {
        QuestionInput {
            username: req.username,
            question: req.question,
            tweets: req.tweets,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub tweet_text: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersRequest {
    pub query: Option<String>,
}

/// Decode a JSON body whatever its declared content type.
///
/// Readiness is checked before the body is parsed.
fn decode<T: DeserializeOwned>(state: &AppState, body: &[u8]) -> Result<T, ApiError> {
    state.orchestrator.ensure_ready()?;
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

pub async fn health(State(state): State<AppState>) -> Json<Envelope<HealthData>> {
    Json(Envelope::success(HealthData {
        version: env!("CARGO_PKG_VERSION"),
        llm: state.orchestrator.llm_reachable().await,
    }))
}

async fn answer(
    state: &AppState,
    req: QuestionRequest,
    mode: AnswerMode,
    delivery: Delivery,
) -> Result<Response, ApiError> {
    let answer = state
        .orchestrator
        .answer_question(req.into(), mode, delivery)
        .await?;
    tracing::debug!(
        username = answer.user.username.as_deref().unwrap_or_default(),
        perspective = ?answer.perspective,
        "api.answered"
    );
    Ok(render(answer.body))
}

fn render(body: AnswerBody) -> Response {
    match body {
        AnswerBody::Text(analysis) => Json(Envelope::success(AnalysisData { analysis })).into_response(),
        AnswerBody::Dual {
            first_person,
            third_person,
        } => Json(Envelope::success(DualData {
            first_person,
            third_person,
        }))
        .into_response(),
        AnswerBody::Stream(stream) => stream_response(stream),
    }
}

/// Raw text chunks as an event stream. An upstream error ends the body.
fn stream_response(mut chunks: TextStream) -> Response {
    let body = async_stream::stream! {
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => yield Ok::<Bytes, Infallible>(Bytes::from(text)),
                Err(err) => {
                    tracing::warn!(error = %err, "api.stream_aborted");
                    break;
                }
            }
        }
    };

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

pub async fn question(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = decode(&state, &body)?;
    answer(&state, req, AnswerMode::AboutUser, Delivery::Buffered).await
}

pub async fn question_first(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = decode(&state, &body)?;
    answer(&state, req, AnswerMode::AsUser, Delivery::Streamed).await
}

pub async fn question_third(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = decode(&state, &body)?;
    answer(&state, req, AnswerMode::AboutUser, Delivery::Streamed).await
}

pub async fn question_dual(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = decode(&state, &body)?;
    answer(&state, req, AnswerMode::Both, Delivery::Buffered).await
}

pub async fn analyze_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = decode(&state, &body)?;
    answer(&state, req, AnswerMode::AboutUser, Delivery::Buffered).await
}

pub async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Envelope<AnalysisData>>, ApiError> {
    let req: AnalyzeRequest = decode(&state, &body)?;
    let analysis = state
        .orchestrator
        .analyze_text(req.tweet_text, req.question)
        .await?;
    Ok(Json(Envelope::success(AnalysisData { analysis })))
}

pub async fn users(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Envelope<UsersData>>, ApiError> {
    let req: UsersRequest = decode(&state, &body)?;
    let users = state.orchestrator.lookup_users(req.query).await?;
    Ok(Json(Envelope::success(UsersData { users })))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<ProfileData>>, ApiError> {
    let profile = state.orchestrator.profile(&username).await?;
    Ok(Json(Envelope::success(ProfileData {
        user: profile.user,
        tweets: profile.tweets,
    })))
}

pub async fn personality(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<UserAnalysisData>>, ApiError> {
    let found = state.orchestrator.personality(&username).await?;
    Ok(Json(Envelope::success(UserAnalysisData {
        user: found.user,
        analysis: found.analysis,
    })))
}

pub async fn community(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<UserAnalysisData>>, ApiError> {
    let found = state.orchestrator.community_view(&username).await?;
    Ok(Json(Envelope::success(UserAnalysisData {
        user: found.user,
        analysis: found.analysis,
    })))
}
