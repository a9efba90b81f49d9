//! Per-request question answering over a user's tweets.
//!
//! The orchestrator owns no mutable state: every call resolves the user,
//! gathers tweets, packs them and asks the LLM, using only the immutable
//! settings it was built with and the two gateways.
use crate::combine::combine;
use crate::pack::Packer;
use crate::sanitize::Sanitizer;
use perspec_common::{oldest_id, FailureKind, Outcome, Perspective, Tweet, UserIdentity};
use perspec_llm::{LlmGateway, Subject, TextStream};
use perspec_social::twitter::{TimelineRequest, TwitterGateway};
use std::sync::Arc;

pub const RATE_LIMIT_MESSAGE: &str = "Failed to get analysis. Likely the OpenAI API is overloaded or receiving too many requests. Please try again after a few minutes.";

/// What to do when no search terms can be extracted from a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchTermsPolicy {
    #[default]
    Require,
    FallBackToTimeline,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub token_limit: usize,
    pub analysis_token_limit: usize,
    pub min_words: usize,
    pub search_terms: SearchTermsPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            token_limit: 3400,
            analysis_token_limit: 3500,
            min_words: Sanitizer::DEFAULT_MIN_WORDS,
            search_terms: SearchTermsPolicy::Require,
        }
    }
}

/// Whether the service may call its upstreams at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Misconfigured { missing: Vec<String> },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PipelineFailure {
    #[error("Environment Configuration Error")]
    Configuration { missing: Vec<String> },
    #[error("Missing required parameters")]
    MissingParameters,
    #[error("Invalid user")]
    InvalidUser,
    #[error("Failed to extract search terms.")]
    SearchTermsUnavailable,
    #[error("Failed to find any tweets")]
    NoTweets,
    #[error("Failed to find any users")]
    NoUsers,
    #[error("{}", RATE_LIMIT_MESSAGE)]
    AnalysisUnavailable { cause: Option<FailureKind> },
}

impl PipelineFailure {
    /// Seconds a client should wait before retrying, when retrying helps.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::AnalysisUnavailable { .. } | Self::SearchTermsUnavailable => Some(60),
            Self::NoTweets => Some(180),
            _ => None,
        }
    }
}

/// Body of the question endpoints. Absent fields are reported, not defaulted.
#[derive(Debug, Clone, Default)]
pub struct QuestionInput {
    pub username: Option<String>,
    pub question: Option<String>,
    pub tweets: Option<Vec<Tweet>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// First person, speaking as the user.
    AsUser,
    /// Third person, about the user.
    AboutUser,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Buffered,
    Streamed,
}

pub enum AnswerBody {
    Text(String),
    Stream(TextStream),
    Dual {
        first_person: Option<String>,
        third_person: Option<String>,
    },
}

impl std::fmt::Debug for AnswerBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Dual {
                first_person,
                third_person,
            } => f
                .debug_struct("Dual")
                .field("first_person", first_person)
                .field("third_person", third_person)
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct Answer {
    pub user: UserIdentity,
    pub perspective: Perspective,
    pub body: AnswerBody,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub user: UserIdentity,
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub user: UserIdentity,
    pub analysis: String,
}

struct Resolved {
    user: UserIdentity,
    id: String,
    subject: Subject,
}

pub struct Orchestrator {
    settings: PipelineSettings,
    readiness: Readiness,
    packer: Packer,
    twitter: Arc<dyn TwitterGateway>,
    llm: Arc<dyn LlmGateway>,
}

impl Orchestrator {
    pub fn new(
        settings: PipelineSettings,
        readiness: Readiness,
        twitter: Arc<dyn TwitterGateway>,
        llm: Arc<dyn LlmGateway>,
    ) -> Result<Self, regex::Error> {
        let packer = Packer::new(Sanitizer::new(settings.min_words)?);
        Ok(Self {
            settings,
            readiness,
            packer,
            twitter,
            llm,
        })
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Probe the LLM provider. Never contacts it while misconfigured.
    pub async fn llm_reachable(&self) -> bool {
        match self.readiness {
            Readiness::Ready => self.llm.reachable().await,
            Readiness::Misconfigured { .. } => false,
        }
    }

    /// Fails with [`PipelineFailure::Configuration`] unless credentials were complete.
    pub fn ensure_ready(&self) -> Result<(), PipelineFailure> {
        match &self.readiness {
            Readiness::Ready => Ok(()),
            Readiness::Misconfigured { missing } => {
                tracing::error!(missing = ?missing, "pipeline.misconfigured");
                Err(PipelineFailure::Configuration {
                    missing: missing.clone(),
                })
            }
        }
    }

    async fn resolve(&self, username: &str) -> Result<Resolved, PipelineFailure> {
        let outcome = self.twitter.resolve_user(username).await;
        if let Some(failure) = outcome.failure() {
            tracing::warn!(username, kind = failure.kind.as_str(), "pipeline.resolve_failed");
        }
        let user = outcome.unwrap_or_default();
        match (&user.id, &user.display_name) {
            (Some(id), Some(name)) => {
                let handle = user
                    .username
                    .clone()
                    .unwrap_or_else(|| username.trim_start_matches('@').to_string());
                Ok(Resolved {
                    id: id.clone(),
                    subject: Subject {
                        name: name.clone(),
                        handle,
                    },
                    user,
                })
            }
            _ => {
                tracing::info!(username, "pipeline.invalid_user");
                Err(PipelineFailure::InvalidUser)
            }
        }
    }

    /// Answer a question as and/or about a Twitter user.
    pub async fn answer_question(
        &self,
        input: QuestionInput,
        mode: AnswerMode,
        delivery: Delivery,
    ) -> Result<Answer, PipelineFailure> {
        self.ensure_ready()?;

        let (username, question, supplied) = match (input.username, input.question, input.tweets) {
            (Some(u), Some(q), Some(t)) if !u.trim().is_empty() && !q.trim().is_empty() => {
                (u.trim().to_string(), q.trim().to_string(), t)
            }
            _ => return Err(PipelineFailure::MissingParameters),
        };

        let resolved = self.resolve(&username).await?;
        tracing::info!(
            user_id = %resolved.id,
            ?mode,
            ?delivery,
            supplied = supplied.len(),
            "pipeline.question.start"
        );

        let terms = match self.llm.extract_search_terms(&question).await {
            Outcome::Found(terms) => Some(terms),
            other => {
                let kind = other.failure().map(|f| f.kind.as_str()).unwrap_or("empty");
                match self.settings.search_terms {
                    SearchTermsPolicy::Require => {
                        tracing::warn!(kind, "pipeline.search_terms.unavailable");
                        return Err(PipelineFailure::SearchTermsUnavailable);
                    }
                    SearchTermsPolicy::FallBackToTimeline => {
                        tracing::info!(kind, "pipeline.search_terms.skipped");
                        None
                    }
                }
            }
        };

        let context = self.gather(&resolved, terms.as_deref(), supplied).await;
        if context.is_empty() {
            return Err(PipelineFailure::NoTweets);
        }

        let perspective = self
            .llm
            .classify_perspective(&question)
            .await
            .found()
            .unwrap_or(Perspective::Unknown);
        tracing::debug!(%perspective, "pipeline.perspective");

        let body = match mode {
            AnswerMode::AsUser | AnswerMode::AboutUser => {
                let target = target_for(mode);
                let asked = self.rewrite_if_needed(&question, perspective, target).await;
                self.answer_one(mode, delivery, &resolved.subject, &context, &asked)
                    .await?
            }
            AnswerMode::Both => {
                let (as_q, about_q) = tokio::join!(
                    self.rewrite_if_needed(&question, perspective, Perspective::Second),
                    self.rewrite_if_needed(&question, perspective, Perspective::Third),
                );
                let (first, third) = tokio::join!(
                    self.llm.answer_as_user(&resolved.subject, &context, &as_q),
                    self.llm.answer_about_user(&resolved.subject, &context, &about_q),
                );
                if !first.is_found() && !third.is_found() {
                    let cause = first.failure().or(third.failure()).map(|f| f.kind);
                    return Err(PipelineFailure::AnalysisUnavailable { cause });
                }
                AnswerBody::Dual {
                    first_person: first.found(),
                    third_person: third.found(),
                }
            }
        };

        Ok(Answer {
            user: resolved.user,
            perspective,
            body,
        })
    }

    /// Search tweets (or fall back to the timeline) and pack them.
    async fn gather(&self, user: &Resolved, terms: Option<&str>, supplied: Vec<Tweet>) -> String {
        let searched = match terms {
            Some(terms) => self.twitter.search_by_user(&user.id, terms).await,
            None => Outcome::Empty,
        };

        let combined = match searched {
            Outcome::Found(hits) => {
                tracing::debug!(hits = hits.len(), "pipeline.search.hits");
                combine(hits, vec![supplied])
            }
            other => {
                if let Some(f) = other.failure() {
                    tracing::warn!(kind = f.kind.as_str(), "pipeline.search.failed");
                }
                let req = TimelineRequest {
                    pages: 1,
                    exclude_retweets: true,
                    exclude_replies: true,
                    until_id: oldest_id(&supplied).map(str::to_owned),
                };
                let timeline = self.twitter.fetch_timeline(&user.id, req).await;
                combine(supplied, vec![timeline.unwrap_or_default()])
            }
        };

        let context = self.packer.pack(&combined, self.settings.token_limit);
        tracing::debug!(
            tweets = combined.len(),
            words = context.split_whitespace().count(),
            "pipeline.context.packed"
        );
        context
    }

    async fn rewrite_if_needed(
        &self,
        question: &str,
        perspective: Perspective,
        target: Perspective,
    ) -> String {
        if perspective == target {
            return question.to_string();
        }
        self.llm.rewrite_perspective(question, target).await
    }

    async fn answer_one(
        &self,
        mode: AnswerMode,
        delivery: Delivery,
        subject: &Subject,
        context: &str,
        question: &str,
    ) -> Result<AnswerBody, PipelineFailure> {
        let llm = &self.llm;
        match (mode, delivery) {
            (AnswerMode::AsUser, Delivery::Streamed) => {
                into_body(llm.stream_answer_as_user(subject, context, question).await, AnswerBody::Stream)
            }
            (_, Delivery::Streamed) => {
                into_body(llm.stream_answer_about_user(subject, context, question).await, AnswerBody::Stream)
            }
            (AnswerMode::AsUser, Delivery::Buffered) => {
                into_body(llm.answer_as_user(subject, context, question).await, AnswerBody::Text)
            }
            (_, Delivery::Buffered) => {
                into_body(llm.answer_about_user(subject, context, question).await, AnswerBody::Text)
            }
        }
    }

    /// Answer a question from caller-supplied tweet text.
    pub async fn analyze_text(
        &self,
        tweet_text: Option<String>,
        question: Option<String>,
    ) -> Result<String, PipelineFailure> {
        self.ensure_ready()?;
        let (text, question) = match (tweet_text, question) {
            (Some(t), Some(q)) if !t.trim().is_empty() && !q.trim().is_empty() => (t, q),
            _ => return Err(PipelineFailure::MissingParameters),
        };
        let context = self.packer.clip(&text, self.settings.analysis_token_limit);
        unavailable_unless_found(self.llm.answer_from_text(&context, question.trim()).await)
    }

    /// Look up several accounts by handle.
    pub async fn lookup_users(&self, query: Option<String>) -> Result<Vec<UserIdentity>, PipelineFailure> {
        self.ensure_ready()?;
        let query = query
            .filter(|q| !q.trim().is_empty())
            .ok_or(PipelineFailure::MissingParameters)?;
        match self.twitter.lookup_users(&query).await {
            Outcome::Found(users) => Ok(users),
            other => {
                if let Some(f) = other.failure() {
                    tracing::warn!(kind = f.kind.as_str(), "pipeline.lookup_failed");
                }
                Err(PipelineFailure::NoUsers)
            }
        }
    }

    /// Identity plus the most recent page of original tweets.
    pub async fn profile(&self, username: &str) -> Result<Profile, PipelineFailure> {
        self.ensure_ready()?;
        let resolved = self.resolve(non_blank(username)?).await?;
        let req = TimelineRequest {
            pages: 1,
            exclude_retweets: true,
            exclude_replies: true,
            until_id: None,
        };
        match self.twitter.fetch_timeline(&resolved.id, req).await {
            Outcome::Found(tweets) => Ok(Profile {
                user: resolved.user,
                tweets,
            }),
            _ => Err(PipelineFailure::NoTweets),
        }
    }

    /// Psychologist-style description of the user from their timeline.
    pub async fn personality(&self, username: &str) -> Result<Analysis, PipelineFailure> {
        self.ensure_ready()?;
        let resolved = self.resolve(non_blank(username)?).await?;
        let req = TimelineRequest {
            pages: 2,
            exclude_retweets: true,
            exclude_replies: false,
            until_id: None,
        };
        let tweets = self.twitter.fetch_timeline(&resolved.id, req).await.unwrap_or_default();
        let context = self.packer.pack(&tweets, self.settings.analysis_token_limit);
        if context.is_empty() {
            return Err(PipelineFailure::NoTweets);
        }
        let analysis =
            unavailable_unless_found(self.llm.analyze_personality(&resolved.subject, &context).await)?;
        Ok(Analysis {
            user: resolved.user,
            analysis,
        })
    }

    /// How other accounts talk about the user, from recent mentions.
    pub async fn community_view(&self, username: &str) -> Result<Analysis, PipelineFailure> {
        self.ensure_ready()?;
        let resolved = self.resolve(non_blank(username)?).await?;
        let mentions = self
            .twitter
            .search_mentions(&resolved.id, &resolved.subject.handle)
            .await
            .unwrap_or_default();
        let context = self.packer.pack(&mentions, self.settings.analysis_token_limit);
        if context.is_empty() {
            return Err(PipelineFailure::NoTweets);
        }
        let analysis = unavailable_unless_found(
            self.llm
                .analyze_community_view(&resolved.subject, &context)
                .await,
        )?;
        Ok(Analysis {
            user: resolved.user,
            analysis,
        })
    }
}

fn target_for(mode: AnswerMode) -> Perspective {
    match mode {
        AnswerMode::AsUser => Perspective::Second,
        AnswerMode::AboutUser | AnswerMode::Both => Perspective::Third,
    }
}

fn non_blank(username: &str) -> Result<&str, PipelineFailure> {
    let trimmed = username.trim();
    if trimmed.is_empty() || trimmed == "@" {
        Err(PipelineFailure::MissingParameters)
    } else {
        Ok(trimmed)
    }
}

fn into_body<T>(outcome: Outcome<T>, wrap: fn(T) -> AnswerBody) -> Result<AnswerBody, PipelineFailure> {
    unavailable_unless_found(outcome).map(wrap)
}

fn unavailable_unless_found<T>(outcome: Outcome<T>) -> Result<T, PipelineFailure> {
    match outcome {
        Outcome::Found(v) => Ok(v),
        Outcome::Empty => {
            tracing::warn!("pipeline.answer.empty");
            Err(PipelineFailure::AnalysisUnavailable { cause: None })
        }
        Outcome::Failed(f) => {
            tracing::warn!(kind = f.kind.as_str(), detail = %f.detail, "pipeline.answer.failed");
            Err(PipelineFailure::AnalysisUnavailable {
                cause: Some(f.kind),
            })
        }
    }
}
