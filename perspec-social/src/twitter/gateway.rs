//! Fail-soft Twitter access for the pipeline.
//!
//! Every operation reports an [`Outcome`]; nothing here returns `Err`.
use crate::twitter::client::TwitterApi;
use async_trait::async_trait;
use perspec_common::{Failure, FailureKind, Outcome, Tweet, UserIdentity};
use perspec_http::HttpError;

pub const MAX_TIMELINE_PAGES: u8 = 3;
pub const MAX_LOOKUP_HANDLES: usize = 100;

/// How much of a user's timeline to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRequest {
    /// Clamped to `1..=3`.
    pub pages: u8,
    pub exclude_retweets: bool,
    pub exclude_replies: bool,
    /// Only tweets older than this id.
    pub until_id: Option<String>,
}

impl Default for TimelineRequest {
    fn default() -> Self {
        Self {
            pages: 1,
            exclude_retweets: true,
            exclude_replies: false,
            until_id: None,
        }
    }
}

#[async_trait]
pub trait TwitterGateway: Send + Sync {
    async fn resolve_user(&self, username: &str) -> Outcome<UserIdentity>;
    async fn lookup_users(&self, query: &str) -> Outcome<Vec<UserIdentity>>;
    async fn fetch_timeline(&self, user_id: &str, req: TimelineRequest) -> Outcome<Vec<Tweet>>;
    async fn search_by_user(&self, user_id: &str, terms: &str) -> Outcome<Vec<Tweet>>;
    async fn search_mentions(&self, user_id: &str, handle: &str) -> Outcome<Vec<Tweet>>;
}

/// Classify a transport or API error.
pub fn failure_from_http(err: &HttpError) -> Failure {
    let kind = match err {
        HttpError::Api { status, .. } => match status.as_u16() {
            429 => FailureKind::RateLimited,
            404 => FailureKind::NotFound,
            _ => FailureKind::Upstream,
        },
        HttpError::Decode(..) => FailureKind::Malformed,
        HttpError::Network(_) => FailureKind::Network,
        HttpError::Timeout(_) => FailureKind::Timeout,
        HttpError::Url(_) | HttpError::Build(_) => FailureKind::Configuration,
    };
    Failure::new(kind, err.to_string())
}

/// Split a free-form query into valid handles (`[A-Za-z0-9_]{1,15}`).
///
/// ```
/// use perspec_social::twitter::parse_handles;
///
/// assert_eq!(
///     parse_handles("@jack, elonmusk  not-a-handle @@x"),
///     vec!["jack".to_string(), "elonmusk".to_string()]
/// );
/// ```
pub fn parse_handles(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in query.split(|c: char| c == ',' || c.is_whitespace()) {
        let handle = raw.strip_prefix('@').unwrap_or(raw);
        if is_valid_handle(handle) && !out.iter().any(|h| h.eq_ignore_ascii_case(handle)) {
            out.push(handle.to_string());
        }
        if out.len() == MAX_LOOKUP_HANDLES {
            break;
        }
    }
    out
}

/// Twitter handles are 1 to 15 ASCII letters, digits or underscores.
pub fn is_valid_handle(handle: &str) -> bool {
    (1..=15).contains(&handle.len())
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn failed<T>(op: &'static str, err: HttpError) -> Outcome<T> {
    let failure = failure_from_http(&err);
    tracing::warn!(op, kind = failure.kind.as_str(), error = %err, "twitter.call_failed");
    Outcome::Failed(failure)
}

#[async_trait]
impl TwitterGateway for TwitterApi {
    async fn resolve_user(&self, username: &str) -> Outcome<UserIdentity> {
        let handle = username.trim().trim_start_matches('@');
        if !is_valid_handle(handle) {
            tracing::info!(username, "twitter.user.invalid_handle");
            return Outcome::Empty;
        }
        match self.user_by_username(handle).await {
            Ok(resp) => match resp.data {
                Some(user) => Outcome::Found(user.into()),
                None => {
                    tracing::info!(handle, "twitter.user.not_found");
                    Outcome::Empty
                }
            },
            Err(err) => failed("resolve_user", err),
        }
    }

    async fn lookup_users(&self, query: &str) -> Outcome<Vec<UserIdentity>> {
        let handles = parse_handles(query);
        if handles.is_empty() {
            return Outcome::Empty;
        }
        match self.users_by_usernames(&handles).await {
            Ok(resp) => Outcome::from_collection(
                resp.data
                    .unwrap_or_default()
                    .into_iter()
                    .map(UserIdentity::from)
                    .collect(),
            ),
            Err(err) => failed("lookup_users", err),
        }
    }

    async fn fetch_timeline(&self, user_id: &str, req: TimelineRequest) -> Outcome<Vec<Tweet>> {
        let pages = req.pages.clamp(1, MAX_TIMELINE_PAGES);
        let mut exclude = Vec::new();
        if req.exclude_retweets {
            exclude.push("retweets");
        }
        if req.exclude_replies {
            exclude.push("replies");
        }

        let mut tweets = Vec::new();
        let mut token: Option<String> = None;
        for page in 0..pages {
            let until = if page == 0 { req.until_id.as_deref() } else { None };
            match self
                .user_tweets(user_id, &exclude, until, token.as_deref())
                .await
            {
                Ok(resp) => {
                    token = resp.next_token().map(str::to_owned);
                    tweets.extend(resp.into_tweets());
                }
                Err(err) if page == 0 => return failed("fetch_timeline", err),
                Err(err) => {
                    tracing::warn!(
                        user_id,
                        page = page + 1,
                        kept = tweets.len(),
                        error = %err,
                        "twitter.timeline.partial"
                    );
                    break;
                }
            }
            if token.is_none() {
                break;
            }
        }
        tracing::debug!(user_id, count = tweets.len(), "twitter.timeline.done");
        Outcome::from_collection(tweets)
    }

    async fn search_by_user(&self, user_id: &str, terms: &str) -> Outcome<Vec<Tweet>> {
        let query = format!("from:{user_id} ({terms})");
        match self.recent_search(&query).await {
            Ok(resp) => Outcome::from_collection(resp.into_tweets()),
            Err(err) => failed("search_by_user", err),
        }
    }

    async fn search_mentions(&self, user_id: &str, handle: &str) -> Outcome<Vec<Tweet>> {
        let handle = handle.trim_start_matches('@');
        let query = format!("to:{user_id} OR @{handle} -is:retweet");
        let mention = format!("@{handle}");
        match self.recent_search(&query).await {
            Ok(resp) => Outcome::from_collection(
                resp.into_tweets()
                    .into_iter()
                    .map(|t| Tweet::new(t.id, t.text.replace(&mention, "")))
                    .collect(),
            ),
            Err(err) => failed("search_mentions", err),
        }
    }
}
