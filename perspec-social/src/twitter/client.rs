//! Thin wrapper around the Twitter/X v2 endpoints Perspec reads from.
//!
//! Handles auth and request parameter shaping before delegating to the
//! shared HTTP client. Every method returns the raw `HttpError`; mapping to
//! [`perspec_common::Outcome`] happens in the gateway layer.
use crate::twitter::types::{TweetsResponse, UserResponse, UsersResponse};
use perspec_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";
pub const PAGE_SIZE: u32 = 100;

type Params<'a> = Vec<(&'a str, Cow<'a, str>)>;

#[derive(Clone)]
pub struct TwitterApi {
    http: HttpClient,
    bearer: String,
}

impl std::fmt::Debug for TwitterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterApi")
            .field("base", &self.http.base().as_str())
            .finish_non_exhaustive()
    }
}

impl TwitterApi {
    pub fn new(bearer_token: impl Into<String>, base_url: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
            bearer: bearer_token.into(),
        })
    }

    /// Swap the underlying client (custom timeouts or retry counts).
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    fn opts<'a>(&'a self, query: Params<'a>) -> RequestOpts<'a> {
        RequestOpts {
            auth: Some(Auth::Bearer(&self.bearer)),
            query: Some(query),
            ..Default::default()
        }
    }

    pub async fn user_by_username(&self, username: &str) -> Result<UserResponse, HttpError> {
        let path = format!("2/users/by/username/{username}");
        self.http
            .get_json(
                &path,
                self.opts(vec![("user.fields", "profile_image_url".into())]),
            )
            .await
    }

    pub async fn users_by_usernames(&self, usernames: &[String]) -> Result<UsersResponse, HttpError> {
        self.http
            .get_json(
                "2/users/by",
                self.opts(vec![
                    ("usernames", usernames.join(",").into()),
                    ("user.fields", "profile_image_url".into()),
                ]),
            )
            .await
    }

    /// One page of a user's timeline, newest first.
    pub async fn user_tweets(
        &self,
        user_id: &str,
        exclude: &[&str],
        until_id: Option<&str>,
        pagination_token: Option<&str>,
    ) -> Result<TweetsResponse, HttpError> {
        let path = format!("2/users/{user_id}/tweets");
        let mut params: Params<'_> = vec![("max_results", PAGE_SIZE.to_string().into())];
        if !exclude.is_empty() {
            params.push(("exclude", exclude.join(",").into()));
        }
        if let Some(id) = until_id {
            params.push(("until_id", id.into()));
        }
        if let Some(token) = pagination_token {
            params.push(("pagination_token", token.into()));
        }
        self.http.get_json(&path, self.opts(params)).await
    }

    /// `GET 2/tweets/search/recent` over the last seven days.
    pub async fn recent_search(&self, query: &str) -> Result<TweetsResponse, HttpError> {
        // The endpoint rejects windows older than 7 days or ending less than 10s ago.
        let now = OffsetDateTime::now_utc();
        let start = now - Duration::days(7) + Duration::minutes(1);
        let end = now - Duration::seconds(20);
        let fmt = |t: OffsetDateTime| {
            t.format(&Rfc3339)
                .map_err(|e| HttpError::Build(format!("time format: {e}")))
        };

        let params: Params<'_> = vec![
            ("query", query.into()),
            ("max_results", PAGE_SIZE.to_string().into()),
            ("start_time", fmt(start)?.into()),
            ("end_time", fmt(end)?.into()),
        ];

        let resp: TweetsResponse = self
            .http
            .get_json("2/tweets/search/recent", self.opts(params))
            .await?;
        tracing::debug!(
            query,
            result_count = resp.meta.as_ref().and_then(|m| m.result_count),
            "twitter.search.done"
        );
        Ok(resp)
    }
}
