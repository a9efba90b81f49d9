use perspec_common::{Tweet as DomainTweet, UserIdentity};
use serde::{Deserialize, Serialize};

/// `GET 2/users/by/username/:username`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub data: Option<User>,
    #[serde(default)]
    pub errors: Option<Vec<Problem>>,
}

/// `GET 2/users/by?usernames=`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub data: Option<Vec<User>>,
    #[serde(default)]
    pub errors: Option<Vec<Problem>>,
}

/// Timeline and recent-search pages share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetsResponse {
    #[serde(default)]
    pub data: Option<Vec<Tweet>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub result_count: Option<u32>,
}

/// Partial errors reported alongside a 200 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

impl From<User> for UserIdentity {
    fn from(user: User) -> Self {
        UserIdentity {
            id: Some(user.id),
            display_name: user.name,
            // `_normal` is the 48px thumbnail; without it the API serves the original.
            avatar_url: user.profile_image_url.map(|u| u.replacen("_normal", "", 1)),
            username: Some(user.username),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
}

impl From<Tweet> for DomainTweet {
    fn from(t: Tweet) -> Self {
        DomainTweet::new(t.id, t.text)
    }
}

impl TweetsResponse {
    pub fn into_tweets(self) -> Vec<DomainTweet> {
        self.data
            .unwrap_or_default()
            .into_iter()
            .map(DomainTweet::from)
            .collect()
    }

    pub fn next_token(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.next_token.as_deref())
    }
}
