#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use perspec_common::observability::{LogConfig, LogFormat};
use perspec_common::{FailureKind, Outcome, Perspective, Tweet, UserIdentity};
use perspec_config::ServerConfig;
use perspec_llm::{LlmGateway, Subject, TextStream};
use perspec_pipeline::{Orchestrator, PipelineSettings, Readiness};
use perspec_server::app::{AppState, router};
use perspec_social::twitter::{TimelineRequest, TwitterGateway};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "perspec-server-tests".to_string(),
            log_dir: Some(std::env::temp_dir().join("perspec-tests")),
            emit_stderr: true,
            format: LogFormat::from_name(
                &std::env::var("PERSPEC_LOG_FORMAT").unwrap_or_default(),
            ),
            default_filter: "debug".to_string(),
        };

        perspec_common::observability::init_logging(config).unwrap_or_default()
    });
}

pub fn ada() -> UserIdentity {
    UserIdentity {
        id: Some("42".into()),
        display_name: Some("Ada Lovelace".into()),
        avatar_url: Some("https://pbs.twimg.com/ada.jpg".into()),
        username: Some("ada".into()),
    }
}

pub fn supplied_tweets() -> Vec<Tweet> {
    vec![
        Tweet::new("300", "I really do enjoy writing small compilers in rust"),
        Tweet::new("200", "The analytical engine weaves algebraic patterns like a loom"),
    ]
}

pub struct FakeTwitter {
    pub user: Outcome<UserIdentity>,
    pub timeline: Outcome<Vec<Tweet>>,
    pub calls: AtomicUsize,
}

impl Default for FakeTwitter {
    fn default() -> Self {
        Self {
            user: Outcome::Found(ada()),
            timeline: Outcome::Found(supplied_tweets()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeTwitter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TwitterGateway for FakeTwitter {
    async fn resolve_user(&self, _username: &str) -> Outcome<UserIdentity> {
        self.hit();
        self.user.clone()
    }

    async fn lookup_users(&self, _query: &str) -> Outcome<Vec<UserIdentity>> {
        self.hit();
        Outcome::Found(vec![ada()])
    }

    async fn fetch_timeline(&self, _user_id: &str, _req: TimelineRequest) -> Outcome<Vec<Tweet>> {
        self.hit();
        self.timeline.clone()
    }

    async fn search_by_user(&self, _user_id: &str, _terms: &str) -> Outcome<Vec<Tweet>> {
        self.hit();
        Outcome::Empty
    }

    async fn search_mentions(&self, _user_id: &str, _handle: &str) -> Outcome<Vec<Tweet>> {
        self.hit();
        self.timeline.clone()
    }
}

pub struct FakeLlm {
    pub answer: Outcome<String>,
    pub calls: AtomicUsize,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            answer: Outcome::Found("She likes engines.".into()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> Outcome<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn stream(&self) -> Outcome<TextStream> {
        match self.hit() {
            Outcome::Found(text) => {
                let (head, tail) = text.split_at(text.len() / 2);
                let chunks = vec![Ok(head.to_string()), Ok(tail.to_string())];
                Outcome::Found(Box::pin(futures::stream::iter(chunks)))
            }
            _ => Outcome::failed(FailureKind::RateLimited, "429"),
        }
    }
}

#[async_trait]
impl LlmGateway for FakeLlm {
    async fn extract_search_terms(&self, _question: &str) -> Outcome<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Found("\"engines\"".into())
    }

    async fn classify_perspective(&self, _question: &str) -> Outcome<Perspective> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Found(Perspective::Third)
    }

    async fn rewrite_perspective(&self, question: &str, _target: Perspective) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        question.to_string()
    }

    async fn answer_about_user(&self, _s: &Subject, _context: &str, _question: &str) -> Outcome<String> {
        self.hit()
    }

    async fn stream_answer_about_user(&self, _s: &Subject, _context: &str, _question: &str) -> Outcome<TextStream> {
        self.stream()
    }

    async fn answer_as_user(&self, _s: &Subject, _context: &str, _question: &str) -> Outcome<String> {
        self.hit()
    }

    async fn stream_answer_as_user(&self, _s: &Subject, _context: &str, _question: &str) -> Outcome<TextStream> {
        self.stream()
    }

    async fn analyze_personality(&self, _s: &Subject, _context: &str) -> Outcome<String> {
        self.hit()
    }

    async fn analyze_community_view(&self, _s: &Subject, _mentions: &str) -> Outcome<String> {
        self.hit()
    }

    async fn answer_from_text(&self, _tweet_text: &str, _question: &str) -> Outcome<String> {
        self.hit()
    }

    async fn reachable(&self) -> bool {
        self.hit().is_found()
    }
}

pub fn app(readiness: Readiness, twitter: Arc<FakeTwitter>, llm: Arc<FakeLlm>) -> Router {
    init_test_tracing();
    let orchestrator = Orchestrator::new(PipelineSettings::default(), readiness, twitter, llm)
        .expect("sanitizer patterns compile");
    router(AppState::new(orchestrator), &ServerConfig::default())
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("valid request")
}
