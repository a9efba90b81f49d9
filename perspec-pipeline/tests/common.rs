use async_trait::async_trait;
use perspec_common::{Outcome, Perspective, Tweet, UserIdentity};
use perspec_llm::{LlmGateway, Subject, TextStream};
use perspec_social::twitter::{TimelineRequest, TwitterGateway};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn tweet(id: &str, text: &str) -> Tweet {
    Tweet::new(id, text)
}

pub fn ada() -> UserIdentity {
    UserIdentity {
        id: Some("42".into()),
        display_name: Some("Ada Lovelace".into()),
        avatar_url: None,
        username: Some("ada".into()),
    }
}

/// In-memory Twitter with canned outcomes and call accounting.
pub struct FakeTwitter {
    pub user: Outcome<UserIdentity>,
    pub users: Outcome<Vec<UserIdentity>>,
    pub search: Outcome<Vec<Tweet>>,
    pub timeline: Outcome<Vec<Tweet>>,
    pub mentions: Outcome<Vec<Tweet>>,
    pub calls: AtomicUsize,
    pub search_queries: Mutex<Vec<String>>,
    pub timeline_requests: Mutex<Vec<TimelineRequest>>,
}

impl Default for FakeTwitter {
    fn default() -> Self {
        Self {
            user: Outcome::Found(ada()),
            users: Outcome::Found(vec![ada()]),
            search: Outcome::Empty,
            timeline: Outcome::Empty,
            mentions: Outcome::Empty,
            calls: AtomicUsize::new(0),
            search_queries: Mutex::new(Vec::new()),
            timeline_requests: Mutex::new(Vec::new()),
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
        self.users.clone()
    }

    async fn fetch_timeline(&self, _user_id: &str, req: TimelineRequest) -> Outcome<Vec<Tweet>> {
        self.hit();
        self.timeline_requests.lock().unwrap().push(req);
        self.timeline.clone()
    }

    async fn search_by_user(&self, user_id: &str, terms: &str) -> Outcome<Vec<Tweet>> {
        self.hit();
        self.search_queries
            .lock()
            .unwrap()
            .push(format!("{user_id}|{terms}"));
        self.search.clone()
    }

    async fn search_mentions(&self, _user_id: &str, _handle: &str) -> Outcome<Vec<Tweet>> {
        self.hit();
        self.mentions.clone()
    }
}

/// In-memory LLM with canned outcomes; records what it was asked.
pub struct FakeLlm {
    pub terms: Outcome<String>,
    pub perspective: Outcome<Perspective>,
    pub rewritten: Option<String>,
    pub answer: Outcome<String>,
    pub stream_chunks: Option<Vec<String>>,
    pub calls: AtomicUsize,
    pub rewrites: Mutex<Vec<Perspective>>,
    pub answered: Mutex<Vec<(String, String, String)>>,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            terms: Outcome::Found("\"rust\"".into()),
            perspective: Outcome::Found(Perspective::Third),
            rewritten: None,
            answer: Outcome::Found("an answer".into()),
            stream_chunks: Some(vec!["an ".into(), "answer".into()]),
            calls: AtomicUsize::new(0),
            rewrites: Mutex::new(Vec::new()),
            answered: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, kind: &str, context: &str, question: &str) {
        self.answered
            .lock()
            .unwrap()
            .push((kind.to_string(), context.to_string(), question.to_string()));
    }

    fn stream(&self) -> Outcome<TextStream> {
        match &self.stream_chunks {
            Some(chunks) => {
                let items: Vec<Result<String, perspec_llm::traits::LlmError>> =
                    chunks.iter().cloned().map(Ok).collect();
                Outcome::Found(Box::pin(futures::stream::iter(items)))
            }
            None => Outcome::failed(perspec_common::FailureKind::RateLimited, "429"),
        }
    }
}

#[async_trait]
impl LlmGateway for FakeLlm {
    async fn extract_search_terms(&self, _question: &str) -> Outcome<String> {
        self.hit();
        self.terms.clone()
    }

    async fn classify_perspective(&self, _question: &str) -> Outcome<Perspective> {
        self.hit();
        self.perspective.clone()
    }

    async fn rewrite_perspective(&self, question: &str, target: Perspective) -> String {
        self.hit();
        self.rewrites.lock().unwrap().push(target);
        match &self.rewritten {
            Some(r) => format!("{r} ({target})"),
            None => question.to_string(),
        }
    }

    async fn answer_about_user(&self, _s: &Subject, context: &str, question: &str) -> Outcome<String> {
        self.hit();
        self.record("about", context, question);
        self.answer.clone()
    }

    async fn stream_answer_about_user(&self, _s: &Subject, context: &str, question: &str) -> Outcome<TextStream> {
        self.hit();
        self.record("about-stream", context, question);
        self.stream()
    }

    async fn answer_as_user(&self, _s: &Subject, context: &str, question: &str) -> Outcome<String> {
        self.hit();
        self.record("as", context, question);
        self.answer.clone()
    }

    async fn stream_answer_as_user(&self, _s: &Subject, context: &str, question: &str) -> Outcome<TextStream> {
        self.hit();
        self.record("as-stream", context, question);
        self.stream()
    }

    async fn analyze_personality(&self, _s: &Subject, context: &str) -> Outcome<String> {
        self.hit();
        self.record("personality", context, "");
        self.answer.clone()
    }

    async fn analyze_community_view(&self, _s: &Subject, mentions: &str) -> Outcome<String> {
        self.hit();
        self.record("community", mentions, "");
        self.answer.clone()
    }

    async fn answer_from_text(&self, tweet_text: &str, question: &str) -> Outcome<String> {
        self.hit();
        self.record("text", tweet_text, question);
        self.answer.clone()
    }

    async fn reachable(&self) -> bool {
        self.hit();
        true
    }
}
