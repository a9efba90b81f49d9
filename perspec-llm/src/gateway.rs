//! Fail-soft LLM operations used by the pipeline.
//!
//! [`PromptedGateway`] renders a [`PromptBook`] entry, calls the
//! [`LlmClient`], and folds the result into an [`Outcome`]. Errors are
//! logged here and never propagated.
use crate::prompts::{PromptBook, UseCase};
use crate::traits::{CompletionRequest, LlmClient, LlmError, TextStream};
use async_trait::async_trait;
use perspec_common::{Outcome, Perspective};
use std::sync::Arc;

/// The person a question is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Display name.
    pub name: String,
    /// Handle without `@`.
    pub handle: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn extract_search_terms(&self, question: &str) -> Outcome<String>;
    async fn classify_perspective(&self, question: &str) -> Outcome<Perspective>;
    /// Falls back to `question` unchanged when the rewrite fails or is blank.
    async fn rewrite_perspective(&self, question: &str, target: Perspective) -> String;
    async fn answer_about_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<String>;
    async fn stream_answer_about_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<TextStream>;
    async fn answer_as_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<String>;
    async fn stream_answer_as_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<TextStream>;
    async fn analyze_personality(&self, subject: &Subject, context: &str) -> Outcome<String>;
    async fn analyze_community_view(&self, subject: &Subject, mentions: &str) -> Outcome<String>;
    async fn answer_from_text(&self, tweet_text: &str, question: &str) -> Outcome<String>;
    /// Whether the provider currently answers at all.
    async fn reachable(&self) -> bool;
}

/// Turn a raw comma/newline separated completion into a search fragment.
///
/// ```
/// use perspec_llm::gateway::parse_search_terms;
///
/// assert_eq!(
///     parse_search_terms(" cats, \"dogs\"\n\npets,,a\n"),
///     "\"cats\" OR \"dogs\" OR \"pets\""
/// );
/// assert_eq!(parse_search_terms("\n,\n"), "");
/// ```
pub fn parse_search_terms(raw: &str) -> String {
    raw.replace('\n', ",")
        .replace('"', "")
        .split(',')
        .map(str::trim)
        .filter(|term| term.chars().count() > 1)
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub struct PromptedGateway {
    client: Arc<dyn LlmClient>,
    book: PromptBook,
}

impl PromptedGateway {
    pub fn new(client: Arc<dyn LlmClient>, book: PromptBook) -> Self {
        Self { client, book }
    }

    pub fn book(&self) -> &PromptBook {
        &self.book
    }

    async fn run(&self, use_case: UseCase, vars: &[(&str, &str)]) -> Outcome<String> {
        let req = self.book.request(use_case, vars);
        match self.client.complete(&req).await {
            Ok(resp) => {
                tracing::debug!(
                    use_case = use_case.key(),
                    tokens_used = resp.tokens_used,
                    "llm.call.done"
                );
                Outcome::from_text(resp.text.trim().to_string())
            }
            Err(e) => failed(use_case, &req, e),
        }
    }

    async fn run_stream(&self, use_case: UseCase, vars: &[(&str, &str)]) -> Outcome<TextStream> {
        let req = self.book.request(use_case, vars);
        match self.client.complete_stream(&req).await {
            Ok(stream) => Outcome::Found(stream),
            Err(e) => failed(use_case, &req, e),
        }
    }
}

fn failed<T>(use_case: UseCase, req: &CompletionRequest, err: LlmError) -> Outcome<T> {
    let failure = err.to_failure();
    tracing::warn!(
        use_case = use_case.key(),
        model = %req.model,
        kind = failure.kind.as_str(),
        error = %err,
        "llm.call_failed"
    );
    Outcome::Failed(failure)
}

#[async_trait]
impl LlmGateway for PromptedGateway {
    async fn extract_search_terms(&self, question: &str) -> Outcome<String> {
        match self.run(UseCase::ExtractTerms, &[("question", question)]).await {
            Outcome::Found(raw) => Outcome::from_text(parse_search_terms(&raw)),
            other => other,
        }
    }

    async fn classify_perspective(&self, question: &str) -> Outcome<Perspective> {
        self.run(UseCase::ClassifyPerspective, &[("question", question)])
            .await
            .map(|label| Perspective::parse_label(&label))
    }

    async fn rewrite_perspective(&self, question: &str, target: Perspective) -> String {
        let vars = [("question", question), ("target", target.as_str())];
        match self.run(UseCase::RewritePerspective, &vars).await {
            Outcome::Found(text) => {
                let cleaned = text.trim().trim_matches('"').trim();
                if cleaned.is_empty() {
                    question.to_string()
                } else {
                    cleaned.to_string()
                }
            }
            _ => question.to_string(),
        }
    }

    async fn answer_about_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<String> {
        let vars = subject_vars(subject, context, question);
        self.run(UseCase::AnswerAbout, &vars).await
    }

    async fn stream_answer_about_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<TextStream> {
        let vars = subject_vars(subject, context, question);
        self.run_stream(UseCase::AnswerAbout, &vars).await
    }

    async fn answer_as_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<String> {
        let vars = subject_vars(subject, context, question);
        self.run(UseCase::AnswerAs, &vars).await
    }

    async fn stream_answer_as_user(&self, subject: &Subject, context: &str, question: &str) -> Outcome<TextStream> {
        let vars = subject_vars(subject, context, question);
        self.run_stream(UseCase::AnswerAs, &vars).await
    }

    async fn analyze_personality(&self, subject: &Subject, context: &str) -> Outcome<String> {
        let vars = subject_vars(subject, context, "");
        self.run(UseCase::AnalyzePersonality, &vars).await
    }

    async fn analyze_community_view(&self, subject: &Subject, mentions: &str) -> Outcome<String> {
        let vars = subject_vars(subject, mentions, "");
        self.run(UseCase::AnalyzeCommunity, &vars).await
    }

    async fn answer_from_text(&self, tweet_text: &str, question: &str) -> Outcome<String> {
        self.run(
            UseCase::AnswerFromText,
            &[("tweets", tweet_text), ("question", question)],
        )
        .await
    }

    async fn reachable(&self) -> bool {
        self.client.health_check().await
    }
}

fn subject_vars<'a>(subject: &'a Subject, tweets: &'a str, question: &'a str) -> [(&'static str, &'a str); 4] {
    [
        ("name", subject.name.as_str()),
        ("handle", subject.handle.as_str()),
        ("tweets", tweets),
        ("question", question),
    ]
}
