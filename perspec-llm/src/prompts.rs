//! Prompt templates and generation parameters, one entry per use case.
//!
//! Templates use `{name}`, `{handle}`, `{tweets}`, `{question}` and
//! `{target}` placeholders. Substitution is single pass, so placeholder-like
//! text inside tweets is left alone.
use crate::traits::CompletionRequest;
use perspec_config::ProfileOverride;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    ExtractTerms,
    ClassifyPerspective,
    RewritePerspective,
    AnswerAbout,
    AnswerAs,
    AnalyzePersonality,
    AnalyzeCommunity,
    AnswerFromText,
}

impl UseCase {
    pub const ALL: [UseCase; 8] = [
        UseCase::ExtractTerms,
        UseCase::ClassifyPerspective,
        UseCase::RewritePerspective,
        UseCase::AnswerAbout,
        UseCase::AnswerAs,
        UseCase::AnalyzePersonality,
        UseCase::AnalyzeCommunity,
        UseCase::AnswerFromText,
    ];

    /// Key used under `llm.overrides` in configuration.
    pub fn key(&self) -> &'static str {
        match self {
            UseCase::ExtractTerms => "extract_terms",
            UseCase::ClassifyPerspective => "classify_perspective",
            UseCase::RewritePerspective => "rewrite_perspective",
            UseCase::AnswerAbout => "answer_about",
            UseCase::AnswerAs => "answer_as",
            UseCase::AnalyzePersonality => "analyze_personality",
            UseCase::AnalyzeCommunity => "analyze_community",
            UseCase::AnswerFromText => "answer_from_text",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub template: &'static str,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

const EXTRACT_TERMS: &str = "List several search terms, separated by commas, based on the following question.\n\nQuestion: {question}\n\nSearch Terms:";

const CLASSIFY_PERSPECTIVE: &str = "Decide whether the following question is written in the first, second, or third person. Reply with exactly one word: first, second, or third.\n\nQuestion: {question}\n\nPerspective:";

const REWRITE_PERSPECTIVE: &str = "Convert this question to a {target} person question. Reply with the converted question only.\n\nQuestion: {question}\n\nConverted question:";

const ANSWER_ABOUT: &str = "Read the following user details, including real name and tweets, and then answer the following question about the user in the tone of a psychologist. Explain your answer. If it isn't possible to answer based on the tweets, you should speculate.\n\n\"\"\"\nName: {name}\nTweets: {tweets}.\n\"\"\"\n\nQuestion: {question}\n\nAnswer:";

const ANSWER_AS: &str = "\"\"\"\n{tweets}\n\"\"\"\n\nThe above text is a list of tweets made by {name}. Using the tweets, pretend to be this person and answer the following question in their speaking style and language.\n\nQuestion: {question}\n\nAnswer:";

const ANALYZE_PERSONALITY: &str = "Provided a person's tweets, their handle, and their real name, act as a psychologist and describe the person. Make sure to talk about both their success and failures. Be specific and speculate.\n\n\"\"\"\nName: {name}\nHandle: {handle}\nTweets: {tweets}.\n\"\"\"\n\nAnalysis:";

const ANALYZE_COMMUNITY: &str = "Provided tweets directed at a person, their handle, and their real name, describe how people see the person. Be specific and speculate.\n\n\"\"\"\nName: {name}\nHandle: {handle}\nTweets: {tweets}.\n\"\"\"\n\nAnalysis:";

const ANSWER_FROM_TEXT: &str =
    "Provided some tweets, and the question about the user.\nTweets: {tweets}.\nQuestion: {question}\nAnswer:";

fn default_profile(use_case: UseCase) -> Profile {
    let (template, temperature, max_tokens, presence, frequency) = match use_case {
        UseCase::ExtractTerms => (EXTRACT_TERMS, 0.2, 50, None, None),
        UseCase::ClassifyPerspective => (CLASSIFY_PERSPECTIVE, 0.0, 5, None, None),
        UseCase::RewritePerspective => (REWRITE_PERSPECTIVE, 0.1, 100, None, None),
        UseCase::AnswerAbout => (ANSWER_ABOUT, 0.4, 200, None, None),
        UseCase::AnswerAs => (ANSWER_AS, 0.6, 150, None, None),
        UseCase::AnalyzePersonality => (ANALYZE_PERSONALITY, 0.8, 300, Some(0.3), Some(0.1)),
        UseCase::AnalyzeCommunity => (ANALYZE_COMMUNITY, 0.5, 300, Some(0.3), Some(0.1)),
        UseCase::AnswerFromText => (ANSWER_FROM_TEXT, 0.75, 300, None, None),
    };
    Profile {
        template,
        model: None,
        temperature,
        max_tokens,
        presence_penalty: presence,
        frequency_penalty: frequency,
    }
}

/// The full table of use cases, with configuration overrides applied.
///
/// ```
/// use perspec_llm::prompts::{PromptBook, UseCase};
///
/// let book = PromptBook::new("gpt-4o-mini");
/// let req = book.request(UseCase::ExtractTerms, &[("question", "Does he like cats?")]);
/// assert!(req.prompt.ends_with("Question: Does he like cats?\n\nSearch Terms:"));
/// assert_eq!(req.max_tokens, 50);
/// ```
#[derive(Debug, Clone)]
pub struct PromptBook {
    default_model: String,
    profiles: HashMap<UseCase, Profile>,
}

impl PromptBook {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            profiles: UseCase::ALL
                .into_iter()
                .map(|u| (u, default_profile(u)))
                .collect(),
        }
    }

    pub fn with_overrides(mut self, overrides: &HashMap<String, ProfileOverride>) -> Self {
        for (key, o) in overrides {
            let Some(use_case) = UseCase::from_key(key) else {
                tracing::warn!(key = %key, "llm.prompt_override.unknown_use_case");
                continue;
            };
            if let Some(profile) = self.profiles.get_mut(&use_case) {
                if let Some(model) = &o.model {
                    profile.model = Some(model.clone());
                }
                if let Some(t) = o.temperature {
                    profile.temperature = t;
                }
                if let Some(m) = o.max_tokens {
                    profile.max_tokens = m;
                }
            }
        }
        self
    }

    pub fn profile(&self, use_case: UseCase) -> Profile {
        self.profiles
            .get(&use_case)
            .cloned()
            .unwrap_or_else(|| default_profile(use_case))
    }

    /// Render the template for `use_case` and attach its parameters.
    pub fn request(&self, use_case: UseCase, vars: &[(&str, &str)]) -> CompletionRequest {
        let profile = self.profile(use_case);
        CompletionRequest {
            model: profile
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            system_prompt: None,
            prompt: render(profile.template, vars),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            presence_penalty: profile.presence_penalty,
            frequency_penalty: profile.frequency_penalty,
        }
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
