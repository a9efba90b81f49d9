//! Tweet aggregation and prompt construction.
//!
//! * [`sanitize`]: per-tweet text cleaning and short-tweet rejection
//! * [`combine`]: order-preserving merge of tweet sets, deduplicated by id
//! * [`pack`]: bounded prompt context from a tweet set
//! * [`orchestrator`]: the per-request flow over the Twitter and LLM gateways
pub mod combine;
pub mod orchestrator;
pub mod pack;
pub mod sanitize;

pub use combine::combine;
pub use orchestrator::{
    Analysis, Answer, AnswerBody, AnswerMode, Delivery, Orchestrator, PipelineFailure,
    PipelineSettings, Profile, QuestionInput, Readiness, SearchTermsPolicy,
};
pub use pack::Packer;
pub use sanitize::Sanitizer;
