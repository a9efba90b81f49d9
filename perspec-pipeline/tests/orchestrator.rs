mod common;

use common::{FakeLlm, FakeTwitter, tweet};
use futures::StreamExt;
use perspec_common::{FailureKind, Outcome, Perspective};
use perspec_pipeline::{
    AnswerBody, AnswerMode, Delivery, Orchestrator, PipelineFailure, PipelineSettings,
    QuestionInput, Readiness, SearchTermsPolicy,
};
use std::sync::Arc;

const LONG: &str = "this tweet has more than five words in it";

fn build(
    twitter: &Arc<FakeTwitter>,
    llm: &Arc<FakeLlm>,
    settings: PipelineSettings,
    readiness: Readiness,
) -> Orchestrator {
    Orchestrator::new(settings, readiness, twitter.clone(), llm.clone()).unwrap()
}

fn ready(twitter: &Arc<FakeTwitter>, llm: &Arc<FakeLlm>) -> Orchestrator {
    build(twitter, llm, PipelineSettings::default(), Readiness::Ready)
}

fn input(question: &str) -> QuestionInput {
    QuestionInput {
        username: Some("@ada".into()),
        question: Some(question.into()),
        tweets: Some(vec![tweet("300", LONG), tweet("200", "supplied tweet about engines and notes")]),
    }
}

#[tokio::test]
async fn misconfiguration_short_circuits_every_operation() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm::default());
    let orch = build(
        &twitter,
        &llm,
        PipelineSettings::default(),
        Readiness::Misconfigured {
            missing: vec!["llm.api_key".into()],
        },
    );

    let expected = PipelineFailure::Configuration {
        missing: vec!["llm.api_key".into()],
    };
    for mode in [AnswerMode::AsUser, AnswerMode::AboutUser, AnswerMode::Both] {
        let err = orch
            .answer_question(input("q?"), mode, Delivery::Buffered)
            .await
            .unwrap_err();
        assert_eq!(err, expected);
    }
    assert_eq!(orch.analyze_text(Some("t".into()), Some("q".into())).await.unwrap_err(), expected);
    assert_eq!(orch.lookup_users(Some("ada".into())).await.unwrap_err(), expected);
    assert_eq!(orch.profile("ada").await.unwrap_err(), expected);
    assert_eq!(orch.personality("ada").await.unwrap_err(), expected);
    assert_eq!(orch.community_view("ada").await.unwrap_err(), expected);
    assert_eq!(expected.to_string(), "Environment Configuration Error");

    assert_eq!(twitter.calls(), 0);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn missing_parameters_are_rejected_before_any_call() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm::default());
    let orch = ready(&twitter, &llm);

    let mut no_tweets = input("q?");
    no_tweets.tweets = None;
    let mut blank_question = input("   ");
    blank_question.username = Some("ada".into());

    for bad in [no_tweets, blank_question, QuestionInput::default()] {
        let err = orch
            .answer_question(bad, AnswerMode::AboutUser, Delivery::Buffered)
            .await
            .unwrap_err();
        assert_eq!(err, PipelineFailure::MissingParameters);
    }
    assert_eq!(twitter.calls() + llm.calls(), 0);
}

#[tokio::test]
async fn unknown_user_is_invalid() {
    let twitter = Arc::new(FakeTwitter {
        user: Outcome::Empty,
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::default());
    let err = ready(&twitter, &llm)
        .answer_question(input("q?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap_err();
    assert_eq!(err, PipelineFailure::InvalidUser);
    assert_eq!(err.to_string(), "Invalid user");
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn empty_search_terms_fail_under_require_policy() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm {
        terms: Outcome::Empty,
        ..Default::default()
    });
    let err = ready(&twitter, &llm)
        .answer_question(input("q?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap_err();
    assert_eq!(err, PipelineFailure::SearchTermsUnavailable);
    assert_eq!(err.retry_after_secs(), Some(60));
    assert!(twitter.search_queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fallback_policy_uses_timeline_when_terms_missing() {
    let twitter = Arc::new(FakeTwitter {
        timeline: Outcome::Found(vec![tweet("150", "older timeline tweet about the analytical engine")]),
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm {
        terms: Outcome::failed(FailureKind::RateLimited, "429"),
        ..Default::default()
    });
    let settings = PipelineSettings {
        search_terms: SearchTermsPolicy::FallBackToTimeline,
        ..Default::default()
    };
    let answer = build(&twitter, &llm, settings, Readiness::Ready)
        .answer_question(input("q?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap();
    assert!(matches!(answer.body, AnswerBody::Text(ref t) if t == "an answer"));
    assert!(twitter.search_queries.lock().unwrap().is_empty());

    let (_, context, _) = llm.answered.lock().unwrap()[0].clone();
    assert!(context.contains("analytical engine"));
}

#[tokio::test]
async fn search_hits_come_first_then_supplied_tweets() {
    let twitter = Arc::new(FakeTwitter {
        search: Outcome::Found(vec![
            tweet("500", "search hit one mentions rust and more words"),
            tweet("300", "duplicate of a supplied tweet with same id"),
        ]),
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::default());
    ready(&twitter, &llm)
        .answer_question(input("Does she like Rust?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap();

    assert_eq!(twitter.search_queries.lock().unwrap()[0], "42|\"rust\"");
    assert!(twitter.timeline_requests.lock().unwrap().is_empty());
    let (_, context, _) = llm.answered.lock().unwrap()[0].clone();
    let lines: Vec<&str> = context.lines().collect();
    assert_eq!(
        lines,
        vec![
            "search hit one mentions rust and more words",
            "duplicate of a supplied tweet with same id",
            "supplied tweet about engines and notes",
        ]
    );
}

#[tokio::test]
async fn empty_search_falls_back_to_timeline_before_oldest_supplied() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm::default());
    ready(&twitter, &llm)
        .answer_question(input("q?"), AnswerMode::AsUser, Delivery::Buffered)
        .await
        .unwrap();

    let reqs = twitter.timeline_requests.lock().unwrap();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].pages, 1);
    assert!(reqs[0].exclude_retweets && reqs[0].exclude_replies);
    assert_eq!(reqs[0].until_id.as_deref(), Some("200"));
}

#[tokio::test]
async fn no_usable_tweets_is_reported() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm::default());
    let mut short = input("q?");
    short.tweets = Some(vec![tweet("1", "too short")]);
    let err = ready(&twitter, &llm)
        .answer_question(short, AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap_err();
    assert_eq!(err, PipelineFailure::NoTweets);
    assert_eq!(err.retry_after_secs(), Some(180));
}

#[tokio::test]
async fn question_is_rewritten_only_when_perspective_differs() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm {
        perspective: Outcome::Found(Perspective::Third),
        rewritten: Some("rewritten".into()),
        ..Default::default()
    });
    let orch = ready(&twitter, &llm);

    orch.answer_question(input("What does she like?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap();
    assert!(llm.rewrites.lock().unwrap().is_empty());

    orch.answer_question(input("What does she like?"), AnswerMode::AsUser, Delivery::Buffered)
        .await
        .unwrap();
    assert_eq!(*llm.rewrites.lock().unwrap(), vec![Perspective::Second]);
    let answered = llm.answered.lock().unwrap();
    assert_eq!(answered[0].2, "What does she like?");
    assert_eq!(answered[1].0, "as");
    assert_eq!(answered[1].2, "rewritten (second)");
}

#[tokio::test]
async fn streamed_answer_yields_chunks() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm::default());
    let answer = ready(&twitter, &llm)
        .answer_question(input("q?"), AnswerMode::AsUser, Delivery::Streamed)
        .await
        .unwrap();
    let AnswerBody::Stream(stream) = answer.body else {
        panic!("expected a stream");
    };
    let text: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(text.concat(), "an answer");
    assert_eq!(llm.answered.lock().unwrap()[0].0, "as-stream");
}

#[tokio::test]
async fn failed_answer_is_analysis_unavailable() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm {
        answer: Outcome::failed(FailureKind::RateLimited, "429"),
        ..Default::default()
    });
    let err = ready(&twitter, &llm)
        .answer_question(input("q?"), AnswerMode::AboutUser, Delivery::Buffered)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineFailure::AnalysisUnavailable {
            cause: Some(FailureKind::RateLimited)
        }
    );
    assert!(err.to_string().contains("try again after a few minutes"));
}

#[tokio::test]
async fn dual_view_answers_both_ways() {
    let twitter = Arc::new(FakeTwitter::default());
    let llm = Arc::new(FakeLlm {
        perspective: Outcome::Found(Perspective::First),
        rewritten: Some("r".into()),
        ..Default::default()
    });
    let answer = ready(&twitter, &llm)
        .answer_question(input("Do I like tea?"), AnswerMode::Both, Delivery::Streamed)
        .await
        .unwrap();
    match answer.body {
        AnswerBody::Dual {
            first_person,
            third_person,
        } => {
            assert_eq!(first_person.as_deref(), Some("an answer"));
            assert_eq!(third_person.as_deref(), Some("an answer"));
        }
        other => panic!("unexpected body {other:?}"),
    }
    let mut targets = llm.rewrites.lock().unwrap().clone();
    targets.sort_by_key(|p| p.as_str());
    assert_eq!(targets, vec![Perspective::Second, Perspective::Third]);
}

#[tokio::test]
async fn supplementary_operations() {
    let twitter = Arc::new(FakeTwitter {
        timeline: Outcome::Found(vec![tweet("9", LONG)]),
        mentions: Outcome::Found(vec![tweet("8", "people say she writes excellent notes")]),
        users: Outcome::Empty,
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::default());
    let orch = ready(&twitter, &llm);

    let profile = orch.profile("ada").await.unwrap();
    assert_eq!(profile.tweets.len(), 1);
    assert_eq!(profile.user.username.as_deref(), Some("ada"));

    let personality = orch.personality("ada").await.unwrap();
    assert_eq!(personality.analysis, "an answer");
    assert_eq!(twitter.timeline_requests.lock().unwrap()[1].pages, 2);

    let community = orch.community_view("ada").await.unwrap();
    assert_eq!(community.analysis, "an answer");

    assert_eq!(
        orch.lookup_users(Some("nobody".into())).await.unwrap_err(),
        PipelineFailure::NoUsers
    );
    assert_eq!(
        orch.lookup_users(None).await.unwrap_err(),
        PipelineFailure::MissingParameters
    );
    assert_eq!(
        orch.analyze_text(Some("tweets".into()), Some("why?".into())).await.unwrap(),
        "an answer"
    );
    assert_eq!(orch.profile("  ").await.unwrap_err(), PipelineFailure::MissingParameters);
}
