//! Turns a loaded [`PerspecConfig`] into a running service.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use perspec_config::{ConfigIssue, PerspecConfig, SearchTermsSetting};
use perspec_pipeline::{Orchestrator, PipelineSettings, Readiness, SearchTermsPolicy};
use perspec_runtime::ShutdownHandle;
use perspec_social::twitter::TwitterApi;

use crate::app::{AppState, router};

pub fn pipeline_settings(cfg: &PerspecConfig) -> PipelineSettings {
    PipelineSettings {
        token_limit: cfg.pipeline.token_limit,
        analysis_token_limit: cfg.pipeline.analysis_token_limit,
        min_words: cfg.pipeline.min_words,
        search_terms: match cfg.pipeline.search_terms {
            SearchTermsSetting::Require => SearchTermsPolicy::Require,
            SearchTermsSetting::FallBackToTimeline => SearchTermsPolicy::FallBackToTimeline,
        },
    }
}

/// Build the pipeline with the configured gateways.
///
/// Missing credentials do not abort startup: the service comes up in a
/// misconfigured state and answers every request with a configuration
/// error without contacting either upstream.
pub fn build_orchestrator(cfg: &PerspecConfig) -> anyhow::Result<Orchestrator> {
    let (readiness, bearer, api_key) = match cfg.credentials() {
        Ok(creds) => (Readiness::Ready, creds.twitter_bearer, creds.llm_api_key),
        Err(ConfigIssue::Missing(keys)) => {
            tracing::error!(missing = ?keys, "startup.credentials_missing");
            let missing = keys.into_iter().map(str::to_string).collect();
            (Readiness::Misconfigured { missing }, String::new(), String::new())
        }
    };

    let twitter = TwitterApi::new(bearer, &cfg.twitter.base_url)
        .with_context(|| format!("invalid twitter.base_url: {}", cfg.twitter.base_url))?;
    let llm = perspec_llm::connect(&cfg.llm, &api_key)
        .with_context(|| format!("invalid llm.endpoint: {}", cfg.llm.endpoint))?;

    Orchestrator::new(
        pipeline_settings(cfg),
        readiness,
        Arc::new(twitter),
        Arc::new(llm),
    )
    .context("failed to compile sanitizer patterns")
}

/// Bind and serve until `shutdown` fires.
pub async fn serve(cfg: PerspecConfig, shutdown: ShutdownHandle) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&cfg)?;
    let state = AppState::new(orchestrator);
    let app = router(state, &cfg.server);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cfg.server.host, cfg.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "server.listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server.stopped");
    Ok(())
}
