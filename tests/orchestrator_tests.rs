mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use themis_scan::analyzer::AnalysisRequest;
use themis_scan::orchestrator::{ModelCandidate, Orchestrator, RetryPolicy};
use themis_scan::provider::{AttemptOutcome, FailureKind, ProbeError, ProviderKind};
use themis_scan::AnalysisError;

fn request() -> AnalysisRequest {
    AnalysisRequest {
        contract_text: "CLÁUSULA 1 - O CONTRATANTE pagará R$ 1.000,00 mensais.".to_string(),
        context: None,
    }
}

fn gemini_candidates(models: &[&str]) -> Vec<ModelCandidate> {
    models
        .iter()
        .enumerate()
        .map(|(order, model)| ModelCandidate::new(ProviderKind::Gemini, *model, order as u32))
        .collect()
}

fn orchestrator(candidates: Vec<ModelCandidate>, provider: &Arc<ScriptedProvider>) -> Orchestrator {
    Orchestrator::new(candidates, RetryPolicy::default()).with_provider(provider.clone())
}

fn gaps(calls: &[Call]) -> Vec<Duration> {
    calls.windows(2).map(|pair| pair[1].at - pair[0].at).collect()
}

#[tokio::test(start_paused = true)]
async fn test_first_candidate_success_makes_one_call() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).script("a", vec![success()]));
    let raw = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(raw, sample_analysis_json());
    assert_eq!(provider.models_called(), vec!["a"]);
    assert_eq!(provider.probe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_aborts_after_one_attempt() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .script("a", vec![unauthorized()])
            .script("b", vec![success()]),
    );
    let err = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Credential { .. }));
    assert_eq!(provider.models_called(), vec!["a"]);
    assert_eq!(provider.probe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off_then_falls_back() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .script("a", vec![rate_limited()])
            .script("b", vec![success()]),
    );
    let raw = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(raw, sample_analysis_json());
    let calls = provider.calls();
    let models: Vec<&str> = calls.iter().map(|c| c.model.as_str()).collect();
    assert_eq!(models, vec!["a", "a", "a", "b"]);

    let gaps = gaps(&calls);
    assert_eq!(gaps[0], Duration::from_secs(1));
    assert_eq!(gaps[1], Duration::from_secs(2));
    // Moving to the next candidate does not wait.
    assert_eq!(gaps[2], Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_overload_uses_longer_backoff_and_reports_unavailable() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).script("a", vec![overloaded()]));
    let err = orchestrator(gemini_candidates(&["a"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::ServiceUnavailable { .. }));
    let calls = provider.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(gaps(&calls), vec![Duration::from_secs(2), Duration::from_secs(4)]);
    assert_eq!(provider.probe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_retries_like_rate_limit() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .script("a", vec![network_error(), success()])
            .script("b", vec![success()]),
    );
    let raw = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(raw, sample_analysis_json());
    let calls = provider.calls();
    assert_eq!(provider.models_called(), vec!["a", "a"]);
    assert_eq!(gaps(&calls), vec![Duration::from_secs(1)]);
    assert_eq!(provider.probe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_within_the_same_candidate() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini).script("a", vec![rate_limited(), success()]),
    );
    orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(provider.models_called(), vec!["a", "a"]);
}

#[tokio::test(start_paused = true)]
async fn test_all_models_missing_probes_once_and_lists_available() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .probe(Ok(vec!["gemini-pro".to_string(), "gemini-1.0-pro".to_string()])),
    );
    let err = orchestrator(gemini_candidates(&["a", "b", "c"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert_eq!(provider.models_called(), vec!["a", "b", "c"]);
    assert_eq!(provider.probe_calls(), 1);
    match &err {
        AnalysisError::ModelUnavailable { tried, available } => {
            assert_eq!(tried, &vec!["gemini:a", "gemini:b", "gemini:c"]);
            assert_eq!(
                available.as_deref(),
                Some(&["gemini-pro".to_string(), "gemini-1.0-pro".to_string()][..])
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("gemini-pro"));
    assert_eq!(err.http_status(), 503);
}

#[tokio::test(start_paused = true)]
async fn test_probe_rejecting_the_key_reports_credential_error() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).probe(Err(ProbeError::Unauthorized {
        status: 403,
        message: "API key not valid".to_string(),
    })));
    let err = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Credential { .. }));
    assert_eq!(provider.probe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_still_reports_model_unavailable() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).probe(Err(ProbeError::Failed {
        message: "connection refused".to_string(),
    })));
    let err = orchestrator(gemini_candidates(&["a"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AnalysisError::ModelUnavailable {
            tried: vec!["gemini:a".to_string()],
            available: None,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_envelope_falls_back_without_probe() {
    let malformed = AttemptOutcome::retryable(FailureKind::MalformedEnvelope, Some(200), "{\"candidates\":[]}");
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .script("a", vec![malformed.clone()])
            .script("b", vec![malformed]),
    );
    let err = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert_eq!(provider.models_called(), vec!["a", "b"]);
    assert_eq!(provider.probe_calls(), 0);
    assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    assert_eq!(err.http_status(), 502);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_status_aborts_with_upstream_message() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).script(
        "a",
        vec![AttemptOutcome::Fatal {
            credential: false,
            status: Some(500),
            message: "Internal error encountered.".to_string(),
        }],
    ));
    let err = orchestrator(gemini_candidates(&["a", "b"]), &provider)
        .run(&request())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AnalysisError::Upstream {
            status: 500,
            message: "Internal error encountered.".to_string(),
        }
    );
    assert_eq!(provider.models_called(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_still_tries_each_candidate_once() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .script("a", vec![rate_limited()])
            .script("b", vec![rate_limited()]),
    );
    let policy = RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    };
    let err = Orchestrator::new(gemini_candidates(&["a", "b"]), policy)
        .with_provider(provider.clone())
        .run(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::RateLimited { .. }));
    assert_eq!(provider.models_called(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_schema_is_embedded_only_for_providers_that_cannot_enforce_it() {
    let gemini = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    let openai = Arc::new(ScriptedProvider::new(ProviderKind::OpenAi).script("gpt-4o-mini", vec![success()]));
    let candidates = vec![
        ModelCandidate::new(ProviderKind::Gemini, "gemini-2.5-flash", 0),
        ModelCandidate::new(ProviderKind::OpenAi, "gpt-4o-mini", 1),
    ];

    Orchestrator::new(candidates, RetryPolicy::default())
        .with_provider(gemini.clone())
        .with_provider(openai.clone())
        .run(&request())
        .await
        .unwrap();

    let gemini_prompt = &gemini.calls()[0].prompt;
    let openai_prompt = &openai.calls()[0].prompt;
    assert!(!gemini_prompt.contains("\"executiveSummary\""));
    assert!(openai_prompt.contains("\"executiveSummary\""));
    assert!(openai_prompt.starts_with(gemini_prompt.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_candidates_without_a_client_are_skipped() {
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).script("gemini-2.0-flash", vec![success()]));
    let candidates = vec![
        ModelCandidate::new(ProviderKind::OpenAi, "gpt-4o", 0),
        ModelCandidate::new(ProviderKind::Gemini, "gemini-2.0-flash", 1),
    ];

    Orchestrator::new(candidates, RetryPolicy::default())
        .with_provider(provider.clone())
        .run(&request())
        .await
        .unwrap();

    assert_eq!(provider.models_called(), vec!["gemini-2.0-flash"]);
}

#[tokio::test]
async fn test_no_provider_is_a_credential_error() {
    let err = Orchestrator::new(gemini_candidates(&["a"]), RetryPolicy::default())
        .run(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Credential { .. }));
}
