//! Retry, fallback and cancellation behaviour of `ResilientInvoker`
//!
//! Backends are scripted: each call pops the next outcome, and the last
//! outcome repeats once the script runs out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vibeforge::llm::{
    InvokeError, LlmBackend, LlmInvocation, LlmResult, Message, ProviderError, ProviderErrorKind,
    ResilientInvoker, RetryPolicy,
};

type Outcome = Result<&'static str, ProviderErrorKind>;

struct ScriptedProvider {
    id: &'static str,
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    seen_models: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(id: &'static str, script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            seen_models: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Outcome {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().unwrap()
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedProvider {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models.lock().unwrap().push(inv.model.clone());
        match self.next() {
            Ok(body) => Ok(LlmResult::new(body, self.id, "scripted-model")),
            Err(kind) => Err(ProviderError::new(kind, self.id, "scripted failure")),
        }
    }
}

fn invocation() -> LlmInvocation {
    LlmInvocation::new(
        "demo",
        "backend",
        Duration::from_secs(5),
        vec![Message::system("be terse"), Message::user("build it")],
    )
}

fn invoker(
    primary: &Arc<ScriptedProvider>,
    secondary: Option<&Arc<ScriptedProvider>>,
    policy: RetryPolicy,
) -> ResilientInvoker {
    ResilientInvoker::new(
        primary.clone(),
        secondary.map(|s| s.clone() as Arc<dyn LlmBackend>),
        policy,
    )
}

#[tokio::test]
async fn test_rate_limits_are_retried_on_the_primary() {
    let primary = ScriptedProvider::new(
        "deepseek",
        vec![
            Err(ProviderErrorKind::RateLimited),
            Err(ProviderErrorKind::RateLimited),
            Ok("{}"),
        ],
    );
    let secondary = ScriptedProvider::new("gemini", vec![Ok("fallback")]);

    let reply = invoker(&primary, Some(&secondary), RetryPolicy::immediate(3))
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.result.raw_response, "{}");
    assert!(!reply.used_fallback);
    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 0);
    assert_eq!(reply.attempts.len(), 3);
    assert_eq!(reply.attempts[2].error, None);
}

#[tokio::test]
async fn test_auth_failure_falls_back_without_retrying() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::AuthInvalid)]);
    let secondary = ScriptedProvider::new("gemini", vec![Ok("from gemini")]);

    let reply = invoker(&primary, Some(&secondary), RetryPolicy::immediate(3))
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(reply.used_fallback);
    assert_eq!(reply.result.provider, "gemini");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_malformed_reply_is_not_retried() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::MalformedReply)]);

    let err = invoker(&primary, None, RetryPolicy::immediate(3))
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(primary.calls(), 1);
    match err {
        InvokeError::Exhausted { last, attempts, .. } => {
            assert_eq!(last.kind, ProviderErrorKind::MalformedReply);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_reply_falls_back_without_retrying() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::MalformedReply)]);
    let secondary = ScriptedProvider::new("gemini", vec![Ok("from gemini")]);

    let reply = invoker(&primary, Some(&secondary), RetryPolicy::immediate(3))
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(reply.used_fallback);
    assert_eq!(reply.result.raw_response, "from gemini");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_persistent_server_errors_exhaust_both_providers() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::ServerError)]);
    let secondary = ScriptedProvider::new("gemini", vec![Err(ProviderErrorKind::ServerError)]);

    let err = invoker(&primary, Some(&secondary), RetryPolicy::immediate(3))
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 3);
    match err {
        InvokeError::Exhausted {
            last,
            attempts,
            history,
        } => {
            assert_eq!(attempts, 6);
            assert_eq!(last.provider, "gemini");
            assert_eq!(last.kind, ProviderErrorKind::ServerError);
            assert_eq!(history.iter().filter(|a| a.provider == "deepseek").count(), 3);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeouts_retry_with_fixed_delay() {
    let primary = ScriptedProvider::new(
        "deepseek",
        vec![Err(ProviderErrorKind::Timeout), Ok("late but fine")],
    );
    let policy = RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_secs(30),
        transient_delay: Duration::from_millis(20),
    };

    let started = Instant::now();
    let reply = invoker(&primary, None, policy)
        .invoke(&invocation(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.result.raw_response, "late but fine");
    assert_eq!(primary.calls(), 2);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_model_override_applies_to_primary_only() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::AuthInvalid)]);
    let secondary = ScriptedProvider::new("gemini", vec![Ok("ok")]);

    let inv = invocation().with_model("deepseek-reasoner");
    invoker(&primary, Some(&secondary), RetryPolicy::immediate(1))
        .invoke(&inv, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*primary.seen_models.lock().unwrap(), vec!["deepseek-reasoner"]);
    assert_eq!(*secondary.seen_models.lock().unwrap(), vec![String::new()]);
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let primary = ScriptedProvider::new("deepseek", vec![Err(ProviderErrorKind::RateLimited)]);
    let secondary = ScriptedProvider::new("gemini", vec![Ok("never")]);
    let policy = RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_secs(60),
        transient_delay: Duration::from_secs(60),
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = invoker(&primary, Some(&secondary), policy)
        .invoke(&invocation(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_already_cancelled_token_makes_no_calls() {
    let primary = ScriptedProvider::new("deepseek", vec![Ok("unused")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = invoker(&primary, None, RetryPolicy::immediate(3))
        .invoke(&invocation(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Cancelled));
    assert_eq!(primary.calls(), 0);
}
