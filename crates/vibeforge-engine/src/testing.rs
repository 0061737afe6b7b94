//! Scripted provider used by the engine's unit tests

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vibeforge_experts::ExpertRegistry;
use vibeforge_llm::{LlmBackend, LlmInvocation, LlmResult, ResilientInvoker, RetryPolicy};
use vibeforge_utils::ProviderError;

use crate::consultation::ConsultationEngine;

type Responder = dyn Fn(&LlmInvocation) -> Result<String, ProviderError> + Send + Sync;

pub(crate) struct ScriptedBackend {
    id: &'static str,
    delay: Duration,
    respond: Box<Responder>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(
        respond: impl Fn(&LlmInvocation) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: "scripted",
            delay: Duration::ZERO,
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn slow(
        delay: Duration,
        respond: impl Fn(&LlmInvocation) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: "scripted",
            delay,
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(&inv).map(|raw| LlmResult::new(raw, self.id, "scripted-model"))
    }
}

/// Reply JSON for `expert` declaring the given `(path, content)` files.
pub(crate) fn reply_json(expert: &str, files: &[(&str, &str)], dependencies: &[&str]) -> String {
    let files: Vec<_> = files
        .iter()
        .map(|(path, content)| serde_json::json!({"path": path, "content": content}))
        .collect();
    serde_json::json!({
        "expert": expert,
        "analysis": format!("{expert} analysis"),
        "recommendations": ["keep it simple"],
        "files": files,
        "dependencies": dependencies,
        "next_steps": ["ship it"],
    })
    .to_string()
}

pub(crate) fn engine_with(backend: Arc<ScriptedBackend>) -> ConsultationEngine {
    engine_with_registry(backend, ExpertRegistry::builtin().clone())
}

pub(crate) fn engine_with_registry(
    backend: Arc<ScriptedBackend>,
    registry: ExpertRegistry,
) -> ConsultationEngine {
    let invoker = ResilientInvoker::new(backend, None, RetryPolicy::immediate(1));
    ConsultationEngine::new(invoker, registry, Duration::from_secs(5))
}
