//! The `Completer` collaborator (spec.md §9): a minimal async chat
//! contract the init pipeline calls for JIT prompt compilation and
//! strategic-knowledge research, without depending on any concrete
//! provider wire format.
//!
//! Grounded on the teacher's `LlmProvider` trait: same async-trait
//! shape, same "stub returns NotConfigured" test-double idiom, trimmed
//! to the single method the pipeline actually needs.

#[derive(Debug, thiserror::Error)]
pub enum CompleterError {
    #[error("completer not configured: {0}")]
    NotConfigured(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("request timed out")]
    Timeout,
}

/// A single-shot system/user completion. No streaming, no tool calls —
/// the init pipeline only ever asks one question per call and reads
/// the whole answer back.
#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, CompleterError>;
}

/// Test double and default collaborator for workspaces that opt out of
/// LLM-backed research. Every call fails with `NotConfigured`; callers
/// (e.g. `nerd-init`'s phase 12 worker) treat that as "skip research,
/// keep the base atoms" rather than a fatal error.
#[derive(Debug, Clone, Default)]
pub struct StubCompleter;

#[async_trait::async_trait]
impl Completer for StubCompleter {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, CompleterError> {
        Err(CompleterError::NotConfigured(
            "no Completer configured – install a concrete LLM client".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_completer_always_reports_not_configured() {
        let err = StubCompleter
            .complete("system", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, CompleterError::NotConfigured(_)));
    }
}
