//! The `Agent` trait -- the adapter interface for text-generation backends.
//!
//! The trait is object-safe so one backend can be shared across concurrent
//! calls as `Arc<dyn Agent>`.

use async_trait::async_trait;

use super::AgentError;
use crate::persona::Persona;

/// A text-generation backend.
///
/// `persona` carries the per-call configuration: system instruction,
/// model, tool list, and the optional structured-output directive.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable backend name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate text for `prompt` in the voice of `persona`.
    async fn generate(&self, prompt: &str, persona: &Persona) -> Result<String, AgentError>;
}

// Compile-time assertion: Agent must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Agent) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Repeats the prompt back, prefixed with the persona name.
    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str, persona: &Persona) -> Result<String, AgentError> {
            Ok(format!("{}: {prompt}", persona.name))
        }
    }

    #[test]
    fn agent_is_object_safe() {
        let agent: Arc<dyn Agent> = Arc::new(EchoAgent);
        assert_eq!(agent.name(), "echo");
    }

    #[tokio::test]
    async fn echo_agent_generates() {
        let agent: Arc<dyn Agent> = Arc::new(EchoAgent);
        let persona = Persona::new("Neo", "argue");
        let text = agent.generate("hello", &persona).await.unwrap();
        assert_eq!(text, "Neo: hello");
    }
}
