use crate::error::Result;
use async_trait::async_trait;

/// Something that turns a prompt into a decision output
///
/// Only invoked when a runtime is recording; a replaying runtime answers from
/// the trace without touching the source.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Produce the output for `prompt`
    async fn decide(&self, prompt: &str) -> Result<String>;

    /// Model name and temperature to record alongside the decision, if known
    fn model(&self) -> Option<(&str, f64)> {
        None
    }
}

/// Adapter turning a plain function into a [`DecisionSource`]
pub struct FnDecisionSource<F> {
    func: F,
}

impl<F> FnDecisionSource<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> DecisionSource for FnDecisionSource<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    async fn decide(&self, prompt: &str) -> Result<String> {
        (self.func)(prompt)
    }
}
