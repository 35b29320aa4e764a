//! Scripted LLM client

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::abstractions::{Completion, LlmClient};
use crate::error::{FactoryError, FailureKind, Result};

#[derive(Debug, Clone)]
enum Step {
    Reply(Completion),
    Fail(FailureKind, String),
}

/// Answers prompts from a queue of canned replies and failures.
///
/// Once the queue is empty the `always` reply is used, if set; otherwise
/// every further call fails permanently.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    steps: Mutex<VecDeque<Step>>,
    always: Option<Completion>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>, cost: f64) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Reply(Completion::new(text, cost)));
        self
    }

    pub fn fail(self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(kind, message.into()));
        self
    }

    pub fn always(mut self, text: impl Into<String>, cost: f64) -> Self {
        self.always = Some(Completion::new(text, cost));
        self
    }

    /// Every prompt received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(completion)) => Ok(completion),
            Some(Step::Fail(kind, message)) => Err(FactoryError::collaborator("llm", kind, message)),
            None => match &self.always {
                Some(completion) => Ok(completion.clone()),
                None => Err(FactoryError::collaborator(
                    "llm",
                    FailureKind::Permanent,
                    "script exhausted",
                )),
            },
        }
    }
}
