use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AgentInvoker, AgentOutput, InvocationRequest};

/// Scripted test double: returns queued outputs in order and records every request.
#[derive(Default)]
pub struct MockInvoker {
    responses: Mutex<VecDeque<AgentOutput>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl MockInvoker {
    pub fn new(responses: impl IntoIterator<Item = AgentOutput>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, output: AgentOutput) {
        self.responses.lock().unwrap().push_back(output);
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentInvoker for MockInvoker {
    async fn invoke(&self, request: &InvocationRequest) -> AgentOutput {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| AgentOutput::failed(1, "mock invoker has no scripted response"))
    }
}
