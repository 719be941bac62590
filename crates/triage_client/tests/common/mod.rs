#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};
use triage_client::{
    ApiRequest, ByteStream, ClientError, Method, RequestBody, RequestExecutor, SelectionPrompt,
};
use triage_core::{PromptOption, SelectionRule};

type Key = (Method, String);

/// In-memory executor answering from scripted responses, keyed by method and
/// path. Unscripted requests fail with a 404 service error.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<Key, VecDeque<Result<Value, ClientError>>>>,
    streams: Mutex<HashMap<String, Vec<Result<Bytes, ClientError>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, response: Result<Value, ClientError>) {
        self.responses
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn stream(&self, path: &str, chunks: &[&str]) {
        let chunks = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from(chunk.to_string())))
            .collect();
        self.streams
            .lock()
            .unwrap()
            .insert(path.to_string(), chunks);
    }

    /// `(method, path)` of every request, in order.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| (request.method.clone(), request.path.clone()))
            .collect()
    }

    pub fn called(&self, path: &str) -> bool {
        self.calls().iter().any(|(_, p)| p == path)
    }

    pub fn json_bodies(&self, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .filter_map(|request| match &request.body {
                Some(RequestBody::Json(value)) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

fn not_scripted(path: &str) -> ClientError {
    ClientError::Service {
        status: 404,
        kind: "NOT_FOUND".to_string(),
        message: format!("{path} not scripted"),
    }
}

#[async_trait::async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let key = (request.method.clone(), request.path.clone());
        self.responses
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(not_scripted(&request.path)))
    }

    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .remove(&request.path)
            .ok_or_else(|| not_scripted(&request.path))?;
        Ok(futures_util::stream::iter(chunks).boxed())
    }
}

/// Prompt answering from a queue. Answers the rule rejects are skipped, the
/// way a terminal prompt asks again.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Vec<usize>>,
    pub asked: Vec<(String, Vec<PromptOption>, SelectionRule)>,
    pub rejected: usize,
}

impl ScriptedPrompt {
    pub fn answering(answers: Vec<Vec<usize>>) -> Self {
        Self {
            answers: answers.into(),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl SelectionPrompt for ScriptedPrompt {
    async fn choose(
        &mut self,
        heading: &str,
        options: &[PromptOption],
        rule: SelectionRule,
    ) -> Result<Vec<usize>, ClientError> {
        self.asked
            .push((heading.to_string(), options.to_vec(), rule));
        while let Some(answer) = self.answers.pop_front() {
            if rule.accepts(&answer) {
                return Ok(answer);
            }
            self.rejected += 1;
        }
        Err(ClientError::Cancelled)
    }
}

pub fn sample(id: &str, status: &str) -> Value {
    json!({ "id": id, "status": status, "kind": "file", "filename": format!("{id}.bin") })
}

pub fn snapshot_line(id: &str, status: &str) -> String {
    format!("{}\n", sample(id, status))
}
