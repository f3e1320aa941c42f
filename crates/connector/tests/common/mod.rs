//! Test infrastructure for the connector.
//!
//! [`MockFactory`] hands out [`MockClient`]s backed by a shared in-memory
//! cluster. Ping outcomes for connection attempts are scripted; once the
//! script runs out, pings succeed unless the client was killed.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use elk_connector::query::SearchRequest;
use elk_connector::{AttemptError, ClientFactory, ClusterClient, ClusterError, RetryPolicy};

pub const MOCK_HOST: &str = "https://mock-es:9200";

/// Scripted result of one build-and-ping attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Recoverable,
    Transport,
    Unexpected,
    BuildFailure,
}

impl Outcome {
    fn into_result(self) -> Result<(), AttemptError> {
        match self {
            Outcome::Ok => Ok(()),
            Outcome::Recoverable => Err(AttemptError::recoverable("connection refused")),
            Outcome::Transport => Err(AttemptError::transport("status 401")),
            Outcome::Unexpected => Err(AttemptError::unexpected("unrecognized ping response")),
            Outcome::BuildFailure => Err(AttemptError::unexpected("client construction failed")),
        }
    }
}

#[derive(Debug, Default)]
struct MockIndex {
    body: Value,
    documents: Vec<Value>,
    aliases: Vec<String>,
}

/// State shared by a factory and every client it built.
#[derive(Debug)]
pub struct MockState {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    builds: AtomicU32,
    pings: AtomicU32,
    closes: AtomicU32,
    dead_through: AtomicU32,
    fail_close: Mutex<bool>,
    fail_search: Mutex<bool>,
    indices: Mutex<BTreeMap<String, MockIndex>>,
    searches: Mutex<Vec<SearchRequest>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Outcome::Ok),
            builds: AtomicU32::new(0),
            pings: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            dead_through: AtomicU32::new(0),
            fail_close: Mutex::new(false),
            fail_search: Mutex::new(false),
            indices: Mutex::new(BTreeMap::new()),
            searches: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    /// Queues outcomes for the next attempts, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Sets the outcome used once the script is empty.
    pub fn set_fallback(&self, outcome: Outcome) {
        *self.fallback.lock() = outcome;
    }

    /// Makes every client built so far fail its liveness probe.
    pub fn kill_clients(&self) {
        self.dead_through
            .store(self.builds.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        *self.fail_close.lock() = true;
    }

    /// Makes search requests fail on existing indices.
    pub fn fail_search(&self) {
        *self.fail_search.lock() = true;
    }

    pub fn builds(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.searches.lock().clone()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indices.lock().keys().cloned().collect()
    }

    fn next_outcome(&self) -> Outcome {
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or(*self.fallback.lock())
    }

    fn peek_build_failure(&self) -> bool {
        let mut script = self.script.lock();
        if script.front() == Some(&Outcome::BuildFailure) {
            script.pop_front();
            return true;
        }
        script.is_empty() && *self.fallback.lock() == Outcome::BuildFailure
    }
}

/// Factory over a [`MockState`].
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub state: Arc<MockState>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientFactory for MockFactory {
    type Client = MockClient;

    fn host(&self) -> &str {
        MOCK_HOST
    }

    fn build(&self) -> Result<MockClient, AttemptError> {
        let generation = self.state.builds.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.peek_build_failure() {
            return Err(AttemptError::unexpected("client construction failed"));
        }
        Ok(MockClient {
            state: self.state.clone(),
            generation,
        })
    }
}

/// In-memory cluster handle.
#[derive(Debug)]
pub struct MockClient {
    state: Arc<MockState>,
    generation: u32,
}

fn missing(operation: &'static str, index: &str) -> ClusterError {
    ClusterError::Api {
        operation,
        status: 404,
        body: format!(r#"{{"error":{{"type":"index_not_found_exception","index":"{}"}}}}"#, index),
    }
}

#[async_trait]
impl ClusterClient for MockClient {
    async fn ping(&self) -> Result<(), AttemptError> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        if self.generation <= self.state.dead_through.load(Ordering::SeqCst) {
            return Err(AttemptError::recoverable("connection reset"));
        }
        self.state.next_outcome().into_result()
    }

    async fn info(&self) -> Result<Value, ClusterError> {
        Ok(json!({
            "name": "mock-node",
            "cluster_name": "mock-cluster",
            "version": { "number": "8.15.0" },
            "tagline": "You Know, for Search"
        }))
    }

    async fn health(&self) -> Result<Value, ClusterError> {
        Ok(json!({
            "cluster_name": "mock-cluster",
            "status": "green",
            "timed_out": false,
            "number_of_nodes": 1,
            "number_of_data_nodes": 1,
            "active_primary_shards": 3,
            "active_shards": 3,
            "relocating_shards": 0,
            "initializing_shards": 0,
            "unassigned_shards": 0
        }))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ClusterError> {
        Ok(self.state.indices.lock().contains_key(index))
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<Value, ClusterError> {
        let mut indices = self.state.indices.lock();
        if indices.contains_key(index) {
            return Err(ClusterError::Api {
                operation: "create index",
                status: 400,
                body: "resource_already_exists_exception".to_string(),
            });
        }
        indices.insert(
            index.to_string(),
            MockIndex {
                body,
                ..MockIndex::default()
            },
        );
        Ok(json!({ "acknowledged": true, "index": index }))
    }

    async fn delete_index(&self, index: &str) -> Result<Value, ClusterError> {
        match self.state.indices.lock().remove(index) {
            Some(_) => Ok(json!({ "acknowledged": true })),
            None => Err(missing("delete index", index)),
        }
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<Value, ClusterError> {
        let mut indices = self.state.indices.lock();
        let entry = indices.get_mut(index).ok_or_else(|| missing("put alias", index))?;
        entry.aliases.push(alias.to_string());
        Ok(json!({ "acknowledged": true }))
    }

    async fn index_document(&self, index: &str, document: Value) -> Result<Value, ClusterError> {
        let mut indices = self.state.indices.lock();
        let entry = indices.entry(index.to_string()).or_default();
        entry.documents.push(document);
        Ok(json!({ "_index": index, "_id": format!("doc-{}", entry.documents.len()), "result": "created" }))
    }

    async fn count(&self, index: &str) -> Result<u64, ClusterError> {
        let indices = self.state.indices.lock();
        let entry = indices.get(index).ok_or_else(|| missing("count", index))?;
        Ok(entry.documents.len() as u64)
    }

    async fn get_alias(&self, index: &str) -> Result<Value, ClusterError> {
        let indices = self.state.indices.lock();
        let entry = indices.get(index).ok_or_else(|| missing("get alias", index))?;
        let aliases: serde_json::Map<String, Value> = entry
            .aliases
            .iter()
            .map(|a| (a.clone(), json!({})))
            .collect();
        Ok(json!({ index: { "aliases": aliases } }))
    }

    async fn get_mapping(&self, index: &str) -> Result<Value, ClusterError> {
        let indices = self.state.indices.lock();
        let entry = indices.get(index).ok_or_else(|| missing("get mapping", index))?;
        Ok(json!({ index: { "mappings": entry.body.get("mappings").cloned().unwrap_or(json!({})) } }))
    }

    async fn get_settings(&self, index: &str) -> Result<Value, ClusterError> {
        let indices = self.state.indices.lock();
        let entry = indices.get(index).ok_or_else(|| missing("get settings", index))?;
        Ok(json!({ index: { "settings": entry.body.get("settings").cloned().unwrap_or(json!({})) } }))
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Value, ClusterError> {
        self.state.searches.lock().push(request.clone());
        let indices = self.state.indices.lock();
        let entry = indices.get(index).ok_or_else(|| missing("search", index))?;
        if *self.state.fail_search.lock() {
            return Err(ClusterError::Api {
                operation: "search",
                status: 400,
                body: r#"{"error":{"type":"search_phase_execution_exception"}}"#.to_string(),
            });
        }
        let hits: Vec<Value> = entry
            .documents
            .iter()
            .enumerate()
            .skip(request.from as usize)
            .take(request.size as usize)
            .map(|(i, doc)| {
                json!({ "_index": index, "_id": format!("doc-{}", i + 1), "_score": 1.0, "_source": doc })
            })
            .collect();
        Ok(json!({
            "took": 1,
            "timed_out": false,
            "hits": {
                "total": { "value": entry.documents.len(), "relation": "eq" },
                "max_score": 1.0,
                "hits": hits
            }
        }))
    }

    async fn close(&self) -> Result<(), ClusterError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if *self.state.fail_close.lock() {
            return Err(ClusterError::Request {
                operation: "close",
                source: "socket already closed".into(),
            });
        }
        Ok(())
    }
}

/// A bounded policy with the default three second backoff.
pub fn bounded_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::bounded(attempts).unwrap()
}

/// A persistent policy with the given backoff.
pub fn persistent_policy(backoff: Duration) -> RetryPolicy {
    RetryPolicy::persistent().with_backoff(backoff)
}

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Reads a file under `tests/fixtures`.
pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).unwrap()
}
