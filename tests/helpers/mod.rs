//! Scripted stand-ins for the Gemini client used by integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use stock_metadata_gen::services::credentials::Credential;
use stock_metadata_gen::services::gemini::{
    ClientFactory, GenerationError, GenerationRequest, MetadataClient,
};

/// What the fake model does for a given payload.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text as the model's answer.
    Text(String),
    /// Fail like an API error with this message.
    ApiError(String),
    /// Answer after a delay.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
    /// Blow up inside the task.
    Panic,
}

/// One recorded call: which key served which payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub credential: String,
    pub payload: String,
}

#[derive(Default)]
struct Shared {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Factory whose clients answer according to a per-payload script. Payloads
/// without a script get a valid answer titled after the payload.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    shared: Arc<Shared>,
    created: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, payload: &str, reply: Reply) {
        self.shared
            .replies
            .lock()
            .unwrap()
            .insert(payload.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, payload: &str) -> usize {
        self.calls().iter().filter(|c| c.payload == payload).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.shared.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn clients_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ClientFactory for ScriptedFactory {
    fn create(&self, credential: &Credential) -> Arc<dyn MetadataClient> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(ScriptedClient {
            credential: credential.expose().to_string(),
            shared: Arc::clone(&self.shared),
        })
    }
}

struct ScriptedClient {
    credential: String,
    shared: Arc<Shared>,
}

struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
    fn enter(shared: &'a Shared) -> Self {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(request.data)
            .expect("payload is base64");
        let payload = String::from_utf8_lossy(&bytes).into_owned();

        self.shared.calls.lock().unwrap().push(Call {
            credential: self.credential.clone(),
            payload: payload.clone(),
        });
        let reply = self.shared.replies.lock().unwrap().get(&payload).cloned();
        let _guard = InFlight::enter(&self.shared);

        match reply {
            None => {
                tokio::task::yield_now().await;
                Ok(valid_json(&payload))
            }
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::ApiError(message)) => Err(GenerationError::Api {
                status: 429,
                message,
            }),
            Some(Reply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Panic) => panic!("scripted client panic"),
        }
    }
}

/// A well-formed model answer.
pub fn valid_json(title: &str) -> String {
    serde_json::json!({
        "title": title,
        "keywords": ["first", "second", "third"],
        "category": "Animals"
    })
    .to_string()
}
