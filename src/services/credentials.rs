use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::services::gemini::{ClientFactory, MetadataClient};

/// An opaque API key. Formatting never reveals more than a short prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short form safe for logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}***", prefix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Split a raw key field on commas and newlines, trimming blanks away.
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

struct Rotation {
    queue: VecDeque<Credential>,
    issued: HashMap<Credential, u64>,
}

/// Round-robin credential rotation with a per-credential client cache.
///
/// Each issuance takes the front credential and pushes it to the back under
/// a single lock, so concurrent callers never observe a torn rotation. Clients
/// are created on first use of a credential and then shared; the cache lives
/// and dies with the pool.
pub struct CredentialPool {
    order: Vec<Credential>,
    rotation: Mutex<Rotation>,
    clients: Mutex<HashMap<Credential, Arc<dyn MetadataClient>>>,
    factory: Arc<dyn ClientFactory>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<String>, factory: Arc<dyn ClientFactory>) -> Self {
        let order: Vec<Credential> = credentials.into_iter().map(Credential::new).collect();
        Self {
            rotation: Mutex::new(Rotation {
                queue: order.iter().cloned().collect(),
                issued: HashMap::new(),
            }),
            order,
            clients: Mutex::new(HashMap::new()),
            factory,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Hand out the next credential. `None` only when the pool was built empty.
    pub async fn issue(&self) -> Option<Credential> {
        let mut rotation = self.rotation.lock().await;
        let credential = rotation.queue.pop_front()?;
        rotation.queue.push_back(credential.clone());
        *rotation.issued.entry(credential.clone()).or_default() += 1;
        Some(credential)
    }

    /// Cached client for `credential`, created through the factory on first use.
    pub async fn client_for(&self, credential: &Credential) -> Arc<dyn MetadataClient> {
        let mut clients = self.clients.lock().await;
        Arc::clone(
            clients
                .entry(credential.clone())
                .or_insert_with(|| self.factory.create(credential)),
        )
    }

    /// How often each credential has been issued, in pool order.
    pub async fn issue_counts(&self) -> Vec<(Credential, u64)> {
        let rotation = self.rotation.lock().await;
        self.order
            .iter()
            .map(|c| (c.clone(), rotation.issued.get(c).copied().unwrap_or(0)))
            .collect()
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.order)
            .finish_non_exhaustive()
    }
}
