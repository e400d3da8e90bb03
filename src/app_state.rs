use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::settings::GenerationSettings;
use crate::services::{batch::BatchRun, dispatcher::Dispatcher, gemini::ClientFactory};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub run: Arc<RwLock<BatchRun>>,
    pub dispatcher: Arc<Dispatcher>,
    pub clients: Arc<dyn ClientFactory>,
    pub defaults: Arc<GenerationSettings>,
    /// Keys from the environment, used when a request brings none.
    pub default_keys: Arc<Vec<String>>,
    generating: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        clients: Arc<dyn ClientFactory>,
        defaults: GenerationSettings,
        default_keys: Vec<String>,
    ) -> Self {
        Self {
            run: Arc::new(RwLock::new(BatchRun::empty())),
            dispatcher: Arc::new(dispatcher),
            clients,
            defaults: Arc::new(defaults),
            default_keys: Arc::new(default_keys),
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the batch for a dispatch round or an upload. Returns `None` while
    /// another one holds it.
    pub fn begin_generation(&self) -> Option<GenerationGuard> {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GenerationGuard {
                flag: Arc::clone(&self.generating),
            })
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }
}

/// Releases the batch when dropped.
pub struct GenerationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
