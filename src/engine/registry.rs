//! In-memory registry of per-session engines
//!
//! Engines are created lazily the first time a session is touched. On first
//! creation after a restart, persisted session state (genre group, injection
//! ratio) is replayed into the fresh engine so sessions survive restarts
//! with their pool intact, though filter queues and shown-track history do
//! not persist.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::models::SessionState;

use super::{EngineTuning, PoolEngine};

/// Shared registry mapping session ids to live engines
#[derive(Clone)]
pub struct EngineRegistry {
    catalog: Arc<Catalog>,
    tuning: EngineTuning,
    engines: Arc<RwLock<HashMap<Uuid, Arc<Mutex<PoolEngine>>>>>,
}

impl EngineRegistry {
    pub fn new(catalog: Arc<Catalog>, tuning: EngineTuning) -> Self {
        Self {
            catalog,
            tuning,
            engines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the engine for a session, creating it on first touch
    ///
    /// `restored` is only applied when the engine does not exist yet;
    /// an already-live engine keeps its in-memory state.
    pub async fn get_or_create(
        &self,
        session_id: Uuid,
        restored: Option<&SessionState>,
    ) -> Arc<Mutex<PoolEngine>> {
        {
            let engines = self.engines.read().await;
            if let Some(engine) = engines.get(&session_id) {
                return Arc::clone(engine);
            }
        }

        let mut engines = self.engines.write().await;
        // Double-check after the write lock: another task may have won
        if let Some(engine) = engines.get(&session_id) {
            return Arc::clone(engine);
        }

        let mut engine = PoolEngine::new(Arc::clone(&self.catalog), self.tuning.clone());
        if let Some(state) = restored {
            if engine.set_injection_ratio(state.fresh_injection_ratio).is_err() {
                warn!(
                    session_id = %session_id,
                    ratio = state.fresh_injection_ratio,
                    "Persisted injection ratio out of range; keeping default"
                );
            }
            if let Some(group) = &state.current_genre_group {
                if let Err(e) = engine.set_genre_pool(group) {
                    warn!(
                        session_id = %session_id,
                        group,
                        error = %e,
                        "Persisted genre group no longer resolvable"
                    );
                }
            }
            debug!(session_id = %session_id, "Engine restored from persisted state");
        } else {
            debug!(session_id = %session_id, "Fresh engine created");
        }

        let engine = Arc::new(Mutex::new(engine));
        engines.insert(session_id, Arc::clone(&engine));
        engine
    }

    /// Drop a session's engine, if it exists
    pub async fn remove(&self, session_id: Uuid) {
        let mut engines = self.engines.write().await;
        if engines.remove(&session_id).is_some() {
            debug!(session_id = %session_id, "Engine removed");
        }
    }

    /// Number of live engines
    pub async fn len(&self) -> usize {
        self.engines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.engines.read().await.is_empty()
    }
}
