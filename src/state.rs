use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use log::{error, info};
use serde::Serialize;

use crate::config::Config;
use crate::data::loader::{load_file, LoadError};
use crate::data::model::Dataset;

// ---------------------------------------------------------------------------
// Snapshot – one immutable, published view of the data
// ---------------------------------------------------------------------------

/// Whether the server has data to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded { reason: String },
}

/// A loaded dataset together with its readiness. Never mutated once published.
#[derive(Debug)]
pub struct Snapshot {
    pub dataset: Dataset,
    pub readiness: Readiness,
    pub loaded_at: SystemTime,
}

impl Snapshot {
    pub fn ready(dataset: Dataset) -> Self {
        Snapshot {
            dataset,
            readiness: Readiness::Ready,
            loaded_at: SystemTime::now(),
        }
    }

    /// Empty snapshot recording why loading failed.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Snapshot {
            dataset: Dataset::default(),
            readiness: Readiness::Degraded {
                reason: reason.into(),
            },
            loaded_at: SystemTime::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Process-wide state handed to every request handler.
pub struct AppState {
    pub config: Config,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl AppState {
    /// Load the configured dataset.
    ///
    /// A load failure produces a degraded state, or an error when
    /// `require_data` is set.
    pub fn load(config: Config) -> Result<Self, LoadError> {
        let snapshot = match load_file(&config.data_path, &config.load_options()) {
            Ok(dataset) => Snapshot::ready(dataset),
            Err(e) if config.require_data => return Err(e),
            Err(e) => {
                error!("Serving degraded, no cutoff data: {e}");
                Snapshot::degraded(e.to_string())
            }
        };
        Ok(Self::with_snapshot(config, snapshot))
    }

    /// Build state around an already-loaded dataset.
    pub fn from_dataset(config: Config, dataset: Dataset) -> Self {
        Self::with_snapshot(config, Snapshot::ready(dataset))
    }

    pub fn with_snapshot(config: Config, snapshot: Snapshot) -> Self {
        AppState {
            config,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The currently published snapshot. Holding it never blocks a reload.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the configured source and publish it.
    ///
    /// On failure the current snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<Snapshot>, LoadError> {
        let dataset = load_file(&self.config.data_path, &self.config.load_options())?;
        let fresh = Arc::new(Snapshot::ready(dataset));
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        info!("Published {} cutoff records", fresh.dataset.len());
        Ok(fresh)
    }
}
