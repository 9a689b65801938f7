use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::{
    config::{ScanConfig, ScanConfigPatch, VulnerabilityDefinition, VulnerabilityLibrary, VulnerabilityRulePatch},
    error::{ApiError, LastError},
    repositories::{load_typed, save_typed, StateSlot, StateStore},
};

pub type SharedScanConfig = Arc<ArcSwap<ScanConfig>>;

/// Owns the process-wide [`ScanConfig`]. Readers take lock-free snapshots;
/// writers are serialized so every update merges against the latest value.
pub struct ConfigManager {
    store: Arc<dyn StateStore + Send + Sync>,
    shared: SharedScanConfig,
    write_lock: Mutex<()>,
    last_error: Arc<LastError>,
}

impl ConfigManager {
    /// Load the stored scan configuration, or seed the slot with defaults.
    pub async fn initialize(
        store: Arc<dyn StateStore + Send + Sync>,
        last_error: Arc<LastError>,
    ) -> Result<Self, ApiError> {
        let config = match load_typed::<ScanConfig, _>(store.as_ref(), StateSlot::ScanConfig).await? {
            Some(stored) => match stored.validate() {
                Ok(()) => stored,
                Err(e) => {
                    tracing::warn!(error = %e, "stored scan configuration is invalid, using defaults");
                    ScanConfig::default()
                }
            },
            None => {
                let defaults = ScanConfig::default();
                if let Err(e) = save_typed(store.as_ref(), StateSlot::ScanConfig, &defaults).await {
                    tracing::error!(error = %e, "failed to seed default scan configuration");
                    last_error.set(format!("Failed to save scan configuration: {}", e));
                }
                defaults
            }
        };

        tracing::info!(
            concurrent_scans = config.concurrent_scans,
            modules = config.vulnerability_definitions.len(),
            "scan configuration loaded"
        );

        Ok(Self {
            store,
            shared: Arc::new(ArcSwap::from_pointee(config)),
            write_lock: Mutex::new(()),
            last_error,
        })
    }

    pub fn shared_config(&self) -> SharedScanConfig {
        self.shared.clone()
    }

    pub fn snapshot(&self) -> Arc<ScanConfig> {
        self.shared.load_full()
    }

    pub fn get_config(&self) -> ScanConfig {
        self.shared.load().as_ref().clone()
    }

    pub fn get_vulnerability_library(&self) -> VulnerabilityLibrary {
        self.shared.load().vulnerability_definitions.clone()
    }

    pub async fn update_config(&self, patch: ScanConfigPatch) -> Result<ScanConfig, ApiError> {
        let _guard = self.write_lock.lock().await;
        self.last_error.clear();

        let next = self.shared.load().merged(patch);
        next.validate()
            .map_err(|e| self.last_error.capture("Failed to update scan configuration", e))?;

        self.commit(next.clone()).await;
        tracing::info!(
            concurrent_scans = next.concurrent_scans,
            timeout = next.timeout,
            "scan configuration updated"
        );
        Ok(next)
    }

    pub async fn reset_config(&self) -> ScanConfig {
        let _guard = self.write_lock.lock().await;
        self.last_error.clear();

        let defaults = ScanConfig::default();
        self.commit(defaults.clone()).await;
        tracing::info!("scan configuration reset to defaults");
        defaults
    }

    /// Re-read the stored configuration. An absent slot keeps the current value.
    pub async fn load_config(&self) -> Result<ScanConfig, ApiError> {
        let _guard = self.write_lock.lock().await;

        let stored = load_typed::<ScanConfig, _>(self.store.as_ref(), StateSlot::ScanConfig)
            .await
            .map_err(|e| self.last_error.capture("Failed to load scan configuration", e))?;

        if let Some(config) = stored {
            config
                .validate()
                .map_err(|e| self.last_error.capture("Failed to load scan configuration", e))?;
            self.shared.store(Arc::new(config));
        }
        Ok(self.get_config())
    }

    /// Merge into an existing rule, or insert a new one when the patch is complete.
    pub async fn update_vulnerability_rule(
        &self,
        module: &str,
        patch: VulnerabilityRulePatch,
    ) -> Result<VulnerabilityDefinition, ApiError> {
        let _guard = self.write_lock.lock().await;
        self.last_error.clear();

        let module = module.trim();
        if module.is_empty() {
            return Err(self
                .last_error
                .capture("Failed to update rule", ApiError::validation("module id must not be empty")));
        }

        let mut next = self.shared.load().as_ref().clone();
        let rule = match next.vulnerability_definitions.get_mut(module) {
            Some(existing) => {
                patch.apply_to(existing);
                existing.clone()
            }
            None => {
                let rule = patch.into_definition().ok_or_else(|| {
                    self.last_error.capture(
                        "Failed to update rule",
                        ApiError::UnknownModule(module.to_string()),
                    )
                })?;
                next.vulnerability_definitions
                    .insert(module.to_string(), rule.clone());
                rule
            }
        };

        self.commit(next).await;
        tracing::info!(module = %module, severity = %rule.severity, "vulnerability rule updated");
        Ok(rule)
    }

    /// Write the current configuration, surfacing storage errors.
    pub async fn flush(&self) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot();
        save_typed(self.store.as_ref(), StateSlot::ScanConfig, current.as_ref()).await
    }

    /// Swap in `next` and persist it. Storage failures leave the in-memory
    /// value authoritative.
    async fn commit(&self, next: ScanConfig) {
        let next = Arc::new(next);
        self.shared.store(next.clone());
        if let Err(e) = save_typed(self.store.as_ref(), StateSlot::ScanConfig, next.as_ref()).await {
            tracing::error!(error = %e, "failed to persist scan configuration");
            self.last_error
                .set(format!("Failed to save scan configuration: {}", e));
        }
    }
}
