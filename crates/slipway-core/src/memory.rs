//! In-memory reference implementation of the application collaborator.
//!
//! Records every registration the boot pipeline performs so tests (and
//! embedders prototyping without a real runtime) can inspect the outcome.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::app::{Application, MiddlewareFactory, ModelRegistry};
use crate::types::{MiddlewareEntry, MixinRecord, ModelRecord};
use crate::{BootError, Result};

/// A middleware instance the in-memory app "mounted": the compiled entry plus
/// whatever the factory built from it.
#[derive(Debug, Clone)]
pub struct MountedMiddleware {
    pub entry: MiddlewareEntry,
    pub built: Value,
}

pub struct InMemoryApplication {
    settings: RwLock<Map<String, Value>>,
    data_sources: RwLock<Map<String, Value>>,
    created_models: RwLock<Vec<ModelRecord>>,
    attached_models: RwLock<Map<String, Value>>,
    mixins: RwLock<Vec<MixinRecord>>,
    middleware_phases: RwLock<Vec<String>>,
    mounted: RwLock<Vec<MountedMiddleware>>,
    booting: AtomicBool,
    booted: AtomicBool,
    booted_tx: broadcast::Sender<()>,
}

impl Default for InMemoryApplication {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryApplication {
    pub fn new() -> Self {
        let (booted_tx, _) = broadcast::channel(4);
        Self {
            settings: RwLock::new(Map::new()),
            data_sources: RwLock::new(Map::new()),
            created_models: RwLock::new(Vec::new()),
            attached_models: RwLock::new(Map::new()),
            mixins: RwLock::new(Vec::new()),
            middleware_phases: RwLock::new(Vec::new()),
            mounted: RwLock::new(Vec::new()),
            booting: AtomicBool::new(false),
            booted: AtomicBool::new(false),
            booted_tx,
        }
    }

    // ── Inspection ─────────────────────────────────────────────

    pub fn settings(&self) -> Map<String, Value> {
        self.settings.read().clone()
    }

    pub fn data_sources(&self) -> Map<String, Value> {
        self.data_sources.read().clone()
    }

    /// Models in creation order.
    pub fn created_models(&self) -> Vec<ModelRecord> {
        self.created_models.read().clone()
    }

    pub fn attached_models(&self) -> Map<String, Value> {
        self.attached_models.read().clone()
    }

    pub fn mixins(&self) -> Vec<MixinRecord> {
        self.mixins.read().clone()
    }

    pub fn middleware_phases(&self) -> Vec<String> {
        self.middleware_phases.read().clone()
    }

    pub fn mounted_middleware(&self) -> Vec<MountedMiddleware> {
        self.mounted.read().clone()
    }

    pub fn booted(&self) -> bool {
        self.booted.load(Ordering::SeqCst)
    }

    /// Subscribe to the one-shot `booted` notification.
    pub fn subscribe_booted(&self) -> broadcast::Receiver<()> {
        self.booted_tx.subscribe()
    }
}

impl Application for InMemoryApplication {
    fn get(&self, key: &str) -> Option<Value> {
        self.settings.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.settings.write().insert(key.to_string(), value);
    }

    fn register_data_source(&self, name: &str, config: Value) -> Result<()> {
        self.data_sources.write().insert(name.to_string(), config);
        Ok(())
    }

    fn attach_model(&self, name: &str, config: Value) -> Result<()> {
        self.attached_models.write().insert(name.to_string(), config);
        Ok(())
    }

    fn models(&self) -> &dyn ModelRegistry {
        self
    }

    fn define_middleware_phases(&self, phases: &[String]) -> Result<()> {
        let mut defined = self.middleware_phases.write();
        for phase in phases {
            if !defined.iter().any(|p| p == phase) {
                defined.push(phase.clone());
            }
        }
        Ok(())
    }

    fn mount_middleware(&self, factory: MiddlewareFactory, entry: &MiddlewareEntry) -> Result<()> {
        let config = serde_json::to_value(&entry.config)?;
        let built = factory(&config).map_err(BootError::Other)?;
        self.mounted.write().push(MountedMiddleware {
            entry: entry.clone(),
            built,
        });
        Ok(())
    }

    fn set_booting(&self, booting: bool) {
        self.booting.store(booting, Ordering::SeqCst);
    }

    fn booting(&self) -> bool {
        self.booting.load(Ordering::SeqCst)
    }

    fn emit_booted(&self) {
        self.booted.store(true, Ordering::SeqCst);
        // Nobody listening is fine.
        let _ = self.booted_tx.send(());
    }
}

impl ModelRegistry for InMemoryApplication {
    fn has_model(&self, name: &str) -> bool {
        self.created_models.read().iter().any(|m| m.name == name)
    }

    fn create_model(&self, record: &ModelRecord) -> Result<()> {
        self.created_models.write().push(record.clone());
        Ok(())
    }

    fn register_mixin(&self, name: &str, source_file: &Path) -> Result<()> {
        self.mixins.write().push(MixinRecord {
            name: name.to_string(),
            source_file: PathBuf::from(source_file),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn records_settings_and_data_sources() {
        let app = InMemoryApplication::new();
        app.set("port", json!(3000));
        assert_eq!(app.get("port"), Some(json!(3000)));

        app.register_data_source("db", json!({"connector": "memory"}))
            .unwrap();
        assert_eq!(app.data_sources()["db"]["connector"], "memory");
    }

    #[test]
    fn model_registry_tracks_creation_order() {
        let app = InMemoryApplication::new();
        for name in ["Vehicle", "Car"] {
            app.models()
                .create_model(&ModelRecord {
                    name: name.into(),
                    config: None,
                    definition: None,
                    source_file: None,
                })
                .unwrap();
        }
        let names: Vec<_> = app.created_models().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["Vehicle", "Car"]);
        assert!(app.models().has_model("Car"));
        assert!(!app.models().has_model("Boat"));
    }

    #[test]
    fn middleware_phases_deduplicate() {
        let app = InMemoryApplication::new();
        app.define_middleware_phases(&["initial".into(), "routes".into()])
            .unwrap();
        app.define_middleware_phases(&["routes".into(), "final".into()])
            .unwrap();
        assert_eq!(app.middleware_phases(), vec!["initial", "routes", "final"]);
    }

    #[tokio::test]
    async fn booted_notification_reaches_subscribers() {
        let app = InMemoryApplication::new();
        let mut rx = app.subscribe_booted();
        assert!(!app.booted());
        app.emit_booted();
        assert!(app.booted());
        rx.recv().await.unwrap();
    }

    #[test]
    fn mount_middleware_runs_factory() {
        let app = InMemoryApplication::new();
        let factory: MiddlewareFactory =
            Arc::new(|config: &Value| Ok(json!({"phase": config["phase"]})));
        let entry: MiddlewareEntry = serde_json::from_value(json!({
            "source_file": "/modules/compression.wasm",
            "config": {"phase": "routes"}
        }))
        .unwrap();
        app.mount_middleware(factory, &entry).unwrap();
        let mounted = app.mounted_middleware();
        assert_eq!(mounted.len(), 1);
        assert_eq!(mounted[0].built["phase"], "routes");
    }
}
