//! Persistence for the master: two JSON documents with whole-document writes
//! (settings and the versioned registry) plus a fixed-layout byte store for
//! per-slot actuator state. The byte store is restored before any radio
//! traffic and is the source of truth for on/dim across reboots.

use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use tokio::sync::Mutex;

use fleet_common::{RegistryFile, RuntimeConfig, SLOT_COUNT};

/// Byte-store layout: one record per slot at `index * SLOT_RECORD_STRIDE`,
/// on/off at +SLOT_ON_OFFSET, dim at +SLOT_DIM_OFFSET. The stride and offsets
/// only need to be unique and stable.
pub const SLOT_RECORD_STRIDE: usize = 8;
pub const SLOT_ON_OFFSET: usize = 0;
pub const SLOT_DIM_OFFSET: usize = 4;

const SLOT_STORE_LEN: usize = SLOT_COUNT * SLOT_RECORD_STRIDE;

#[derive(Clone)]
pub struct AppStore {
    settings_path: Arc<PathBuf>,
    registry_path: Arc<PathBuf>,
    slots_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("FLEET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.fleet"));
        Self::with_dir(data_dir)
    }

    pub fn with_dir(data_dir: PathBuf) -> Self {
        Self {
            settings_path: Arc::new(data_dir.join("settings.json")),
            registry_path: Arc::new(data_dir.join("registry.json")),
            slots_path: Arc::new(data_dir.join("slots.bin")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_settings(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.settings_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_settings(&self, settings: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.settings_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }

    pub async fn load_registry(&self) -> anyhow::Result<RegistryFile> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.registry_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RegistryFile>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RegistryFile::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Whole-registry rewrite; there is no partial save.
    pub async fn save_registry(&self, registry: &RegistryFile) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.registry_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(registry)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }

    /// Restores `(on, dim)` for every slot; a missing or short store reads as
    /// all-off.
    pub async fn load_slot_records(&self) -> anyhow::Result<Vec<(bool, u8)>> {
        let _guard = self.lock.lock().await;
        let mut raw = match tokio::fs::read(self.slots_path.as_ref()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        raw.resize(SLOT_STORE_LEN, 0);

        Ok((0..SLOT_COUNT)
            .map(|index| {
                let base = index * SLOT_RECORD_STRIDE;
                (raw[base + SLOT_ON_OFFSET] != 0, raw[base + SLOT_DIM_OFFSET])
            })
            .collect())
    }

    /// Updates only the affected record's bytes at its deterministic offset.
    pub async fn save_slot_record(&self, index: usize, on: bool, dim: u8) -> anyhow::Result<()> {
        if index >= SLOT_COUNT {
            anyhow::bail!("slot index {index} out of range");
        }

        let _guard = self.lock.lock().await;
        let path = self.slots_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        raw.resize(SLOT_STORE_LEN, 0);

        let base = index * SLOT_RECORD_STRIDE;
        raw[base + SLOT_ON_OFFSET] = on as u8;
        raw[base + SLOT_DIM_OFFSET] = dim;

        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_common::NodeRegistry;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_store(name: &str) -> AppStore {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        let dir = std::env::temp_dir().join(format!("fleet-store-{name}-{nanos}"));
        AppStore::with_dir(dir)
    }

    #[tokio::test]
    async fn missing_files_read_as_defaults() {
        let store = scratch_store("defaults");

        let settings = store.load_settings().await.unwrap();
        assert_eq!(settings.fan_threshold, 50.0);

        let registry = store.load_registry().await.unwrap();
        assert_eq!(registry.next_id, 1);
        assert!(registry.entries.is_empty());

        let records = store.load_slot_records().await.unwrap();
        assert_eq!(records.len(), SLOT_COUNT);
        assert!(records.iter().all(|(on, dim)| !on && *dim == 0));
    }

    #[tokio::test]
    async fn registry_roundtrip_preserves_entries() {
        let store = scratch_store("registry");

        let mut registry = NodeRegistry::new();
        registry.add(2, "garage", true).unwrap();
        registry.add(14, "far shed", false).unwrap();
        store.save_registry(&registry.to_file()).await.unwrap();

        let restored = NodeRegistry::from_file(&store.load_registry().await.unwrap());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(2).unwrap().label, "garage");
        assert!(restored.get(2).unwrap().relay);
        assert_eq!(restored.next_id(), 15);
    }

    #[tokio::test]
    async fn slot_record_lands_at_deterministic_offset() {
        let store = scratch_store("offsets");
        store.save_slot_record(2, true, 200).await.unwrap();

        let raw = tokio::fs::read(store.slots_path.as_ref()).await.unwrap();
        assert_eq!(raw.len(), SLOT_STORE_LEN);
        assert_eq!(raw[2 * SLOT_RECORD_STRIDE + SLOT_ON_OFFSET], 1);
        assert_eq!(raw[2 * SLOT_RECORD_STRIDE + SLOT_DIM_OFFSET], 200);

        // Other records are untouched.
        assert_eq!(raw[0], 0);
        assert_eq!(raw[3 * SLOT_RECORD_STRIDE + SLOT_DIM_OFFSET], 0);

        let records = store.load_slot_records().await.unwrap();
        assert_eq!(records[2], (true, 200));
    }

    #[tokio::test]
    async fn slot_record_update_keeps_neighbors() {
        let store = scratch_store("neighbors");
        store.save_slot_record(0, true, 10).await.unwrap();
        store.save_slot_record(1, false, 99).await.unwrap();

        let records = store.load_slot_records().await.unwrap();
        assert_eq!(records[0], (true, 10));
        assert_eq!(records[1], (false, 99));

        assert!(store.save_slot_record(SLOT_COUNT, true, 1).await.is_err());
    }
}
