use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory-backed record store. Every record is a typed struct serialized
/// to `<dir>/<name>.json`; run stages load and save checkpoints by name.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: impl AsRef<Path>) -> Result<Store, String> {
        fs::create_dir_all(dir.as_ref())
            .map_err(|e| format!("cannot create store directory: {e}"))?;
        Ok(Store {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn save<T: Serialize>(&self, name: &str, record: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| format!("cannot serialize record '{name}': {e}"))?;
        fs::write(self.path(name), json)
            .map_err(|e| format!("cannot write record '{name}': {e}"))
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, String> {
        let text = fs::read_to_string(self.path(name))
            .map_err(|e| format!("cannot read record '{name}': {e}"))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("cannot parse record '{name}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        label: String,
        values: Vec<f64>,
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "olg-store-{tag}-{}-{n}",
            std::process::id()
        ))
    }

    #[test]
    fn round_trips_named_records() {
        let store = Store::open(scratch_dir("roundtrip")).expect("store opens");
        let record = Sample {
            label: "stage".to_string(),
            values: vec![1.0, 2.5, -3.0],
        };
        store.save("checkpoint", &record).expect("save succeeds");
        assert!(store.contains("checkpoint"));
        let loaded: Sample = store.load("checkpoint").expect("load succeeds");
        assert_eq!(loaded, record);
    }

    #[test]
    fn load_reports_missing_record_by_name() {
        let store = Store::open(scratch_dir("missing")).expect("store opens");
        let err = store.load::<Sample>("absent").expect_err("must fail");
        assert!(err.contains("absent"));
    }

    #[test]
    fn save_overwrites_existing_record() {
        let store = Store::open(scratch_dir("overwrite")).expect("store opens");
        let first = Sample {
            label: "one".to_string(),
            values: vec![1.0],
        };
        let second = Sample {
            label: "two".to_string(),
            values: vec![2.0],
        };
        store.save("slot", &first).expect("save succeeds");
        store.save("slot", &second).expect("save succeeds");
        let loaded: Sample = store.load("slot").expect("load succeeds");
        assert_eq!(loaded, second);
    }
}
