use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Flat key/value persistence boundary.
///
/// A missing key reads as `None` and is treated by every caller as
/// "empty/default". Implementations swallow I/O errors at this boundary
/// (logged to stderr), so a failing disk never crashes a scan — callers
/// must not assume a `set` reached the disk if a warning was printed.
#[allow(async_fn_in_trait)]
pub trait Storage {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value);
}

impl<S: Storage> Storage for &S {
    async fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) {
        (**self).set(key, value).await
    }
}

const STORE_FILE: &str = "store.json";

/// Storage backed by a single JSON document in the user data directory.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new() -> Self {
        let mut dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.push("leakwatch");
        fs::create_dir_all(&dir).ok();
        dir.push(STORE_FILE);
        JsonFileStorage { path: dir }
    }

    /// Storage rooted at an explicit file, for scripted use.
    pub fn at(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        JsonFileStorage { path }
    }

    fn read_document(&self) -> serde_json::Map<String, Value> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .unwrap_or_default(),
            Err(_) => serde_json::Map::new(),
        }
    }
}

impl Default for JsonFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for JsonFileStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        self.read_document().get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        let mut document = self.read_document();
        document.insert(key.to_string(), value);

        let json = match serde_json::to_string_pretty(&Value::Object(document)) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("⚠️  Could not encode storage document: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            eprintln!(
                "⚠️  Could not write storage file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
