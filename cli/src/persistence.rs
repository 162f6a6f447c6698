use canvass::{ChangeSet, Persistence, StoreReceipt, SurveyError, SurveyResult};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps committed answers in one flat JSON object on disk
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> SurveyResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SurveyError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(SurveyError::State(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl Persistence for JsonFilePersistence {
    fn store(&self, changes: &ChangeSet) -> SurveyResult<StoreReceipt> {
        let mut saved = self.read()?;
        for (key, value) in &changes.entries {
            if value.is_null() {
                saved.remove(key);
            } else {
                saved.insert(key.clone(), value.clone());
            }
        }
        let text = serde_json::to_string_pretty(&Value::Object(saved))?;
        fs::write(&self.path, text)
            .map_err(|e| SurveyError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), keys = changes.len(), "state written");
        Ok(StoreReceipt::ok())
    }

    fn retrieve(&self) -> SurveyResult<Option<Value>> {
        let saved = self.read()?;
        Ok((!saved.is_empty()).then_some(Value::Object(saved)))
    }
}
