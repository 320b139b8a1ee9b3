//! Free-form scheduler options read from a JSON file
//!
//! The file is re-read whenever its modification time or size changes, so
//! operators can adjust filter options without restarting the scheduler.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{debug, warn};
use vmsched_core::SchedResult;

#[derive(Debug, Default)]
struct Cached {
    /// Modification time and length of the file last loaded
    stamp: Option<(SystemTime, u64)>,
    data: Option<Value>,
}

/// Options loader backing `filter_properties["config_options"]`
#[derive(Debug)]
pub struct SchedulerOptions {
    path: Option<PathBuf>,
    cache: Mutex<Cached>,
}

impl SchedulerOptions {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            cache: Mutex::new(Cached::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current options, reloading the file if it changed.
    ///
    /// Without a configured file this is an empty object. If the file
    /// cannot be read or parsed the last good options are kept.
    pub fn get_configuration(&self) -> Value {
        let Some(path) = &self.path else {
            return empty();
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        let stamp = match file_stamp(path) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not stat scheduler options file");
                return cache.data.clone().unwrap_or_else(empty);
            }
        };

        if cache.stamp != Some(stamp) {
            match load(path) {
                Ok(data) => {
                    debug!(path = %path.display(), "Loaded scheduler options");
                    cache.stamp = Some(stamp);
                    cache.data = Some(data);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not load scheduler options file");
                }
            }
        }

        cache.data.clone().unwrap_or_else(empty)
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn file_stamp(path: &Path) -> std::io::Result<(SystemTime, u64)> {
    let meta = std::fs::metadata(path)?;
    Ok((meta.modified()?, meta.len()))
}

fn load(path: &Path) -> SchedResult<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
