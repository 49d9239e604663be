use hearth_base::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_LOADED_RESOURCES: usize = 4096;
const DEFAULT_WORKER_THREAD_COUNT: usize = 4;

/// Handles are a u32 slot index + 1, with 0 reserved for null
pub const MAX_LOADED_RESOURCES_LIMIT: usize = u32::MAX as usize - 1;

fn default_max_loaded_resources() -> usize {
    DEFAULT_MAX_LOADED_RESOURCES
}

fn default_data_root_path() -> String {
    ".".to_string()
}

fn default_worker_thread_count() -> usize {
    DEFAULT_WORKER_THREAD_COUNT
}

#[derive(Serialize, Deserialize)]
pub struct ResourceSystemConfigJson {
    #[serde(default = "default_max_loaded_resources")]
    pub max_loaded_resources: usize,
    #[serde(default = "default_data_root_path")]
    pub data_root_path: String,
    #[serde(default = "default_worker_thread_count")]
    pub worker_thread_count: usize,
}

#[derive(Debug, Clone)]
pub struct ResourceSystemConfig {
    // Size of the handle pool. This is a hard limit, running out of handles is a configuration
    // error and is not recovered from.
    pub max_loaded_resources: usize,

    // Directory compiled resources are read from when using the disk file system
    pub data_root_path: PathBuf,

    // Threads in the pool the streaming job runs on
    pub worker_thread_count: usize,
}

impl Default for ResourceSystemConfig {
    fn default() -> Self {
        ResourceSystemConfig {
            max_loaded_resources: DEFAULT_MAX_LOADED_RESOURCES,
            data_root_path: PathBuf::from(default_data_root_path()),
            worker_thread_count: DEFAULT_WORKER_THREAD_COUNT,
        }
    }
}

impl ResourceSystemConfig {
    pub fn unverified_absolute_path(
        root_path: &Path,
        json_path: &str,
    ) -> PathBuf {
        if Path::new(json_path).is_absolute() {
            PathBuf::from(json_path)
        } else {
            root_path.join(json_path)
        }
    }

    // root_path is the directory the json file is in. Relative paths in the file are relative to it.
    pub fn read_from_path(path: &Path) -> ResourceResult<Self> {
        let parent = path.parent().ok_or_else(|| {
            ResourceError::StringError(format!("Parent of config file path {:?} could not be found", path))
        })?;
        let root_path = dunce::canonicalize(parent)?;

        let file_contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&root_path, &file_contents)
    }

    pub fn from_json_str(
        root_path: &Path,
        json: &str,
    ) -> ResourceResult<Self> {
        let config_file: ResourceSystemConfigJson = serde_json::from_str(json)?;

        if config_file.max_loaded_resources == 0 {
            return Err("max_loaded_resources must be at least 1".into());
        }

        if config_file.max_loaded_resources > MAX_LOADED_RESOURCES_LIMIT {
            return Err(format!(
                "max_loaded_resources is {}, the limit is {}",
                config_file.max_loaded_resources, MAX_LOADED_RESOURCES_LIMIT
            )
            .into());
        }

        let joined_path = Self::unverified_absolute_path(root_path, &config_file.data_root_path);
        // The data directory may not exist yet (content gets baked later), only canonicalize if it does
        let data_root_path = if joined_path.exists() {
            dunce::canonicalize(&joined_path)?
        } else {
            joined_path
        };

        Ok(ResourceSystemConfig {
            max_loaded_resources: config_file.max_loaded_resources,
            data_root_path,
            worker_thread_count: config_file.worker_thread_count,
        })
    }
}
