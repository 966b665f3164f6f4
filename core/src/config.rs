use std::path::PathBuf;

/// Where the registry data lives and how index writes are guarded.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Directory holding `companies.json`, `search-index.json` and `work-instructions/`.
    pub data_root: PathBuf,
    /// Serialize writers of the shared index files within this process.
    pub serialize_index_writes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./public/data"),
            serialize_index_writes: true,
        }
    }
}

impl RegistryConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Production and NAS deployments read `DATA_ROOT_PATH`; development reads
    /// `DEV_DATA_ROOT_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let production = var("REGISTRY_ENV").as_deref() == Some("production");
        let nas = var("USE_NAS").as_deref() == Some("true");

        let data_root = if production || nas {
            var("DATA_ROOT_PATH").unwrap_or_else(|| "./public/data_demo".to_string())
        } else {
            var("DEV_DATA_ROOT_PATH").unwrap_or_else(|| "./public/data".to_string())
        };

        Self {
            data_root: PathBuf::from(data_root),
            serialize_index_writes: var("REGISTRY_SERIALIZE_WRITES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.serialize_index_writes),
        }
    }
}
