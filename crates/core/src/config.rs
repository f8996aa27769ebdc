use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_DIR: &str = ".stubscope/index";
pub const DEFAULT_DICTIONARY_FILE: &str = "names.dict";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StubIndexConfig {
    pub index_dir: PathBuf,
    #[serde(default = "default_dictionary_file")]
    pub dictionary_file: String,
}

fn default_dictionary_file() -> String {
    DEFAULT_DICTIONARY_FILE.to_string()
}

impl StubIndexConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            dictionary_file: default_dictionary_file(),
        }
    }

    /// Location from `STUBSCOPE_INDEX_DIR`, falling back to `$HOME/.stubscope/index`.
    pub fn from_env() -> Self {
        Self::new(Self::base_index_dir())
    }

    pub fn base_index_dir() -> PathBuf {
        if let Ok(env_dir) = std::env::var("STUBSCOPE_INDEX_DIR") {
            return PathBuf::from(env_dir);
        }

        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(DEFAULT_INDEX_DIR)
    }

    pub fn with_dictionary_file(mut self, name: &str) -> Self {
        self.dictionary_file = name.to_string();
        self
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.index_dir.join(&self.dictionary_file)
    }
}
