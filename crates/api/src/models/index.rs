use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of an indexed source file, assigned by the file system layer.
pub type FileId = u32;

/// Names an index category, e.g. `java.class.shortName`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(#[serde(with = "crate::models::util::serde_arc_str")] pub Arc<str>);

impl IndexKey {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key inside one index category.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IndexValue {
    Str(#[serde(with = "crate::models::util::serde_arc_str")] Arc<str>),
    Int(i64),
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for IndexValue {
    fn from(s: Arc<str>) -> Self {
        IndexValue::Str(s)
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        IndexValue::Int(v)
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Str(s) => write!(f, "{:?}", s),
            IndexValue::Int(v) => write!(f, "{}", v),
        }
    }
}
