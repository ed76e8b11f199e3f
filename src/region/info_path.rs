//! Mapping between block info coordinates and document key paths
//!
//! Info for a block lives at `x / y / z / namespace / name` inside its
//! region's document. The dotted rendering (`"12.64.-3.myplugin.owner"`) is
//! what shows up in logs and can be parsed back into an [`InfoPath`].

use std::str::FromStr;

use super::location::BlockPos;
use crate::error::{StorageError, StorageResult};

/// Two-part key naming who a stored value belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedKey {
    namespace: String,
    key: String,
}

impl NamespacedKey {
    /// Create a key, the namespace is lowercased before validation
    pub fn new(namespace: impl AsRef<str>, key: impl Into<String>) -> StorageResult<Self> {
        let namespace = normalize_namespace(namespace.as_ref())?;
        let key = key.into();
        validate_segment(&key, |c| c == '/')?;
        Ok(Self { namespace, key })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for NamespacedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

impl FromStr for NamespacedKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, key) = s.split_once(':').ok_or_else(|| StorageError::InvalidKey {
            key: s.to_string(),
            reason: "expected namespace:key",
        })?;
        Self::new(namespace, key)
    }
}

/// Lowercase a namespace or type name and check it is usable as a path segment
pub fn normalize_namespace(namespace: &str) -> StorageResult<String> {
    let namespace = namespace.to_ascii_lowercase();
    validate_segment(&namespace, |_| false)?;
    Ok(namespace)
}

fn validate_segment(segment: &str, extra: impl Fn(char) -> bool) -> StorageResult<()> {
    if segment.is_empty() {
        return Err(StorageError::InvalidKey {
            key: segment.to_string(),
            reason: "empty segment",
        });
    }
    let valid = segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || extra(c));
    if !valid {
        return Err(StorageError::InvalidKey {
            key: segment.to_string(),
            reason: "only [a-z0-9_-] are allowed",
        });
    }
    Ok(())
}

/// Path of block info inside a region document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InfoPath {
    pub pos: BlockPos,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl InfoPath {
    /// Everything stored at a block
    pub fn block(pos: BlockPos) -> Self {
        Self {
            pos,
            namespace: None,
            name: None,
        }
    }

    /// One namespace's section at a block, `namespace` must already be normalized
    pub fn section(pos: BlockPos, namespace: impl Into<String>) -> Self {
        Self {
            pos,
            namespace: Some(namespace.into()),
            name: None,
        }
    }

    /// A single value at a block
    pub fn value(pos: BlockPos, key: &NamespacedKey) -> Self {
        Self {
            pos,
            namespace: Some(key.namespace.clone()),
            name: Some(key.key.clone()),
        }
    }

    /// Document key segments from the region root down
    pub fn segments(&self) -> Vec<String> {
        let mut segments = vec![
            self.pos.x.to_string(),
            self.pos.y.to_string(),
            self.pos.z.to_string(),
        ];
        if let Some(namespace) = &self.namespace {
            segments.push(namespace.clone());
            if let Some(name) = &self.name {
                segments.push(name.clone());
            }
        }
        segments
    }
}

impl std::fmt::Display for InfoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments().join("."))
    }
}

impl FromStr for InfoPath {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| StorageError::InvalidKey {
            key: s.to_string(),
            reason,
        };
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 3 || parts.len() > 5 {
            return Err(invalid("expected x.y.z[.namespace[.name]]"));
        }

        let mut coords = [0i32; 3];
        for (coord, part) in coords.iter_mut().zip(&parts) {
            *coord = part.parse().map_err(|_| invalid("coordinate is not an integer"))?;
        }
        let pos = BlockPos::new(coords[0], coords[1], coords[2]);

        match parts.len() {
            3 => Ok(Self::block(pos)),
            4 => Ok(Self::section(pos, normalize_namespace(parts[3])?)),
            _ => Ok(Self::value(pos, &NamespacedKey::new(parts[3], parts[4])?)),
        }
    }
}
