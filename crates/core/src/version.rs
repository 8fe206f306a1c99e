//! Version tag and precache manifest.
//!
//! The version tag is bumped by hand on every deploy that changes the asset
//! set or the interception policy. It is the only invalidation mechanism:
//! activation deletes every store whose name does not match.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifies the active store: `"{prefix}-{tag}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheVersion {
    prefix: String,
    tag: String,
}

impl CacheVersion {
    pub fn new(prefix: impl Into<String>, tag: impl Into<String>) -> Result<Self, Error> {
        let prefix = prefix.into();
        let tag = tag.into();
        if prefix.trim().is_empty() {
            return Err(Error::InvalidInput("cache prefix cannot be empty".into()));
        }
        if tag.trim().is_empty() {
            return Err(Error::InvalidInput("version tag cannot be empty".into()));
        }
        Ok(Self { prefix, tag })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Name of the store owned by this version.
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.prefix, self.tag)
    }

    /// Every store not named for this version is stale.
    pub fn is_stale(&self, store_name: &str) -> bool {
        store_name != self.store_name()
    }

    /// Same prefix, different tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Result<Self, Error> {
        Self::new(self.prefix.clone(), tag)
    }
}

impl std::fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.store_name())
    }
}

/// Ordered list of absolute paths that must be in the store after install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheManifest(Vec<String>);

impl PrecacheManifest {
    /// Build a manifest, dropping duplicates while keeping first-seen order.
    pub fn new<I, S>(paths: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !path.starts_with('/') {
                return Err(Error::InvalidInput(format!("precache path must be absolute: {path}")));
            }
            if !out.contains(&path) {
                out.push(path);
            }
        }
        Ok(Self(out))
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self(default_precache_paths())
    }
}

/// Site root, root document and the two app icons.
pub fn default_precache_paths() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/icon-192.png".into(), "/icon-512.png".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name() {
        let version = CacheVersion::new("reelmind", "v1.0.0").unwrap();
        assert_eq!(version.store_name(), "reelmind-v1.0.0");
        assert_eq!(version.to_string(), "reelmind-v1.0.0");
    }

    #[test]
    fn test_is_stale() {
        let version = CacheVersion::new("reelmind", "v1.0.1").unwrap();
        assert!(version.is_stale("reelmind-v1.0.0"));
        assert!(version.is_stale("something-else"));
        assert!(!version.is_stale("reelmind-v1.0.1"));
    }

    #[test]
    fn test_empty_tag_rejected() {
        assert!(matches!(CacheVersion::new("reelmind", "  "), Err(Error::InvalidInput(_))));
        assert!(matches!(CacheVersion::new("", "v1"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_manifest_dedup_keeps_order() {
        let manifest = PrecacheManifest::new(["/", "/index.html", "/", "/icon-192.png"]).unwrap();
        assert_eq!(manifest.paths(), ["/", "/index.html", "/icon-192.png"]);
    }

    #[test]
    fn test_manifest_rejects_relative() {
        let result = PrecacheManifest::new(["index.html"]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_default_manifest() {
        let manifest = PrecacheManifest::default();
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.paths()[0], "/");
        assert_eq!(manifest.paths()[1], "/index.html");
    }
}
