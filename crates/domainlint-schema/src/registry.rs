use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::builder::{split_fragments, Resolver};
use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::node::{IncludeRef, SchemaNode};

/// Name-keyed set of schema fragments available to `include`.
///
/// Every stored fragment is fully linked, so a registry is immutable input to
/// schema building and can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    fragments: BTreeMap<String, Arc<SchemaNode>>,
    config: SchemaConfig,
}

impl Registry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(SchemaConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            fragments: BTreeMap::new(),
            config,
        }
    }

    /// Register an already constructed node under `name`.
    pub fn register(&mut self, name: impl Into<String>, node: SchemaNode) -> Result<()> {
        let name = name.into();
        if self.fragments.contains_key(&name) {
            return Err(SchemaError::DuplicateFragment(name));
        }
        debug!(fragment = %name, "registered fragment");
        self.fragments.insert(name, Arc::new(node));
        Ok(())
    }

    /// Register every `schema;<name>` entry of a fragment source.
    ///
    /// Returns the registered names in sorted order.
    pub fn register_partials(&mut self, source: &str) -> Result<Vec<String>> {
        let value: Value = serde_yaml::from_str(source)?;
        self.register_partials_value(&value)
    }

    /// Register every `schema;<name>` entry of an already parsed fragment source.
    pub fn register_partials_value(&mut self, value: &Value) -> Result<Vec<String>> {
        let pending = collect_partials(value)?;
        self.absorb(pending)
    }

    fn absorb(&mut self, pending: BTreeMap<String, Value>) -> Result<Vec<String>> {
        let config = self.config;
        let mut resolver = Resolver::new(self, &config, pending)?;
        resolver.build_pending()?;
        let built = resolver.into_fragments();

        let names: Vec<String> = built.keys().cloned().collect();
        debug!(count = names.len(), fragments = ?names, "registered fragments");
        self.fragments.extend(built);
        Ok(names)
    }

    /// Load from embedded fragment sources.
    ///
    /// Sources may include each other regardless of their order in `sources`.
    pub fn from_embedded(sources: &[&str]) -> Result<Self> {
        let mut pending = BTreeMap::new();
        for source in sources {
            let value: Value = serde_yaml::from_str(source)?;
            merge_partials(&mut pending, collect_partials(&value)?)?;
        }
        let mut registry = Self::new();
        registry.absorb(pending)?;
        Ok(registry)
    }

    /// Load fragment files (`*.yml`, `*.yaml`) from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, SchemaConfig::default())
    }

    /// Load fragment files from a directory with explicit config.
    pub fn from_directory_with_config(path: &Path, config: SchemaConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded_file_count = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        let mut entries = entries
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut pending = BTreeMap::new();
        for entry in entries {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_fragment_file = is_yaml_file_name(&file_name);
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_fragment_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load fragment symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            if !is_fragment_file {
                warn!(file = %file_name, "skipping non-YAML file in fragment directory");
                continue;
            }

            loaded_file_count = loaded_file_count.saturating_add(1);
            if loaded_file_count > registry.config.max_fragments_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "fragment file count exceeds configured max ({}): {}",
                    registry.config.max_fragments_from_directory, loaded_file_count
                )));
            }

            let file = std::fs::File::open(&entry_path).map_err(|err| {
                SchemaError::LoadFailed(format!(
                    "failed opening fragment {}: {err}",
                    entry_path.display()
                ))
            })?;
            let opened_metadata = file
                .metadata()
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

            #[cfg(unix)]
            {
                if !same_file_identity(&path_metadata, &opened_metadata) {
                    return Err(SchemaError::LoadFailed(format!(
                        "fragment file changed during load: {file_name}"
                    )));
                }
            }

            let content = read_limited(file, &opened_metadata, &registry.config, &file_name)?;
            let value: Value = serde_yaml::from_str(&content)?;
            merge_partials(&mut pending, collect_partials(&value)?)?;
        }

        registry.absorb(pending)?;
        Ok(registry)
    }

    /// Look up a linked fragment.
    pub fn get(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.fragments.get(name)
    }

    /// Build an include node pointing at a registered fragment.
    pub fn include(&self, name: &str) -> Result<SchemaNode> {
        let target = self
            .get(name)
            .ok_or_else(|| SchemaError::UnresolvedInclude(name.to_string()))?;
        Ok(IncludeRef::new(name, Arc::clone(target)).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Registered fragment names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.fragments.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Get registry configuration.
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }
}

/// Read a schema file, enforcing the configured size limit even if it grows mid-read.
pub(crate) fn read_limited(
    file: std::fs::File,
    metadata: &std::fs::Metadata,
    config: &SchemaConfig,
    file_name: &str,
) -> Result<String> {
    if metadata.len() > config.max_schema_file_size as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large ({} bytes): {file_name}",
            metadata.len()
        )));
    }

    let max_bytes = config.max_schema_file_size;
    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| SchemaError::LoadFailed(format!("failed reading {file_name}: {err}")))?;
    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large while reading: {file_name}"
        )));
    }
    Ok(content)
}

fn collect_partials(value: &Value) -> Result<BTreeMap<String, Value>> {
    let Value::Mapping(def) = value else {
        return Err(SchemaError::Malformed {
            path: "<root>".to_string(),
            message: "fragment source must be a map of `schema;<name>` entries".to_string(),
        });
    };
    let (fragments, rest) = split_fragments(def)?;
    if let Some(key) = rest.keys().next() {
        return Err(SchemaError::Malformed {
            path: "<root>".to_string(),
            message: format!(
                "fragment sources may only declare `schema;<name>` entries, found `{}`",
                crate::violation::key_text(key)
            ),
        });
    }
    Ok(fragments)
}

fn merge_partials(
    into: &mut BTreeMap<String, Value>,
    from: BTreeMap<String, Value>,
) -> Result<()> {
    for (name, value) in from {
        if into.contains_key(&name) {
            return Err(SchemaError::DuplicateFragment(name));
        }
        into.insert(name, value);
    }
    Ok(())
}

fn is_yaml_file_name(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".yml") || lower.ends_with(".yaml")
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
