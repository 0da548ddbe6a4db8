//! Definition loading and the id-keyed store
//!
//! Definitions live in a directory of TOML files, walked recursively so
//! encounters can be grouped into subdirectories. The store is immutable
//! once built; a reload builds a fresh store and swaps it wholesale.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;

use super::{DefinitionError, EncounterDefinition, EncounterFile};

/// Default definitions directory under the platform config dir.
pub fn default_definitions_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gauntlet")
        .join("encounters")
}

/// Read-only lookup of encounter definitions by id.
///
/// Definitions are held behind `Arc` so sessions can capture the exact
/// definition they started with, independent of later reloads.
#[derive(Debug, Clone, Default)]
pub struct DefinitionStore {
    encounters: HashMap<String, Arc<EncounterDefinition>>,
}

impl DefinitionStore {
    /// Build a store from already-parsed definitions (used by tests and
    /// embedders that manage their own config pipeline).
    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = EncounterDefinition>,
    {
        let mut encounters = HashMap::new();
        for mut def in definitions {
            fill_fallbacks(&mut def);
            encounters.insert(def.id.clone(), Arc::new(def));
        }
        Self { encounters }
    }

    /// Load every `*.toml` file under `dir`, recursively.
    ///
    /// A missing directory yields an empty store; a malformed file or a
    /// duplicate id fails the whole load, so a broken reload never half
    /// replaces the previous definitions.
    pub fn load_from_dir(dir: &Path) -> Result<Self, DefinitionError> {
        let mut store = Self::default();
        if !dir.exists() {
            return Ok(store);
        }
        store.load_recursive(dir)?;
        Ok(store)
    }

    fn load_recursive(&mut self, dir: &Path) -> Result<(), DefinitionError> {
        let entries = fs::read_dir(dir).map_err(|source| DefinitionError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.load_recursive(&path)?;
            } else if path.extension().is_some_and(|ext| ext == "toml") {
                self.load_file(&path)?;
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<(), DefinitionError> {
        let content = fs::read_to_string(path).map_err(|source| DefinitionError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let file: EncounterFile =
            toml::from_str(&content).map_err(|source| DefinitionError::ParseToml {
                path: path.to_path_buf(),
                source,
            })?;

        for mut def in file.encounters {
            if def.id.is_empty() {
                return Err(DefinitionError::MissingId {
                    path: path.to_path_buf(),
                });
            }
            fill_fallbacks(&mut def);
            if self.encounters.contains_key(&def.id) {
                return Err(DefinitionError::DuplicateId {
                    id: def.id,
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(id = %def.id, path = %path.display(), "loaded encounter definition");
            self.encounters.insert(def.id.clone(), Arc::new(def));
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<EncounterDefinition>> {
        self.encounters.get(id).cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<EncounterDefinition>> {
        self.encounters.values()
    }

    /// Sorted ids, for listings.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.encounters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.encounters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encounters.is_empty()
    }
}

/// Display name and monster id default to the encounter id.
fn fill_fallbacks(def: &mut EncounterDefinition) {
    if def.name.is_empty() {
        def.name = def.id.clone();
    }
    if def.monster.is_empty() {
        def.monster = def.id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Vec<EncounterDefinition> {
        toml::from_str::<EncounterFile>(toml)
            .expect("parse failed")
            .encounters
    }

    #[test]
    fn test_store_lookup_and_fallbacks() {
        let defs = parse(
            r#"
[[encounter]]
id = "dragon"

[[encounter]]
id = "lich"
name = "Lich King"
monster = "lich_king"
"#,
        );
        let store = DefinitionStore::from_definitions(defs);

        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec!["dragon", "lich"]);

        let dragon = store.get("dragon").expect("dragon missing");
        assert_eq!(dragon.name, "dragon");
        assert_eq!(dragon.monster, "dragon");

        let lich = store.get("lich").expect("lich missing");
        assert_eq!(lich.name, "Lich King");
        assert_eq!(lich.monster, "lich_king");

        assert!(store.get("wyrm").is_none());
    }

    #[test]
    fn test_missing_directory_is_empty_store() {
        let store = DefinitionStore::load_from_dir(Path::new("/nonexistent/gauntlet-defs"))
            .expect("missing dir should not error");
        assert!(store.is_empty());
    }
}
