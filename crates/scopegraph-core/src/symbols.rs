//! Name index for cross-file reference resolution (feeds C3).
//!
//! Distinct from `uuid::UuidRegistry`: the registry mints/reuses uuids from
//! identity tuples, while this table is the resolver-facing `name ->
//! identities` and `file -> names defined here` index used to look a bare
//! identifier up and to drop a file's definitions on re-parse.

use dashmap::DashMap;

/// Maps short names to the scope identities (uuids) defined under them,
/// and tracks which file each name came from for bulk removal.
pub struct SymbolTable {
    symbols: DashMap<String, Vec<String>>,
    file_symbols: DashMap<String, Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: DashMap::new(),
            file_symbols: DashMap::new(),
        }
    }

    /// Register `name` as resolving (among possibly several candidates) to
    /// `identity`, defined in `file_path`.
    pub fn insert(&self, name: String, identity: String, file_path: String) {
        let mut names = self.symbols.entry(name.clone()).or_default();
        if !names.contains(&identity) {
            names.push(identity.clone());
        }
        drop(names);
        let mut in_file = self.file_symbols.entry(file_path).or_default();
        if !in_file.contains(&name) {
            in_file.push(name);
        }
    }

    /// All identities registered under `name`, in insertion order.
    pub fn lookup(&self, name: &str) -> Vec<String> {
        self.symbols.get(name).map(|r| r.value().clone()).unwrap_or_default()
    }

    /// Names defined in a given file.
    pub fn names_in_file(&self, file_path: &str) -> Vec<String> {
        self.file_symbols.get(file_path).map(|r| r.value().clone()).unwrap_or_default()
    }

    /// Drop every name this file contributed, so a re-parse starts clean.
    pub fn remove_file(&self, file_path: &str) {
        if let Some((_, names)) = self.file_symbols.remove(file_path) {
            for name in names {
                if let Some(mut identities) = self.symbols.get_mut(&name) {
                    identities.retain(|id| !is_from_file(id, file_path));
                }
            }
        }
    }
}

/// Best-effort check used only by `remove_file`'s cleanup: most identities
/// here are content-hash uuids with no file encoded, so this only prunes
/// the node/dir/lib/project identities that do carry a path.
fn is_from_file(identity: &str, file_path: &str) -> bool {
    identity
        .strip_prefix("file:")
        .map(|p| p == file_path)
        .unwrap_or(false)
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_all_candidates_for_a_name() {
        let table = SymbolTable::new();
        table.insert("render".into(), "uuid1".into(), "a.ts".into());
        table.insert("render".into(), "uuid2".into(), "b.ts".into());
        let mut candidates = table.lookup("render");
        candidates.sort();
        assert_eq!(candidates, vec!["uuid1".to_string(), "uuid2".to_string()]);
    }

    #[test]
    fn names_in_file_tracks_definitions() {
        let table = SymbolTable::new();
        table.insert("render".into(), "uuid1".into(), "a.ts".into());
        table.insert("helper".into(), "uuid2".into(), "a.ts".into());
        let mut names = table.names_in_file("a.ts");
        names.sort();
        assert_eq!(names, vec!["helper".to_string(), "render".to_string()]);
    }
}
