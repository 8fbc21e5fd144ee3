//! UUID Registry (C2): deterministic scope identity across builds.
//!
//! The hashing rule itself (§3 invariant) is a pure function; `UuidRegistry`
//! adds the re-encounter/reuse bookkeeping described in §4.2 on top of it.

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::model::ScopeKind;

/// `SHA256("<parent>.<signature|name:type:content>[:line<L>]")[:8]`,
/// lowercase hex. `parent` is the empty string for top-level scopes.
pub fn scope_uuid(
    parent: &str,
    signature_or_fallback: &str,
    kind: ScopeKind,
    line: Option<u32>,
) -> String {
    let mut input = format!("{}.{}", parent, signature_or_fallback);
    if kind.disambiguates_by_line() {
        if let Some(line) = line {
            input.push_str(&format!(":line{}", line));
        }
    }
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Builds the `<name|type|content>` fallback used when a scope has no
/// explicit `signature` (e.g. a bare variable binding): `name:type:content`.
pub fn signature_fallback(name: &str, kind: ScopeKind, content: &str) -> String {
    format!("{}:{}:{}", name, kind.as_str(), content)
}

/// The identity tuple that decides UUID reuse on re-encounter (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityTuple {
    pub parent: String,
    pub signature: String,
    pub kind: ScopeKind,
    pub line: Option<u32>,
}

/// A single candidate registered under a name: used by the reference
/// resolver (C3) to disambiguate identifier references by file + kind.
#[derive(Debug, Clone)]
pub struct UuidCandidate {
    pub uuid: String,
    pub file: std::path::PathBuf,
    pub kind: ScopeKind,
}

/// Maintains `name -> [{uuid, file, type}]` (multi-valued) plus the identity
/// tuple each minted uuid was minted from, so repeated ingestion runs reuse
/// uuids for logically-unchanged scopes (§4.2, §5 "rebuilt each ingestion
/// run").
#[derive(Debug, Default)]
pub struct UuidRegistry {
    by_name: DashMap<String, Vec<UuidCandidate>>,
    by_identity: DashMap<IdentityTuple, String>,
}

impl UuidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint or reuse a uuid for this identity tuple, then register it under
    /// `name` for lookup by the reference resolver.
    pub fn assign(
        &self,
        name: &str,
        parent: &str,
        signature_or_fallback: &str,
        kind: ScopeKind,
        line: Option<u32>,
        file: &std::path::Path,
    ) -> String {
        let identity = IdentityTuple {
            parent: parent.to_string(),
            signature: signature_or_fallback.to_string(),
            kind,
            line,
        };

        let uuid = self
            .by_identity
            .entry(identity)
            .or_insert_with(|| scope_uuid(parent, signature_or_fallback, kind, line))
            .clone();

        let mut candidates = self.by_name.entry(name.to_string()).or_default();
        if !candidates.iter().any(|c| c.uuid == uuid) {
            candidates.push(UuidCandidate { uuid: uuid.clone(), file: file.to_path_buf(), kind });
        }
        uuid
    }

    pub fn candidates(&self, name: &str) -> Vec<UuidCandidate> {
        self.by_name.get(name).map(|c| c.clone()).unwrap_or_default()
    }

    /// Pre-seeds the registry with `(uuid, identity)` pairs already present
    /// in the store, so a re-parse of an unchanged scope reuses its uuid
    /// even before `assign` is called (§5: "rebuilt each ingestion run by
    /// pre-reading existing (uuid, hash) pairs").
    pub fn seed(&self, identity: IdentityTuple, uuid: String, name: &str, file: &std::path::Path, kind: ScopeKind) {
        self.by_identity.insert(identity, uuid.clone());
        let mut candidates = self.by_name.entry(name.to_string()).or_default();
        if !candidates.iter().any(|c| c.uuid == uuid) {
            candidates.push(UuidCandidate { uuid, file: file.to_path_buf(), kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_deterministic() {
        let a = scope_uuid("Foo", "fn bar()", ScopeKind::Method, None);
        let b = scope_uuid("Foo", "fn bar()", ScopeKind::Method, None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn uuid_changes_with_signature() {
        let a = scope_uuid("", "fn render()", ScopeKind::Function, None);
        let b = scope_uuid("", "fn render(x: i32)", ScopeKind::Function, None);
        assert_ne!(a, b);
    }

    #[test]
    fn line_suffix_only_applies_to_bindings() {
        let function_a = scope_uuid("", "fn x()", ScopeKind::Function, Some(1));
        let function_b = scope_uuid("", "fn x()", ScopeKind::Function, Some(2));
        assert_eq!(function_a, function_b, "line number must not affect function identity");

        let var_a = scope_uuid("", "x:variable:let x = 1", ScopeKind::Variable, Some(1));
        let var_b = scope_uuid("", "x:variable:let x = 1", ScopeKind::Variable, Some(2));
        assert_ne!(var_a, var_b, "line number must disambiguate shadowed variables");
    }

    #[test]
    fn registry_reuses_uuid_for_same_identity() {
        let registry = UuidRegistry::new();
        let file = std::path::Path::new("a.ts");
        let first = registry.assign("render", "", "function render()", ScopeKind::Function, None, file);
        let second = registry.assign("render", "", "function render()", ScopeKind::Function, None, file);
        assert_eq!(first, second);
        assert_eq!(registry.candidates("render").len(), 1);
    }

    #[test]
    fn registry_distinguishes_siblings_by_signature() {
        let registry = UuidRegistry::new();
        let file = std::path::Path::new("a.ts");
        let a = registry.assign("render", "", "function render(a)", ScopeKind::Function, None, file);
        let b = registry.assign("render", "", "function render(a, b)", ScopeKind::Function, None, file);
        assert_ne!(a, b);
        assert_eq!(registry.candidates("render").len(), 2);
    }
}
