//! Reference resolver (C3): maps identifier references to owning scope
//! UUIDs using file + import + re-export context (§4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scopegraph_core::{EdgeKind, EdgeLocation, GraphEdge, ScopeKind, SymbolTable};

use crate::extractor::{IdentifierReference, ImportReference, ReferenceKind};

const MAX_REEXPORT_DEPTH: u32 = 16;

/// The resolver-relevant facts about one already-UUID-assigned scope.
#[derive(Debug, Clone)]
pub struct ScopeFacts {
    pub uuid: String,
    pub name: String,
    pub kind: ScopeKind,
    pub file: PathBuf,
    pub signature: String,
}

/// Resolves every identifier/import reference across a whole run's scopes
/// into `CONSUMES` / `INHERITS_FROM` / `IMPLEMENTS` / `USES_LIBRARY` edges.
///
/// `refs_by_uuid` carries each scope's own identifier references plus the
/// import bindings visible in its file. `file_imports` is the same import
/// list keyed by file, used to follow re-export chains when an import
/// resolves to a symbol the target file itself re-exports from elsewhere.
pub fn resolve(
    scopes: &[ScopeFacts],
    refs_by_uuid: &HashMap<String, (Vec<IdentifierReference>, Vec<ImportReference>)>,
    file_imports: &HashMap<PathBuf, Vec<ImportReference>>,
    symbols: &SymbolTable,
) -> Vec<GraphEdge> {
    let facts_by_uuid: HashMap<&str, &ScopeFacts> = scopes.iter().map(|f| (f.uuid.as_str(), f)).collect();
    let mut edges = Vec::new();

    for scope in scopes {
        let Some((refs, imports)) = refs_by_uuid.get(&scope.uuid) else { continue };
        for r in refs {
            let location = EdgeLocation { line: Some(r.line), column: Some(r.column), context: r.context.clone() };
            match r.kind {
                ReferenceKind::LocalScope => {
                    if let Some(target) = resolve_local_scope(scope, r, &facts_by_uuid, symbols) {
                        edges.push(classify_edge(scope, target, r, location));
                    }
                }
                ReferenceKind::Import => {
                    if let Some(target) = resolve_import(scope, r, imports, file_imports, &facts_by_uuid, symbols) {
                        edges.push(classify_edge(scope, target, r, location));
                    }
                }
                ReferenceKind::External => {
                    if let Some(import) = find_import(imports, r) {
                        edges.push(
                            GraphEdge::new(EdgeKind::UsesLibrary, scope.uuid.clone(), format!("lib:{}", import.source))
                                .with_symbol(r.identifier.clone())
                                .with_location(location),
                        );
                    }
                }
            }
        }
    }
    edges
}

fn find_import<'a>(imports: &'a [ImportReference], r: &IdentifierReference) -> Option<&'a ImportReference> {
    imports
        .iter()
        .find(|i| i.imported == r.identifier || i.alias.as_deref() == Some(r.identifier.as_str()))
}

fn prefer_value_kind<'a>(mut candidates: Vec<&'a ScopeFacts>) -> Option<&'a ScopeFacts> {
    candidates.sort_by_key(|f| !f.kind.is_value_kind());
    candidates.into_iter().next()
}

fn resolve_local_scope<'a>(
    scope: &ScopeFacts,
    r: &IdentifierReference,
    facts_by_uuid: &HashMap<&str, &'a ScopeFacts>,
    symbols: &SymbolTable,
) -> Option<&'a ScopeFacts> {
    let candidates: Vec<&ScopeFacts> = symbols
        .lookup(&r.identifier)
        .iter()
        .filter_map(|uuid| facts_by_uuid.get(uuid.as_str()).copied())
        .filter(|f| f.file == scope.file && f.uuid != scope.uuid)
        .collect();
    prefer_value_kind(candidates)
}

fn resolve_import<'a>(
    scope: &ScopeFacts,
    r: &IdentifierReference,
    imports: &[ImportReference],
    file_imports: &HashMap<PathBuf, Vec<ImportReference>>,
    facts_by_uuid: &HashMap<&str, &'a ScopeFacts>,
    symbols: &SymbolTable,
) -> Option<&'a ScopeFacts> {
    let import = find_import(imports, r)?;
    if !import.is_local {
        return None;
    }

    let mut target_file = resolve_module_path(&scope.file, &import.source);
    let mut imported_name = import.imported.clone();
    let mut depth = 0;

    loop {
        let candidates: Vec<&ScopeFacts> = symbols
            .lookup(&imported_name)
            .iter()
            .filter_map(|uuid| facts_by_uuid.get(uuid.as_str()).copied())
            .filter(|f| stem_matches(&f.file, &target_file))
            .collect();
        if let Some(found) = prefer_value_kind(candidates) {
            return Some(found);
        }

        depth += 1;
        if depth > MAX_REEXPORT_DEPTH {
            return None;
        }

        // The name isn't defined in target_file itself; see if target_file
        // re-exports it from a third file and keep following the chain.
        let reexport = file_imports
            .get(&target_file)
            .or_else(|| file_imports.iter().find(|(f, _)| stem_matches(f, &target_file)).map(|(_, v)| v))
            .and_then(|imports| imports.iter().find(|i| i.imported == imported_name || i.alias.as_deref() == Some(imported_name.as_str())))?;
        if !reexport.is_local {
            return None;
        }
        imported_name = reexport.imported.clone();
        target_file = resolve_module_path(&target_file, &reexport.source);
    }
}

fn resolve_module_path(from_file: &Path, source: &str) -> PathBuf {
    if let Some(dir) = from_file.parent() {
        normalize(&dir.join(source))
    } else {
        PathBuf::from(source)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn stem_matches(a: &Path, b: &Path) -> bool {
    a.with_extension("") == b.with_extension("")
}

/// §4.3: a reference is an inheritance edge iff the source scope is a class,
/// the target is a class or interface, and the reference's context (or the
/// source's own signature) carries the relevant keyword.
fn classify_edge(scope: &ScopeFacts, target: &ScopeFacts, r: &IdentifierReference, location: EdgeLocation) -> GraphEdge {
    let mentions = |keyword: &str| {
        r.context.as_deref().map(|c| c.contains(keyword)).unwrap_or(false) || scope.signature.contains(keyword)
    };
    if scope.kind == ScopeKind::Class && matches!(target.kind, ScopeKind::Class | ScopeKind::Interface) {
        if mentions("extends") {
            return GraphEdge::new(EdgeKind::InheritsFrom, scope.uuid.clone(), target.uuid.clone()).with_location(location);
        }
        if mentions("implements") {
            return GraphEdge::new(EdgeKind::Implements, scope.uuid.clone(), target.uuid.clone()).with_location(location);
        }
    }
    GraphEdge::new(EdgeKind::Consumes, scope.uuid.clone(), target.uuid.clone()).with_location(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(uuid: &str, name: &str, kind: ScopeKind, file: &str, signature: &str) -> ScopeFacts {
        ScopeFacts { uuid: uuid.into(), name: name.into(), kind, file: PathBuf::from(file), signature: signature.into() }
    }

    fn reference(identifier: &str, kind: ReferenceKind, context: Option<&str>) -> IdentifierReference {
        IdentifierReference {
            identifier: identifier.into(),
            line: 1,
            column: 1,
            context: context.map(str::to_string),
            kind,
            target_scope: None,
            source: None,
        }
    }

    #[test]
    fn local_reference_prefers_value_kind_over_type_kind() {
        let symbols = SymbolTable::new();
        symbols.insert("Widget".into(), "iface-uuid".into(), "a.ts".into());
        symbols.insert("Widget".into(), "class-uuid".into(), "a.ts".into());

        let caller = facts("caller-uuid", "render", ScopeKind::Function, "a.ts", "function render()");
        let iface = facts("iface-uuid", "Widget", ScopeKind::Interface, "a.ts", "interface Widget {}");
        let class = facts("class-uuid", "Widget", ScopeKind::Class, "a.ts", "class Widget {}");

        let mut refs = HashMap::new();
        refs.insert(caller.uuid.clone(), (vec![reference("Widget", ReferenceKind::LocalScope, None)], vec![]));

        let edges = resolve(&[caller.clone(), iface, class], &refs, &HashMap::new(), &symbols);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Consumes);
        assert_eq!(edges[0].target, "class-uuid");
    }

    #[test]
    fn cross_file_extends_becomes_inherits_from() {
        let symbols = SymbolTable::new();
        symbols.insert("SourceAdapter".into(), "base-uuid".into(), "base.ts".into());

        let derived = facts(
            "derived-uuid",
            "CodeSourceAdapter",
            ScopeKind::Class,
            "derived.ts",
            "class CodeSourceAdapter extends SourceAdapter",
        );
        let base = facts("base-uuid", "SourceAdapter", ScopeKind::Class, "base.ts", "class SourceAdapter {}");

        let import = ImportReference { source: "./base".into(), imported: "SourceAdapter".into(), alias: None, is_local: true };
        let mut refs = HashMap::new();
        refs.insert(
            derived.uuid.clone(),
            (vec![reference("SourceAdapter", ReferenceKind::Import, Some("class CodeSourceAdapter extends SourceAdapter"))], vec![import]),
        );

        let edges = resolve(&[derived, base], &refs, &HashMap::new(), &symbols);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::InheritsFrom);
        assert_eq!(edges[0].target, "base-uuid");
    }

    #[test]
    fn external_import_records_uses_library_with_symbol() {
        let symbols = SymbolTable::new();
        let caller = facts("caller-uuid", "render", ScopeKind::Function, "a.ts", "function render()");
        let import = ImportReference { source: "react".into(), imported: "useState".into(), alias: None, is_local: false };
        let mut refs = HashMap::new();
        refs.insert(caller.uuid.clone(), (vec![reference("useState", ReferenceKind::External, None)], vec![import]));

        let edges = resolve(&[caller], &refs, &HashMap::new(), &symbols);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::UsesLibrary);
        assert_eq!(edges[0].target, "lib:react");
        assert_eq!(edges[0].symbol.as_deref(), Some("useState"));
    }
}
