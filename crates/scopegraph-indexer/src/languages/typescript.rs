//! TypeScript language extractor using tree-sitter.

use std::path::{Path, PathBuf};

use anyhow::Result;
use scopegraph_core::{Language, Parameter, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{IdentifierReference, ImportReference, LanguageExtractor, ParsedFile, ReferenceKind, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct TypeScriptExtractor {
    parser_pool: ParserPool,
}

impl TypeScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn point_to_u32(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
        node.utf8_text(source).unwrap_or_default()
    }

    fn extract_parameters(node: Node, source: &[u8]) -> Vec<Parameter> {
        let Some(params) = node.child_by_field_name("parameters") else { return vec![] };
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for child in params.children(&mut cursor) {
            if child.kind() != "required_parameter" && child.kind() != "optional_parameter" {
                continue;
            }
            let name = child
                .child_by_field_name("pattern")
                .map(|n| Self::text(n, source).to_string())
                .unwrap_or_default();
            let param_type = child.child_by_field_name("type").map(|n| Self::text(n, source).to_string());
            out.push(Parameter { name, param_type, default: None });
        }
        out
    }

    fn heritage_clauses(node: Node, source: &[u8]) -> (Option<String>, Vec<String>) {
        let mut extends = None;
        let mut implements = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "class_heritage" {
                let mut hcursor = child.walk();
                for clause in child.children(&mut hcursor) {
                    match clause.kind() {
                        "extends_clause" => {
                            if let Some(value) = clause.named_child(0) {
                                extends = Some(Self::text(value, source).to_string());
                            }
                        }
                        "implements_clause" => {
                            let mut icursor = clause.walk();
                            for iface in clause.named_children(&mut icursor) {
                                implements.push(Self::text(iface, source).to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        (extends, implements)
    }

    fn identifier_references(body: Node, source: &[u8]) -> Vec<IdentifierReference> {
        let mut refs = Vec::new();
        collect_calls(body, source, &mut refs);
        refs
    }
}

fn heritage_reference(name: &str, imports: &[ImportReference], line: u32, keyword: &str) -> IdentifierReference {
    let kind = if imports.iter().any(|i| i.imported == name) {
        ReferenceKind::Import
    } else {
        ReferenceKind::LocalScope
    };
    IdentifierReference {
        identifier: name.to_string(),
        line,
        column: 0,
        context: Some(format!("{} {}", keyword, name)),
        kind,
        target_scope: None,
        source: None,
    }
}

fn collect_calls(node: Node, source: &[u8], refs: &mut Vec<IdentifierReference>) {
    if node.kind() == "call_expression" {
        if let Some(function) = node.child_by_field_name("function") {
            let identifier = match function.kind() {
                "identifier" => Some(function.utf8_text(source).unwrap_or_default().to_string()),
                "member_expression" => function
                    .child_by_field_name("property")
                    .map(|p| p.utf8_text(source).unwrap_or_default().to_string()),
                _ => None,
            };
            if let Some(identifier) = identifier {
                let point = function.start_position();
                refs.push(IdentifierReference {
                    identifier,
                    line: TypeScriptExtractor::point_to_u32(point),
                    column: point.column as u32,
                    context: node.utf8_text(source).ok().map(|s| s.to_string()),
                    kind: ReferenceKind::LocalScope,
                    target_scope: None,
                    source: None,
                });
            }
        }
    }
    if node.kind() == "new_expression" {
        if let Some(constructor) = node.child_by_field_name("constructor") {
            if constructor.kind() == "identifier" {
                let point = constructor.start_position();
                refs.push(IdentifierReference {
                    identifier: constructor.utf8_text(source).unwrap_or_default().to_string(),
                    line: TypeScriptExtractor::point_to_u32(point),
                    column: point.column as u32,
                    context: node.utf8_text(source).ok().map(|s| s.to_string()),
                    kind: ReferenceKind::LocalScope,
                    target_scope: None,
                    source: None,
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, refs);
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::TypeScript,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit_item(tree.root_node(), source, path, None, &mut scopes, &mut imports);

        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        // Heritage clauses (`extends`/`implements`) are resolved through the
        // same identifier-reference machinery as calls, so the resolver (C3)
        // can tell a cross-file `extends` from a same-file one.
        for scope in &mut scopes {
            if scope.kind != ScopeKind::Class {
                continue;
            }
            let mut extra = Vec::new();
            if let Some(extends) = scope.extends.clone() {
                extra.push(heritage_reference(&extends, &scope.import_references, scope.start_line, "extends"));
            }
            for implemented in scope.implements.clone() {
                extra.push(heritage_reference(&implemented, &scope.import_references, scope.start_line, "implements"));
            }
            scope.identifier_references.extend(extra);
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::TypeScript, scopes })
    }
}

fn visit_item(
    node: Node,
    source: &[u8],
    path: &Path,
    parent: Option<&str>,
    scopes: &mut Vec<ScopeInfo>,
    imports: &mut Vec<ImportReference>,
) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = TypeScriptExtractor::text(name_node, source).to_string();
                let body = node.child_by_field_name("body");
                let identifier_references = body.map(|b| TypeScriptExtractor::identifier_references(b, source)).unwrap_or_default();
                let return_type = node.child_by_field_name("return_type").map(|n| TypeScriptExtractor::text(n, source).to_string());
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: ScopeKind::Function,
                    file_path: path.to_path_buf(),
                    start_line: TypeScriptExtractor::point_to_u32(node.start_position()),
                    end_line: TypeScriptExtractor::point_to_u32(node.end_position()),
                    content: TypeScriptExtractor::text(node, source).to_string(),
                    signature: Some(format!("function {}(...)", name)),
                    parent: parent.map(str::to_string),
                    return_type,
                    parameters: TypeScriptExtractor::extract_parameters(node, source),
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references,
                    import_references: vec![],
                });
            }
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = TypeScriptExtractor::text(name_node, source).to_string();
                let (extends, implements) = TypeScriptExtractor::heritage_clauses(node, source);
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: ScopeKind::Class,
                    file_path: path.to_path_buf(),
                    start_line: TypeScriptExtractor::point_to_u32(node.start_position()),
                    end_line: TypeScriptExtractor::point_to_u32(node.end_position()),
                    content: TypeScriptExtractor::text(node, source).to_string(),
                    signature: Some(format!("class {}", name)),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends,
                    implements,
                    identifier_references: vec![],
                    import_references: vec![],
                });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        if child.kind() == "method_definition" {
                            visit_method(child, source, path, &name, scopes);
                        }
                    }
                }
            }
            return;
        }
        "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = TypeScriptExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind: ScopeKind::Interface,
                    file_path: path.to_path_buf(),
                    start_line: TypeScriptExtractor::point_to_u32(node.start_position()),
                    end_line: TypeScriptExtractor::point_to_u32(node.end_position()),
                    content: TypeScriptExtractor::text(node, source).to_string(),
                    signature: Some(format!("interface {}", name)),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "type_alias_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = TypeScriptExtractor::text(name_node, source).to_string();
                scopes.push(ScopeInfo {
                    name,
                    kind: ScopeKind::Type,
                    file_path: path.to_path_buf(),
                    start_line: TypeScriptExtractor::point_to_u32(node.start_position()),
                    end_line: TypeScriptExtractor::point_to_u32(node.end_position()),
                    content: TypeScriptExtractor::text(node, source).to_string(),
                    signature: Some(TypeScriptExtractor::text(node, source).to_string()),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends: None,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
            }
        }
        "import_statement" => {
            collect_import(node, source, imports);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_item(child, source, path, parent, scopes, imports);
    }
}

fn visit_method(node: Node, source: &[u8], path: &Path, class_name: &str, scopes: &mut Vec<ScopeInfo>) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = TypeScriptExtractor::text(name_node, source).to_string();
    let body = node.child_by_field_name("body");
    let identifier_references = body.map(|b| TypeScriptExtractor::identifier_references(b, source)).unwrap_or_default();
    scopes.push(ScopeInfo {
        name: name.clone(),
        kind: ScopeKind::Method,
        file_path: path.to_path_buf(),
        start_line: TypeScriptExtractor::point_to_u32(node.start_position()),
        end_line: TypeScriptExtractor::point_to_u32(node.end_position()),
        content: TypeScriptExtractor::text(node, source).to_string(),
        signature: Some(format!("{}::{}(...)", class_name, name)),
        parent: Some(class_name.to_string()),
        return_type: node.child_by_field_name("return_type").map(|n| TypeScriptExtractor::text(n, source).to_string()),
        parameters: TypeScriptExtractor::extract_parameters(node, source),
        decorators: vec![],
        docstring: None,
        heritage_clauses: vec![],
        generics: vec![],
        extends: None,
        implements: vec![],
        identifier_references,
        import_references: vec![],
    });
}

fn collect_import(node: Node, source: &[u8], imports: &mut Vec<ImportReference>) {
    let Some(source_node) = node.child_by_field_name("source") else { return };
    let module = TypeScriptExtractor::text(source_node, source).trim_matches(|c| c == '\'' || c == '"').to_string();
    let is_local = module.starts_with('.');

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_clause" {
            let mut icursor = child.walk();
            for clause_child in child.children(&mut icursor) {
                if clause_child.kind() == "named_imports" {
                    let mut ncursor = clause_child.walk();
                    for spec in clause_child.children(&mut ncursor) {
                        if spec.kind() == "import_specifier" {
                            let name = spec.child_by_field_name("name").map(|n| TypeScriptExtractor::text(n, source).to_string());
                            let alias = spec.child_by_field_name("alias").map(|n| TypeScriptExtractor::text(n, source).to_string());
                            if let Some(name) = name {
                                imports.push(ImportReference { source: module.clone(), imported: name, alias, is_local });
                            }
                        }
                    }
                } else if clause_child.kind() == "identifier" {
                    imports.push(ImportReference {
                        source: module.clone(),
                        imported: "default".to_string(),
                        alias: Some(TypeScriptExtractor::text(clause_child, source).to_string()),
                        is_local,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_class_with_method_and_import() {
        let extractor = TypeScriptExtractor::new(create_parser_pool());
        let source = r#"
import { SourceAdapter } from './types';

export class CodeSourceAdapter extends SourceAdapter {
    load() {
        return true;
    }
}
"#;
        let parsed = extractor.extract(Path::new("code.ts"), source.as_bytes()).unwrap();
        let class = parsed.scopes.iter().find(|s| s.name == "CodeSourceAdapter").unwrap();
        assert_eq!(class.extends.as_deref(), Some("SourceAdapter"));
        assert!(parsed.scopes.iter().any(|s| s.name == "load" && s.kind == ScopeKind::Method));
        assert!(class.import_references.iter().any(|i| i.imported == "SourceAdapter"));
    }

    #[test]
    fn shadowed_function_names_are_both_extracted_independently() {
        let extractor = TypeScriptExtractor::new(create_parser_pool());
        let a = extractor.extract(Path::new("a.ts"), b"export function render() {}").unwrap();
        let b = extractor.extract(Path::new("b.ts"), b"export function render() {}").unwrap();
        assert_eq!(a.scopes[0].name, "render");
        assert_eq!(b.scopes[0].name, "render");
        assert_eq!(a.scopes[0].file_path, PathBuf::from("a.ts"));
        assert_eq!(b.scopes[0].file_path, PathBuf::from("b.ts"));
    }
}
