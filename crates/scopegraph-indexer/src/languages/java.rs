//! Java language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{IdentifierReference, ImportReference, LanguageExtractor, ParsedFile, ReferenceKind, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct JavaExtractor {
    parser_pool: ParserPool,
}

impl JavaExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn point_to_u32(point: Point) -> u32 {
        point.row as u32 + 1
    }

    fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
        node.utf8_text(source).unwrap_or_default()
    }
}

impl LanguageExtractor for JavaExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Java,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit(tree.root_node(), source, path, None, &mut scopes, &mut imports);
        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }
        for scope in &mut scopes {
            if scope.kind != ScopeKind::Class {
                continue;
            }
            if let Some(extends) = scope.extends.clone() {
                scope.identifier_references.push(heritage_reference(&extends, &scope.import_references, scope.start_line, "extends"));
            }
            for implemented in scope.implements.clone() {
                scope
                    .identifier_references
                    .push(heritage_reference(&implemented, &scope.import_references, scope.start_line, "implements"));
            }
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Java, scopes })
    }
}

fn heritage_reference(name: &str, imports: &[ImportReference], line: u32, keyword: &str) -> IdentifierReference {
    let kind = if imports.iter().any(|i| i.imported == name) { ReferenceKind::Import } else { ReferenceKind::LocalScope };
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

fn visit(
    node: Node,
    source: &[u8],
    path: &Path,
    parent: Option<&str>,
    scopes: &mut Vec<ScopeInfo>,
    imports: &mut Vec<ImportReference>,
) {
    match node.kind() {
        "class_declaration" | "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = JavaExtractor::text(name_node, source).to_string();
                let kind = if node.kind() == "interface_declaration" { ScopeKind::Interface } else { ScopeKind::Class };
                let extends = node
                    .child_by_field_name("superclass")
                    .and_then(|n| n.named_child(0))
                    .map(|n| JavaExtractor::text(n, source).to_string());
                let implements = node
                    .child_by_field_name("interfaces")
                    .map(|n| {
                        let mut cursor = n.walk();
                        n.named_children(&mut cursor)
                            .map(|c| JavaExtractor::text(c, source).to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind,
                    file_path: path.to_path_buf(),
                    start_line: JavaExtractor::point_to_u32(node.start_position()),
                    end_line: JavaExtractor::point_to_u32(node.end_position()),
                    content: JavaExtractor::text(node, source).to_string(),
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
                        if matches!(child.kind(), "method_declaration" | "constructor_declaration") {
                            if let Some(method_name) = child.child_by_field_name("name") {
                                let method_name = JavaExtractor::text(method_name, source).to_string();
                                scopes.push(ScopeInfo {
                                    name: method_name.clone(),
                                    kind: ScopeKind::Method,
                                    file_path: path.to_path_buf(),
                                    start_line: JavaExtractor::point_to_u32(child.start_position()),
                                    end_line: JavaExtractor::point_to_u32(child.end_position()),
                                    content: JavaExtractor::text(child, source).to_string(),
                                    signature: Some(format!("{}(...)", method_name)),
                                    parent: Some(name.clone()),
                                    return_type: child.child_by_field_name("type").map(|n| JavaExtractor::text(n, source).to_string()),
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
                    }
                }
            }
            return;
        }
        "import_declaration" => {
            if let Some(name_node) = node.named_child(0) {
                let full_path = JavaExtractor::text(name_node, source).to_string();
                let imported = full_path.rsplit('.').next().unwrap_or(&full_path).to_string();
                imports.push(ImportReference { source: full_path, imported, alias: None, is_local: false });
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, path, parent, scopes, imports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_class_and_method() {
        let extractor = JavaExtractor::new(create_parser_pool());
        let source = r#"
public class Widget implements Renderable {
    public boolean render() {
        return true;
    }
}
"#;
        let parsed = extractor.extract(Path::new("Widget.java"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "Widget" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "render" && s.kind == ScopeKind::Method));
    }
}
