//! C++ language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{IdentifierReference, ImportReference, LanguageExtractor, ParsedFile, ReferenceKind, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct CppExtractor {
    parser_pool: ParserPool,
}

impl CppExtractor {
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

impl LanguageExtractor for CppExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Cpp,
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
            if scope.kind == ScopeKind::Class {
                if let Some(extends) = scope.extends.clone() {
                    scope.identifier_references.push(heritage_reference(&extends, &scope.import_references, scope.start_line));
                }
            }
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Cpp, scopes })
    }
}

fn heritage_reference(name: &str, imports: &[ImportReference], line: u32) -> IdentifierReference {
    let kind = if imports.iter().any(|i| i.imported == name) { ReferenceKind::Import } else { ReferenceKind::LocalScope };
    IdentifierReference {
        identifier: name.to_string(),
        line,
        column: 0,
        context: Some(format!("extends {}", name)),
        kind,
        target_scope: None,
        source: None,
    }
}

fn function_name(declarator: Node, source: &[u8]) -> Option<String> {
    match declarator.kind() {
        "function_declarator" => declarator
            .child_by_field_name("declarator")
            .map(|n| CppExtractor::text(n, source).to_string()),
        "pointer_declarator" | "reference_declarator" => {
            declarator.child_by_field_name("declarator").and_then(|n| function_name(n, source))
        }
        _ => None,
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
        "class_specifier" | "struct_specifier" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = CppExtractor::text(name_node, source).to_string();
                let kind = if node.kind() == "struct_specifier" { ScopeKind::Class } else { ScopeKind::Class };
                let extends = node.child_by_field_name("base_class_clause").and_then(|n| {
                    let mut cursor = n.walk();
                    n.named_children(&mut cursor).find_map(|c| {
                        if c.kind() == "type_identifier" || c.kind() == "qualified_identifier" {
                            Some(CppExtractor::text(c, source).to_string())
                        } else {
                            None
                        }
                    })
                });
                scopes.push(ScopeInfo {
                    name: name.clone(),
                    kind,
                    file_path: path.to_path_buf(),
                    start_line: CppExtractor::point_to_u32(node.start_position()),
                    end_line: CppExtractor::point_to_u32(node.end_position()),
                    content: CppExtractor::text(node, source).to_string(),
                    signature: Some(format!("class {}", name)),
                    parent: parent.map(str::to_string),
                    return_type: None,
                    parameters: vec![],
                    decorators: vec![],
                    docstring: None,
                    heritage_clauses: vec![],
                    generics: vec![],
                    extends,
                    implements: vec![],
                    identifier_references: vec![],
                    import_references: vec![],
                });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        visit(child, source, path, Some(&name), scopes, imports);
                    }
                }
            }
            return;
        }
        "function_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = function_name(declarator, source) {
                    let kind = if parent.is_some() { ScopeKind::Method } else { ScopeKind::Function };
                    scopes.push(ScopeInfo {
                        name: name.clone(),
                        kind,
                        file_path: path.to_path_buf(),
                        start_line: CppExtractor::point_to_u32(node.start_position()),
                        end_line: CppExtractor::point_to_u32(node.end_position()),
                        content: CppExtractor::text(node, source).to_string(),
                        signature: Some(format!("{}(...)", name)),
                        parent: parent.map(str::to_string),
                        return_type: node.child_by_field_name("type").map(|n| CppExtractor::text(n, source).to_string()),
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
            return;
        }
        "preproc_include" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "string_literal" || child.kind() == "system_lib_string" {
                    let header = CppExtractor::text(child, source)
                        .trim_matches('"')
                        .trim_matches('<')
                        .trim_matches('>')
                        .to_string();
                    let is_local = child.kind() == "string_literal";
                    imports.push(ImportReference { source: header, imported: "*".to_string(), alias: None, is_local });
                }
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
    fn extracts_class_method_and_include() {
        let extractor = CppExtractor::new(create_parser_pool());
        let source = r#"
#include "widget.h"

class Widget : public Base {
public:
    bool render() {
        return true;
    }
};
"#;
        let parsed = extractor.extract(Path::new("a.cpp"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "Widget" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "render" && s.kind == ScopeKind::Method));
    }
}
