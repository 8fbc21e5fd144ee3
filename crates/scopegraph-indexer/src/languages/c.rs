//! C language extractor using tree-sitter.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::{Language, ScopeKind};
use tree_sitter::{Node, Point};

use crate::extractor::{ImportReference, LanguageExtractor, ParsedFile, ScopeInfo};
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct CExtractor {
    parser_pool: ParserPool,
}

impl CExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn point_to_u32(point: Point) -> u32 {
        (point.row as u32) + 1
    }

    fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
        node.utf8_text(source).unwrap_or_default()
    }

    fn scope(node: Node, source: &[u8], path: &Path, name: &str, kind: ScopeKind, signature: String) -> ScopeInfo {
        ScopeInfo {
            name: name.to_string(),
            kind,
            file_path: path.to_path_buf(),
            start_line: Self::point_to_u32(node.start_position()),
            end_line: Self::point_to_u32(node.end_position()),
            content: Self::text(node, source).to_string(),
            signature: Some(signature),
            parent: None,
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
        }
    }

    fn extract_function(node: Node, source: &[u8], path: &Path) -> Option<ScopeInfo> {
        if node.kind() != "function_definition" {
            return None;
        }
        let declarator = node.child_by_field_name("declarator")?;
        let mut cursor = declarator.walk();
        for child in declarator.children(&mut cursor) {
            if child.kind() == "function_declarator" {
                if let Some(name_node) = child.child_by_field_name("declarator") {
                    let name = Self::text(name_node, source).to_string();
                    return Some(Self::scope(node, source, path, &name, ScopeKind::Function, format!("{}(...)", name)));
                }
            }
        }
        None
    }

    fn extract_struct(node: Node, source: &[u8], path: &Path) -> Option<ScopeInfo> {
        if node.kind() != "struct_specifier" {
            return None;
        }
        let name_node = node.child_by_field_name("name")?;
        let name = Self::text(name_node, source).to_string();
        Some(Self::scope(node, source, path, &name, ScopeKind::Class, format!("struct {}", name)))
    }

    fn extract_typedef(node: Node, source: &[u8], path: &Path) -> Option<ScopeInfo> {
        if node.kind() != "type_definition" {
            return None;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "type_identifier" {
                let name = Self::text(child, source).to_string();
                return Some(Self::scope(node, source, path, &name, ScopeKind::Type, format!("typedef {}", name)));
            }
        }
        None
    }

    fn extract_enum(node: Node, source: &[u8], path: &Path) -> Option<ScopeInfo> {
        if node.kind() != "enum_specifier" {
            return None;
        }
        let name_node = node.child_by_field_name("name")?;
        let name = Self::text(name_node, source).to_string();
        Some(Self::scope(node, source, path, &name, ScopeKind::Type, format!("enum {}", name)))
    }

    fn extract_include(node: Node, source: &[u8]) -> Option<ImportReference> {
        if node.kind() != "preproc_include" {
            return None;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "string_literal" || child.kind() == "system_lib_string" {
                let header = Self::text(child, source)
                    .trim_matches('"')
                    .trim_matches('<')
                    .trim_matches('>')
                    .to_string();
                let is_local = child.kind() == "string_literal";
                return Some(ImportReference { source: header, imported: "*".to_string(), alias: None, is_local });
            }
        }
        None
    }
}

impl LanguageExtractor for CExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<ParsedFile> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::C,
            content: source_code.to_string(),
            path: path.to_path_buf(),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;
        let tree = parse_result.tree;
        let source = source_code.as_bytes();

        let mut scopes = Vec::new();
        let mut imports = Vec::new();
        visit(tree.root_node(), source, path, &mut scopes, &mut imports);
        for scope in &mut scopes {
            scope.import_references = imports.clone();
        }

        Ok(ParsedFile { path: path.to_path_buf(), language: Language::C, scopes })
    }
}

fn visit(node: Node, source: &[u8], path: &Path, scopes: &mut Vec<ScopeInfo>, imports: &mut Vec<ImportReference>) {
    if let Some(s) = CExtractor::extract_function(node, source, path) {
        scopes.push(s);
    }
    if let Some(s) = CExtractor::extract_struct(node, source, path) {
        scopes.push(s);
    }
    if let Some(s) = CExtractor::extract_typedef(node, source, path) {
        scopes.push(s);
    }
    if let Some(s) = CExtractor::extract_enum(node, source, path) {
        scopes.push(s);
    }
    if let Some(i) = CExtractor::extract_include(node, source) {
        imports.push(i);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, path, scopes, imports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_function_struct_and_include() {
        let extractor = CExtractor::new(create_parser_pool());
        let source = r#"
#include "widget.h"

struct Widget {
    int id;
};

int render(struct Widget *w) {
    return w->id;
}
"#;
        let parsed = extractor.extract(Path::new("a.c"), source.as_bytes()).unwrap();
        assert!(parsed.scopes.iter().any(|s| s.name == "Widget" && s.kind == ScopeKind::Class));
        assert!(parsed.scopes.iter().any(|s| s.name == "render" && s.kind == ScopeKind::Function));
        assert!(parsed.scopes[0].import_references.iter().any(|i| i.source == "widget.h"));
    }
}
