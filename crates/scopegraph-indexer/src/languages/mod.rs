//! Language extractors for different programming languages

pub mod c;
pub mod cpp;
pub mod generic;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use std::path::Path;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{create_parser_pool, FileType};

/// Picks the extractor for a path by its extension, always returning
/// `Some` — unrecognized extensions fall back to the no-op generic
/// extractor rather than leaving the file unindexed.
pub fn get_extractor(path: &Path) -> Option<Box<dyn LanguageExtractor>> {
    let parser_pool = create_parser_pool();
    Some(match FileType::from_path(&path.to_path_buf()) {
        Some(FileType::Rust) => Box::new(rust::RustExtractor::new(parser_pool)),
        Some(FileType::TypeScript) => Box::new(typescript::TypeScriptExtractor::new(parser_pool)),
        Some(FileType::JavaScript) => Box::new(javascript::JavaScriptExtractor::new(parser_pool)),
        Some(FileType::Python) => Box::new(python::PythonExtractor::new(parser_pool)),
        Some(FileType::Go) => Box::new(go::GoExtractor::new(parser_pool)),
        Some(FileType::Java) => Box::new(java::JavaExtractor::new(parser_pool)),
        Some(FileType::C) => Box::new(c::CExtractor::new(parser_pool)),
        Some(FileType::Cpp) => Box::new(cpp::CppExtractor::new(parser_pool)),
        Some(FileType::Generic) | None => Box::new(generic::GenericExtractor::new()),
    })
}
