//! Generic fallback extractor for file types without a dedicated language extractor.

use std::path::Path;

use anyhow::Result;
use scopegraph_core::Language;

use crate::extractor::{LanguageExtractor, ParsedFile};

pub struct GenericExtractor;

impl GenericExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for GenericExtractor {
    fn extract(&self, path: &Path, _content: &[u8]) -> Result<ParsedFile> {
        Ok(ParsedFile { path: path.to_path_buf(), language: Language::Other, scopes: vec![] })
    }
}
