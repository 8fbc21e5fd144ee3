//! File discovery: walks a project root honoring `.gitignore`-style rules
//! plus the project config's own `include`/`exclude` globs, producing the
//! file list `Coordinator::run_full_index` parses.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use scopegraph_core::CoreError;

fn build_globset(patterns: &[String]) -> Result<GlobSet, CoreError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| CoreError::ConfigInvalid(format!("invalid glob `{pattern}`: {e}")))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| CoreError::ConfigInvalid(e.to_string()))
}

/// Walks `root`, respecting VCS ignore files, and returns every file whose
/// project-relative path matches `include` (or every path when `include` is
/// empty) and matches none of `exclude`.
pub fn discover_files(root: &Path, include: &[String], exclude: &[String]) -> Result<Vec<PathBuf>, CoreError> {
    let include_set = build_globset(include)?;
    let exclude_set = build_globset(exclude)?;

    let mut files = Vec::new();
    for entry in WalkBuilder::new(root).hidden(false).build() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude_set.is_match(relative) {
            continue;
        }
        if !include.is_empty() && !include_set.is_match(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_patterns_win_over_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target").join("generated.rs"), "// generated").unwrap();

        let files = discover_files(dir.path(), &["**/*.rs".to_string()], &["target/**".to_string()]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.rs"));
    }
}
