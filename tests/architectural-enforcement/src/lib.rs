//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the chat crates honest:
//! - Timers only live in the scheduler; nothing else sleeps
//! - Blocking file I/O only happens while loading configuration
//! - Library code propagates errors instead of unwrapping
//!
//! Only production code is scanned. Everything from a file's `#[cfg(test)]`
//! module onwards is ignored, as are comment lines.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File, relative to the workspace root
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from("../.."))
}

/// All `.rs` files under `chat/*/src`
pub fn production_sources() -> Vec<PathBuf> {
    let chat = workspace_root().join("chat");
    WalkDir::new(&chat)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "rs"))
        .filter(|p| p.components().any(|c| c.as_os_str() == "src"))
        .collect()
}

/// Production lines of a source file: stops at the test module, skips comments
pub fn production_lines(source: &str) -> Vec<(usize, &str)> {
    source
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

/// Find `pattern` in production code, except in files whose path ends with
/// one of `allowed`
pub fn find_violations(pattern: &str, allowed: &[&str]) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for path in production_sources() {
        if allowed.iter().any(|suffix| path.ends_with(suffix)) {
            continue;
        }
        let Ok(source) = fs::read_to_string(&path) else {
            continue;
        };
        for (line, text) in production_lines(&source) {
            if text.contains(pattern) {
                violations.push(Violation {
                    file: path.strip_prefix(&root).unwrap_or(&path).to_path_buf(),
                    line,
                    text: text.trim().to_string(),
                });
            }
        }
    }

    violations
}

/// Panic with a readable report if there are violations
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
    panic!(
        "{rule}: {} violation(s)\n  {}",
        violations.len(),
        report.join("\n  ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// x.unwrap()\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}")]);
    }
}
