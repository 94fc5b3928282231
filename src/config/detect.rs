// src/config/detect.rs

//! Naive project type detection for `relaunch init`.
//!
//! Looks at the top-level file names only and returns a config with
//! sensible defaults for the first language that matches, in the order Go,
//! Ruby, Python, Rust, JavaScript. Anything else gets the Go-style default.

use std::path::Path;

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Go,
    Ruby,
    Python,
    Rust,
    JavaScript,
    Unknown,
}

/// Detect the project kind from the entries of `dir`.
pub fn detect_project(dir: &Path) -> Result<ProjectKind> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(detect_from_names(&names))
}

pub fn detect_from_names<S: AsRef<str>>(names: &[S]) -> ProjectKind {
    let has_ext = |ext: &str| names.iter().any(|n| n.as_ref().ends_with(ext));
    let has_file = |file: &str| names.iter().any(|n| n.as_ref() == file);

    if has_ext(".go") {
        ProjectKind::Go
    } else if has_file("Gemfile") || has_ext(".rb") {
        ProjectKind::Ruby
    } else if has_ext(".py") {
        ProjectKind::Python
    } else if has_file("Cargo.toml") || has_ext(".rs") {
        ProjectKind::Rust
    } else if has_file("package.json") || has_ext(".js") {
        ProjectKind::JavaScript
    } else {
        ProjectKind::Unknown
    }
}

/// Default configuration for a project kind.
pub fn config_for(kind: ProjectKind) -> Config {
    let mut raw = RawConfig::default();

    // Compiled languages build into tmp/ and are run from there.
    raw.build.enabled = true;
    raw.build.command = "go build".to_string();
    raw.watch.extensions = vec![".go".to_string()];

    match kind {
        ProjectKind::Go | ProjectKind::Unknown => {}
        ProjectKind::Rust => {
            raw.build.command = "rustc main.rs".to_string();
            raw.watch.extensions = vec![".rs".to_string()];
        }
        ProjectKind::Ruby => interpreted(&mut raw, ".rb"),
        ProjectKind::Python => interpreted(&mut raw, ".py"),
        ProjectKind::JavaScript => interpreted(&mut raw, ".js"),
    }

    // Only built-in defaults above; they always validate.
    Config::new_unchecked(raw)
}

fn interpreted(raw: &mut RawConfig, ext: &str) {
    raw.build.enabled = false;
    raw.build.command = String::new();
    raw.watch.extensions = vec![ext.to_string()];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_wins_over_javascript() {
        assert_eq!(detect_from_names(&["main.go", "package.json"]), ProjectKind::Go);
    }

    #[test]
    fn gemfile_means_ruby() {
        assert_eq!(detect_from_names(&["Gemfile", "config.ru"]), ProjectKind::Ruby);
    }

    #[test]
    fn cargo_manifest_means_rust() {
        assert_eq!(detect_from_names(&["Cargo.toml", "README.md"]), ProjectKind::Rust);
        let cfg = config_for(ProjectKind::Rust);
        assert!(cfg.build.enabled);
        assert_eq!(cfg.watch.extensions, vec![".rs"]);
    }

    #[test]
    fn interpreted_languages_disable_build() {
        let cfg = config_for(detect_from_names(&["app.py"]));
        assert!(!cfg.build.enabled);
        assert!(cfg.build.command.is_empty());
        assert_eq!(cfg.watch.extensions, vec![".py"]);
        assert!(Config::try_from(cfg.to_raw()).is_ok());
    }

    #[test]
    fn unknown_gets_go_defaults() {
        let cfg = config_for(detect_from_names::<&str>(&[]));
        assert_eq!(cfg.build.command, "go build");
    }
}
