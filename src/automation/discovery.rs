//! Locating installed application executables.
//!
//! Install folders carry the product version ("AutoCAD 2024", "NX2212"), so
//! configs list wildcard patterns instead of fixed paths. `*` matches any run
//! of characters inside one path component.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::IntegrationConfig;
use crate::error::DriverError;

/// Resolves the executable for an integration.
///
/// An explicit `executable` wins when it exists. Otherwise every search
/// pattern is expanded and the lexicographically highest match is used, which
/// selects the newest version for year- or number-named install folders.
pub fn resolve_executable(
    name: &str,
    integration: &IntegrationConfig,
) -> Result<PathBuf, DriverError> {
    let mut searched = Vec::new();

    if let Some(exe) = &integration.executable {
        if exe.is_file() {
            return Ok(exe.clone());
        }
        searched.push(exe.display().to_string());
    }

    for pattern in &integration.search_patterns {
        searched.push(pattern.clone());
        if let Some(found) = expand_pattern(pattern).into_iter().next() {
            crate::log(&format!("{}: found executable {}", name, found.display()));
            return Ok(found);
        }
    }

    Err(DriverError::ExecutableNotFound {
        integration: name.to_string(),
        searched,
    })
}

/// Expands a wildcard path pattern into existing files, highest first.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let normalized = pattern.replace('\\', "/");
    let mut parts = normalized.split('/').peekable();

    // Leading literal components form the starting directory
    let mut literal = Vec::new();
    while let Some(part) = parts.peek() {
        if part.contains('*') {
            break;
        }
        literal.push(*part);
        parts.next();
    }
    let rest: Vec<&str> = parts.collect();
    let base = match literal.as_slice() {
        [""] => "/".to_string(),
        _ => literal.join("/"),
    };

    if rest.is_empty() {
        let path = PathBuf::from(&base);
        return if path.is_file() { vec![path] } else { Vec::new() };
    }

    let mut candidates = vec![PathBuf::from(if base.is_empty() { "." } else { &base })];
    for (i, part) in rest.iter().enumerate() {
        let last = i == rest.len() - 1;
        let mut next = Vec::new();
        for dir in &candidates {
            if part.contains('*') {
                let Some(re) = component_regex(part) else {
                    return Vec::new();
                };
                next.extend(matching_entries(dir, &re));
            } else {
                next.push(dir.join(part));
            }
        }
        candidates = next
            .into_iter()
            .filter(|p| if last { p.is_file() } else { p.is_dir() })
            .collect();
        if candidates.is_empty() {
            break;
        }
    }

    candidates.sort();
    candidates.reverse();
    candidates
}

fn component_regex(component: &str) -> Option<Regex> {
    let body = component
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{}$", body)).ok()
}

fn matching_entries(dir: &Path, re: &Regex) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| re.is_match(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"MZ").unwrap();
    }

    #[test]
    fn test_newest_version_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Autodesk/AutoCAD 2022/acad.exe"));
        touch(&root.join("Autodesk/AutoCAD 2024/acad.exe"));
        fs::create_dir_all(root.join("Autodesk/AutoCAD 2025")).unwrap(); // no exe

        let pattern = format!("{}/Autodesk/AutoCAD*/acad.exe", root.display());
        let found = expand_pattern(&pattern);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("AutoCAD 2024/acad.exe"));
    }

    #[test]
    fn test_wildcard_is_case_insensitive_and_literal_otherwise() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Siemens/NX2212/NXBIN/ugraf.exe"));
        touch(&root.join("Siemens/NX.Tools/NXBIN/ugraf.exe"));

        let pattern = format!("{}/siemens/nx2*/NXBIN/ugraf.exe", root.display());
        // Literal components keep their case on case-sensitive file systems
        let literal_ok = root.join("siemens").exists();
        let found = expand_pattern(&pattern);
        if literal_ok {
            assert_eq!(found.len(), 1);
        } else {
            assert!(found.is_empty());
        }

        let pattern = format!("{}/Siemens/nx2*/NXBIN/ugraf.exe", root.display());
        let found = expand_pattern(&pattern);
        assert_eq!(found.len(), 1);
        assert!(found[0].to_string_lossy().contains("NX2212"));
    }

    #[test]
    fn test_resolve_prefers_explicit_executable() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("custom/acad.exe");
        touch(&exe);
        touch(&dir.path().join("AutoCAD 2030/acad.exe"));

        let integration = IntegrationConfig {
            executable: Some(exe.clone()),
            search_patterns: vec![format!("{}/AutoCAD*/acad.exe", dir.path().display())],
            ..Default::default()
        };
        assert_eq!(resolve_executable("autocad", &integration).unwrap(), exe);
    }

    #[test]
    fn test_resolve_reports_everything_searched() {
        let dir = tempdir().unwrap();
        let integration = IntegrationConfig {
            executable: Some(dir.path().join("missing.exe")),
            search_patterns: vec![format!("{}/NX*/ugraf.exe", dir.path().display())],
            ..Default::default()
        };
        let err = resolve_executable("nx", &integration).unwrap_err();
        assert!(err.is_environment());
        match err {
            DriverError::ExecutableNotFound { integration, searched } => {
                assert_eq!(integration, "nx");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
