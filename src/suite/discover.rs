//! Test script discovery
//!
//! Test scripts are files named `tNNNN-<name>.sh` in a single directory.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use super::pattern::wildmatch;

/// True for names shaped like `t0001-basic.sh`
pub fn is_test_script(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 5
        && bytes[0] == b't'
        && bytes[1..5].iter().all(u8::is_ascii_digit)
        && bytes[5] == b'-'
        && name.ends_with(".sh")
}

/// List test scripts in `dir` matching any of `patterns`, sorted by name
///
/// With no patterns every test script is selected.
pub fn discover_tests(dir: &Path, patterns: &[String]) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Could not open directory '{}'", dir.display()))?;

    let mut tests = Vec::new();

    for entry in entries {
        let entry = entry.with_context(|| format!("Could not read '{}'", dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        if !is_test_script(&name) {
            continue;
        }

        if patterns.is_empty() || patterns.iter().any(|p| wildmatch(p, &name)) {
            tests.push(name);
        }
    }

    tests.sort();
    debug!("Discovered {} test scripts in {}", tests.len(), dir.display());

    Ok(tests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_script_names() {
        assert!(is_test_script("t0001-basic.sh"));
        assert!(is_test_script("t9999-x.sh"));
        assert!(!is_test_script("t001-basic.sh"));
        assert!(!is_test_script("t0001_basic.sh"));
        assert!(!is_test_script("t0001-basic.bash"));
        assert!(!is_test_script("s0001-basic.sh"));
        assert!(!is_test_script("t000a-basic.sh"));
        assert!(!is_test_script("t0001"));
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "t0003-third.sh",
            "t0001-first.sh",
            "t0002-second.sh",
            "helper.sh",
            "t0004-notes.txt",
        ] {
            fs::write(dir.path().join(name), "exit 0\n").unwrap();
        }

        let all = discover_tests(dir.path(), &[]).unwrap();
        assert_eq!(all, vec!["t0001-first.sh", "t0002-second.sh", "t0003-third.sh"]);

        let some = discover_tests(
            dir.path(),
            &["*third*".to_string(), "t0001-*".to_string()],
        )
        .unwrap();
        assert_eq!(some, vec!["t0001-first.sh", "t0003-third.sh"]);

        let none = discover_tests(dir.path(), &["t9*".to_string()]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_tests(&dir.path().join("absent"), &[]).unwrap_err();
        assert!(err.to_string().contains("Could not open directory"));
    }
}
