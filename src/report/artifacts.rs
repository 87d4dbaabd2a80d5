//! Glob-based artifact collection

use crate::report::ReportError;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Translate a glob into an anchored regex over `/`-separated relative paths.
///
/// `**/` matches any number of directories (including none), `*` and `?`
/// never cross a separator.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ReportError> {
    let mut out = String::from("^");
    let mut chars = pattern.trim_start_matches("./").chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|source| ReportError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Find every file under `root` whose relative path matches `pattern`, sorted
pub fn collect_artifacts(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, ReportError> {
    let matcher = glob_to_regex(pattern)?;
    let mut files = Vec::new();
    collect_recursive(root, root, &matcher, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    dir: &Path,
    matcher: &Regex,
    files: &mut Vec<PathBuf>,
) -> Result<(), ReportError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

        // file_type() does not follow links, so symlinked directories are never walked
        if file_type.is_dir() {
            collect_recursive(root, &path, matcher, files)?;
        } else if !path.is_file() {
            continue;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if matcher.is_match(&relative) {
                files.push(path);
            }
        }
    }

    Ok(())
}
