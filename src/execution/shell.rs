//! Per-job shell environment

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Search path, variables and working directory shared by a job's steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellEnv {
    /// Directories registered by earlier steps, most recent first
    pub path_prefixes: Vec<String>,

    /// Extra environment variables for every command
    pub vars: BTreeMap<String, String>,

    pub working_dir: PathBuf,
}

impl ShellEnv {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Self::default()
        }
    }

    /// Put `dir` in front of the search path. Returns false if it was already registered.
    pub fn prepend_path(&mut self, dir: &str) -> bool {
        if self.path_prefixes.iter().any(|p| p == dir) {
            return false;
        }
        self.path_prefixes.insert(0, dir.to_string());
        true
    }

    /// The search path a command sees: registered prefixes followed by `inherited`
    pub fn search_path(&self, inherited: Option<OsString>) -> OsString {
        let mut dirs: Vec<PathBuf> = self.path_prefixes.iter().map(PathBuf::from).collect();
        if let Some(inherited) = inherited {
            dirs.extend(std::env::split_paths(&inherited));
        }
        // Entries containing the separator cannot be joined; keep the prefixes alone then
        std::env::join_paths(&dirs).unwrap_or_else(|_| {
            std::env::join_paths(self.path_prefixes.iter().map(PathBuf::from)).unwrap_or_default()
        })
    }
}

/// A single command a step asks the runner to execute
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Step the command belongs to
    pub step: String,

    /// Shell command line
    pub command: String,

    pub env: ShellEnv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_path_is_idempotent() {
        let mut shell = ShellEnv::default();

        assert!(shell.prepend_path("/usr/share/miniconda/bin"));
        assert!(!shell.prepend_path("/usr/share/miniconda/bin"));
        assert!(shell.prepend_path("/opt/tools"));

        assert_eq!(shell.path_prefixes, vec!["/opt/tools", "/usr/share/miniconda/bin"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_puts_prefixes_first() {
        let mut shell = ShellEnv::default();
        shell.prepend_path("/usr/share/miniconda/bin");

        let path = shell.search_path(Some(OsString::from("/usr/bin:/bin")));
        assert_eq!(path, OsString::from("/usr/share/miniconda/bin:/usr/bin:/bin"));

        let path = shell.search_path(None);
        assert_eq!(path, OsString::from("/usr/share/miniconda/bin"));
    }
}
