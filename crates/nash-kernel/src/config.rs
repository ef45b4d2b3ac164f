//! Shell configuration.

use std::path::{Path, PathBuf};

/// Configuration for a [`crate::Shell`].
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Name of the shell, used as the root scope name.
    pub name: String,
    pub debug: bool,
    pub interactive: bool,
    /// User library root; `lib/` is searched on import.
    pub nashpath: PathBuf,
    /// Distribution root; `stdlib/` is searched on import.
    pub nashroot: PathBuf,
    /// Executable started as the rfork child.
    pub nashd_path: PathBuf,
    /// Initial environment; every entry becomes an exported variable.
    pub env: Vec<(String, String)>,
    /// Install the default `cd` bind.
    pub default_cd: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            name: "nash".to_string(),
            debug: false,
            interactive: false,
            nashpath: home.join("nash"),
            nashroot: home.join("nashroot"),
            nashd_path: nashd_path(),
            env: Vec::new(),
            default_cd: true,
        }
    }
}

impl ShellConfig {
    /// Configuration taken from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self {
            env: std::env::vars().collect(),
            ..Self::default()
        };
        if let Some(path) = non_empty_var("NASHPATH") {
            config.nashpath = PathBuf::from(path);
        }
        if let Some(root) = non_empty_var("NASHROOT") {
            config.nashroot = PathBuf::from(root);
        }
        config
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_nashpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.nashpath = path.into();
        self
    }

    pub fn with_nashroot(mut self, path: impl Into<PathBuf>) -> Self {
        self.nashroot = path.into();
        self
    }

    pub fn with_nashd_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.nashd_path = path.into();
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_default_cd(mut self, enabled: bool) -> Self {
        self.default_cd = enabled;
        self
    }

    /// Check NASHPATH and NASHROOT, one diagnostic line per problem.
    pub fn validate_dirs(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_dir("NASHPATH", &self.nashpath, &mut problems);
        check_dir("NASHROOT", &self.nashroot, &mut problems);
        if self.nashpath == self.nashroot {
            problems.push(format!(
                "invalid NASHPATH and NASHROOT: both are set to {:?}",
                self.nashpath
            ));
        }
        problems
    }
}

fn check_dir(label: &str, path: &Path, problems: &mut Vec<String>) {
    if !path.is_absolute() {
        problems.push(format!("{label} must be an absolute path, got {path:?}"));
    } else if !path.is_dir() {
        problems.push(format!("{label} {path:?} is not an existing directory"));
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn home_dir() -> PathBuf {
    non_empty_var("HOME")
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// The running executable, used to start rfork children.
fn nashd_path() -> PathBuf {
    std::fs::read_link("/proc/self/exe")
        .ok()
        .or_else(|| std::env::current_exe().ok())
        .or_else(|| std::env::args_os().next().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("nash"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dirs_ok() {
        let path = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let config = ShellConfig::default()
            .with_nashpath(path.path())
            .with_nashroot(root.path());
        assert!(config.validate_dirs().is_empty());
    }

    #[test]
    fn test_validate_dirs_problems() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShellConfig::default()
            .with_nashpath(dir.path())
            .with_nashroot(dir.path());
        let problems = config.validate_dirs();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("both are set"));

        let config = ShellConfig::default()
            .with_nashpath("relative/lib")
            .with_nashroot(dir.path().join("missing"));
        let problems = config.validate_dirs();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("absolute"));
        assert!(problems[1].contains("not an existing directory"));
    }
}
