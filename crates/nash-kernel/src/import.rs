//! Module search for `import`.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Candidate files for `import name`, in search order.
///
/// Explicit paths (absolute, `./`, `../`) are tried as written. Otherwise
/// the directory of the importing file comes first, then `NASHPATH/lib` and
/// `NASHROOT/stdlib`. Each location is tried with and without `.sh`.
pub fn candidates(name: &str, importer: Option<&Path>, nashpath: &Path, nashroot: &Path) -> Vec<PathBuf> {
    let with_ext = |base: PathBuf| {
        let mut sh = base.clone().into_os_string();
        sh.push(".sh");
        [base, PathBuf::from(sh)]
    };

    if name.starts_with('/') || name.starts_with("./") || name.starts_with("../") {
        return with_ext(PathBuf::from(name)).to_vec();
    }

    let mut dirs = Vec::new();
    if let Some(dir) = importer.and_then(Path::parent) {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(nashpath.join("lib"));
    dirs.push(nashroot.join("stdlib"));

    dirs.into_iter().flat_map(|dir| with_ext(dir.join(name))).collect()
}

/// The first candidate that is a regular file, or the list of tried paths.
pub fn resolve(name: &str, importer: Option<&Path>, nashpath: &Path, nashroot: &Path) -> Result<PathBuf, String> {
    let tried = candidates(name, importer, nashpath, nashroot);
    if let Some(found) = tried.iter().find(|p| p.is_file()) {
        debug!(import = name, path = %found.display(), "import resolved");
        return Ok(found.clone());
    }
    let listed: Vec<String> = tried.iter().map(|p| format!("{:?}", p.display().to_string())).collect();
    Err(format!(
        "Failed to import path '{name}'. The locations below have been tried:\n {}",
        listed.join(", ")
    ))
}
