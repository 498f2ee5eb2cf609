//! Path normalization helpers.
//!
//! The daemon's report keys entries by absolute path, so every fixture path
//! must be made absolute and normalized before it is used as a lookup key.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths go through `fs::canonicalize` (resolves symlinks). Paths
/// that do not exist yet (the fixture directory before `reset()`, report
/// artifacts before the first daemon write) are made absolute relative to
/// CWD with `.`/`..` resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_path_resolves_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn nonexistent_path_normalizes_syntactically() {
        let input = Path::new("/nonexistent_fimh/foo/../file_0000.data");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(
            resolve_absolute_path(input),
            PathBuf::from("/nonexistent_fimh/file_0000.data")
        );
    }

    #[test]
    fn already_absolute_path_kept_absolute() {
        let resolved = resolve_absolute_path(Path::new("/tmp/./fimh_fixture"));
        assert!(resolved.is_absolute());
        assert!(!resolved.to_string_lossy().contains("/./"));
    }
}
