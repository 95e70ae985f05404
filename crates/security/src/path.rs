//! Path containment: the single choke point for every boundary decision.
//!
//! Paths are compared only after [`normalize`] (lexical `.`/`..` folding)
//! and, for anything that touches configuration or a request target,
//! [`resolve`] (every symlink along the path followed, dangling ones too).
//! Plain string prefix checks are never used: `/docs-old` is not under
//! `/docs`.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` segments without touching the filesystem.
///
/// `..` never climbs above the root of an absolute path. Leading `..`
/// segments of a relative path are kept, so a relative path that escapes
/// its starting point still looks like one.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component),
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            Component::Normal(_) => out.push(component),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Join `path` onto `base` when it is relative, then normalize.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Symlink hops followed before [`resolve`] gives up on a path.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Normalize, then follow every symlink along the path.
///
/// Components are walked one at a time with `symlink_metadata`, so a link
/// is followed even when its target does not exist (a dangling link is
/// where a write would land). Missing components are kept lexically,
/// since write targets usually don't exist yet. After
/// [`MAX_SYMLINK_HOPS`] links the remaining tail is kept as-is; such a
/// path cannot be opened anyway.
pub fn resolve(path: &Path) -> PathBuf {
    let normalized = normalize(path);
    let mut resolved = root_of(&normalized);
    let mut pending = Vec::new();
    push_parts(&mut pending, &normalized);
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        if part == PARENT {
            climb(&mut resolved);
            continue;
        }

        let candidate = resolved.join(&part);
        let is_link = std::fs::symlink_metadata(&candidate)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link || hops == MAX_SYMLINK_HOPS {
            resolved = candidate;
            continue;
        }

        match std::fs::read_link(&candidate) {
            Ok(target) => {
                hops += 1;
                if target.is_absolute() {
                    resolved = root_of(&target);
                }
                push_parts(&mut pending, &target);
            }
            Err(_) => resolved = candidate,
        }
    }

    if resolved.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    resolved
}

/// Stands in for `..` on the pending stack; no normal component is `..`.
const PARENT: &str = "..";

fn root_of(path: &Path) -> PathBuf {
    path.components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

/// Push the named and `..` components of `path` so they pop in order.
fn push_parts(pending: &mut Vec<OsString>, path: &Path) {
    for component in path.components().rev() {
        match component {
            Component::Normal(name) => pending.push(name.to_os_string()),
            Component::ParentDir => pending.push(OsString::from(PARENT)),
            _ => {}
        }
    }
}

fn climb(resolved: &mut PathBuf) {
    match resolved.components().next_back() {
        Some(Component::Normal(_)) => {
            resolved.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => resolved.push(PARENT),
    }
}

/// Relative path from `base` to `candidate`, if `candidate` is inside
/// or equal to `base` (both normalized first).
fn relative_to(base: &Path, candidate: &Path) -> Option<PathBuf> {
    let base = normalize(base);
    let candidate = normalize(candidate);
    candidate.strip_prefix(&base).ok().map(Path::to_path_buf)
}

/// Strict containment: `candidate` lies inside `base`.
///
/// The relative path from `base` to `candidate` must be non-empty, must
/// not begin with a `..` escape, and must not be absolute (which would
/// mean the two share no common prefix). A directory does not contain
/// itself.
pub fn is_under(base: &Path, candidate: &Path) -> bool {
    match relative_to(base, candidate) {
        Some(rel) => {
            !rel.as_os_str().is_empty()
                && !rel.is_absolute()
                && !matches!(rel.components().next(), Some(Component::ParentDir))
        }
        None => false,
    }
}

/// `candidate` is `base` itself or lies inside it.
pub fn is_under_or_equal(base: &Path, candidate: &Path) -> bool {
    normalize(base) == normalize(candidate) || is_under(base, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/b/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn base_does_not_contain_itself() {
        let base = Path::new("/srv/docs");
        assert!(!is_under(base, base));
        assert!(!is_under(base, Path::new("/srv/docs/")));
        assert!(is_under_or_equal(base, base));
    }

    #[test]
    fn child_is_under_base() {
        let base = Path::new("/srv/docs");
        assert!(is_under(base, Path::new("/srv/docs/child")));
        assert!(is_under(base, Path::new("/srv/docs/a/b/c.md")));
    }

    #[test]
    fn dot_dot_escape_is_not_under() {
        let base = Path::new("/srv/docs");
        assert!(!is_under(base, Path::new("/srv/docs/../escape")));
        assert!(!is_under(base, Path::new("/srv/docs/migrations/../../etc/passwd")));
        assert!(is_under(base, Path::new("/srv/docs/a/../b")));
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_under() {
        assert!(!is_under(Path::new("/srv/docs"), Path::new("/srv/docs-old/x")));
    }

    #[test]
    fn unrelated_paths_are_not_under() {
        assert!(!is_under(Path::new("/srv/docs"), Path::new("/etc/passwd")));
        assert!(!is_under(Path::new("/srv/docs"), Path::new("docs/x")));
        assert!(!is_under(Path::new("docs"), Path::new("/srv/docs/x")));
    }

    #[test]
    fn absolutize_joins_relative() {
        assert_eq!(
            absolutize(Path::new("/srv/forge"), Path::new("docs/../docs/x")),
            PathBuf::from("/srv/forge/docs/x")
        );
        assert_eq!(
            absolutize(Path::new("/srv/forge"), Path::new("/etc/x")),
            PathBuf::from("/etc/x")
        );
    }

    #[test]
    fn resolve_keeps_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let resolved = resolve(&root.join("not/yet/created.md"));
        assert_eq!(resolved, root.join("not/yet/created.md"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_symlink_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let docs = root.join("docs");
        let outside = root.join("outside");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, docs.join("link")).unwrap();

        let target = resolve(&docs.join("link/secret.md"));
        assert_eq!(target, outside.join("secret.md"));
        assert!(!is_under(&docs, &target));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let outside = elsewhere.path().canonicalize().unwrap().join("pwned.md");
        let docs = root.join("docs/migrations");
        std::fs::create_dir_all(&docs).unwrap();
        std::os::unix::fs::symlink(&outside, docs.join("evil.md")).unwrap();

        let target = resolve(&docs.join("evil.md"));
        assert_eq!(target, outside);
        assert!(!is_under(&root, &target));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_relative_link_chain() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("docs/a")).unwrap();
        std::os::unix::fs::symlink("../../escape", root.join("docs/a/hop")).unwrap();
        std::os::unix::fs::symlink("a/hop", root.join("docs/entry")).unwrap();

        let target = resolve(&root.join("docs/entry/new.md"));
        assert_eq!(target, root.join("escape/new.md"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_stops_on_symlink_loop() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink("b", root.join("a")).unwrap();
        std::os::unix::fs::symlink("a", root.join("b")).unwrap();

        let target = resolve(&root.join("a/x"));
        assert!(is_under(&root, &target));
    }
}
