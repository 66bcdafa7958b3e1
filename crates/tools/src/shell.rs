//! Quoting and path checks for values interpolated into shell commands.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Wrap `value` in single quotes. An embedded `'` closes the quote, emits an
/// escaped quote and reopens, so the shell never interprets the contents.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Reject paths with NUL bytes or `..` segments that climb above their
/// starting point, or above `root` when one is configured.
///
/// Purely lexical: nothing is resolved against the filesystem.
pub fn validate_path(path: &str, root: Option<&Path>) -> Result<()> {
    if path.contains('\0') {
        return Err(Error::message("Invalid path: contains null byte"));
    }
    let traversal = || Error::message(format!("Directory traversal not allowed: {path}"));

    let mut depth: usize = 0;
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(traversal)?,
            Component::Normal(_) => depth += 1,
            Component::RootDir | Component::Prefix(_) => depth = 0,
            Component::CurDir => {},
        }
    }

    if let Some(root) = root {
        let root = normalize(root);
        if !normalize(&root.join(path)).starts_with(&root) {
            return Err(traversal());
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            },
            Component::CurDir => {},
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("plain", "'plain'")]
    #[case("it's", r"'it'\''s'")]
    #[case("/tmp/test$(whoami).txt", "'/tmp/test$(whoami).txt'")]
    #[case("a`id`b; rm -rf / #", "'a`id`b; rm -rf / #'")]
    #[case("", "''")]
    fn quotes_for_posix_shells(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote(input), expected);
    }

    #[test]
    fn null_byte_is_invalid() {
        let err = validate_path("/tmp/test\0.txt", None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid path: contains null byte");
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("./../x")]
    #[case("/../etc")]
    fn climbing_above_start_is_traversal(#[case] path: &str) {
        let err = validate_path(path, None).unwrap_err();
        assert_eq!(err.to_string(), format!("Directory traversal not allowed: {path}"));
    }

    #[rstest]
    #[case("/tmp/test.txt")]
    #[case("src/../README.md")]
    #[case("/home/user/./project")]
    fn ordinary_paths_pass(#[case] path: &str) {
        validate_path(path, None).unwrap();
    }

    #[test]
    fn workspace_root_confines_paths() {
        let root = Path::new("/home/user/ws");
        validate_path("notes/a.md", Some(root)).unwrap();
        validate_path("/home/user/ws/notes/a.md", Some(root)).unwrap();
        assert!(validate_path("/etc/passwd", Some(root)).is_err());
        assert!(validate_path("/home/user/ws/../other", Some(root)).is_err());
    }
}
