//! Directory plan construction for batch uploads.
//!
//! Before a batch of files can be written, every ancestor directory of every
//! target must exist. The plan is the deduplicated list of those ancestors,
//! ordered shallow-to-deep so sequential creation never depends on a
//! directory that comes later.

use std::collections::BTreeSet;

use super::errors::BridgeError;

/// Validate an absolute container path supplied by a caller.
///
/// Paths cross a trust boundary here: they end up as exec arguments and, in
/// one case, inside a quoted shell redirection. Relative paths, traversal
/// segments and NUL bytes are rejected outright.
pub fn validate_abs_path(path: &str) -> Result<(), BridgeError> {
    if !path.starts_with('/') {
        return Err(invalid(path, "must be absolute"));
    }
    if path.contains('\0') {
        return Err(invalid(path, "contains a NUL byte"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid(path, "contains a parent-directory segment"));
    }
    Ok(())
}

/// Validate a relative path from an upload batch (e.g. `a/c/d.txt`).
pub fn validate_relative_path(path: &str) -> Result<(), BridgeError> {
    if path.is_empty() || path.starts_with('/') {
        return Err(invalid(path, "must be relative and non-empty"));
    }
    if path.contains('\0') {
        return Err(invalid(path, "contains a NUL byte"));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid(path, "contains an empty or traversal segment"));
    }
    Ok(())
}

/// Join a validated relative path under a base directory.
pub fn join_under(base: &str, relative: &str) -> Result<String, BridgeError> {
    validate_abs_path(base)?;
    validate_relative_path(relative)?;
    Ok(format!("{}/{}", base.trim_end_matches('/'), relative))
}

/// Depth of an absolute path in `/`-separated segments.
fn path_depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Compute the ordered set of directories to create before writing a batch
/// of files under `base`.
///
/// For every relative target path, the parent directory and all ancestors
/// strictly below `base` are collected. The result is duplicate-free and
/// sorted ascending by depth, ties broken lexically, so creating in order is
/// always ancestor-before-descendant.
pub fn build_directory_plan(
    base: &str,
    relative_paths: &[String],
) -> Result<Vec<String>, BridgeError> {
    validate_abs_path(base)?;
    let base = base.trim_end_matches('/');

    let mut directories: BTreeSet<(usize, String)> = BTreeSet::new();

    for relative in relative_paths {
        validate_relative_path(relative)?;

        let segments: Vec<&str> = relative.split('/').collect();
        // Everything but the final segment (the file itself) is a directory.
        let mut current = base.to_string();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            current = format!("{}/{}", current, segment);
            directories.insert((path_depth(&current), current.clone()));
        }
    }

    Ok(directories.into_iter().map(|(_, path)| path).collect())
}

fn invalid(path: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_orders_shallow_to_deep() {
        let plan = build_directory_plan(
            "/data",
            &["a/b.txt".to_string(), "a/c/d.txt".to_string()],
        )
        .unwrap();

        assert_eq!(plan, vec!["/data/a".to_string(), "/data/a/c".to_string()]);
    }

    #[test]
    fn test_plan_deduplicates_shared_ancestors() {
        let plan = build_directory_plan(
            "/base",
            &[
                "x/y/one.txt".to_string(),
                "x/y/two.txt".to_string(),
                "x/z/three.txt".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(
            plan,
            vec![
                "/base/x".to_string(),
                "/base/x/y".to_string(),
                "/base/x/z".to_string(),
            ]
        );
    }

    #[test]
    fn test_plan_covers_every_ancestor() {
        let plan =
            build_directory_plan("/r", &["a/b/c/d/file.bin".to_string()]).unwrap();
        assert_eq!(plan, vec!["/r/a", "/r/a/b", "/r/a/b/c", "/r/a/b/c/d"]);

        // Every entry is strictly deeper than the previous one here, and
        // each prefix of a later entry appears earlier.
        for pair in plan.windows(2) {
            assert!(pair[1].starts_with(&format!("{}/", pair[0])));
        }
    }

    #[test]
    fn test_plan_empty_for_flat_batch() {
        let plan = build_directory_plan(
            "/data",
            &["one.txt".to_string(), "two.txt".to_string()],
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_depth_ties_break_lexically() {
        let plan = build_directory_plan(
            "/d",
            &["b/f".to_string(), "a/f".to_string(), "c/f".to_string()],
        )
        .unwrap();
        assert_eq!(plan, vec!["/d/a", "/d/b", "/d/c"]);
    }

    #[test]
    fn test_plan_rejects_traversal() {
        assert!(build_directory_plan("/d", &["../evil.txt".to_string()]).is_err());
        assert!(build_directory_plan("/d", &["a/../b.txt".to_string()]).is_err());
        assert!(build_directory_plan("relative", &["a.txt".to_string()]).is_err());
    }

    #[test]
    fn test_validate_abs_path() {
        assert!(validate_abs_path("/ok/path").is_ok());
        assert!(validate_abs_path("/with space/file.txt").is_ok());
        assert!(validate_abs_path("relative/path").is_err());
        assert!(validate_abs_path("/has/../traversal").is_err());
        assert!(validate_abs_path("/nul\0byte").is_err());
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("a/b.txt").is_ok());
        assert!(validate_relative_path("file.txt").is_ok());
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path("/abs").is_err());
        assert!(validate_relative_path("a//b").is_err());
        assert!(validate_relative_path("./a").is_err());
        assert!(validate_relative_path("a/..").is_err());
    }

    #[test]
    fn test_join_under_normalizes_trailing_slash() {
        assert_eq!(join_under("/data/", "a/b.txt").unwrap(), "/data/a/b.txt");
        assert_eq!(join_under("/data", "a/b.txt").unwrap(), "/data/a/b.txt");
    }
}
