//! Path resolution over the dentry tree.

use crate::config::{DOTDOT_NAME, DOT_NAME};
use crate::directory::dir_lookup;
use crate::error::{FsError, Result};
use crate::tree::{NodeId, Tree};

/// Resolves `path` starting at `from`; absolute paths restart at the root.
///
/// With `parent_mode`, the last segment is left unresolved and the directory that
/// would contain it is returned. `load` is called on every directory before its
/// children are scanned, so unloaded directories get their entries in time.
pub fn resolve<F>(tree: &mut Tree, path: &str, from: NodeId, parent_mode: bool, load: &mut F) -> Result<NodeId>
where
    F: FnMut(&mut Tree, NodeId) -> Result<()>,
{
    let mut current = if path.starts_with('/') { NodeId::ROOT } else { from };
    let mut rest = path.trim_start_matches('/');

    loop {
        if rest.is_empty() {
            return Ok(current);
        }
        let (segment, tail) = match rest.find('/') {
            Some(pos) => (&rest[..pos], rest[pos..].trim_start_matches('/')),
            None => (rest, ""),
        };
        if tail.is_empty() && parent_mode {
            return Ok(current);
        }
        if !tree[current].is_dir() {
            return Err(FsError::NotDirectory);
        }

        current = match segment {
            DOT_NAME => current,
            DOTDOT_NAME => tree[current].parent.unwrap_or(NodeId::ROOT),
            name => {
                load(tree, current)?;
                dir_lookup(tree, current, name)?
            }
        };
        rest = tail;
    }
}

/// The final segment of `path`, or an empty string for the root.
pub fn extract_leaf_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Splits a path into (parent path, leaf name).
pub fn split(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(pos) => (trimmed[..pos].to_string(), trimmed[pos + 1..].to_string()),
        None => (".".to_string(), trimmed.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::directory::dir_add_entry;
    use crate::structs::FileType;
    use crate::tree::{Dentry, Inode};

    fn loaded(name: &str, ftype: FileType) -> Dentry {
        let mut d = Dentry::new(name, ftype);
        d.inode = Some(Inode::new(0, ftype));
        d
    }

    // /a/b and /f
    fn sample() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new(loaded("/", FileType::Directory));
        let a = dir_add_entry(&mut tree, NodeId::ROOT, loaded("a", FileType::Directory)).unwrap();
        let b = dir_add_entry(&mut tree, a, loaded("b", FileType::Directory)).unwrap();
        let f = dir_add_entry(&mut tree, NodeId::ROOT, loaded("f", FileType::Regular)).unwrap();
        (tree, a, b, f)
    }

    fn no_load(_: &mut Tree, _: NodeId) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_resolve() {
        let (mut tree, a, b, f) = sample();
        let mut load = no_load;
        assert_eq!(resolve(&mut tree, "/", NodeId::ROOT, false, &mut load).unwrap(), NodeId::ROOT);
        assert_eq!(resolve(&mut tree, "/a", NodeId::ROOT, false, &mut load).unwrap(), a);
        assert_eq!(resolve(&mut tree, "/a/b/", NodeId::ROOT, false, &mut load).unwrap(), b);
        assert_eq!(resolve(&mut tree, "b", a, false, &mut load).unwrap(), b);
        assert_eq!(resolve(&mut tree, "/a/b/../../f", NodeId::ROOT, false, &mut load).unwrap(), f);
    }

    #[test]
    fn test_resolve_parent_mode() {
        let (mut tree, a, b, _) = sample();
        let mut load = no_load;
        assert_eq!(resolve(&mut tree, "/a/new", NodeId::ROOT, true, &mut load).unwrap(), a);
        assert_eq!(resolve(&mut tree, "/a/b/c", NodeId::ROOT, true, &mut load).unwrap(), b);
        assert_eq!(resolve(&mut tree, "/x", NodeId::ROOT, true, &mut load).unwrap(), NodeId::ROOT);
    }

    #[test]
    fn test_resolve_errors() {
        let (mut tree, ..) = sample();
        let mut load = no_load;
        assert!(matches!(
            resolve(&mut tree, "/nope", NodeId::ROOT, false, &mut load),
            Err(FsError::NotFound)
        ));
        assert!(matches!(
            resolve(&mut tree, "/f/x", NodeId::ROOT, false, &mut load),
            Err(FsError::NotDirectory)
        ));
        assert!(matches!(
            resolve(&mut tree, "/nope/x", NodeId::ROOT, true, &mut load),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn test_leaf_name() {
        assert_eq!(extract_leaf_name("/"), "");
        assert_eq!(extract_leaf_name("/a/b"), "b");
        assert_eq!(extract_leaf_name("/a/b/"), "b");
        assert_eq!(extract_leaf_name("c"), "c");
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/a"), ("/".to_string(), "a".to_string()));
        assert_eq!(split("/a/b/c"), ("/a/b".to_string(), "c".to_string()));
    }
}
