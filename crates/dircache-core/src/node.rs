//! Snapshot node types: files and directories.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::Serialize;
use tracing::debug;

use crate::tree::{DepthFirst, TreeNode};

/// Entry name for a path: its final component, or the whole path if it has none.
fn name_of(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => CompactString::new(path.to_string_lossy()),
    }
}

/// A regular file in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct File {
    name: CompactString,
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

impl File {
    /// Create a file node. The name is taken from the last path component.
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime, size: u64) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            modified,
            size,
        }
    }

    /// File name (not full path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path as walked.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time. Informational only, see the `PartialEq` impl.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

// Equality deliberately ignores `modified`. Re-reading metadata of an
// untouched file can move it, and that must not count as a change.
impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        if self.path != other.path {
            return false;
        }
        if self.size != other.size {
            debug!(
                path = %self.path.display(),
                size = self.size,
                other_size = other.size,
                "file size differs"
            );
            return false;
        }
        true
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.size.hash(state);
    }
}

/// A directory in a snapshot, owning its filtered children.
#[derive(Debug, Clone, Serialize)]
pub struct Directory {
    name: CompactString,
    path: PathBuf,
    modified: SystemTime,
    children: Vec<Node>,
}

impl Directory {
    /// Create a directory node. Children are kept in the given order.
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime, children: Vec<Node>) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            modified,
            children,
        }
    }

    /// Directory name (not full path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path as walked.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time. Informational only, see the `PartialEq` impl.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Direct children, directories first, then by name.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Whether this directory has no (matching) children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Immediate child with the given name.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name() == name)
    }

    /// Immediate child with the given name, only if it is a directory.
    pub fn get_dir(&self, name: &str) -> Option<&Directory> {
        self.get(name).and_then(Node::as_dir)
    }

    /// Immediate child with the given name, only if it is a file.
    pub fn get_file(&self, name: &str) -> Option<&File> {
        self.get(name).and_then(Node::as_file)
    }

    /// Descendant at a path relative to this directory, e.g. `"docs/readme.txt"`.
    pub fn lookup(&self, relative: impl AsRef<Path>) -> Option<&Node> {
        let mut components = relative
            .as_ref()
            .components()
            .filter(|c| !matches!(c, Component::CurDir));
        let first = components.next()?;
        let mut node = self.get(&first.as_os_str().to_string_lossy())?;
        for component in components {
            node = node.as_dir()?.get(&component.as_os_str().to_string_lossy())?;
        }
        Some(node)
    }

    /// Pre-order iteration over every descendant (not including this directory).
    pub fn iter(&self) -> DepthFirst<'_, Node> {
        DepthFirst::over(&self.children)
    }

    /// Every file below this directory, depth first.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.iter().filter_map(Node::as_file)
    }

    /// Number of files below this directory.
    pub fn file_count(&self) -> u64 {
        self.files().count() as u64
    }

    /// Number of directories below this directory.
    pub fn dir_count(&self) -> u64 {
        self.iter().filter(|node| node.is_dir()).count() as u64
    }

    /// Sum of the sizes of every file below this directory.
    pub fn total_size(&self) -> u64 {
        self.files().map(File::size).sum()
    }

    /// Fold the tree bottom-up.
    ///
    /// `on_file` maps each file; `on_dir` receives a directory together with
    /// the already-folded results of its children. `None` results are left
    /// out of the parent's list.
    pub fn fold<R, D, F>(&self, mut on_dir: D, mut on_file: F) -> Option<R>
    where
        D: FnMut(&Directory, Vec<R>) -> Option<R>,
        F: FnMut(&File) -> Option<R>,
    {
        self.fold_with(&mut on_dir, &mut on_file)
    }

    fn fold_with<R, D, F>(&self, on_dir: &mut D, on_file: &mut F) -> Option<R>
    where
        D: FnMut(&Directory, Vec<R>) -> Option<R>,
        F: FnMut(&File) -> Option<R>,
    {
        let mut folded = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let result = match child {
                Node::File(file) => on_file(file),
                Node::Directory(dir) => dir.fold_with(on_dir, on_file),
            };
            folded.extend(result);
        }
        on_dir(self, folded)
    }

    /// Map every file below this directory into a flat list, dropping `None`s.
    pub fn flatten<R>(&self, mut on_file: impl FnMut(&File) -> Option<R>) -> Vec<R> {
        self.files().filter_map(|file| on_file(file)).collect()
    }
}

// Like `File`, equality skips `modified`. Children are compared in order,
// recursively, which is why walks must produce a deterministic ordering.
impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        if self.path != other.path {
            return false;
        }
        if self.children.len() != other.children.len() {
            debug!(
                path = %self.path.display(),
                entries = self.children.len(),
                other_entries = other.children.len(),
                "directory entry count differs"
            );
            return false;
        }
        self.children
            .iter()
            .zip(&other.children)
            .all(|(ours, theirs)| ours == theirs)
    }
}

impl Eq for Directory {}

impl Hash for Directory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.children.hash(state);
    }
}

/// A node in a snapshot tree.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Regular file.
    File(File),
    /// Directory.
    Directory(Directory),
}

impl Node {
    /// Entry name (not full path).
    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => file.name(),
            Node::Directory(dir) => dir.name(),
        }
    }

    /// Full path as walked.
    pub fn path(&self) -> &Path {
        match self {
            Node::File(file) => file.path(),
            Node::Directory(dir) => dir.path(),
        }
    }

    /// Last modification time.
    pub fn modified(&self) -> SystemTime {
        match self {
            Node::File(file) => file.modified(),
            Node::Directory(dir) => dir.modified(),
        }
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// The file, if this node is one.
    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    /// The directory, if this node is one.
    pub fn as_dir(&self) -> Option<&Directory> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    /// Ordering used for siblings: directories before files, then by name.
    ///
    /// Names are lossy UTF-8, so distinct non-UTF-8 names can collide; the
    /// full path breaks such ties.
    pub fn sibling_order(a: &Node, b: &Node) -> Ordering {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name().cmp(b.name()))
            .then_with(|| a.path().cmp(b.path()))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::File(a), Node::File(b)) => a == b,
            (Node::Directory(a), Node::Directory(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Node::File(file) => file.hash(state),
            Node::Directory(dir) => dir.hash(state),
        }
    }
}

impl TreeNode for Node {
    fn name(&self) -> &str {
        Node::name(self)
    }

    fn children(&self) -> &[Self] {
        match self {
            Node::File(_) => &[],
            Node::Directory(dir) => dir.children(),
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Directory> for Node {
    fn from(dir: Directory) -> Self {
        Node::Directory(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::time::{Duration, UNIX_EPOCH};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_file_name_from_path() {
        let file = File::new("/root/docs/readme.txt", at(0), 10);
        assert_eq!(file.name(), "readme.txt");
        assert_eq!(file.size(), 10);
    }

    #[test]
    fn test_file_equality_ignores_modified() {
        let a = File::new("/r/a.txt", at(1), 10);
        let b = File::new("/r/a.txt", at(2), 10);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_file_equality_uses_size_and_path() {
        let a = File::new("/r/a.txt", at(1), 10);
        assert_ne!(a, File::new("/r/a.txt", at(1), 20));
        assert_ne!(a, File::new("/r/b.txt", at(1), 10));
    }

    #[test]
    fn test_cross_kind_never_equal() {
        let file: Node = File::new("/r/x", at(0), 0).into();
        let dir: Node = Directory::new("/r/x", at(0), Vec::new()).into();
        assert_ne!(file, dir);
    }

    #[test]
    fn test_sibling_order() {
        let mut nodes: Vec<Node> = vec![
            File::new("/r/a.txt", at(0), 1).into(),
            Directory::new("/r/z", at(0), Vec::new()).into(),
            File::new("/r/B.txt", at(0), 1).into(),
            Directory::new("/r/m", at(0), Vec::new()).into(),
        ];
        nodes.sort_by(Node::sibling_order);
        let names: Vec<&str> = nodes.iter().map(Node::name).collect();
        assert_eq!(names, ["m", "z", "B.txt", "a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_sibling_order_with_colliding_lossy_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let first = Path::new("/r").join(OsStr::from_bytes(b"a\xfe"));
        let second = Path::new("/r").join(OsStr::from_bytes(b"a\xff"));
        let make = |paths: [&PathBuf; 2]| -> Vec<Node> {
            paths
                .into_iter()
                .map(|p| File::new(p.clone(), at(0), 1).into())
                .collect()
        };

        let mut forward = make([&first, &second]);
        let mut backward = make([&second, &first]);
        assert_eq!(forward[0].name(), forward[1].name());

        forward.sort_by(Node::sibling_order);
        backward.sort_by(Node::sibling_order);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].path(), first.as_path());
    }

    #[test]
    fn test_get_dir_only_returns_directories() {
        let dir = Directory::new(
            "/r",
            at(0),
            vec![
                Directory::new("/r/sub", at(0), Vec::new()).into(),
                File::new("/r/file", at(0), 1).into(),
            ],
        );
        assert!(dir.get_dir("sub").is_some());
        assert!(dir.get_dir("file").is_none());
        assert!(dir.get("file").is_some());
        assert!(dir.get("missing").is_none());
    }
}
