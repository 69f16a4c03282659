use dircache_walk::{CacheConfig, FilterMode, NameFilter, Node, Walker, walk};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn touch(path: &Path, modified: SystemTime) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(modified).unwrap();
}

fn names(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(Node::name).collect()
}

#[test]
fn test_rewalk_of_unchanged_tree_is_equal() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "0123456789");
    write(temp.path(), "sub/b.txt", "abc");

    let first = walk(temp.path(), NameFilter::all()).unwrap();

    // Move timestamps without changing any sizes
    let later = SystemTime::now() + Duration::from_secs(3600);
    touch(&temp.path().join("a.txt"), later);
    touch(&temp.path().join("sub/b.txt"), later);

    let second = walk(temp.path(), NameFilter::all()).unwrap();

    let before = first.root.get_file("a.txt").unwrap().modified();
    let after = second.root.get_file("a.txt").unwrap().modified();
    assert_ne!(before, after);
    assert_eq!(first.root, second.root);
}

#[test]
fn test_size_change_breaks_equality() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "0123456789");

    let first = walk(temp.path(), NameFilter::all()).unwrap();
    write(temp.path(), "a.txt", "01234567890123456789");
    let second = walk(temp.path(), NameFilter::all()).unwrap();

    assert_eq!(second.root.get_file("a.txt").unwrap().size(), 20);
    assert_ne!(first.root, second.root);
}

#[test]
fn test_files_only_filter_keeps_parent_directories() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "docs/readme.txt", "read me");
    write(temp.path(), "docs/notes.log", "log");

    let snapshot = walk(temp.path(), NameFilter::include_files(["*.txt"]).unwrap()).unwrap();

    // root -> [docs -> [readme.txt]]
    assert_eq!(names(snapshot.root.children()), ["docs"]);
    let docs = snapshot.root.get_dir("docs").unwrap();
    assert_eq!(names(docs.children()), ["readme.txt"]);
    assert!(docs.get("notes.log").is_none());
}

#[test]
fn test_rejected_directory_drops_subtree() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "docs/readme.txt", "read me");
    write(temp.path(), "docs/deep/more.txt", "more");
    write(temp.path(), "top.txt", "top");

    // `docs` fails the filter, so its matching descendants must not appear
    let snapshot = walk(temp.path(), NameFilter::include(["*.txt"]).unwrap()).unwrap();

    assert!(snapshot.root.get("docs").is_none());
    assert_eq!(names(snapshot.root.children()), ["top.txt"]);
    assert!(snapshot.root.files().all(|f| f.name() != "readme.txt"));
}

#[test]
fn test_exclude_filter_drops_subtree() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/main.rs", "fn main() {}");
    write(temp.path(), "target/debug/app", "binary");
    write(temp.path(), "build.log", "log");

    let filter = NameFilter::exclude(["target", "*.log"]).unwrap();
    let snapshot = walk(temp.path(), filter).unwrap();

    assert_eq!(names(snapshot.root.children()), ["src"]);
    assert_eq!(snapshot.stats.files, 1);
}

#[test]
fn test_root_is_not_filtered() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "data/a.txt", "a");

    let filter = NameFilter::include(["*.txt"]).unwrap();
    let snapshot = walk(temp.path().join("data"), filter).unwrap();

    assert_eq!(snapshot.root.name(), "data");
    assert_eq!(names(snapshot.root.children()), ["a.txt"]);
}

#[test]
fn test_ordering_is_deterministic() {
    let temp = TempDir::new().unwrap();
    for name in ["delta", "alpha", "charlie", "bravo"] {
        write(temp.path(), &format!("{name}.txt"), name);
        fs::create_dir(temp.path().join(format!("{name}_dir"))).unwrap();
    }

    let first = walk(temp.path(), NameFilter::all()).unwrap();
    let second = walk(temp.path(), NameFilter::all()).unwrap();

    let expected = [
        "alpha_dir",
        "bravo_dir",
        "charlie_dir",
        "delta_dir",
        "alpha.txt",
        "bravo.txt",
        "charlie.txt",
        "delta.txt",
    ];
    assert_eq!(names(first.root.children()), expected);
    assert_eq!(names(second.root.children()), expected);
    assert_eq!(first.root, second.root);
}

#[test]
fn test_walker_from_config() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "keep.txt", "k");
    write(temp.path(), "skip.bin", "s");

    let config = CacheConfig::builder()
        .root(temp.path())
        .patterns(vec!["*.txt".to_string()])
        .filter_mode(FilterMode::IncludeFiles)
        .build()
        .unwrap();
    let walker = Walker::new(config).unwrap();
    let snapshot = walker.walk().unwrap();

    assert_eq!(names(snapshot.root.children()), ["keep.txt"]);
    assert_eq!(walker.filter().mode(), FilterMode::IncludeFiles);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_followed_by_default() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "real/a.txt", "aaaa");
    std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

    let snapshot = walk(temp.path(), NameFilter::all()).unwrap();

    let linked = snapshot.root.lookup("link/a.txt").and_then(Node::as_file).unwrap();
    assert_eq!(linked.size(), 4);
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_skipped() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "a");
    std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("broken")).unwrap();

    let snapshot = walk(temp.path(), NameFilter::all()).unwrap();

    assert!(snapshot.root.get("broken").is_none());
    assert!(snapshot.root.get("a.txt").is_some());
}
