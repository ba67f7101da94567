use std::io::SeekFrom;

use cachefs::{CacheStore, Error, OpenMode, Session, SessionConfig, SharedCache};

fn open_session(store: &SharedCache) -> Session<SharedCache> {
    Session::open(store.clone(), SessionConfig::default()).unwrap()
}

fn write_file(session: &mut Session<SharedCache>, path: &str, data: &[u8]) {
    let file = session.open_file(path, OpenMode::WRITE).unwrap();
    session.write(file, data).unwrap();
    session.close_file(file).unwrap();
}

fn read_file(session: &mut Session<SharedCache>, path: &str) -> Vec<u8> {
    let file = session.open_file(path, OpenMode::READ).unwrap();
    let data = session.read_to_end(file).unwrap();
    session.close_file(file).unwrap();
    data
}

#[test]
fn empty_store_scenario() {
    let store = SharedCache::new();
    let mut s = open_session(&store);

    s.mkdir("/d").unwrap();
    let f = s.open_file("/d/f.txt", "w".parse().unwrap()).unwrap();
    s.write(f, b"hi").unwrap();
    s.close_file(f).unwrap();

    let f = s.open_file("/d/f.txt", "r".parse().unwrap()).unwrap();
    assert_eq!(s.read(f, 8192).unwrap(), b"hi");
    assert_eq!(s.list_children("/d"), vec!["f.txt"]);
}

#[test]
fn write_then_read_roundtrip_and_size() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let payload: Vec<u8> = (0..=255).collect();

    write_file(&mut s, "/blob.bin", &payload);

    assert_eq!(read_file(&mut s, "blob.bin"), payload);
    assert_eq!(s.stat("cache://blob.bin").unwrap().size, payload.len() as u64);
}

#[test]
fn content_is_stored_under_normalized_key() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/a").unwrap();
    write_file(&mut s, "a\\..\\a//x.txt", b"k");

    let mut raw = store.clone();
    assert_eq!(raw.get("cache://a/x.txt").unwrap().as_deref(), Some(&b"k"[..]));
}

#[test]
fn write_is_buffered_until_flush() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();

    let f = s.open_file("/buffered", OpenMode::WRITE).unwrap();
    s.write(f, b"later").unwrap();
    assert_eq!(raw.get("cache://buffered").unwrap(), None);
    assert!(matches!(s.stat("/buffered"), Err(Error::NotFound { .. })));

    s.flush(f).unwrap();
    assert!(raw.get("cache://buffered").unwrap().is_some());
    assert_eq!(s.stat("/buffered").unwrap().size, 5);
    s.close_file(f).unwrap();
}

#[test]
fn flush_without_parent_fails_and_writes_nothing() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();

    let f = s.open_file("/nodir/f.txt", OpenMode::WRITE).unwrap();
    s.write(f, b"x").unwrap();

    assert!(matches!(s.flush(f), Err(Error::InvalidParent { .. })));
    assert_eq!(raw.get("cache://nodir/f.txt").unwrap(), None);
    assert!(!s.exists("/nodir/f.txt"));

    // Creating the parent afterwards lets the same stream land.
    s.mkdir("/nodir").unwrap();
    s.close_file(f).unwrap();
    assert_eq!(read_file(&mut s, "/nodir/f.txt"), b"x");
}

#[test]
fn open_missing_for_read_is_not_found() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    assert!(matches!(
        s.open_file("/ghost", OpenMode::READ),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn open_directory_is_invalid() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/d").unwrap();

    assert!(matches!(
        s.open_file("/d", OpenMode::WRITE),
        Err(Error::InvalidOperation { .. })
    ));
    assert!(matches!(
        s.open_file("/", OpenMode::READ),
        Err(Error::InvalidOperation { .. })
    ));
}

#[test]
fn unsupported_mode_is_invalid() {
    assert!(matches!(
        "rw".parse::<OpenMode>(),
        Err(Error::InvalidOperation { .. })
    ));
}

#[test]
fn opening_for_read_records_atime() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/f", b"data");
    s.open_file("/f", OpenMode::READ).unwrap();

    let entry = s.index().get("cache://f").unwrap();
    assert!(entry.atime.is_some());
    assert_eq!(entry.size, Some(4));
}

#[test]
fn truncate_replaces_content() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/f", b"long original");
    write_file(&mut s, "/f", b"new");

    assert_eq!(read_file(&mut s, "/f"), b"new");
    assert_eq!(s.stat("/f").unwrap().size, 3);
}

#[test]
fn empty_write_creates_empty_file() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let f = s.open_file("/empty", OpenMode::WRITE).unwrap();
    s.close_file(f).unwrap();

    let stat = s.stat("/empty").unwrap();
    assert!(stat.is_file());
    assert_eq!(stat.size, 0);
}

#[test]
fn append_extends_existing_content() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/log", b"one;");

    let f = s.open_file("/log", OpenMode::APPEND).unwrap();
    assert_eq!(s.tell(f).unwrap(), 4);
    s.write(f, b"two;").unwrap();
    s.close_file(f).unwrap();

    assert_eq!(read_file(&mut s, "/log"), b"one;two;");
}

#[test]
fn append_to_missing_file_creates_it() {
    let store = SharedCache::new();
    let mut s = open_session(&store);

    let f = s.open_file("/fresh", OpenMode::APPEND).unwrap();
    s.close_file(f).unwrap();

    assert!(s.stat("/fresh").unwrap().is_file());
}

#[test]
fn exclusive_create_refuses_existing() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/taken", b"x");

    assert!(matches!(
        s.open_file("/taken", "x".parse().unwrap()),
        Err(Error::InvalidOperation { .. })
    ));
    let f = s.open_file("/free", "x".parse().unwrap()).unwrap();
    s.close_file(f).unwrap();
    assert!(s.exists("/free"));
}

#[test]
fn read_write_mode_edits_in_place() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/f", b"hello world");

    let f = s.open_file("/f", "r+".parse().unwrap()).unwrap();
    s.seek(f, SeekFrom::Start(6)).unwrap();
    s.write(f, b"there").unwrap();
    s.seek(f, SeekFrom::Start(0)).unwrap();
    assert_eq!(s.read(f, 5).unwrap(), b"hello");
    assert!(!s.eof(f).unwrap());
    s.close_file(f).unwrap();

    assert_eq!(read_file(&mut s, "/f"), b"hello there");
}

#[test]
fn unlink_removes_entry_and_content() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    write_file(&mut s, "/gone.txt", b"bye");

    s.unlink("/gone.txt").unwrap();

    assert!(matches!(s.stat("/gone.txt"), Err(Error::NotFound { .. })));
    assert_eq!(raw.get("cache://gone.txt").unwrap(), None);
}

#[test]
fn stale_entry_heals_on_stat() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    write_file(&mut s, "/evicted", b"x");

    raw.delete("cache://evicted").unwrap();

    assert!(s.index().contains("cache://evicted"));
    assert!(matches!(s.stat("/evicted"), Err(Error::NotFound { .. })));
    assert!(!s.index().contains("cache://evicted"));
}

#[test]
fn stale_entry_heals_on_open() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    write_file(&mut s, "/evicted", b"x");
    raw.delete("cache://evicted").unwrap();

    assert!(matches!(
        s.open_file("/evicted", OpenMode::READ),
        Err(Error::NotFound { .. })
    ));
    assert!(!s.exists("/evicted"));
    assert!(s.list_children("/").is_empty());
}

#[test]
fn exclusive_create_replaces_stale_entry() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    write_file(&mut s, "/evicted", b"old");
    raw.delete("cache://evicted").unwrap();

    let f = s.open_file("/evicted", "x".parse().unwrap()).unwrap();
    s.write(f, b"new").unwrap();
    s.close_file(f).unwrap();

    assert_eq!(read_file(&mut s, "/evicted"), b"new");
}

#[test]
fn rename_of_stale_source_is_not_found() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    write_file(&mut s, "/f", b"x");
    raw.delete("cache://f").unwrap();

    assert!(matches!(s.rename("/f", "/g"), Err(Error::NotFound { .. })));
    assert!(!s.exists("/f"));
    assert!(!s.exists("/g"));
    assert_eq!(raw.get("cache://g").unwrap(), None);
}

#[test]
fn mkdir_creates_parents() {
    let store = SharedCache::new();
    let mut s = open_session(&store);

    s.mkdir("a/b/c").unwrap();

    for path in ["a", "a/b", "a/b/c"] {
        assert!(s.stat(path).unwrap().is_dir(), "{} is not a directory", path);
    }
    s.mkdir("/a/b/c").unwrap();
    assert_eq!(s.index().len(), 3);
}

#[test]
fn mkdir_stops_at_existing_directory() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/a").unwrap();
    let ctime = s.index().get("cache://a").unwrap().ctime;

    s.mkdir("/a/b").unwrap();

    assert_eq!(s.index().get("cache://a").unwrap().ctime, ctime);
    assert!(s.index().is_dir("cache://a/b"));
}

#[test]
fn rmdir_requires_empty_directory() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/d/sub").unwrap();
    write_file(&mut s, "/d/f.txt", b"x");

    assert!(matches!(s.rmdir("/d"), Err(Error::DirectoryNotEmpty { .. })));

    s.unlink("/d/f.txt").unwrap();
    assert!(matches!(s.rmdir("/d"), Err(Error::DirectoryNotEmpty { .. })));

    s.rmdir("/d/sub").unwrap();
    s.rmdir("/d").unwrap();
    assert!(!s.exists("/d"));
    assert!(matches!(s.rmdir("/d"), Err(Error::NotFound { .. })));
}

#[test]
fn rename_file_moves_content_and_metadata() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    let mut raw = store.clone();
    s.mkdir("/a").unwrap();
    write_file(&mut s, "/a/x.txt", b"payload");
    let before = s.index().get("cache://a/x.txt").cloned().unwrap();

    s.rename("/a/x.txt", "/a/y.txt").unwrap();

    assert_eq!(s.index().get("cache://a/y.txt"), Some(&before));
    assert!(!s.exists("/a/x.txt"));
    assert_eq!(raw.get("cache://a/x.txt").unwrap(), None);
    assert_eq!(read_file(&mut s, "/a/y.txt"), b"payload");
    assert_eq!(s.list_children("/a"), vec!["y.txt"]);
}

#[test]
fn rename_requires_source_and_target_parent() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    write_file(&mut s, "/f", b"x");

    assert!(matches!(
        s.rename("/missing", "/other"),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        s.rename("/f", "/nodir/f"),
        Err(Error::InvalidParent { .. })
    ));
    assert!(s.exists("/f"));
}

#[test]
fn rename_directory_is_shallow() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/a").unwrap();
    write_file(&mut s, "/a/child.txt", b"left behind");

    s.rename("/a", "/b").unwrap();

    assert!(s.stat("/b").unwrap().is_dir());
    assert!(matches!(s.stat("/a"), Err(Error::NotFound { .. })));
    assert!(s.list_children("/b").is_empty());
    assert!(matches!(
        s.stat("/b/child.txt"),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(read_file(&mut s, "/a/child.txt"), b"left behind");
    // The orphan still shows up under its old parent name.
    assert_eq!(s.list_children("/"), vec!["a", "b"]);
}

#[test]
fn directory_cursor_lifecycle() {
    let store = SharedCache::new();
    let mut s = open_session(&store);
    s.mkdir("/d/z_dir/deeper").unwrap();
    write_file(&mut s, "/d/a.txt", b"1");
    write_file(&mut s, "/d/m.txt", b"2");

    let dir = s.opendir("/d");
    assert_eq!(s.readdir(dir).unwrap().as_deref(), Some("a.txt"));
    assert_eq!(s.readdir(dir).unwrap().as_deref(), Some("m.txt"));
    assert_eq!(s.readdir(dir).unwrap().as_deref(), Some("z_dir"));
    assert_eq!(s.readdir(dir).unwrap(), None);

    s.rewinddir(dir).unwrap();
    assert_eq!(s.readdir(dir).unwrap().as_deref(), Some("a.txt"));

    s.closedir(dir).unwrap();
    assert!(s.readdir(dir).is_err());
}

#[test]
fn opendir_on_missing_path_is_empty() {
    let store = SharedCache::new();
    let mut s = open_session(&store);

    let dir = s.opendir("/does/not/exist");
    assert_eq!(s.readdir(dir).unwrap(), None);
}

#[test]
fn failed_operations_leave_session_usable() {
    let store = SharedCache::new();
    let mut s = open_session(&store);

    assert!(s.rmdir("/nothing").is_err());
    assert!(s.unlink("/nothing").is_err());
    assert!(s.open_file("/nothing", OpenMode::READ).is_err());

    s.mkdir("/ok").unwrap();
    assert!(s.stat("/ok").unwrap().is_dir());
}

#[test]
fn custom_scheme_and_file_ttl() {
    let store = SharedCache::new();
    let config = SessionConfig::new()
        .with_scheme("mem")
        .with_file_ttl(Some(std::time::Duration::ZERO));
    let mut s = Session::open(store.clone(), config).unwrap();

    let f = s.open_file("mem://short", OpenMode::WRITE).unwrap();
    s.write(f, b"x").unwrap();
    s.close_file(f).unwrap();
    assert_eq!(s.normalize("/short"), "mem://short");

    // Content expired straight away, so the entry is stale.
    assert!(matches!(s.stat("/short"), Err(Error::NotFound { .. })));
}
