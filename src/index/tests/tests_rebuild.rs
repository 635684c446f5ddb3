use crate::index::Index;
use crate::log::Log;
use tempfile::TempDir;

#[test]
fn rebuild__empty_log_yields_empty_index() {
    let tmp = TempDir::new().unwrap();
    let mut log = Log::open(tmp.path().join("data.txt"), 1024).unwrap();

    let index = Index::rebuild(&mut log).unwrap();
    assert!(index.is_empty());
}

#[test]
fn rebuild__one_record_per_key_indexes_each_offset() {
    let tmp = TempDir::new().unwrap();
    let mut log = Log::open(tmp.path().join("data.txt"), 1024).unwrap();

    let off_a = log.append(b"a", b"1").unwrap();
    let off_b = log.append(b"b", b"2").unwrap();

    let index = Index::rebuild(&mut log).unwrap();
    assert_eq!(index.get(b"a"), Some(off_a));
    assert_eq!(index.get(b"b"), Some(off_b));
    assert_eq!(index.len(), 2);
}

#[test]
fn rebuild__later_write_wins_for_repeated_key() {
    let tmp = TempDir::new().unwrap();
    let mut log = Log::open(tmp.path().join("data.txt"), 1024).unwrap();

    log.append(b"a", b"1").unwrap();
    log.append(b"b", b"2").unwrap();
    let off_a3 = log.append(b"a", b"3").unwrap();

    let index = Index::rebuild(&mut log).unwrap();
    assert_eq!(index.get(b"a"), Some(off_a3));
    assert_eq!(log.read_at(index.get(b"a").unwrap()).unwrap().value, b"3");
    assert_eq!(index.len(), 2);
}

#[test]
fn rebuild__skips_lines_with_no_separator() {
    use std::io::Write;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.txt");
    {
        let mut raw = std::fs::File::create(&path).unwrap();
        raw.write_all(b"garbage-no-separator\n").unwrap();
        raw.write_all(b"a 1\n").unwrap();
    }

    let mut log = Log::open(&path, 1024).unwrap();
    let index = Index::rebuild(&mut log).unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(log.read_at(index.get(b"a").unwrap()).unwrap().value, b"1");
}

#[test]
fn rebuild__reflects_current_log_contents_after_external_rewrite() {
    let tmp = TempDir::new().unwrap();
    let mut log = Log::open(tmp.path().join("data.txt"), 1024).unwrap();

    log.append(b"a", b"1").unwrap();
    log.append(b"b", b"2").unwrap();
    log.append(b"a", b"3").unwrap();

    log.rewrite([(b"a".as_slice(), b"3".as_slice()), (b"b".as_slice(), b"2".as_slice())])
        .unwrap();

    let index = Index::rebuild(&mut log).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(log.read_at(index.get(b"a").unwrap()).unwrap().value, b"3");
    assert_eq!(log.read_at(index.get(b"b").unwrap()).unwrap().value, b"2");
}
