use demux_step::copier::{clean_dir_with_retries, Copier};
use std::path::Path;
use std::time::Duration;

fn fast_copier() -> Copier {
    Copier::with_backoff(Duration::from_millis(0))
}

#[test]
fn copies_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a.uimf");
    let dst = tmp.path().join("sub").join("b.uimf");
    std::fs::write(&src, b"payload").unwrap();

    assert!(fast_copier().copy(&src, &dst, false, 0, false));
    assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
}

#[test]
fn copies_a_directory_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("DS1.d");
    std::fs::create_dir_all(src.join("AcqData")).unwrap();
    std::fs::write(src.join("AcqData").join("frames.bin"), b"x").unwrap();
    std::fs::write(src.join("meta.xml"), b"<m/>").unwrap();

    let dst = tmp.path().join("copy.d");
    assert!(fast_copier().copy(&src, &dst, false, 0, false));
    assert!(dst.join("AcqData").join("frames.bin").exists());
    assert!(dst.join("meta.xml").exists());
}

#[test]
fn returns_false_after_exhausting_retries() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("does-not-exist.uimf");
    let dst = tmp.path().join("out.uimf");
    assert!(!fast_copier().copy(&missing, &dst, true, 2, false));
    assert!(!dst.exists());
}

#[test]
fn negative_retry_count_is_clamped_to_one_attempt() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let dst = tmp.path().join("out");
    assert!(!fast_copier().copy(&missing, &dst, true, -5, false));
}

#[test]
fn refuses_existing_destination_without_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a");
    let dst = tmp.path().join("b");
    std::fs::write(&src, b"new").unwrap();
    std::fs::write(&dst, b"old").unwrap();

    assert!(!fast_copier().copy(&src, &dst, false, 0, false));
    assert_eq!(std::fs::read(&dst).unwrap(), b"old");
}

#[test]
fn backs_up_existing_destination_with_numbered_names() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a");
    let dst = tmp.path().join("b");
    std::fs::write(&src, b"v2").unwrap();
    std::fs::write(&dst, b"v1").unwrap();

    assert!(fast_copier().copy(&src, &dst, true, 0, true));
    assert_eq!(std::fs::read(&dst).unwrap(), b"v2");
    assert_eq!(std::fs::read(tmp.path().join("b_Old1")).unwrap(), b"v1");

    std::fs::write(&src, b"v3").unwrap();
    assert!(fast_copier().copy(&src, &dst, true, 0, true));
    assert_eq!(std::fs::read(tmp.path().join("b_Old2")).unwrap(), b"v2");
}

#[test]
fn clean_dir_removes_files_and_subdirs() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();
    std::fs::create_dir_all(tmp.path().join("nested/deeper")).unwrap();
    std::fs::write(tmp.path().join("nested/deeper/b.txt"), b"y").unwrap();

    assert!(clean_dir_with_retries(tmp.path(), 1, Duration::from_millis(1)));
    assert!(dir_is_empty(tmp.path()));
}

fn dir_is_empty(p: &Path) -> bool {
    std::fs::read_dir(p).unwrap().next().is_none()
}
