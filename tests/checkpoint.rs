use demux_step::checkpoint::resolve;
use demux_step::names::DatasetKind;
use std::path::PathBuf;

fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let remote = tmp.path().join("remote");
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    (tmp, remote, work)
}

#[test]
fn no_checkpoint_means_full_run() {
    let (_tmp, remote, work) = dirs();
    let d = resolve(&remote, &work, "DS1", DatasetKind::Uimf);
    assert!(!d.resume_requested);
}

#[test]
fn checkpoint_with_completed_frames_resumes_at_next() {
    let (_tmp, remote, work) = dirs();
    std::fs::write(
        remote.join("DS1_decoded.uimf.tmp"),
        b"2026-08-23T10:00:00Z\tDemultiplexed frame 119\n\
          2026-08-23T10:00:01Z\tDemultiplexed frame 120\n",
    )
    .unwrap();

    let d = resolve(&remote, &work, "DS1", DatasetKind::Uimf);
    assert!(d.resume_requested);
    assert_eq!(d.resume_frame, 121);
    // local copy was staged for the tool
    assert!(work.join("DS1_decoded.uimf.tmp").exists());
}

#[test]
fn checkpoint_without_usable_frames_disables_resume() {
    let (_tmp, remote, work) = dirs();
    std::fs::write(
        remote.join("DS1_decoded.uimf.tmp"),
        b"2026-08-23T10:00:00Z\tstarting up\n",
    )
    .unwrap();

    let d = resolve(&remote, &work, "DS1", DatasetKind::Uimf);
    assert!(!d.resume_requested);
}

#[test]
fn checkpoint_reporting_frame_zero_disables_resume() {
    let (_tmp, remote, work) = dirs();
    std::fs::write(
        remote.join("DS1_decoded.uimf.tmp"),
        b"2026-08-23T10:00:00Z\tDemultiplexed frame 0\n",
    )
    .unwrap();

    let d = resolve(&remote, &work, "DS1", DatasetKind::Uimf);
    assert!(!d.resume_requested);
}
