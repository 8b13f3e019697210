use demux_step::validate::{calibration_failed, validate_at, FINISH_MARKER};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn parse(s: &str) -> OffsetDateTime {
    OffsetDateTime::parse(s, &Rfc3339).unwrap()
}

#[test]
fn marker_absent_is_invalid_with_distinct_message() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("DS1_decoded.uimf");
    std::fs::write(&artifact, b"2026-08-23T10:00:00Z\tDemultiplexed frame 5\n").unwrap();

    let v = validate_at(&artifact, 10, parse("2026-08-23T10:05:00Z")).unwrap();
    assert!(!v.valid);
    assert!(v.message.contains(&format!("no '{FINISH_MARKER}'")));
    assert!(!v.message.contains("stale"));
}

#[test]
fn fresh_marker_is_valid() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("DS1_decoded.uimf");
    std::fs::write(&artifact, b"2026-08-23T10:00:00Z\tDe-multiplexing complete\n").unwrap();

    let v = validate_at(&artifact, 10, parse("2026-08-23T10:05:00Z")).unwrap();
    assert!(v.valid);
    assert_eq!(v.timestamp, Some(parse("2026-08-23T10:00:00Z")));
}

#[test]
fn stale_marker_is_invalid_with_stale_message() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("DS1_decoded.uimf");
    std::fs::write(&artifact, b"2026-08-23T09:00:00Z\tDe-multiplexing complete\n").unwrap();

    let v = validate_at(&artifact, 10, parse("2026-08-23T10:00:00Z")).unwrap();
    assert!(!v.valid);
    assert!(v.message.contains("stale"));
}

#[test]
fn window_boundary_is_exclusive() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("a");
    std::fs::write(&artifact, b"2026-08-23T10:00:00Z\tDe-multiplexing complete\n").unwrap();

    // exactly window-old is already stale: valid iff now - ts < window
    let v = validate_at(&artifact, 10, parse("2026-08-23T10:10:00Z")).unwrap();
    assert!(!v.valid);
}

#[test]
fn timestamp_falls_back_to_following_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("a");
    std::fs::write(
        &artifact,
        b"2026-08-23 09:59:00\tDe-multiplexing complete\n\
          2026-08-23T10:00:00Z\tshutting down\n",
    )
    .unwrap();

    let v = validate_at(&artifact, 10, parse("2026-08-23T10:05:00Z")).unwrap();
    assert!(v.valid);
    assert_eq!(v.timestamp, Some(parse("2026-08-23T10:00:00Z")));
}

#[test]
fn timestamp_falls_back_to_mtime_when_log_has_none() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("a");
    // stamp looks numeric but is not RFC3339, and nothing follows
    std::fs::write(&artifact, b"2026-08-23 09:59:00\tDe-multiplexing complete\n").unwrap();

    let v = validate_at(&artifact, 10, OffsetDateTime::now_utc()).unwrap();
    assert!(v.valid, "mtime of a just-written file is inside the window");
}

#[test]
fn latest_finish_marker_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("a");
    std::fs::write(
        &artifact,
        b"2026-08-23T08:00:00Z\tDe-multiplexing complete\n\
          2026-08-23T09:58:00Z\tDe-multiplexing complete\n",
    )
    .unwrap();

    let v = validate_at(&artifact, 10, parse("2026-08-23T10:00:00Z")).unwrap();
    assert!(v.valid);
    assert_eq!(v.timestamp, Some(parse("2026-08-23T09:58:00Z")));
}

#[test]
fn calibration_failure_checks_last_nonblank_line_only() {
    let phrase = "Calibration failed";
    assert!(calibration_failed("ok\nCalibration failed\n\n\n", phrase));
    assert!(!calibration_failed("Calibration failed\nretrying\nok\n", phrase));
    assert!(!calibration_failed("", phrase));
    assert!(!calibration_failed("\n\n", phrase));
}
