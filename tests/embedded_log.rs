use demux_step::embedded_log::{max_completed_frame, read_entries};

#[test]
fn reads_entries_and_skips_binary_noise() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("DS1_decoded.uimf");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0x00, 0xFF, 0x13, 0x37]);
    bytes.extend_from_slice(b"\nnot a log line\n");
    bytes.extend_from_slice(b"2026-08-23T10:00:00Z\tDemultiplexed frame 1\n");
    bytes.extend_from_slice(b"garbage\tno leading digit\n");
    bytes.extend_from_slice(b"2026-08-23T10:05:00Z\tDemultiplexed frame 2\n");
    std::fs::write(&artifact, bytes).unwrap();

    let entries = read_entries(&artifact).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "Demultiplexed frame 1");
    assert!(entries[0].timestamp.is_some());
}

#[test]
fn keeps_entries_with_unparseable_timestamps() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("log");
    std::fs::write(&artifact, b"2026-08-23 10:00:00\tDe-multiplexing complete\n").unwrap();

    let entries = read_entries(&artifact).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].timestamp.is_none());
}

#[test]
fn max_completed_frame_picks_the_highest() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("log");
    std::fs::write(
        &artifact,
        b"2026-08-23T10:00:00Z\tDemultiplexed frame 119\n\
          2026-08-23T10:00:01Z\tDemultiplexed frame 120\n\
          2026-08-23T10:00:02Z\tsome other entry\n",
    )
    .unwrap();

    let entries = read_entries(&artifact).unwrap();
    assert_eq!(max_completed_frame(&entries), Some(120));
}

#[test]
fn no_frame_entries_means_none() {
    let tmp = tempfile::tempdir().unwrap();
    let artifact = tmp.path().join("log");
    std::fs::write(&artifact, b"2026-08-23T10:00:00Z\tstarting up\n").unwrap();
    let entries = read_entries(&artifact).unwrap();
    assert_eq!(max_completed_frame(&entries), None);
}
