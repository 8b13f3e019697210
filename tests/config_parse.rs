use demux_step::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../demux-step.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.global.dataset_kind, "uimf");
    assert!(cfg.timeouts.demux_max_runtime_minutes > cfg.timeouts.calibrate_max_runtime_minutes);
    assert!(cfg.validation.freshness_window_minutes >= 1);
}

#[test]
fn defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.copy.max_retries, 3);
    assert_eq!(cfg.copy.retry_backoff_seconds, 2);
    assert_eq!(cfg.validation.freshness_window_minutes, 10);
    assert_eq!(cfg.timeouts.demux_max_runtime_minutes, 5 * 24 * 60);
}
