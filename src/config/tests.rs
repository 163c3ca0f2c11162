use std::io::Write;

use clap::Parser;

use super::*;

#[test]
fn defaults_match_production_sizing() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.cache.resolver_limit.get(), 640 * 1024);
    assert_eq!(settings.cache.aggregate_limit.get(), 100);
    assert_eq!(settings.cache.hackathon_ttl, Duration::from_secs(600));
    assert_eq!(settings.cache.news_ttl, Duration::from_secs(32_600));
    assert!(settings.cache.enabled);
    assert!(settings.rate_limit.budgets.is_empty());
    assert_eq!(settings.store.data_file, PathBuf::from("hackhub.json"));
    assert_eq!(settings.channels.audit_channel, "log-team-creation");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.store.data_file = Some(PathBuf::from("from-file.json"));

    raw.apply_overrides(&CliOverrides {
        data_file: Some(PathBuf::from("from-cli.json")),
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        no_cache: true,
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.store.data_file, PathBuf::from("from-cli.json"));
    assert!(!settings.cache.enabled);
}

#[test]
fn rate_limit_overrides_fill_missing_parts_from_defaults() {
    let mut raw = RawSettings::default();
    raw.rate_limit.insert(
        "join_team".to_string(),
        RawBudget {
            max_calls: Some(2),
            window_seconds: None,
        },
    );

    let settings = Settings::from_raw(raw).expect("valid settings");
    let budget = settings.rate_limit.budgets[&Operation::JoinTeam];
    assert_eq!(budget.max_calls, 2);
    assert_eq!(budget.window, Duration::from_secs(60));
}

#[test]
fn unknown_rate_limited_operation_is_rejected() {
    let mut raw = RawSettings::default();
    raw.rate_limit.insert("teleport".to_string(), RawBudget::default());

    let err = Settings::from_raw(raw).expect_err("unknown operation");
    assert!(matches!(err, LoadError::Invalid { ref key, .. } if key == "rate_limit.teleport"));
}

#[test]
fn zero_sizes_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.resolver_limit = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.cache.news_ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn config_file_layers_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[cache]\nhackathon_ttl_seconds = 30\n\n[rate_limit.news]\nmax_calls = 5\nwindow_seconds = 10\n\n[channels]\nadmin_ids = [\"U1\", \" \"]"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let cli = CliArgs::try_parse_from([
        "hackhub",
        "--config-file",
        path.as_str(),
        "--log-level",
        "warn",
        "hackathons",
        "--window",
        "current",
    ])
    .expect("valid args");

    let settings = load(&cli).expect("settings load");
    assert_eq!(settings.cache.hackathon_ttl, Duration::from_secs(30));
    assert_eq!(
        settings.rate_limit.budgets[&Operation::News],
        Budget::new(5, Duration::from_secs(10))
    );
    assert_eq!(settings.channels.admin_ids, vec!["U1".to_string()]);
    assert_eq!(settings.logging.level, LevelFilter::WARN);
}

#[test]
fn parse_membership_commands() {
    let cli = CliArgs::try_parse_from(["hackhub", "join", "--user", "u1", "--team", "t1"])
        .expect("valid args");
    match cli.command {
        Command::Join(args) => {
            assert_eq!(args.user, "u1");
            assert_eq!(args.team, "t1");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_link_with_repeated_events() {
    let cli = CliArgs::try_parse_from([
        "hackhub",
        "link",
        "--problem-statement",
        "ps1",
        "--event",
        "Fall|h1",
        "--event",
        "h2",
    ])
    .expect("valid args");
    match cli.command {
        Command::Link(args) => {
            assert_eq!(args.problem_statement, "ps1");
            assert_eq!(args.events, vec!["Fall|h1", "h2"]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_list_arguments() {
    let cli = CliArgs::try_parse_from([
        "hackhub", "list", "news", "--order-by", "slack_ts", "--desc", "--limit", "3",
    ])
    .expect("valid args");
    match cli.command {
        Command::List(args) => {
            assert_eq!(args.collection, "news");
            assert_eq!(args.order_by.as_deref(), Some("slack_ts"));
            assert!(args.desc);
            assert_eq!(args.limit, Some(3));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn unknown_window_is_rejected() {
    assert!(CliArgs::try_parse_from(["hackhub", "hackathons", "--window", "someday"]).is_err());
}
