//! iwpotest.toml 통합 설정 테스트
//!
//! - iwpotest.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::path::PathBuf;

use iwpotest_core::config::HarnessConfig;
use iwpotest_core::error::{ConfigError, HarnessError};

// =============================================================================
// iwpotest.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../iwpotest.toml.example");
    let config = HarnessConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.paths.iwpo_dir, PathBuf::from("iwpo"));
    assert_eq!(config.paths.companion, vec!["node", "iwpo/server.js"]);
    assert!(config.run.launcher.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../iwpotest.toml.example");
    let config = HarnessConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../iwpotest.toml.example");
    let example = HarnessConfig::parse(content).expect("should parse");
    let defaults = HarnessConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.general.log_format, defaults.general.log_format);
    assert_eq!(example.paths.iwpo_dir, defaults.paths.iwpo_dir);
    assert_eq!(example.paths.program, defaults.paths.program);
    assert_eq!(example.paths.temp_dir, defaults.paths.temp_dir);
    assert_eq!(example.paths.companion, defaults.paths.companion);
    assert_eq!(example.run.max_parallel, defaults.run.max_parallel);
    assert_eq!(example.run.keep, defaults.run.keep);
    assert_eq!(example.run.verbose, defaults.run.verbose);
    assert_eq!(example.run.write_logs, defaults.run.write_logs);
    assert_eq!(example.run.port_base, defaults.run.port_base);
    assert_eq!(example.run.server_host, defaults.run.server_host);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_paths_only() {
    let toml = r#"
[paths]
iwpo_dir = "/opt/iwpo"
temp_dir = "/tmp/iwpotest"
"#;
    let config = HarnessConfig::parse(toml).expect("should parse");
    assert_eq!(config.paths.iwpo_dir, PathBuf::from("/opt/iwpo"));
    assert_eq!(config.paths.temp_dir, PathBuf::from("/tmp/iwpotest"));
    // 나머지 섹션은 기본값
    assert_eq!(config.run.max_parallel, 1);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_run_only() {
    let toml = r#"
[run]
max_parallel = 0
write_logs = true
launcher = ["wine"]
"#;
    let config = HarnessConfig::parse(toml).expect("should parse");
    assert_eq!(config.run.max_parallel, 0);
    assert!(config.run.write_logs);
    assert_eq!(config.run.launcher, vec!["wine"]);
    assert_eq!(config.paths.program, "iwpo.exe");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[run]
max_parallel = 2
"#;

    let original = std::env::var("IWPOTEST_RUN_MAX_PARALLEL").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("IWPOTEST_RUN_MAX_PARALLEL", "8");
    }

    let mut config = HarnessConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.run.max_parallel;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("IWPOTEST_RUN_MAX_PARALLEL", val),
            None => std::env::remove_var("IWPOTEST_RUN_MAX_PARALLEL"),
        }
    }

    assert_eq!(result, 8);
}

#[test]
#[serial_test::serial]
fn env_override_splits_companion_command() {
    let original = std::env::var("IWPOTEST_PATHS_COMPANION").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("IWPOTEST_PATHS_COMPANION", "python3  peer.py --quiet");
    }

    let mut config = HarnessConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.paths.companion.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("IWPOTEST_PATHS_COMPANION", val),
            None => std::env::remove_var("IWPOTEST_PATHS_COMPANION"),
        }
    }

    assert_eq!(result, vec!["python3", "peer.py", "--quiet"]);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_bool_is_ignored() {
    let original = std::env::var("IWPOTEST_RUN_KEEP").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("IWPOTEST_RUN_KEEP", "definitely");
    }

    let mut config = HarnessConfig::parse("[run]\nkeep = true").expect("should parse");
    config.apply_env_overrides();
    let result = config.run.keep;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("IWPOTEST_RUN_KEEP", val),
            None => std::env::remove_var("IWPOTEST_RUN_KEEP"),
        }
    }

    assert!(result, "unparsable env value should keep the toml value");
}

// =============================================================================
// 에러 테스트
// =============================================================================

#[test]
fn malformed_toml_returns_parse_error() {
    let result = HarnessConfig::parse("[run\nmax_parallel = 1");
    assert!(matches!(
        result,
        Err(HarnessError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let result = HarnessConfig::parse("[run]\nmax_parallel = \"many\"");
    assert!(matches!(
        result,
        Err(HarnessError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn unknown_section_is_rejected() {
    let result = HarnessConfig::parse("[ebpf]\nenabled = true");
    assert!(result.is_err());
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = HarnessConfig::from_file("/tmp/iwpotest_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        HarnessError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_reads_and_validates() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("iwpotest.toml");
    std::fs::write(&path, "[general]\nlog_format = \"xml\"\n").expect("should write");

    let result = HarnessConfig::from_file(&path).await;
    let err = result.expect_err("invalid log format should fail validation");
    assert!(err.to_string().contains("general.log_format"));
}

#[test]
fn serialize_and_reparse_roundtrip() {
    let mut original = HarnessConfig::default();
    original.run.max_parallel = 3;
    original.paths.companion = vec!["peer".to_owned()];

    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let reparsed = HarnessConfig::parse(&toml_str).expect("should reparse");

    assert_eq!(reparsed.run.max_parallel, 3);
    assert_eq!(reparsed.paths.companion, vec!["peer"]);
}
