//! 설정 관리 — iwpotest.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 하네스 전체 설정을 담는 최상위 구조체입니다.
//! 시나리오 파일(`*.iwpotest`)의 설정과는 별개입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IWPOTEST_RUN_MAX_PARALLEL=4` 형식)
//! 3. 설정 파일 (`iwpotest.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), iwpotest_core::error::HarnessError> {
//! use iwpotest_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("iwpotest.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[run]\nmax_parallel = 4")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HarnessError};
use crate::ports::DEFAULT_PORT_BASE;
use crate::protocol::SessionConfig;

/// iwpotest 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 경로 설정
    #[serde(default)]
    pub paths: PathsConfig,
    /// 실행 설정
    #[serde(default)]
    pub run: RunSettings,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IWPOTEST_{SECTION}_{FIELD}`
    /// 예: `IWPOTEST_PATHS_TEMP_DIR=/tmp/iwpo`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IWPOTEST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IWPOTEST_GENERAL_LOG_FORMAT");

        // Paths
        override_path(&mut self.paths.iwpo_dir, "IWPOTEST_PATHS_IWPO_DIR");
        override_string(&mut self.paths.program, "IWPOTEST_PATHS_PROGRAM");
        override_path(&mut self.paths.temp_dir, "IWPOTEST_PATHS_TEMP_DIR");
        override_words(&mut self.paths.companion, "IWPOTEST_PATHS_COMPANION");

        // Run
        override_usize(&mut self.run.max_parallel, "IWPOTEST_RUN_MAX_PARALLEL");
        override_bool(&mut self.run.keep, "IWPOTEST_RUN_KEEP");
        override_bool(&mut self.run.verbose, "IWPOTEST_RUN_VERBOSE");
        override_bool(&mut self.run.write_logs, "IWPOTEST_RUN_WRITE_LOGS");
        override_u16(&mut self.run.port_base, "IWPOTEST_RUN_PORT_BASE");
        override_string(&mut self.run.server_host, "IWPOTEST_RUN_SERVER_HOST");
        override_words(&mut self.run.launcher, "IWPOTEST_RUN_LAUNCHER");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.paths.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.program".to_owned(),
                reason: "program name must not be empty".to_owned(),
            }
            .into());
        }

        if self.paths.companion.is_empty() || self.paths.companion[0].trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.companion".to_owned(),
                reason: "companion command must name an executable".to_owned(),
            }
            .into());
        }

        if self.run.port_base == 0 {
            return Err(ConfigError::InvalidValue {
                field: "run.port_base".to_owned(),
                reason: "port base must not be 0".to_owned(),
            }
            .into());
        }

        if self.run.server_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run.server_host".to_owned(),
                reason: "server host must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 테스트 대상 프로그램 실행 파일 경로
    pub fn program_path(&self) -> PathBuf {
        self.paths.iwpo_dir.join(&self.paths.program)
    }

    /// 원본 리소스(data) 디렉토리 경로
    pub fn resources_dir(&self) -> PathBuf {
        self.paths.iwpo_dir.join(RESOURCE_DIR_NAME)
    }

    /// 컴패니언에게 전달할 세션 설정
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            keep: self.run.keep,
            verbose: self.run.verbose,
        }
    }

    /// 상대 경로를 현재 작업 디렉토리 기준 절대 경로로 바꿉니다.
    ///
    /// 컴패니언 명령은 디스크에 실제로 존재하는 상대 경로 단어만 변환합니다
    /// (`node`처럼 PATH에서 찾는 이름은 그대로 둡니다).
    /// 자식 프로세스는 시나리오 작업 디렉토리에서 실행되므로 필요합니다.
    pub fn resolve_paths(&mut self) -> Result<(), HarnessError> {
        self.paths.iwpo_dir = std::path::absolute(&self.paths.iwpo_dir)?;
        self.paths.temp_dir = std::path::absolute(&self.paths.temp_dir)?;
        for word in &mut self.paths.companion {
            let candidate = Path::new(word.as_str());
            if candidate.is_relative() && candidate.exists() {
                *word = std::path::absolute(candidate)?.display().to_string();
            }
        }
        Ok(())
    }
}

/// 원본 리소스 디렉토리 이름 (작업 디렉토리 안에서도 같은 이름으로 복사됨)
pub const RESOURCE_DIR_NAME: &str = "data";

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 경로 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// 테스트 대상 프로그램과 `data/`를 담은 디렉토리
    pub iwpo_dir: PathBuf,
    /// `iwpo_dir` 안의 프로그램 실행 파일 이름
    pub program: String,
    /// 시나리오별 작업 디렉토리가 만들어질 임시 디렉토리
    pub temp_dir: PathBuf,
    /// 컴패니언 프로세스 명령 (실행 파일 + 인자)
    pub companion: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            iwpo_dir: PathBuf::from("iwpo"),
            program: "iwpo.exe".to_owned(),
            temp_dir: PathBuf::from("temp"),
            companion: vec!["node".to_owned(), "iwpo/server.js".to_owned()],
        }
    }
}

/// 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// 동시 실행 시나리오 수 (0 = 시나리오마다 워커 하나)
    pub max_parallel: usize,
    /// 작업 디렉토리 보존
    pub keep: bool,
    /// 리포트에 진단 로그 포함
    pub verbose: bool,
    /// 시나리오별 로그와 요약 파일 저장
    pub write_logs: bool,
    /// 포트 할당 시작 값
    pub port_base: u16,
    /// 컴패니언 서버 주소 (테스트 대상 프로그램에게 전달)
    pub server_host: String,
    /// 프로그램과 산출물 실행 시 앞에 붙일 명령 (예: `["wine"]`)
    pub launcher: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            keep: false,
            verbose: false,
            write_logs: false,
            port_base: DEFAULT_PORT_BASE,
            server_host: "127.0.0.1".to_owned(),
            launcher: Vec::new(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

/// 공백으로 구분된 명령줄을 단어 목록으로 오버라이드합니다.
fn override_words(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split_whitespace().map(str::to_owned).collect();
    }
}
