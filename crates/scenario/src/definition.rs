//! 시나리오 파일 파서
//!
//! `*.iwpotest` 파일은 TOML 설정 블록, 선택적인 `[events]` 줄,
//! 그리고 자유 형식 트레일러로 구성됩니다.
//!
//! ```text
//! [configuration]
//! folder = "game"
//! game = "game.exe"
//! output = "game_online.exe"
//! is_gms = false
//!
//! [server_packages]
//! hello = 'TCP 04 "hi"'
//!
//! [events]
//! $$pre_Step
//! x += 1;
//! $$test_GameBegin
//! check();
//! ```
//!
//! 설정 블록은 엄격한 serde 스키마로 해석되며, 알 수 없는 키와
//! 타입이 맞지 않는 값은 즉시 거부됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use iwpotest_core::types::EngineVariant;
use regex::Regex;
use serde::Deserialize;

use crate::error::{ParseError, ScenarioError};
use crate::event::{EventInjector, InjectionContext, Occurrence};
use crate::packet::PacketSpec;

/// 트레일러 시작 마커
pub const EVENTS_MARKER: &str = "[events]";

/// 기본 실행 제한 시간 (초)
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// 기본 빌드 제한 시간 (초)
pub const DEFAULT_IWPO_TIMEOUT_SECS: f64 = 20.0;

/// 조각 마커 패턴 (`$$<occurrence>_<point>`)
const FRAGMENT_MARKER: &str = r"(?m)^\$\$(\w+?)_(\w+)[ \t]*\r?$";

static FRAGMENT_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(FRAGMENT_MARKER));

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    configuration: Option<RawConfiguration>,
    #[serde(default)]
    server_packages: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfiguration {
    folder: Option<String>,
    game: Option<String>,
    output: Option<String>,
    is_gms: Option<bool>,
    name: Option<String>,
    #[serde(alias = "arguments")]
    args: Option<Vec<String>>,
    timeout: Option<f64>,
    iwpo_timeout: Option<f64>,
    skip_execute: Option<bool>,
    expected_error: Option<Vec<String>>,
    #[serde(default)]
    server_packages: BTreeMap<String, String>,
}

/// 파싱된 시나리오 설정
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// 시나리오 이름 (기본값: 파일 이름)
    pub name: String,
    /// 게임 소스 폴더 (시나리오 파일 기준으로 해석됨)
    pub folder: PathBuf,
    /// 입력 게임 파일
    pub game: String,
    /// 생성될 산출물 파일
    pub output: String,
    /// 엔진 변형
    pub engine: EngineVariant,
    /// 산출물 실행 인자
    pub args: Vec<String>,
    /// 산출물 실행 제한 시간
    pub timeout: Duration,
    /// 테스트 대상 프로그램 제한 시간
    pub iwpo_timeout: Duration,
    /// 실행 단계 생략 여부
    pub skip_execute: bool,
    /// 기대하는 게임 에러 줄
    pub expected_error: Option<Vec<String>>,
}

/// 시나리오 파일 하나의 파싱 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    /// 설정
    pub config: ScenarioConfig,
    /// 주입할 이벤트
    pub events: EventInjector,
    /// 서버 패킷 (이름순)
    pub packets: Vec<PacketSpec>,
}

impl ScenarioDefinition {
    /// 시나리오 파일 내용을 파싱합니다.
    ///
    /// `origin`은 시나리오 파일 경로로, 기본 이름과 `folder` 해석에 사용됩니다.
    /// `resource_root`는 pre/post 조각의 리소스 존재 여부를 확인할 원본 데이터 디렉토리입니다.
    pub fn parse(
        content: &str,
        origin: &Path,
        resource_root: &Path,
    ) -> Result<Self, ScenarioError> {
        let (head, trailer) = split_events(content)?;

        let raw: RawScenario = toml::from_str(head).map_err(|e| ParseError::Malformed {
            reason: e.to_string(),
        })?;
        let mut conf = raw.configuration.ok_or_else(|| missing("configuration.folder"))?;

        let folder = conf.folder.take().ok_or_else(|| missing("configuration.folder"))?;
        let game = conf.game.take().ok_or_else(|| missing("configuration.game"))?;
        let output = conf.output.take().ok_or_else(|| missing("configuration.output"))?;
        let is_gms = conf.is_gms.ok_or_else(|| missing("configuration.is_gms"))?;

        let name = match conf.name.take() {
            Some(name) => name,
            // `Scenario::new`과 같은 규칙: 확장자를 뺀 파일 이름
            None => origin
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let base = origin.parent().unwrap_or_else(|| Path::new(""));

        let config = ScenarioConfig {
            name,
            folder: base.join(folder),
            game,
            output,
            engine: EngineVariant::from_is_gms(is_gms),
            args: conf.args.take().unwrap_or_default(),
            timeout: seconds("configuration.timeout", conf.timeout, DEFAULT_TIMEOUT_SECS)?,
            iwpo_timeout: seconds(
                "configuration.iwpo_timeout",
                conf.iwpo_timeout,
                DEFAULT_IWPO_TIMEOUT_SECS,
            )?,
            skip_execute: conf.skip_execute.unwrap_or(false),
            expected_error: conf.expected_error.take(),
        };

        let mut packets: Vec<PacketSpec> = Vec::new();
        for (name, line) in conf.server_packages.iter().chain(raw.server_packages.iter()) {
            if packets.iter().any(|p| p.name() == name) {
                return Err(ParseError::DuplicatePacket { name: name.clone() }.into());
            }
            packets.push(PacketSpec::compile(name.as_str(), line)?);
        }
        packets.sort_by(|a, b| a.name().cmp(b.name()));

        let ctx = InjectionContext {
            engine: config.engine,
            resource_root,
        };
        let mut events = EventInjector::new();
        if let Some(trailer) = trailer {
            for (point, occurrence, code) in fragments(trailer)? {
                events.declare(&ctx, point, occurrence, code)?;
            }
        }

        Ok(Self {
            config,
            events,
            packets,
        })
    }
}

fn missing(key: &str) -> ScenarioError {
    ParseError::MissingKey {
        key: key.to_owned(),
    }
    .into()
}

fn seconds(key: &str, value: Option<f64>, default: f64) -> Result<Duration, ScenarioError> {
    let secs = value.unwrap_or(default);
    if secs <= 0.0 {
        return Err(ParseError::InvalidValue {
            key: key.to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        ParseError::InvalidValue {
            key: key.to_owned(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// 설정 블록과 `[events]` 트레일러를 분리합니다.
fn split_events(content: &str) -> Result<(&str, Option<&str>), ParseError> {
    let mut marker: Option<(usize, usize)> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if line.trim() == EVENTS_MARKER {
            if marker.is_some() {
                return Err(ParseError::MultipleEventSections);
            }
            marker = Some((offset, offset + line.len()));
        }
        offset += line.len();
    }

    Ok(match marker {
        Some((start, end)) => (&content[..start], Some(&content[end..])),
        None => (content, None),
    })
}

/// 트레일러를 `(지점, 시점, 코드)` 목록으로 분해합니다.
///
/// 각 조각은 다음 마커 또는 입력 끝까지이며, 앞뒤 공백이 제거됩니다.
fn fragments(trailer: &str) -> Result<Vec<(&str, Occurrence, &str)>, ParseError> {
    let pattern = match &*FRAGMENT_RE {
        Ok(pattern) => pattern,
        Err(e) => {
            return Err(ParseError::Malformed {
                reason: e.to_string(),
            });
        }
    };
    let markers: Vec<_> = pattern.captures_iter(trailer).collect();
    let mut result = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(occurrence), Some(point)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(trailer.len(), |m| m.start());
        let occurrence: Occurrence = occurrence.as_str().parse()?;
        result.push((
            point.as_str(),
            occurrence,
            trailer[whole.end()..end].trim(),
        ));
    }

    Ok(result)
}
