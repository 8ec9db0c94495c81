//! 시나리오 에러 타입
//!
//! [`ScenarioError`]는 시나리오 생명주기 안에서 발생하는 모든 에러를 표현합니다.
//! 생명주기 경계에서 잡혀 진단 로그에 기록되고 `Failed` 상태로 변환되므로
//! 형제 시나리오나 전체 실행을 중단시키지 않습니다.
//! `From<ScenarioError> for HarnessError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use iwpotest_core::error::{HarnessError, PortError, ProtocolError};

use crate::event::Occurrence;
use crate::state::ScenarioState;

/// 시나리오 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 시나리오 파일 파싱 실패
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 확장 지점 리소스 파일이 디스크에 없음
    #[error("file '{path}' does not exist")]
    Precondition {
        /// 확인한 리소스 경로
        path: String,
    },

    /// 핸드셰이크 프로토콜 위반
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// 실행/판정 단계 실패
    #[error(transparent)]
    Runtime(#[from] RuntimeFailure),

    /// 생명주기 순서 위반
    #[error("scenario is in invalid state '{current}', expected '{expected}'")]
    InvalidState {
        /// 현재 상태
        current: ScenarioState,
        /// 요구되는 선행 상태
        expected: ScenarioState,
    },

    /// 포트 할당 실패
    #[error("port allocation failed: {0}")]
    Port(#[from] PortError),

    /// 경로가 붙은 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 작업 대상 경로
        path: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 블로킹 작업 태스크가 비정상 종료됨
    #[error("background task failed: {0}")]
    Task(String),
}

impl ScenarioError {
    /// 경로 정보를 붙여 I/O 에러를 감쌉니다.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// 시나리오 파일 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// TOML 구문 오류, 알 수 없는 키, 타입 불일치
    #[error("malformed scenario file: {reason}")]
    Malformed {
        /// 실패 사유
        reason: String,
    },

    /// 필수 키 누락
    #[error("required key '{key}' is missing")]
    MissingKey {
        /// 점으로 구분된 키 경로
        key: String,
    },

    /// 값은 있지만 허용 범위를 벗어남
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// 점으로 구분된 키 경로
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// `[events]` 마커가 두 번 이상 등장
    #[error("multiple [events] sections found")]
    MultipleEventSections,

    /// 같은 (확장 지점, 발생 시점) 쌍에 조각이 이미 있음
    #[error("code for '{occurrence}_{point}' already defined")]
    DuplicateFragment {
        /// 확장 지점 이름
        point: String,
        /// 발생 시점
        occurrence: Occurrence,
    },

    /// 지원하지 않는 발생 시점
    #[error("unknown event occurrence '{0}'")]
    UnknownOccurrence(String),

    /// 같은 이름의 서버 패킷이 이미 있음
    #[error("server package '{name}' is already defined")]
    DuplicatePacket {
        /// 패킷 이름
        name: String,
    },

    /// 서버 패킷 컴파일 실패
    #[error("server package '{name}': {source}")]
    Packet {
        /// 패킷 이름
        name: String,
        /// 원인
        #[source]
        source: PacketError,
    },
}

/// 패킷 DSL 컴파일 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// 전송 종류 태그가 없음
    #[error("missing transport tag")]
    MissingTransport,

    /// 지원하지 않는 전송 종류
    #[error("unsupported transport '{0}', only TCP packages are implemented")]
    UnsupportedTransport(String),

    /// 닫히지 않은 문자열
    #[error("unclosed string at offset {offset}")]
    UnterminatedString {
        /// 여는 따옴표 위치 (바이트 오프셋)
        offset: usize,
    },

    /// 16진수 토큰의 길이가 2/4/8이 아님
    #[error("unknown byte length {length} of hex token '{token}'")]
    InvalidByteLength {
        /// 원본 토큰
        token: String,
        /// 토큰 길이
        length: usize,
    },

    /// 숫자로 해석할 수 없는 토큰
    #[error("could not parse '{token}' as a number")]
    InvalidNumber {
        /// 원본 토큰
        token: String,
    },
}

/// 실행/판정 단계 실패
#[derive(Debug, thiserror::Error)]
pub enum RuntimeFailure {
    /// 테스트 대상 프로그램이 산출물을 만들지 않음
    #[error("output missing: {path}")]
    OutputMissing {
        /// 기대한 산출물 경로
        path: String,
    },

    /// 결과 파일이 없음
    #[error("result file missing: {path}")]
    ResultMissing {
        /// 기대한 결과 파일 경로
        path: String,
    },

    /// 결과 파일 내용이 성공 토큰이 아님 (내용이 그대로 메시지가 됨)
    #[error("{content}")]
    ResultMismatch {
        /// 결과 파일 내용
        content: String,
    },

    /// 게임 에러 로그가 기대한 내용과 다름
    #[error("game error mismatch: expected {expected:?}, got {actual:?}")]
    ErrorLogMismatch {
        /// 기대한 에러 줄
        expected: Vec<String>,
        /// 실제 에러 줄
        actual: Vec<String>,
    },

    /// 에러를 기대했지만 에러 로그가 없음
    #[error("expected game error {expected:?} but no error log was written")]
    ErrorLogMissing {
        /// 기대한 에러 줄
        expected: Vec<String>,
    },

    /// 에러를 기대하지 않았는데 에러 로그가 기록됨
    #[error("unexpected game error: {content}")]
    UnexpectedGameError {
        /// 에러 로그 내용
        content: String,
    },

    /// 자식 프로세스 시간 초과
    #[error("{process} timed out after {secs}s")]
    Timeout {
        /// 프로세스 역할 이름
        process: String,
        /// 제한 시간 (초)
        secs: f64,
    },

    /// 컴패니언 프로세스 판정 실패
    #[error("companion failed: {reason}")]
    Companion {
        /// 실패 사유
        reason: String,
    },

    /// 자식 프로세스 실행 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<ScenarioError> for HarnessError {
    fn from(err: ScenarioError) -> Self {
        HarnessError::Scenario(err.to_string())
    }
}
