//! 에러 타입 — 도메인별 에러 정의

/// iwpotest 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프로세스 간 핸드셰이크 프로토콜 에러
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 포트 할당 에러
    #[error("port error: {0}")]
    Port(#[from] PortError),

    /// 시나리오 처리 에러 (시나리오 크레이트에서 변환됨)
    #[error("scenario error: {0}")]
    Scenario(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 핸드셰이크 프로토콜 에러
///
/// 컴패니언 프로세스나 테스트 대상 프로그램과 주고받는 JSON 메시지가
/// 약속된 형태를 벗어났을 때 발생합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// 메시지 구조가 어떤 변형과도 일치하지 않음
    #[error("unexpected message structure")]
    UnexpectedStructure { reason: String },

    /// 형태는 올바르지만 이 방향에서 허용되지 않는 메시지
    #[error("unexpected message '{name}'")]
    UnexpectedMessage { name: String },

    /// 통과 신호를 받지 못함
    #[error("no pass signal received")]
    NoPassSignal,

    /// 메시지 인코딩 실패
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// 포트 할당 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// 사용 가능한 포트 범위를 모두 소진함
    #[error("port range exhausted (next candidate: {next})")]
    Exhausted { next: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_render_fixed_messages() {
        let err = ProtocolError::UnexpectedStructure {
            reason: "missing field `log`".to_owned(),
        };
        assert_eq!(err.to_string(), "unexpected message structure");
        assert_eq!(
            ProtocolError::NoPassSignal.to_string(),
            "no pass signal received"
        );
    }

    #[test]
    fn converts_into_harness_error() {
        let err: HarnessError = PortError::Exhausted { next: 65536 }.into();
        assert!(matches!(err, HarnessError::Port(_)));
        assert!(err.to_string().contains("65536"));
    }

    #[test]
    fn config_error_display_names_field() {
        let err = ConfigError::InvalidValue {
            field: "run.port_base".to_owned(),
            reason: "must not be 0".to_owned(),
        };
        assert!(err.to_string().contains("run.port_base"));
    }
}
