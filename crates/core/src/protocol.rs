//! 핸드셰이크 프로토콜 — 하네스, 컴패니언 프로세스, 테스트 대상 프로그램 간 메시지
//!
//! 채널은 줄 단위 JSON입니다. 하네스 → 자식은 자식의 stdin,
//! 자식 → 하네스는 자식의 stdout을 사용합니다.
//!
//! # 메시지 흐름
//! ```text
//! harness ──config──────────────▶ companion      (시작 직후 1회)
//! harness ──run─────────────────▶ program        (시작 직후 1회)
//! harness ──get_result_and_close▶ companion      (정리 단계)
//! harness ◀─report─────────────── companion      (언제든)
//! ```
//!
//! 하네스가 보내는 메시지는 [`HandshakeMessage`], 컴패니언이 보내는 판정은
//! [`CompanionReport`]로 디코딩합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// 하네스가 자식 프로세스에게 보내는 메시지
///
/// `name` 필드를 태그로 사용하는 JSON 객체입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case", deny_unknown_fields)]
pub enum HandshakeMessage {
    /// 하네스 → 컴패니언: 세션 설정과 서버 패킷
    Config {
        config: SessionConfig,
        server_packages: Vec<PacketPayload>,
    },
    /// 하네스 → 테스트 대상 프로그램: 실행 설정, 스크립트 조각, 수정된 파일 목록
    Run {
        config: RunConfig,
        scripts: BTreeMap<String, String>,
        modifications: Vec<String>,
    },
    /// 하네스 → 컴패니언: 결과를 보내고 종료하라는 요청
    GetResultAndClose,
}

impl HandshakeMessage {
    /// 메시지 태그 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Run { .. } => "run",
            Self::GetResultAndClose => "get_result_and_close",
        }
    }

    /// 한 줄짜리 JSON으로 인코딩합니다 (줄바꿈 포함).
    pub fn encode_line(&self) -> Result<String, ProtocolError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    /// 수신한 한 줄을 엄격하게 디코딩합니다.
    ///
    /// 알려진 변형과 타입이 정확히 맞지 않으면
    /// [`ProtocolError::UnexpectedStructure`]를 반환합니다.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim()).map_err(|e| ProtocolError::UnexpectedStructure {
            reason: e.to_string(),
        })
    }
}

/// 컴패니언이 하네스에게 보내는 판정 메시지
///
/// `{log: [string], passed: bool, failed: bool}` 형태입니다. `name`은 생략할 수 있고,
/// 있으면 `get_result_and_close`(종료 요청에 대한 응답) 또는 `result`여야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanionReport {
    /// 메시지 이름 (선택)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 컴패니언 로그 줄
    pub log: Vec<String>,
    /// 통과 신호 수신 여부
    pub passed: bool,
    /// 실패 여부 (`log`의 마지막 줄이 사유)
    pub failed: bool,
}

impl CompanionReport {
    /// `name`으로 허용되는 값
    pub const ACCEPTED_NAMES: &'static [&'static str] = &["get_result_and_close", "result"];

    /// 컴패니언 stdout의 한 줄을 디코딩합니다.
    ///
    /// 타입이 맞지 않으면 [`ProtocolError::UnexpectedStructure`],
    /// 허용되지 않는 `name`이면 [`ProtocolError::UnexpectedMessage`]를 반환합니다.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let report: Self =
            serde_json::from_str(line.trim()).map_err(|e| ProtocolError::UnexpectedStructure {
                reason: e.to_string(),
            })?;
        match report.name.as_deref() {
            Some(name) if !Self::ACCEPTED_NAMES.contains(&name) => {
                Err(ProtocolError::UnexpectedMessage {
                    name: name.to_owned(),
                })
            }
            _ => Ok(report),
        }
    }
}

/// 컴패니언에게 전달되는 세션 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 작업 디렉토리 보존 여부
    pub keep: bool,
    /// 상세 로그 여부
    pub verbose: bool,
}

/// 테스트 대상 프로그램에게 전달되는 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// 시나리오 이름
    pub scenario: String,
    /// 입력 게임 파일 (작업 디렉토리 기준)
    pub game: String,
    /// 생성할 산출물 파일 (작업 디렉토리 기준)
    pub output: String,
    /// 산출물 실행 인자
    pub args: Vec<String>,
    /// GMS 여부
    pub is_gms: bool,
    /// 컴패니언 서버 주소
    pub server: String,
    /// 컴패니언 TCP 포트
    pub tcp_port: u16,
    /// 컴패니언 UDP 포트
    pub udp_port: u16,
}

/// IPC 전송용으로 직렬화된 서버 패킷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketPayload {
    /// 패킷 이름
    pub name: String,
    /// 전송 종류 레이블 (`tcp`)
    pub kind: String,
    /// base64로 인코딩된 패킷 바이트
    pub data: String,
}
