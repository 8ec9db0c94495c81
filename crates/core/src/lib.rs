//! iwpotest 공통 크레이트
//!
//! 하네스 전체가 공유하는 에러, 설정, 도메인 타입, 핸드셰이크 프로토콜,
//! 포트 할당기를 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `iwpotest.toml` 하네스 설정
//! - [`error`]: 최상위 에러 타입
//! - [`metrics`]: 메트릭 이름 상수
//! - [`ports`]: 프로세스 전역 포트 할당기
//! - [`protocol`]: 프로세스 간 JSON 메시지
//! - [`types`]: 엔진 변형 등 공유 타입

pub mod config;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod protocol;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HarnessError, PortError, ProtocolError};

// 설정
pub use config::HarnessConfig;

// 포트
pub use ports::PortAllocator;

// 프로토콜
pub use protocol::{CompanionReport, HandshakeMessage, PacketPayload, RunConfig, SessionConfig};

// 도메인 타입
pub use types::{EngineVariant, PortSet};
