//! 도메인 타입 — 여러 크레이트가 공유하는 기본 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 테스트 대상 게임의 엔진 변형
///
/// 시나리오 파일의 `configuration.is_gms` 값에서 결정되며,
/// 리소스 트리의 확장 지점 경로와 복사 제외 목록을 좌우합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVariant {
    /// GameMaker 8 계열
    Gm8,
    /// GameMaker Studio 계열
    Gms,
}

impl EngineVariant {
    /// `is_gms` 플래그로부터 엔진 변형을 만듭니다.
    pub fn from_is_gms(is_gms: bool) -> Self {
        if is_gms { Self::Gms } else { Self::Gm8 }
    }

    /// GMS 여부
    pub fn is_gms(self) -> bool {
        matches!(self, Self::Gms)
    }
}

impl fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gm8 => write!(f, "gm8"),
            Self::Gms => write!(f, "gms"),
        }
    }
}

/// 컴패니언 프로세스 한 번의 실행에 할당되는 포트 묶음
///
/// 모든 포트는 [`PortAllocator`](crate::ports::PortAllocator)에서 새로 할당되며
/// 같은 프로세스 안에서 재사용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSet {
    /// HTTP 포트 (사용되지 않지만 비어 있어야 함)
    pub http: u16,
    /// TCP 소켓 포트
    pub tcp: u16,
    /// UDP 소켓 포트
    pub udp: u16,
}
