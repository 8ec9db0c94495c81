//! 포트 할당기 — 동시 실행 시나리오 간 포트 충돌 방지
//!
//! [`PortAllocator`]는 실행 컨텍스트가 소유하고 워커들에게 `Arc`로 공유됩니다.
//! 원자적 증가 연산만 사용하므로 락 없이 여러 태스크에서 호출할 수 있습니다.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::PortError;
use crate::metrics as m;
use crate::types::PortSet;

/// 기본 시작 포트
pub const DEFAULT_PORT_BASE: u16 = 8002;

/// 단조 증가 포트 할당기
///
/// 한 번 반환한 포트는 다시 반환하지 않습니다.
#[derive(Debug)]
pub struct PortAllocator {
    next: AtomicU32,
}

impl PortAllocator {
    /// `base`부터 포트를 나눠주는 할당기를 생성합니다.
    pub fn new(base: u16) -> Self {
        Self {
            next: AtomicU32::new(u32::from(base)),
        }
    }

    /// 다음 포트를 할당합니다.
    pub fn next(&self) -> Result<u16, PortError> {
        let candidate = self.next.fetch_add(1, Ordering::Relaxed);
        let port = u16::try_from(candidate).map_err(|_| PortError::Exhausted { next: candidate })?;
        metrics::counter!(m::PORTS_ALLOCATED_TOTAL).increment(1);
        Ok(port)
    }

    /// 컴패니언 프로세스용 포트 세 개를 한 번에 할당합니다.
    pub fn next_set(&self) -> Result<PortSet, PortError> {
        Ok(PortSet {
            http: self.next()?,
            tcp: self.next()?,
            udp: self.next()?,
        })
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_BASE)
    }
}
