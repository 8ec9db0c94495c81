//! 메트릭 상수 정의
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 기록은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `iwpotest_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! metrics::counter!(iwpotest_core::metrics::SCENARIOS_PASSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 생명주기 단계 레이블 키 (parse, initialize, run)
pub const LABEL_PHASE: &str = "phase";

// ─── 시나리오 메트릭 ────────────────────────────────────────────────

/// 실행을 시작한 시나리오 수 (counter)
pub const SCENARIOS_STARTED_TOTAL: &str = "iwpotest_scenarios_started_total";

/// 통과한 시나리오 수 (counter)
pub const SCENARIOS_PASSED_TOTAL: &str = "iwpotest_scenarios_passed_total";

/// 실패한 시나리오 수 (counter, label: phase)
pub const SCENARIOS_FAILED_TOTAL: &str = "iwpotest_scenarios_failed_total";

// ─── 스케줄러 / 자원 메트릭 ────────────────────────────────────────

/// 할당된 포트 수 (counter)
pub const PORTS_ALLOCATED_TOTAL: &str = "iwpotest_ports_allocated_total";

/// 동시에 진행 중인 시나리오 수 (gauge)
pub const SCENARIOS_IN_FLIGHT: &str = "iwpotest_scenarios_in_flight";

/// 시간 초과로 종료된 자식 프로세스 수 (counter)
pub const PROCESS_TIMEOUTS_TOTAL: &str = "iwpotest_process_timeouts_total";
