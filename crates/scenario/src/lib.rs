//! iwpotest 시나리오 엔진
//!
//! 시나리오 파일을 파싱하고, 격리된 작업 디렉토리를 구성하고,
//! 테스트 대상 프로그램과 컴패니언 프로세스를 실행해 판정합니다.
//!
//! # 모듈 구성
//!
//! - [`packet`]: 서버 패킷 DSL 컴파일러
//! - [`event`]: 확장 지점 조각 주입기
//! - [`definition`]: `*.iwpotest` 파일 파서
//! - [`fsutil`]: 재귀 복사와 작업 디렉토리 정리
//! - [`process`]: 제한 시간이 있는 자식 프로세스 실행
//! - [`bridge`]: 컴패니언 프로세스 핸드셰이크
//! - [`scenario`]: 생명주기 상태 머신
//!
//! # 사용 예시
//! ```ignore
//! let harness = Arc::new(HarnessConfig::load("iwpotest.toml").await?);
//! let ports = PortAllocator::new(harness.run.port_base);
//!
//! let mut scenario = Scenario::new(Arc::clone(&harness), "tests/jump.iwpotest");
//! scenario.parse().await;
//! if scenario.can_execute() {
//!     scenario.initialize().await;
//! }
//! if scenario.can_execute() {
//!     scenario.run(&ports).await;
//! }
//! scenario.clean().await;
//! println!("{}: {}", scenario.name(), scenario.state());
//! ```

pub mod bridge;
pub mod definition;
pub mod error;
pub mod event;
pub mod fsutil;
pub mod packet;
pub mod process;
pub mod scenario;
pub mod state;

// --- 주요 타입 re-export ---

// 에러
pub use error::{PacketError, ParseError, RuntimeFailure, ScenarioError};

// 정의
pub use definition::{ScenarioConfig, ScenarioDefinition};
pub use event::{Event, EventInjector, InjectionContext, Occurrence};
pub use packet::{PacketSpec, Transport};

// 실행
pub use bridge::{CompanionBridge, CompanionJudgement, CompanionOutcome};
pub use process::ProcessOutput;

// 생명주기
pub use scenario::Scenario;
pub use state::ScenarioState;
