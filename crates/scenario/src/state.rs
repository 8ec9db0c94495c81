//! 시나리오 생명주기 상태

use std::fmt;

use serde::{Deserialize, Serialize};

/// 시나리오 생명주기 상태
///
/// 상태 전환:
/// - `Unread` → `parse()` → `Parsed`
/// - `Parsed` → `initialize()` → `Initialized`
/// - `Initialized` → `run()` → `Passed` | `Failed`
/// - 어느 단계에서든 에러 발생 시 → `Failed`
///
/// `Passed`와 `Failed`는 종료 상태이며 이후 전환은 허용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    /// 생성됨 (파일을 아직 읽지 않음)
    Unread,
    /// 파싱 완료
    Parsed,
    /// 작업 디렉토리 준비 완료 (실행 가능)
    Initialized,
    /// 통과
    Passed,
    /// 실패
    Failed,
}

impl ScenarioState {
    /// 종료 상태 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }

    /// 아직 다음 생명주기 단계로 진행할 수 있는지 여부 (종료 상태가 아님)
    pub fn can_execute(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unread => write!(f, "unread"),
            Self::Parsed => write!(f, "parsed"),
            Self::Initialized => write!(f, "initialized"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ScenarioState::Passed.is_terminal());
        assert!(ScenarioState::Failed.is_terminal());
        assert!(!ScenarioState::Unread.is_terminal());
        assert!(!ScenarioState::Parsed.is_terminal());
        assert!(!ScenarioState::Initialized.is_terminal());
    }

    #[test]
    fn non_terminal_states_can_execute() {
        assert!(ScenarioState::Unread.can_execute());
        assert!(ScenarioState::Parsed.can_execute());
        assert!(ScenarioState::Initialized.can_execute());
        assert!(!ScenarioState::Passed.can_execute());
        assert!(!ScenarioState::Failed.can_execute());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ScenarioState::Initialized.to_string(), "initialized");
        assert_eq!(
            serde_json::to_string(&ScenarioState::Passed).unwrap(),
            "\"passed\""
        );
    }
}
