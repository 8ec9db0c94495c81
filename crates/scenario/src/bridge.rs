//! 컴패니언 프로세스 브리지
//!
//! 컴패니언은 네트워크 상대를 흉내 내는 자식 프로세스입니다.
//! 작업 디렉토리에서 새 포트 세 개를 환경변수로 받아 시작되고,
//! stdin/stdout의 줄 단위 JSON으로 하네스와 통신합니다.
//!
//! # 판정
//! 다음을 모두 만족해야 깨끗한 판정입니다.
//! - 판정 메시지([`CompanionReport`])를 하나 이상 받음
//! - 모든 판정이 `failed: false`, `passed: true`
//! - 종료 코드 0, 시간 초과 없음
//! - stderr 출력 없음
//!
//! 실패 사유는 처음 기록된 것만 유지됩니다.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use iwpotest_core::error::ProtocolError;
use iwpotest_core::metrics as m;
use iwpotest_core::protocol::{CompanionReport, HandshakeMessage};
use iwpotest_core::types::PortSet;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{RuntimeFailure, ScenarioError};
use crate::process::{collect, drain};

/// 컴패니언 프로세스 역할 이름
const ROLE: &str = "companion";

/// 컴패니언 출력 파이프를 비우는 데 허용하는 시간
const READER_GRACE: Duration = Duration::from_secs(2);

/// 컴패니언이 보낸 메시지로부터 누적되는 판정
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanionJudgement {
    results: usize,
    log: Vec<String>,
    failure: Option<String>,
}

impl CompanionJudgement {
    /// 빈 판정을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 컴패니언 stdout의 한 줄을 반영합니다.
    pub fn observe(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match CompanionReport::decode(line) {
            Ok(report) => {
                self.results += 1;
                if report.failed {
                    let reason = report
                        .log
                        .last()
                        .cloned()
                        .unwrap_or_else(|| "companion reported failure".to_owned());
                    self.fail(reason);
                }
                if !report.passed {
                    self.fail(ProtocolError::NoPassSignal.to_string());
                }
                self.log.extend(report.log);
            }
            Err(e) => {
                debug!(error = ?e, line, "rejected companion message");
                self.fail(e.to_string());
            }
        }
    }

    /// 실패 사유를 기록합니다. 이미 기록된 사유가 있으면 무시합니다.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(reason.into());
        }
    }

    /// 받은 판정 메시지 수
    pub fn results(&self) -> usize {
        self.results
    }

    /// 판정 메시지의 로그 줄
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// 처음 기록된 실패 사유
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// 프로세스 종료 정보까지 반영해 최종 판정을 내립니다.
    pub fn conclude(
        &self,
        status: Option<ExitStatus>,
        timed_out: bool,
        budget: Duration,
        stderr: &str,
    ) -> Result<(), RuntimeFailure> {
        if let Some(reason) = &self.failure {
            return Err(RuntimeFailure::Companion {
                reason: reason.clone(),
            });
        }
        if timed_out {
            return Err(RuntimeFailure::Timeout {
                process: ROLE.to_owned(),
                secs: budget.as_secs_f64(),
            });
        }
        if self.results == 0 {
            return Err(RuntimeFailure::Companion {
                reason: ProtocolError::NoPassSignal.to_string(),
            });
        }
        match status {
            Some(s) if s.success() => {}
            Some(s) => {
                return Err(RuntimeFailure::Companion {
                    reason: format!("exited with {s}"),
                });
            }
            None => {
                return Err(RuntimeFailure::Companion {
                    reason: "exit status unknown".to_owned(),
                });
            }
        }
        if !stderr.trim().is_empty() {
            return Err(RuntimeFailure::Companion {
                reason: stderr.trim().to_owned(),
            });
        }
        Ok(())
    }
}

/// 컴패니언 종료 후 수집된 결과
#[derive(Debug)]
pub struct CompanionOutcome {
    /// 컴패니언이 보낸 로그 줄
    pub log: Vec<String>,
    /// stderr 출력
    pub stderr: String,
    /// 최종 판정
    pub verdict: Result<(), RuntimeFailure>,
}

/// 실행 중인 컴패니언 프로세스
pub struct CompanionBridge {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: JoinHandle<CompanionJudgement>,
    stderr: Option<JoinHandle<String>>,
    deadline: Instant,
    budget: Duration,
}

impl std::fmt::Debug for CompanionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionBridge")
            .field("pid", &self.child.id())
            .field("budget", &self.budget)
            .finish()
    }
}

impl CompanionBridge {
    /// 컴패니언을 시작하고 `config` 메시지를 보냅니다.
    ///
    /// `budget`은 시작 시점부터 종료까지 허용되는 전체 시간입니다.
    /// `config` 전송도 이 기한 안에 끝나야 하며, 넘기면 컴패니언을 종료하고
    /// [`RuntimeFailure::Timeout`]을 반환합니다.
    pub async fn start(
        command: &[String],
        work_dir: &Path,
        ports: PortSet,
        config: &HandshakeMessage,
        budget: Duration,
    ) -> Result<Self, ScenarioError> {
        let Some((program, args)) = command.split_first() else {
            return Err(RuntimeFailure::Spawn {
                program: String::new(),
                reason: "empty companion command".to_owned(),
            }
            .into());
        };

        let mut child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .env("PORT_HTTP", ports.http.to_string())
            .env("PORT_SOCKETS", ports.tcp.to_string())
            .env("PORT_SOCKETS_UDP", ports.udp.to_string())
            .env("SERVER_TEST_SUITE", "enable")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeFailure::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        debug!(
            pid = ?child.id(),
            http = ports.http,
            tcp = ports.tcp,
            udp = ports.udp,
            "companion started"
        );

        let stdout = child.stdout.take();
        let reader = tokio::spawn(async move {
            let mut judgement = CompanionJudgement::new();
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => judgement.observe(&line),
                        Ok(None) => break,
                        Err(e) => {
                            judgement.fail(format!("failed to read companion output: {e}"));
                            break;
                        }
                    }
                }
            }
            judgement
        });
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + budget;
        let mut stdin = child.stdin.take();
        if let Some(pipe) = stdin.as_mut() {
            let line = config.encode_line()?;
            let sent = tokio::time::timeout_at(deadline, async {
                pipe.write_all(line.as_bytes()).await?;
                pipe.flush().await
            })
            .await;
            let failure = match sent {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(RuntimeFailure::Companion {
                    reason: format!("failed to send config: {e}"),
                }),
                Err(_) => {
                    warn!(
                        budget_secs = budget.as_secs_f64(),
                        "companion did not accept config, killing"
                    );
                    metrics::counter!(m::PROCESS_TIMEOUTS_TOTAL).increment(1);
                    Some(RuntimeFailure::Timeout {
                        process: ROLE.to_owned(),
                        secs: budget.as_secs_f64(),
                    })
                }
            };
            if let Some(failure) = failure {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "companion already exited");
                }
                reader.abort();
                return Err(failure.into());
            }
        }

        Ok(Self {
            child,
            stdin,
            reader,
            stderr,
            deadline,
            budget,
        })
    }

    /// `get_result_and_close`를 보내고 남은 시간 안에 종료를 기다립니다.
    ///
    /// 시간이 지나면 프로세스를 종료합니다.
    pub async fn stop(mut self) -> CompanionOutcome {
        if let Some(mut stdin) = self.stdin.take() {
            match HandshakeMessage::GetResultAndClose.encode_line() {
                Ok(line) => {
                    match tokio::time::timeout_at(self.deadline, stdin.write_all(line.as_bytes()))
                        .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "companion stdin already closed"),
                        Err(_) => debug!("companion stopped reading stdin"),
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode close request"),
            }
        }

        let mut timed_out = false;
        let status = match tokio::time::timeout_at(self.deadline, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(error = %e, "failed to wait for companion");
                None
            }
            Err(_) => {
                warn!(budget_secs = self.budget.as_secs_f64(), "companion timed out, killing");
                metrics::counter!(m::PROCESS_TIMEOUTS_TOTAL).increment(1);
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill companion");
                }
                timed_out = true;
                None
            }
        };

        let judgement = match tokio::time::timeout(READER_GRACE, &mut self.reader).await {
            Ok(Ok(judgement)) => judgement,
            Ok(Err(e)) => {
                let mut j = CompanionJudgement::new();
                j.fail(format!("companion reader task failed: {e}"));
                j
            }
            Err(_) => {
                self.reader.abort();
                let mut j = CompanionJudgement::new();
                j.fail("companion output was not closed");
                j
            }
        };
        let stderr = collect(self.stderr.take()).await;

        let verdict = judgement.conclude(status, timed_out, self.budget, &stderr);
        debug!(status = ?status, ok = verdict.is_ok(), "companion stopped");
        CompanionOutcome {
            log: judgement.log,
            stderr,
            verdict,
        }
    }

    /// 컴패니언을 즉시 종료합니다.
    pub async fn kill(mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "companion already exited");
        }
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit_ok() -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(0)
    }

    #[cfg(unix)]
    fn exit_code(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    const PASS: &str = r#"{"name":"result","log":["connected"],"passed":true,"failed":false}"#;

    #[test]
    fn passing_result_is_recorded() {
        let mut j = CompanionJudgement::new();
        j.observe(PASS);
        j.observe("");
        assert_eq!(j.results(), 1);
        assert_eq!(j.failure(), None);
        assert_eq!(j.log(), ["connected"]);
    }

    #[test]
    fn failed_result_uses_last_log_line() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"result","log":["a","player desynced"],"passed":false,"failed":true}"#);
        assert_eq!(j.failure(), Some("player desynced"));
    }

    #[test]
    fn missing_pass_signal() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"result","log":[],"passed":false,"failed":false}"#);
        assert_eq!(j.failure(), Some("no pass signal received"));
    }

    #[test]
    fn first_failure_is_kept() {
        let mut j = CompanionJudgement::new();
        j.observe("not json at all");
        j.observe(r#"{"name":"result","log":["later"],"passed":false,"failed":true}"#);
        assert_eq!(j.failure(), Some("unexpected message structure"));
    }

    #[test]
    fn mistyped_result_is_structure_error() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"result","log":[1,2],"passed":true,"failed":false}"#);
        assert_eq!(j.failure(), Some("unexpected message structure"));
        assert_eq!(j.results(), 0);
    }

    #[test]
    fn untagged_report_is_accepted() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"log":["ok"],"passed":true,"failed":false}"#);
        assert_eq!(j.results(), 1);
        assert_eq!(j.failure(), None);
        assert_eq!(j.log(), ["ok"]);
    }

    #[test]
    fn report_named_after_close_request_is_accepted() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"get_result_and_close","log":["done"],"passed":true,"failed":false}"#);
        assert_eq!(j.results(), 1);
        assert_eq!(j.failure(), None);
    }

    #[test]
    fn foreign_message_name_is_rejected() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"hello","log":[],"passed":true,"failed":false}"#);
        assert_eq!(j.results(), 0);
        assert!(j.failure().unwrap_or_default().contains("hello"));
    }

    #[test]
    fn bare_close_request_is_structure_error() {
        let mut j = CompanionJudgement::new();
        j.observe(r#"{"name":"get_result_and_close"}"#);
        assert_eq!(j.failure(), Some("unexpected message structure"));
    }

    #[cfg(unix)]
    #[test]
    fn conclude_requires_clean_exit() {
        let budget = Duration::from_secs(1);
        let mut j = CompanionJudgement::new();
        assert!(matches!(
            j.conclude(Some(exit_ok()), false, budget, ""),
            Err(RuntimeFailure::Companion { .. })
        ));

        j.observe(PASS);
        assert!(j.conclude(Some(exit_ok()), false, budget, "").is_ok());
        assert!(j.conclude(Some(exit_code(1)), false, budget, "").is_err());
        assert!(j.conclude(Some(exit_ok()), false, budget, "warning\n").is_err());
        assert!(matches!(
            j.conclude(None, true, budget, ""),
            Err(RuntimeFailure::Timeout { .. })
        ));
    }

    #[cfg(unix)]
    fn sh_companion(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_owned(), "-c".to_owned(), script.to_owned()]
    }

    #[cfg(unix)]
    fn config_message() -> HandshakeMessage {
        HandshakeMessage::Config {
            config: Default::default(),
            server_packages: vec![],
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn companion_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        // config 한 줄을 받으면 포트를 파일로 남기고, 종료 요청에 결과로 답합니다
        let script = format!(
            "read cfg; echo \"$PORT_SOCKETS $SERVER_TEST_SUITE\" > ports.txt; read close; echo '{PASS}'"
        );
        let ports = PortSet {
            http: 9100,
            tcp: 9101,
            udp: 9102,
        };
        let bridge = CompanionBridge::start(
            &sh_companion(&script),
            dir.path(),
            ports,
            &config_message(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        let outcome = bridge.stop().await;
        assert!(outcome.verdict.is_ok(), "{:?}", outcome.verdict);
        assert_eq!(outcome.log, vec!["connected"]);
        let written = std::fs::read_to_string(dir.path().join("ports.txt")).unwrap();
        assert_eq!(written.trim(), "9101 enable");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_companion_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = CompanionBridge::start(
            &sh_companion("cat > /dev/null"),
            dir.path(),
            PortSet {
                http: 1,
                tcp: 2,
                udp: 3,
            },
            &config_message(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        let outcome = bridge.stop().await;
        let err = outcome.verdict.unwrap_err();
        assert_eq!(err.to_string(), "companion failed: no pass signal received");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_companion_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = CompanionBridge::start(
            &sh_companion("exec sleep 30"),
            dir.path(),
            PortSet {
                http: 1,
                tcp: 2,
                udp: 3,
            },
            &config_message(),
            Duration::from_millis(300),
        )
        .await
        .unwrap();

        let outcome = bridge.stop().await;
        assert!(matches!(
            outcome.verdict,
            Err(RuntimeFailure::Timeout { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stalled_config_write_is_bounded_by_budget() {
        let dir = tempfile::tempdir().unwrap();
        let config = HandshakeMessage::Config {
            config: Default::default(),
            server_packages: vec![iwpotest_core::protocol::PacketPayload {
                name: "blob".to_owned(),
                kind: "tcp".to_owned(),
                data: "A".repeat(300 * 1024),
            }],
        };

        // Given: A companion that never reads stdin
        let started = std::time::Instant::now();
        let err = CompanionBridge::start(
            &sh_companion("exec sleep 30"),
            dir.path(),
            PortSet {
                http: 1,
                tcp: 2,
                udp: 3,
            },
            &config,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();

        // Then: Start gives up at the budget instead of blocking on the pipe
        assert!(matches!(
            err,
            ScenarioError::Runtime(RuntimeFailure::Timeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
