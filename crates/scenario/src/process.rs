//! 제한 시간이 있는 자식 프로세스 실행
//!
//! 테스트 대상 프로그램과 빌드 산출물은 모두 이 모듈을 통해 실행됩니다.
//! 제한 시간이 지나면 프로세스를 종료하고 `timed_out`을 표시한 결과를 반환합니다.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use iwpotest_core::metrics as m;
use iwpotest_core::protocol::HandshakeMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{RuntimeFailure, ScenarioError};

/// 프로세스 종료 후 출력 파이프를 비우는 데 허용하는 시간
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// 자식 프로세스 실행 결과
#[derive(Debug, Default)]
pub struct ProcessOutput {
    /// 종료 상태 (시간 초과로 종료된 경우 `None`일 수 있음)
    pub status: Option<ExitStatus>,
    /// 표준 출력
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
    /// 시간 초과 여부
    pub timed_out: bool,
}

impl ProcessOutput {
    /// 제한 시간 안에 종료 코드 0으로 끝났는지 여부
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// 진단 로그에 남길 줄들 (`<role> stdout: ...` 형식)
    pub fn log_lines(&self, role: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for line in self.stdout.lines().filter(|l| !l.trim().is_empty()) {
            lines.push(format!("{role} stdout: {line}"));
        }
        for line in self.stderr.lines().filter(|l| !l.trim().is_empty()) {
            lines.push(format!("{role} stderr: {line}"));
        }
        lines
    }
}

/// 실행기 접두사(`launcher`)를 적용해 명령을 구성합니다.
///
/// `launcher`가 비어 있으면 `program`을 직접 실행합니다.
pub fn build_command(launcher: &[String], program: &Path, args: &[String], cwd: &Path) -> Command {
    let mut command = match launcher.split_first() {
        Some((head, rest)) => {
            let mut c = Command::new(head);
            c.args(rest).arg(program);
            c
        }
        None => Command::new(program),
    };
    command.args(args).current_dir(cwd);
    command
}

/// 명령을 실행하고 종료 또는 시간 초과까지 기다립니다.
///
/// `input`이 주어지면 한 줄 JSON으로 stdin에 쓴 뒤 stdin을 닫습니다.
/// 쓰기도 `timeout` 안에 포함되므로 stdin을 읽지 않는 프로세스도 기한에 종료됩니다.
/// 시간 초과 시 프로세스를 종료하고 `timed_out = true`로 반환합니다.
pub async fn run_with_timeout(
    mut command: Command,
    role: &str,
    input: Option<&HandshakeMessage>,
    timeout: Duration,
) -> Result<ProcessOutput, ScenarioError> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let line = input.map(HandshakeMessage::encode_line).transpose()?;
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = command.spawn().map_err(|e| RuntimeFailure::Spawn {
        program: program.clone(),
        reason: e.to_string(),
    })?;
    debug!(
        role,
        program = %program,
        pid = ?child.id(),
        handshake = input.map(HandshakeMessage::name),
        "process spawned"
    );

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let mut stdin = child.stdin.take();

    // stdin 쓰기와 종료 대기가 같은 기한을 공유
    let deadline = Instant::now() + timeout;
    let finished = tokio::time::timeout_at(deadline, async {
        if let (Some(line), Some(mut pipe)) = (line.as_deref(), stdin.take()) {
            if let Err(e) = pipe.write_all(line.as_bytes()).await {
                warn!(role, error = %e, "failed to write handshake message");
            }
            // pipe drop으로 EOF 전달
        }
        child.wait().await
    })
    .await;

    let mut output = ProcessOutput::default();
    match finished {
        Ok(Ok(status)) => output.status = Some(status),
        Ok(Err(e)) => return Err(ScenarioError::io(&program, e)),
        Err(_) => {
            warn!(role, timeout_secs = timeout.as_secs_f64(), "process timed out, killing");
            metrics::counter!(m::PROCESS_TIMEOUTS_TOTAL).increment(1);
            if let Err(e) = child.kill().await {
                warn!(role, error = %e, "failed to kill timed out process");
            }
            output.timed_out = true;
            output.status = child.try_wait().ok().flatten();
        }
    }

    output.stdout = collect(stdout).await;
    output.stderr = collect(stderr).await;
    debug!(role, status = ?output.status, timed_out = output.timed_out, "process finished");
    Ok(output)
}

/// 파이프를 끝까지 읽는 태스크를 띄웁니다.
pub(crate) fn drain<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!(error = %e, "pipe read failed");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// 읽기 태스크 결과를 기다립니다. 유예 시간이 지나면 빈 문자열을 반환합니다.
pub(crate) async fn collect(handle: Option<JoinHandle<String>>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "pipe reader task failed");
            String::new()
        }
        Err(_) => {
            warn!("pipe still open after process exit, output discarded");
            String::new()
        }
    }
}
