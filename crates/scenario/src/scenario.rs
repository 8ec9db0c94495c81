//! 시나리오 생명주기
//!
//! [`Scenario`]는 시나리오 파일 하나를 읽고, 격리된 작업 디렉토리를 만들고,
//! 테스트 대상 프로그램과 컴패니언을 실행해 통과/실패를 판정합니다.
//!
//! # 생명주기
//! ```text
//! Unread ─parse()─▶ Parsed ─initialize()─▶ Initialized ─run()─▶ Passed | Failed
//!                                                       clean(): 어느 상태에서나
//! ```
//!
//! 각 단계는 에러를 반환하지 않고 결과 상태를 반환합니다.
//! 단계 안에서 발생한 에러는 진단 로그에 기록되고 `Failed`로 전환됩니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use iwpotest_core::config::{HarnessConfig, RESOURCE_DIR_NAME};
use iwpotest_core::metrics as m;
use iwpotest_core::ports::PortAllocator;
use iwpotest_core::protocol::{HandshakeMessage, PacketPayload, RunConfig};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::CompanionBridge;
use crate::definition::ScenarioDefinition;
use crate::error::{RuntimeFailure, ScenarioError};
use crate::fsutil;
use crate::packet::PacketSpec;
use crate::process::{ProcessOutput, build_command, run_with_timeout};
use crate::state::ScenarioState;

/// 게임이 런타임 에러를 기록하는 파일
pub const ERROR_LOG_FILE: &str = "game_errors.log";

/// 게임이 테스트 결과를 기록하는 파일
pub const RESULT_FILE: &str = "test_result.txt";

/// 결과 파일의 성공 토큰
pub const PASS_TOKEN: &str = "PASSED";

/// 산출물 제한 시간 이후 컴패니언 종료까지 추가로 허용하는 시간
const COMPANION_GRACE: Duration = Duration::from_secs(5);

/// 시나리오 하나
#[derive(Debug)]
pub struct Scenario {
    harness: Arc<HarnessConfig>,
    path: PathBuf,
    name: String,
    state: ScenarioState,
    definition: Option<ScenarioDefinition>,
    log: Vec<String>,
    message: Option<String>,
    work_dir: Option<PathBuf>,
    modifications: Vec<String>,
    companion: Option<CompanionBridge>,
}

impl Scenario {
    /// 아직 읽지 않은 시나리오를 생성합니다.
    pub fn new(harness: Arc<HarnessConfig>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        // 확장자를 뺀 파일 이름 (`jump.iwpotest` → `jump`), 로그 파일은 `<name>.txt`
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            harness,
            path,
            name,
            state: ScenarioState::Unread,
            definition: None,
            log: Vec::new(),
            message: None,
            work_dir: None,
            modifications: Vec::new(),
            companion: None,
        }
    }

    /// 시나리오 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 시나리오 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 상태
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// 통과 여부
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Passed
    }

    /// 스케줄러가 실행해도 되는지 여부
    pub fn can_execute(&self) -> bool {
        self.state.can_execute()
    }

    /// 첫 실패 메시지
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// 진단 로그
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// 파싱 결과
    pub fn definition(&self) -> Option<&ScenarioDefinition> {
        self.definition.as_ref()
    }

    /// 작업 디렉토리 (`initialize` 이후)
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// 이벤트 주입으로 수정된 파일 (데이터 디렉토리 기준)
    pub fn modifications(&self) -> &[String] {
        &self.modifications
    }

    /// 시나리오 파일을 읽고 파싱합니다. `Unread` 상태에서만 유효합니다.
    pub async fn parse(&mut self) -> ScenarioState {
        if !self.guard(ScenarioState::Unread) {
            return self.state;
        }
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => self.apply_source(&content),
            Err(e) => {
                let err = ScenarioError::io(&self.path, e);
                self.fail(err);
                self.state
            }
        }
    }

    /// 이미 읽어 둔 내용을 파싱합니다. `Unread` 상태에서만 유효합니다.
    pub fn parse_source(&mut self, content: &str) -> ScenarioState {
        if !self.guard(ScenarioState::Unread) {
            return self.state;
        }
        self.apply_source(content)
    }

    fn apply_source(&mut self, content: &str) -> ScenarioState {
        let resources = self.harness.resources_dir();
        let result = ScenarioDefinition::parse(content, &self.path, &resources).map(|def| {
            self.name = def.config.name.clone();
            self.note(format!(
                "parsed: {} event(s), {} server package(s), engine {}",
                def.events.len(),
                def.packets.len(),
                def.config.engine
            ));
            self.definition = Some(def);
            ScenarioState::Parsed
        });
        self.settle(result)
    }

    /// 작업 디렉토리를 만들고 리소스를 복사한 뒤 이벤트와 패킷을 기록합니다.
    /// `Parsed` 상태에서만 유효합니다.
    pub async fn initialize(&mut self) -> ScenarioState {
        if !self.guard(ScenarioState::Parsed) {
            return self.state;
        }
        metrics::counter!(m::SCENARIOS_STARTED_TOTAL).increment(1);

        let work_dir = self
            .harness
            .paths
            .temp_dir
            .join(Uuid::new_v4().to_string());
        self.work_dir = Some(work_dir.clone());

        let result = match &self.definition {
            Some(def) => materialize(&self.harness, def, &work_dir, &mut self.log).await,
            None => Err(ScenarioError::Task("scenario has no parsed definition".to_owned())),
        };
        let result = result.map(|modifications| {
            self.modifications = modifications;
            ScenarioState::Initialized
        });
        self.settle(result)
    }

    /// 테스트 대상 프로그램과 산출물을 실행하고 판정합니다.
    /// `Initialized` 상태에서만 유효합니다.
    pub async fn run(&mut self, ports: &PortAllocator) -> ScenarioState {
        if !self.guard(ScenarioState::Initialized) {
            return self.state;
        }
        let result = self.execute(ports).await;
        let state = self.settle(result);
        if state == ScenarioState::Passed {
            metrics::counter!(m::SCENARIOS_PASSED_TOTAL).increment(1);
            info!(scenario = %self.name, "scenario passed");
        }
        state
    }

    /// 남은 컴패니언을 종료하고 작업 디렉토리를 정리합니다.
    ///
    /// 어느 상태에서나 호출할 수 있고 상태를 바꾸지 않습니다.
    /// 삭제 실패는 로그로만 남깁니다.
    pub async fn clean(&mut self) -> ScenarioState {
        if let Some(bridge) = self.companion.take() {
            bridge.kill().await;
            self.note("companion killed during cleanup");
        }

        if let Some(dir) = self.work_dir.clone() {
            if self.harness.run.keep {
                self.note(format!("keeping work directory '{}'", dir.display()));
            } else if let Err(e) = fsutil::remove_work_dir(&dir).await {
                warn!(scenario = %self.name, error = %e, "cleanup failed");
                self.log.push(format!("cleanup failed: {e}"));
            }
        }
        self.state
    }

    async fn execute(&mut self, ports: &PortAllocator) -> Result<ScenarioState, ScenarioError> {
        let (config, scripts, packets) = match &self.definition {
            Some(def) => (
                def.config.clone(),
                def.events.scripts(),
                def.packets
                    .iter()
                    .map(PacketSpec::to_payload)
                    .collect::<Vec<PacketPayload>>(),
            ),
            None => return Err(ScenarioError::Task("scenario has no parsed definition".to_owned())),
        };
        let Some(work_dir) = self.work_dir.clone() else {
            return Err(ScenarioError::Task("scenario has no work directory".to_owned()));
        };
        let harness = Arc::clone(&self.harness);

        let port_set = ports.next_set()?;
        self.note(format!(
            "ports: http {}, tcp {}, udp {}",
            port_set.http, port_set.tcp, port_set.udp
        ));

        if !config.skip_execute {
            let run = HandshakeMessage::Run {
                config: RunConfig {
                    scenario: config.name.clone(),
                    game: config.game.clone(),
                    output: config.output.clone(),
                    args: config.args.clone(),
                    is_gms: config.engine.is_gms(),
                    server: harness.run.server_host.clone(),
                    tcp_port: port_set.tcp,
                    udp_port: port_set.udp,
                },
                scripts,
                modifications: self.modifications.clone(),
            };
            let command = build_command(
                &harness.run.launcher,
                &work_dir.join(&harness.paths.program),
                &[],
                &work_dir,
            );
            let output = run_with_timeout(command, "program", Some(&run), config.iwpo_timeout).await?;
            self.record("program", &output);
        }

        let artifact = work_dir.join(&config.output);
        if !artifact.exists() {
            return Err(RuntimeFailure::OutputMissing {
                path: artifact.display().to_string(),
            }
            .into());
        }
        if config.skip_execute {
            self.note("execution skipped");
            return Ok(ScenarioState::Passed);
        }

        let session = HandshakeMessage::Config {
            config: harness.session(),
            server_packages: packets,
        };
        let bridge = CompanionBridge::start(
            &harness.paths.companion,
            &work_dir,
            port_set,
            &session,
            config.timeout + COMPANION_GRACE,
        )
        .await?;
        self.companion = Some(bridge);

        let command = build_command(&harness.run.launcher, &artifact, &config.args, &work_dir);
        let output = run_with_timeout(command, "artifact", None, config.timeout).await?;
        self.record("artifact", &output);

        let companion = match self.companion.take() {
            Some(bridge) => bridge.stop().await,
            None => return Err(ScenarioError::Task("companion vanished".to_owned())),
        };
        for line in &companion.log {
            self.note(format!("companion: {line}"));
        }
        for line in companion.stderr.lines().filter(|l| !l.trim().is_empty()) {
            self.note(format!("companion stderr: {line}"));
        }

        judge_files(&work_dir, config.expected_error.as_deref()).await?;
        companion.verdict?;
        Ok(ScenarioState::Passed)
    }

    fn record(&mut self, role: &str, output: &ProcessOutput) {
        for line in output.log_lines(role) {
            self.log.push(line);
        }
        if output.timed_out {
            self.note(format!("{role} timed out and was killed"));
        } else if let Some(status) = output.status {
            self.note(format!("{role} exited with {status}"));
        }
    }

    fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(scenario = %self.name, "{message}");
        self.log.push(message);
    }

    /// 현재 상태가 `expected`인지 확인합니다.
    ///
    /// 종료 상태에서의 위반은 기록만 하고 상태를 유지합니다.
    fn guard(&mut self, expected: ScenarioState) -> bool {
        if self.state == expected {
            return true;
        }
        let err = ScenarioError::InvalidState {
            current: self.state,
            expected,
        };
        if self.state.is_terminal() {
            warn!(scenario = %self.name, error = %err, "lifecycle call on finished scenario");
            self.log.push(err.to_string());
        } else {
            self.fail(err);
        }
        false
    }

    fn settle(&mut self, result: Result<ScenarioState, ScenarioError>) -> ScenarioState {
        match result {
            Ok(state) => {
                debug!(scenario = %self.name, from = %self.state, to = %state, "state changed");
                self.state = state;
            }
            Err(err) => self.fail(err),
        }
        self.state
    }

    fn fail(&mut self, err: ScenarioError) {
        let message = err.to_string();
        warn!(scenario = %self.name, error = %message, "scenario failed");
        self.log.push(message.clone());
        if self.message.is_none() {
            self.message = Some(message);
        }
        if !self.state.is_terminal() {
            metrics::counter!(m::SCENARIOS_FAILED_TOTAL).increment(1);
        }
        self.state = ScenarioState::Failed;
    }
}

/// 작업 디렉토리를 구성합니다. 수정된 리소스 목록을 반환합니다.
async fn materialize(
    harness: &HarnessConfig,
    def: &ScenarioDefinition,
    work_dir: &Path,
    log: &mut Vec<String>,
) -> Result<Vec<String>, ScenarioError> {
    let engine = def.config.engine;

    let copied =
        fsutil::copy_tree_blocking(def.config.folder.clone(), work_dir.to_path_buf(), None).await?;
    log.push(format!(
        "copied {copied} file(s) from '{}' to '{}'",
        def.config.folder.display(),
        work_dir.display()
    ));

    let program = harness.program_path();
    let program_target = work_dir.join(&harness.paths.program);
    tokio::fs::copy(&program, &program_target)
        .await
        .map_err(|e| ScenarioError::io(&program, e))?;

    let data_dir = work_dir.join(RESOURCE_DIR_NAME);
    let copied =
        fsutil::copy_tree_blocking(harness.resources_dir(), data_dir.clone(), Some(engine)).await?;
    log.push(format!("copied program and {copied} resource file(s)"));

    let modifications = def.events.render(engine, &data_dir).await?;
    for file in &modifications {
        log.push(format!("modified {file}"));
    }

    for packet in &def.packets {
        packet.persist(work_dir).await?;
        log.push(format!("saved server package '{}'", packet.file_name()));
    }

    Ok(modifications)
}

/// 작업 디렉토리에 남은 파일로 판정합니다.
///
/// 1. `game_errors.log`가 있으면 기대 에러와 같아야 하고, 기대가 없으면 비어 있어야 합니다.
/// 2. 기대 에러가 있는데 로그가 없으면 실패입니다.
/// 3. `test_result.txt`는 정확히 `PASSED`여야 합니다 (끝 줄바꿈 허용).
pub async fn judge_files(work_dir: &Path, expected: Option<&[String]>) -> Result<(), ScenarioError> {
    let error_log = work_dir.join(ERROR_LOG_FILE);
    match read_optional(&error_log).await? {
        Some(content) => match expected {
            Some(expected) => {
                let actual = significant_lines(content.lines());
                let expected = significant_lines(expected.iter().map(String::as_str));
                if actual != expected {
                    return Err(RuntimeFailure::ErrorLogMismatch { expected, actual }.into());
                }
            }
            None if !content.trim().is_empty() => {
                return Err(RuntimeFailure::UnexpectedGameError {
                    content: content.trim().to_owned(),
                }
                .into());
            }
            None => {}
        },
        None => {
            if let Some(expected) = expected {
                return Err(RuntimeFailure::ErrorLogMissing {
                    expected: expected.to_vec(),
                }
                .into());
            }
        }
    }

    let result_file = work_dir.join(RESULT_FILE);
    let Some(content) = read_optional(&result_file).await? else {
        return Err(RuntimeFailure::ResultMissing {
            path: result_file.display().to_string(),
        }
        .into());
    };
    let token = content
        .strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(&content);
    if token != PASS_TOKEN {
        return Err(RuntimeFailure::ResultMismatch { content }.into());
    }
    Ok(())
}

fn significant_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

async fn read_optional(path: &Path) -> Result<Option<String>, ScenarioError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ScenarioError::io(path, e)),
    }
}
