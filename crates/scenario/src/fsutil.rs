//! 작업 디렉토리 구성용 파일시스템 유틸리티
//!
//! 재귀 복사는 블로킹 I/O이므로 `spawn_blocking`에서 실행됩니다.

use std::path::{Path, PathBuf};

use iwpotest_core::types::EngineVariant;
use tracing::debug;

use crate::error::ScenarioError;

/// 엔진과 무관하게 항상 건너뛰는 리소스
const ALWAYS_SKIPPED: &[&str] = &["mac", "tmp"];

/// GMS 전용 리소스 (GM8 게임에서는 복사하지 않음)
const GMS_ONLY: &[&str] = &["converterGMS.exe", "GMS", "http_dll_2_3_x64.dll"];

/// GM8 전용 리소스 (GMS 게임에서는 복사하지 않음)
const GM8_ONLY: &[&str] = &["gml"];

/// 리소스 데이터 디렉토리 복사 시 해당 항목을 건너뛸지 여부
pub fn skips_resource(engine: EngineVariant, name: &str) -> bool {
    if ALWAYS_SKIPPED.contains(&name) {
        return true;
    }
    match engine {
        EngineVariant::Gms => GM8_ONLY.contains(&name),
        EngineVariant::Gm8 => GMS_ONLY.contains(&name),
    }
}

/// `src`를 `dst`로 재귀 복사합니다. 복사한 파일 수를 반환합니다.
///
/// `skip`이 `true`를 반환하는 이름의 항목은 깊이와 관계없이 건너뜁니다.
pub fn copy_tree(
    src: &Path,
    dst: &Path,
    skip: &dyn Fn(&str) -> bool,
) -> Result<u64, ScenarioError> {
    std::fs::create_dir_all(dst).map_err(|e| ScenarioError::io(dst, e))?;

    let entries = std::fs::read_dir(src).map_err(|e| ScenarioError::io(src, e))?;
    let mut copied = 0;

    for entry in entries {
        let entry = entry.map_err(|e| ScenarioError::io(src, e))?;
        let name = entry.file_name();
        if skip(&name.to_string_lossy()) {
            debug!(path = %entry.path().display(), "skipping resource");
            continue;
        }

        let from = entry.path();
        let to = dst.join(&name);
        let file_type = entry.file_type().map_err(|e| ScenarioError::io(&from, e))?;

        if file_type.is_dir() {
            copied += copy_tree(&from, &to, skip)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| ScenarioError::io(&from, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// [`copy_tree`]를 블로킹 스레드에서 실행합니다.
///
/// `engine`이 주어지면 리소스 건너뛰기 목록을 적용합니다.
pub async fn copy_tree_blocking(
    src: PathBuf,
    dst: PathBuf,
    engine: Option<EngineVariant>,
) -> Result<u64, ScenarioError> {
    tokio::task::spawn_blocking(move || match engine {
        Some(engine) => copy_tree(&src, &dst, &|name| skips_resource(engine, name)),
        None => copy_tree(&src, &dst, &|_| false),
    })
    .await
    .map_err(|e| ScenarioError::Task(format!("spawn_blocking failed: {e}")))?
}

/// 작업 디렉토리를 삭제합니다. 이미 없으면 성공으로 간주합니다.
pub async fn remove_work_dir(dir: &Path) -> Result<(), ScenarioError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(path = %dir.display(), "work directory removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ScenarioError::io(dir, e)),
    }
}
