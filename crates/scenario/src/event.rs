//! 이벤트 주입기
//!
//! 시나리오 파일의 `$$<occurrence>_<point>` 조각을 확장 지점별로 모아 두었다가
//! 작업 디렉토리의 리소스 파일에 주입합니다.
//!
//! # 발생 시점
//! - `pre`: 기존 리소스 파일 앞에 삽입
//! - `post`: 기존 리소스 파일 뒤에 추가
//! - `script` (`test`): 테스트 전용 경로에 별도 파일로 생성
//!
//! # 리소스 경로 (데이터 디렉토리 기준)
//! | 엔진 | pre/post | script |
//! |------|----------|--------|
//! | GM8 | `gml/<point>.gml` | `gml/test/<point>.gml` |
//! | GMS | `lib/GMS/<point>.gml` | `lib/GMS/test/<point>.gml` |

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use iwpotest_core::types::EngineVariant;
use tracing::debug;

use crate::error::{ParseError, ScenarioError};

/// pre 조각과 원본 내용 사이의 구분자
///
/// `/**/`는 열린 블록 주석을 닫고, 열린 주석이 없으면 빈 주석이 됩니다.
pub const PRE_DELIMITER: &str = "\r\n/**/ //// END PRE GML ////\r\n";

/// 원본 내용과 post 조각 사이의 구분자
pub const POST_DELIMITER: &str = "\r\n/**/ //// BEGIN POST GML ////\r\n";

/// 리소스 파일 없이도 항상 존재하는 것으로 간주되는 확장 지점과 기본 내용
const SYNTHETIC_POINTS: &[(&str, &str)] = &[
    ("GameBegin", "/// test hook: executed once when the game begins\r\n"),
    ("Step", "/// test hook: executed every step\r\n"),
];

/// 합성 확장 지점의 기본 내용을 조회합니다.
pub fn synthetic_default(point: &str) -> Option<&'static str> {
    SYNTHETIC_POINTS
        .iter()
        .find(|(name, _)| *name == point)
        .map(|(_, content)| *content)
}

/// 조각이 주입되는 시점
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Occurrence {
    /// 원본 앞
    Pre,
    /// 원본 뒤
    Post,
    /// 별도 테스트 스크립트
    Script,
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
            Self::Script => write!(f, "script"),
        }
    }
}

impl FromStr for Occurrence {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            "script" | "test" => Ok(Self::Script),
            other => Err(ParseError::UnknownOccurrence(other.to_owned())),
        }
    }
}

/// 엔진과 발생 시점에 따른 리소스 상대 경로 (`/` 구분)
pub fn resource_path(engine: EngineVariant, point: &str, occurrence: Occurrence) -> String {
    let base = match engine {
        EngineVariant::Gm8 => "gml",
        EngineVariant::Gms => "lib/GMS",
    };
    match occurrence {
        Occurrence::Script => format!("{base}/test/{point}.gml"),
        Occurrence::Pre | Occurrence::Post => format!("{base}/{point}.gml"),
    }
}

/// 조각 선언 시 사용하는 시나리오의 읽기 전용 정보
#[derive(Debug, Clone, Copy)]
pub struct InjectionContext<'a> {
    /// 엔진 변형
    pub engine: EngineVariant,
    /// 원본 리소스 데이터 디렉토리
    pub resource_root: &'a Path,
}

/// 하나의 확장 지점과 그 조각들
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    point: String,
    fragments: BTreeMap<Occurrence, String>,
}

impl Event {
    fn new(point: &str) -> Self {
        Self {
            point: point.to_owned(),
            fragments: BTreeMap::new(),
        }
    }

    /// 확장 지점 이름
    pub fn point(&self) -> &str {
        &self.point
    }

    /// 해당 시점의 조각
    pub fn fragment(&self, occurrence: Occurrence) -> Option<&str> {
        self.fragments.get(&occurrence).map(String::as_str)
    }

    fn wraps_resource(&self) -> bool {
        self.fragments.contains_key(&Occurrence::Pre)
            || self.fragments.contains_key(&Occurrence::Post)
    }
}

/// 확장 지점별 조각 모음
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventInjector {
    events: BTreeMap<String, Event>,
}

impl EventInjector {
    /// 빈 주입기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 조각 하나를 검증하고 저장합니다.
    ///
    /// - `pre`/`post`는 원본 리소스 파일이 있어야 합니다 (합성 지점 제외).
    /// - 같은 (지점, 시점) 쌍에 조각이 이미 있으면 [`ParseError::DuplicateFragment`].
    pub fn declare(
        &mut self,
        ctx: &InjectionContext<'_>,
        point: &str,
        occurrence: Occurrence,
        code: impl Into<String>,
    ) -> Result<(), ScenarioError> {
        if occurrence != Occurrence::Script && synthetic_default(point).is_none() {
            let path = ctx
                .resource_root
                .join(resource_path(ctx.engine, point, occurrence));
            if !path.is_file() {
                return Err(ScenarioError::Precondition {
                    path: path.display().to_string(),
                });
            }
        }

        let event = self
            .events
            .entry(point.to_owned())
            .or_insert_with(|| Event::new(point));
        if event.fragments.contains_key(&occurrence) {
            return Err(ParseError::DuplicateFragment {
                point: point.to_owned(),
                occurrence,
            }
            .into());
        }
        event.fragments.insert(occurrence, code.into());
        Ok(())
    }

    /// 선언된 이벤트 수
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 선언된 이벤트가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 이름으로 이벤트를 조회합니다.
    pub fn get(&self, point: &str) -> Option<&Event> {
        self.events.get(point)
    }

    /// 이벤트를 이름순으로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// `run` 메시지에 실리는 script 조각 (지점 → 코드)
    pub fn scripts(&self) -> BTreeMap<String, String> {
        self.events
            .values()
            .filter_map(|event| {
                event
                    .fragment(Occurrence::Script)
                    .map(|code| (event.point.clone(), code.to_owned()))
            })
            .collect()
    }

    /// 작업 디렉토리의 데이터 디렉토리에 조각을 주입합니다.
    ///
    /// 수정한 파일 목록을 데이터 디렉토리 기준 상대 경로로 반환합니다.
    /// 같은 작업 사본에 두 번 호출하면 조각이 중복 주입됩니다.
    pub async fn render(
        &self,
        engine: EngineVariant,
        data_dir: &Path,
    ) -> Result<Vec<String>, ScenarioError> {
        let mut modifications = Vec::new();

        for event in self.events.values() {
            let synthetic = synthetic_default(&event.point);

            if event.wraps_resource() {
                let rel = resource_path(engine, &event.point, Occurrence::Pre);
                let path = data_dir.join(&rel);
                let original = match tokio::fs::read_to_string(&path).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => match synthetic {
                        Some(default) => default.to_owned(),
                        None => {
                            return Err(ScenarioError::Precondition {
                                path: path.display().to_string(),
                            });
                        }
                    },
                    Err(e) => return Err(ScenarioError::io(&path, e)),
                };

                let mut content = String::new();
                if let Some(pre) = event.fragment(Occurrence::Pre) {
                    content.push_str(pre);
                    content.push_str(PRE_DELIMITER);
                }
                content.push_str(&original);
                if let Some(post) = event.fragment(Occurrence::Post) {
                    content.push_str(POST_DELIMITER);
                    content.push_str(post);
                }

                write_file(&path, &content).await?;
                debug!(point = %event.point, path = %rel, "resource wrapped");
                modifications.push(rel);
            }

            let script = event.fragment(Occurrence::Script);
            if script.is_some() || synthetic.is_some() {
                let rel = resource_path(engine, &event.point, Occurrence::Script);
                let path = data_dir.join(&rel);

                let mut content = synthetic.unwrap_or_default().to_owned();
                if let Some(code) = script {
                    if !content.is_empty() && !content.ends_with('\n') {
                        content.push_str("\r\n");
                    }
                    content.push_str(code);
                }

                write_file(&path, &content).await?;
                debug!(point = %event.point, path = %rel, "test script written");
                modifications.push(rel);
            }
        }

        Ok(modifications)
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), ScenarioError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScenarioError::io(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ScenarioError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gml")).unwrap();
        std::fs::write(dir.path().join("gml/Draw.gml"), "draw_self();").unwrap();
        dir
    }

    #[test]
    fn occurrence_accepts_test_alias() {
        assert_eq!("test".parse::<Occurrence>().unwrap(), Occurrence::Script);
        assert_eq!("script".parse::<Occurrence>().unwrap(), Occurrence::Script);
        assert!(matches!(
            "during".parse::<Occurrence>(),
            Err(ParseError::UnknownOccurrence(_))
        ));
    }

    #[test]
    fn resource_paths_per_engine() {
        assert_eq!(
            resource_path(EngineVariant::Gm8, "Step", Occurrence::Pre),
            "gml/Step.gml"
        );
        assert_eq!(
            resource_path(EngineVariant::Gm8, "Step", Occurrence::Script),
            "gml/test/Step.gml"
        );
        assert_eq!(
            resource_path(EngineVariant::Gms, "Step", Occurrence::Post),
            "lib/GMS/Step.gml"
        );
        assert_eq!(
            resource_path(EngineVariant::Gms, "Step", Occurrence::Script),
            "lib/GMS/test/Step.gml"
        );
    }

    #[test]
    fn pre_requires_existing_resource() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();

        injector
            .declare(&ctx, "Draw", Occurrence::Pre, "a = 1;")
            .unwrap();
        let err = injector
            .declare(&ctx, "Missing", Occurrence::Post, "b = 2;")
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Precondition { .. }));

        // script와 합성 지점은 파일이 없어도 됩니다
        injector
            .declare(&ctx, "Missing", Occurrence::Script, "c = 3;")
            .unwrap();
        injector.declare(&ctx, "Step", Occurrence::Pre, "d = 4;").unwrap();
    }

    #[test]
    fn duplicate_fragment_rejected() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector.declare(&ctx, "Step", Occurrence::Post, "x").unwrap();
        injector.declare(&ctx, "Step", Occurrence::Pre, "y").unwrap();

        let err = injector
            .declare(&ctx, "Step", Occurrence::Post, "z")
            .unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Parse(ParseError::DuplicateFragment {
                occurrence: Occurrence::Post,
                ..
            })
        ));
        assert_eq!(injector.get("Step").unwrap().fragment(Occurrence::Post), Some("x"));
    }

    #[test]
    fn scripts_only_contains_script_fragments() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector.declare(&ctx, "Draw", Occurrence::Pre, "p").unwrap();
        injector
            .declare(&ctx, "Check", Occurrence::Script, "s")
            .unwrap();

        let scripts = injector.scripts();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts["Check"], "s");
    }

    #[tokio::test]
    async fn render_wraps_resource_with_delimiters() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector.declare(&ctx, "Draw", Occurrence::Pre, "pre();").unwrap();
        injector
            .declare(&ctx, "Draw", Occurrence::Post, "post();")
            .unwrap();

        let modified = injector
            .render(EngineVariant::Gm8, dir.path())
            .await
            .unwrap();
        assert_eq!(modified, vec!["gml/Draw.gml".to_owned()]);

        let content = std::fs::read_to_string(dir.path().join("gml/Draw.gml")).unwrap();
        assert_eq!(
            content,
            format!("pre();{PRE_DELIMITER}draw_self();{POST_DELIMITER}post();")
        );
    }

    #[tokio::test]
    async fn render_post_only_has_no_pre_delimiter() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector
            .declare(&ctx, "Draw", Occurrence::Post, "post();")
            .unwrap();
        injector.render(EngineVariant::Gm8, dir.path()).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("gml/Draw.gml")).unwrap();
        assert!(content.starts_with("draw_self();"));
        assert!(!content.contains("END PRE GML"));
        assert!(content.ends_with("post();"));
    }

    #[tokio::test]
    async fn render_writes_script_and_synthetic_files() {
        let dir = resources();
        let ctx = InjectionContext {
            engine: EngineVariant::Gms,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector
            .declare(&ctx, "Check", Occurrence::Script, "check();")
            .unwrap();
        injector
            .declare(&ctx, "Step", Occurrence::Script, "tick();")
            .unwrap();

        let mut modified = injector
            .render(EngineVariant::Gms, dir.path())
            .await
            .unwrap();
        modified.sort();
        assert_eq!(
            modified,
            vec!["lib/GMS/test/Check.gml", "lib/GMS/test/Step.gml"]
        );

        let check = std::fs::read_to_string(dir.path().join("lib/GMS/test/Check.gml")).unwrap();
        assert_eq!(check, "check();");

        let step = std::fs::read_to_string(dir.path().join("lib/GMS/test/Step.gml")).unwrap();
        let default = synthetic_default("Step").unwrap();
        assert_eq!(step, format!("{default}tick();"));
    }

    #[tokio::test]
    async fn synthetic_pre_without_resource_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = InjectionContext {
            engine: EngineVariant::Gm8,
            resource_root: dir.path(),
        };
        let mut injector = EventInjector::new();
        injector
            .declare(&ctx, "GameBegin", Occurrence::Pre, "init();")
            .unwrap();

        let modified = injector
            .render(EngineVariant::Gm8, dir.path())
            .await
            .unwrap();
        assert_eq!(modified, vec!["gml/GameBegin.gml", "gml/test/GameBegin.gml"]);

        let wrapped = std::fs::read_to_string(dir.path().join("gml/GameBegin.gml")).unwrap();
        assert!(wrapped.starts_with("init();"));
        assert!(wrapped.ends_with(synthetic_default("GameBegin").unwrap()));
    }
}
