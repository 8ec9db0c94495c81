#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use iwpotest_scenario::definition::ScenarioDefinition;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // 리소스 디렉토리가 없으므로 pre/post 조각은 전제 조건 에러로 끝남
        let _ = ScenarioDefinition::parse(
            content,
            Path::new("fuzz/scenario.iwpotest"),
            Path::new("fuzz/nonexistent-data"),
        );
    }
});
