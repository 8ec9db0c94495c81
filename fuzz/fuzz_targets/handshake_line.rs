#![no_main]

use libfuzzer_sys::fuzz_target;
use iwpotest_core::protocol::{CompanionReport, HandshakeMessage};

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        if let Ok(message) = HandshakeMessage::decode(line) {
            // 디코딩된 메시지는 다시 인코딩할 수 있어야 함
            assert!(message.encode_line().is_ok());
        }
        if let Ok(report) = CompanionReport::decode(line) {
            let name = report.name.as_deref().unwrap_or("result");
            assert!(CompanionReport::ACCEPTED_NAMES.contains(&name));
        }
    }
});
