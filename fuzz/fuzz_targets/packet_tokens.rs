#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use iwpotest_scenario::packet::compile;

/// 퍼저용 구조적 토큰
#[derive(Arbitrary, Debug)]
enum FuzzToken {
    Byte(u8),
    Short(u16),
    Word(u32),
    Number(i32),
    Text(String),
}

impl FuzzToken {
    /// DSL 표기와 기대 바이트 길이
    fn render(&self) -> (String, usize) {
        match self {
            Self::Byte(v) => (format!("{v:02X}"), 1),
            Self::Short(v) => (format!("{v:04X}"), 2),
            Self::Word(v) => (format!("{v:08X}"), 4),
            // 소수점이 있으면 16진수로 해석되지 않음
            Self::Number(v) => (format!("{v}.25"), 8),
            Self::Text(s) => {
                let mut quoted = String::from("\"");
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        quoted.push('\\');
                    }
                    quoted.push(c);
                }
                quoted.push('"');
                (quoted, s.len() + 1)
            }
        }
    }
}

fuzz_target!(|tokens: Vec<FuzzToken>| {
    let mut line = String::from("TCP");
    let mut expected = 0;
    for token in tokens.iter().take(64) {
        let (text, len) = token.render();
        line.push(' ');
        line.push_str(&text);
        expected += len;
    }

    let (_, bytes) = compile(&line).expect("well-formed packet should compile");
    assert_eq!(bytes.len(), expected, "line: {line}");
    assert_eq!(compile(&line).map(|(_, b)| b), Ok(bytes));
});
