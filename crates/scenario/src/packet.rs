//! 서버 패킷 컴파일러
//!
//! 한 줄짜리 패킷 설명을 원시 바이트로 컴파일합니다.
//!
//! # 문법
//! ```text
//! TCP 04 "test message" 1A2B 3.5
//! ```
//! - 첫 토큰은 전송 종류 태그입니다 (`TCP`만 지원).
//! - `"..."`: UTF-8 바이트 + `0x00` 종료자. `\`는 다음 문자를 그대로 복사합니다.
//! - 모든 문자가 16진수인 토큰: 길이 2 → u8, 4 → u16 LE, 8 → u32 LE.
//! - 그 외 토큰: 10진 부동소수점 → f64 LE.
//!
//! 16진수 해석이 항상 먼저입니다. `10`은 열이 아니라 `0x10`입니다.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::{BufMut, Bytes, BytesMut};
use iwpotest_core::protocol::PacketPayload;
use tracing::debug;

use crate::error::{PacketError, ParseError, ScenarioError};

/// 작업 디렉토리 안의 패킷 저장 폴더 이름
pub const PACKET_DIR_NAME: &str = "server_packages";

/// 패킷 전송 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// TCP 패킷
    Tcp,
}

impl Transport {
    /// 소문자 레이블 (파일 확장자, IPC `kind` 필드)
    pub fn label(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, PacketError> {
        match tag {
            "TCP" => Ok(Self::Tcp),
            other => Err(PacketError::UnsupportedTransport(other.to_owned())),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 패킷 설명 한 줄을 컴파일합니다.
///
/// 같은 입력에는 항상 같은 바이트열을 반환합니다.
pub fn compile(line: &str) -> Result<(Transport, Bytes), PacketError> {
    let line = line.trim_start();
    let (tag, body, body_offset) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..], pos),
        None => (line, "", line.len()),
    };
    if tag.is_empty() {
        return Err(PacketError::MissingTransport);
    }
    let transport = Transport::from_tag(tag)?;

    let mut buf = BytesMut::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, escaped)) => text.push(escaped),
                        None => text.push('\\'),
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(PacketError::UnterminatedString {
                    offset: body_offset + start,
                });
            }
            buf.put_slice(text.as_bytes());
            buf.put_u8(0);
            continue;
        }

        let mut end = body.len();
        while let Some(&(idx, c)) = chars.peek() {
            if c.is_whitespace() {
                end = idx;
                break;
            }
            chars.next();
        }
        write_number(&mut buf, &body[start..end])?;
    }

    Ok((transport, buf.freeze()))
}

fn write_number(buf: &mut BytesMut, token: &str) -> Result<(), PacketError> {
    if token.chars().all(|c| c.is_ascii_hexdigit()) {
        let invalid = || PacketError::InvalidNumber {
            token: token.to_owned(),
        };
        match token.len() {
            2 => buf.put_u8(u8::from_str_radix(token, 16).map_err(|_| invalid())?),
            4 => buf.put_u16_le(u16::from_str_radix(token, 16).map_err(|_| invalid())?),
            8 => buf.put_u32_le(u32::from_str_radix(token, 16).map_err(|_| invalid())?),
            length => {
                return Err(PacketError::InvalidByteLength {
                    token: token.to_owned(),
                    length,
                });
            }
        }
        return Ok(());
    }

    match token.parse::<f64>() {
        Ok(value) if !value.is_nan() => {
            buf.put_f64_le(value);
            Ok(())
        }
        _ => Err(PacketError::InvalidNumber {
            token: token.to_owned(),
        }),
    }
}

/// 컴파일된 서버 패킷
///
/// 생성 후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpec {
    name: String,
    transport: Transport,
    payload: Bytes,
}

impl PacketSpec {
    /// 이름과 패킷 설명으로 패킷을 컴파일합니다.
    pub fn compile(name: impl Into<String>, line: &str) -> Result<Self, ParseError> {
        let name = name.into();
        match compile(line) {
            Ok((transport, payload)) => Ok(Self {
                name,
                transport,
                payload,
            }),
            Err(source) => Err(ParseError::Packet { name, source }),
        }
    }

    /// 패킷 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 전송 종류
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// 컴파일된 바이트
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 디스크에 저장될 파일 이름 (`<name>.tcp`)
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.transport.label())
    }

    /// IPC 전송용 base64 표현
    pub fn to_payload(&self) -> PacketPayload {
        PacketPayload {
            name: self.name.clone(),
            kind: self.transport.label().to_owned(),
            data: STANDARD.encode(&self.payload),
        }
    }

    /// `<work_dir>/server_packages/<name>.<kind>`에 바이트를 기록합니다.
    pub async fn persist(&self, work_dir: &Path) -> Result<PathBuf, ScenarioError> {
        let dir = work_dir.join(PACKET_DIR_NAME);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ScenarioError::io(&dir, e))?;

        let path = dir.join(self.file_name());
        tokio::fs::write(&path, &self.payload)
            .await
            .map_err(|e| ScenarioError::io(&path, e))?;

        debug!(packet = %self.name, path = %path.display(), bytes = self.payload.len(), "server package saved");
        Ok(path)
    }
}
