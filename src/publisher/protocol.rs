//! NSQ TCP 프로토콜 (V2) 중 발행에 필요한 부분입니다.
//!
//! 모든 정수는 빅엔디언입니다. 서버가 보내는 프레임 형식:
//!
//! ```text
//! [size: u32][frame type: u32][data: size - 4 bytes]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::PublishError;

pub const MAGIC_V2: &[u8] = b"  V2";
pub const OK: &[u8] = b"OK";
pub const HEARTBEAT: &[u8] = b"_heartbeat_";
pub const NOP: &[u8] = b"NOP\n";

const FRAME_TYPE_RESPONSE: u32 = 0;
const FRAME_TYPE_ERROR: u32 = 1;
const FRAME_TYPE_MESSAGE: u32 = 2;

// 발행 연결에서 받는 프레임은 짧은 응답뿐임
const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Response(Bytes),
    Error(Bytes),
    Message(Bytes),
}

/// `PUB <topic>\n[size][body]` 명령을 인코딩합니다.
pub fn encode_pub(topic: &str, body: &[u8]) -> Result<Bytes, PublishError> {
    let size = u32::try_from(body.len()).map_err(|_| {
        PublishError::Protocol(format!("메시지가 너무 큼: {} bytes", body.len()))
    })?;

    let mut buf = BytesMut::with_capacity(4 + topic.len() + 1 + 4 + body.len());
    buf.put_slice(b"PUB ");
    buf.put_slice(topic.as_bytes());
    buf.put_u8(b'\n');
    buf.put_u32(size);
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// 버퍼에서 완성된 프레임 하나를 꺼냅니다.
///
/// 데이터가 모자라면 버퍼를 건드리지 않고 `Ok(None)`을 반환합니다.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>, PublishError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if size < 4 {
        return Err(PublishError::Protocol(format!("프레임 크기가 너무 작음: {}", size)));
    }
    if size > MAX_FRAME_SIZE {
        return Err(PublishError::Protocol(format!("프레임 크기가 너무 큼: {}", size)));
    }
    if buf.len() < 4 + size {
        buf.reserve(4 + size - buf.len());
        return Ok(None);
    }

    buf.advance(4);
    let frame_type = buf.get_u32();
    let data = buf.split_to(size - 4).freeze();

    match frame_type {
        FRAME_TYPE_RESPONSE => Ok(Some(Frame::Response(data))),
        FRAME_TYPE_ERROR => Ok(Some(Frame::Error(data))),
        FRAME_TYPE_MESSAGE => Ok(Some(Frame::Message(data))),
        other => Err(PublishError::Protocol(format!("알 수 없는 프레임 타입: {}", other))),
    }
}
