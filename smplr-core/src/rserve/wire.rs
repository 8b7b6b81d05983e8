use bytes::{Buf as _, BufMut as _, BytesMut};

use super::{Error, Result};

pub(super) const GREETING_LEN: usize = 32;
pub(super) const HEADER_LEN: usize = 16;

const CMD_EVAL: u32 = 0x003;
const CMD_RESP: u32 = 0x10000;
const RESP_OK: u32 = CMD_RESP | 0x0001;
const RESP_ERR: u32 = CMD_RESP | 0x0002;

const DT_STRING: u32 = 4;
// Largest payload expressible in the 24-bit parameter length.
const MAX_PARAM_LEN: usize = 0x00ff_ffff;

/// Validates the 32-byte identification block the server sends on connect.
///
/// Layout: `Rsrv` + 4-byte protocol version + `QAP1` + attribute slots.
pub(super) fn check_greeting(id: &[u8; GREETING_LEN]) -> Result<()> {
    if &id[0..4] != b"Rsrv" {
        return Err(Error::Handshake("missing Rsrv signature".to_string()));
    }
    if &id[8..12] != b"QAP1" {
        let proto = String::from_utf8_lossy(&id[8..12]).to_string();
        return Err(Error::Handshake(format!("unsupported protocol `{proto}`")));
    }

    // Attributes are 4-byte slots; `ARpt`/`ARuc` mean the server wants a login.
    for slot in id[12..].chunks_exact(4) {
        if slot == b"ARpt" || slot == b"ARuc" {
            return Err(Error::AuthRequired);
        }
    }
    Ok(())
}

/// Encodes a `CMD_eval` message carrying `command` as a single `DT_STRING` parameter.
pub(super) fn encode_eval(command: &str) -> Result<BytesMut> {
    // NUL-terminated, padded to a multiple of 4.
    let raw_len = command.len() + 1;
    let padded_len = raw_len.next_multiple_of(4);
    if padded_len > MAX_PARAM_LEN {
        return Err(Error::CommandTooLarge(command.len()));
    }

    let payload_len = 4 + padded_len;
    let mut out = BytesMut::with_capacity(HEADER_LEN + payload_len);
    out.put_u32_le(CMD_EVAL);
    out.put_u32_le(payload_len as u32);
    out.put_u32_le(0);
    out.put_u32_le(0);

    out.put_u32_le(DT_STRING | ((padded_len as u32) << 8));
    out.put_slice(command.as_bytes());
    out.put_bytes(0, padded_len - command.len());
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ResponseHeader {
    pub status: ResponseStatus,
    pub payload_len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ResponseStatus {
    Ok,
    Err(u8),
}

pub(super) fn decode_response_header(raw: &[u8; HEADER_LEN]) -> Result<ResponseHeader> {
    let mut src = &raw[..];
    let cmd = src.get_u32_le();
    let len_lo = src.get_u32_le();
    let _offset = src.get_u32_le();
    let len_hi = src.get_u32_le();

    let payload_len = u64::from(len_lo) | (u64::from(len_hi) << 32);
    let kind = cmd & 0x00ff_ffff;
    let status = match kind {
        RESP_OK => ResponseStatus::Ok,
        RESP_ERR => ResponseStatus::Err(((cmd >> 24) & 0x7f) as u8),
        other => return Err(Error::Protocol(format!("unexpected response 0x{other:x}"))),
    };

    Ok(ResponseHeader {
        status,
        payload_len,
    })
}

pub(super) fn error_code_name(code: u8) -> &'static str {
    match code {
        0x02 => "parse incomplete",
        0x03 => "parse error",
        0x41 => "auth failed",
        0x42 => "connection broken",
        0x43 => "invalid command",
        0x44 => "invalid parameter",
        0x45 => "R error",
        0x46 => "I/O error",
        0x4b => "data overflow",
        0x4c => "object too big",
        0x4d => "out of memory",
        0x7f => "evaluation error",
        _ => "unknown error",
    }
}
