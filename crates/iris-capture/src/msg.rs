//! Byte layouts of the typed messages carried inside pack records.
//!
//! Scalars are little-endian; strings and byte blobs are varint
//! length-prefixed. Parsers return `None` on any truncation or trailing
//! garbage; the decoder maps that to a `BadMessage` error with the
//! record's stream offset.

use crate::capture::CaptureHeader;
use crate::ApiState;
use iris_api::{CmdFlags, Cmd};
use iris_pack::varint::{read_uvarint_slice, write_uvarint};
use iris_resource::ResourceId;
use iris_types::{ApiId, CmdId, MemoryRange};

pub(crate) mod msg_type {
    pub const HEADER: u64 = 1;
    pub const COMMAND: u64 = 2;
    pub const OBSERVATION: u64 = 3;
    pub const RESOURCE: u64 = 4;
    pub const CALL_MARKER: u64 = 5;
    pub const INITIAL_STATE: u64 = 6;
    pub const API_STATE: u64 = 7;
    pub const CMD_RESULT: u64 = 8;
    pub const EXTRA: u64 = 9;
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_uvarint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_bytes(out, s.as_bytes());
}

fn get_u16(bytes: &[u8], pos: &mut usize) -> Option<u16> {
    let b = bytes.get(*pos..*pos + 2)?;
    *pos += 2;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn get_u32(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let b = bytes.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn get_u64(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let b = bytes.get(*pos..*pos + 8)?;
    *pos += 8;
    Some(u64::from_le_bytes(b.try_into().ok()?))
}

fn get_bytes(bytes: &[u8], pos: &mut usize) -> Option<Vec<u8>> {
    let len = read_uvarint_slice(bytes, pos)?;
    let b = bytes.get(*pos..*pos + len as usize)?;
    *pos += len as usize;
    Some(b.to_vec())
}

fn get_str(bytes: &[u8], pos: &mut usize) -> Option<String> {
    String::from_utf8(get_bytes(bytes, pos)?).ok()
}

fn done(bytes: &[u8], pos: usize) -> Option<()> {
    (pos == bytes.len()).then_some(())
}

pub(crate) fn encode_header(h: &CaptureHeader) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, h.version);
    put_str(&mut out, &h.device);
    put_str(&mut out, &h.abi);
    out
}

pub(crate) fn decode_header(bytes: &[u8]) -> Option<CaptureHeader> {
    let mut pos = 0;
    let version = get_u32(bytes, &mut pos)?;
    let device = get_str(bytes, &mut pos)?;
    let abi = get_str(bytes, &mut pos)?;
    done(bytes, pos)?;
    Some(CaptureHeader {
        version,
        device,
        abi,
    })
}

/// Encodes the command record itself; extras, observations and the result
/// travel as separate child messages.
pub(crate) fn encode_command(cmd: &Cmd) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, cmd.api.0);
    put_u32(&mut out, cmd.flags.bits());
    put_u64(&mut out, cmd.caller.value());
    put_str(&mut out, &cmd.name);
    put_bytes(&mut out, &cmd.payload);
    out
}

pub(crate) fn decode_command(bytes: &[u8]) -> Option<Cmd> {
    let mut pos = 0;
    let api = ApiId(get_u32(bytes, &mut pos)?);
    let flags = CmdFlags::from_bits_retain(get_u32(bytes, &mut pos)?);
    let caller = CmdId::new(get_u64(bytes, &mut pos)?);
    let name = get_str(bytes, &mut pos)?;
    let payload = get_bytes(bytes, &mut pos)?;
    done(bytes, pos)?;
    let mut cmd = Cmd::new(api, name, payload).with_flags(flags);
    cmd.caller = caller;
    Some(cmd)
}

/// How an observation message points at its backing resource: by content
/// hash, or by the 1-based index the resource got when its bytes were
/// first written to this stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResourceRef {
    Hash(ResourceId),
    Index(u64),
}

pub(crate) fn encode_observation(range: MemoryRange, res: ResourceRef) -> Vec<u8> {
    let mut out = Vec::new();
    put_u64(&mut out, range.base);
    put_u64(&mut out, range.size);
    match res {
        ResourceRef::Hash(id) => {
            out.push(0);
            out.extend_from_slice(&id.0);
        }
        ResourceRef::Index(i) => {
            out.push(1);
            write_uvarint(&mut out, i);
        }
    }
    out
}

pub(crate) fn decode_observation(bytes: &[u8]) -> Option<(MemoryRange, ResourceRef)> {
    let mut pos = 0;
    let base = get_u64(bytes, &mut pos)?;
    let size = get_u64(bytes, &mut pos)?;
    let kind = *bytes.get(pos)?;
    pos += 1;
    let res = match kind {
        0 => {
            let b = bytes.get(pos..pos + ResourceId::SIZE)?;
            pos += ResourceId::SIZE;
            ResourceRef::Hash(ResourceId(b.try_into().ok()?))
        }
        1 => ResourceRef::Index(read_uvarint_slice(bytes, &mut pos)?),
        _ => return None,
    };
    done(bytes, pos)?;
    // base and size come from the wire; a wrapping interval is malformed.
    Some((MemoryRange::checked(base, size)?, res))
}

pub(crate) fn encode_api_state(state: &ApiState) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, state.api.0);
    put_bytes(&mut out, &state.payload);
    out
}

pub(crate) fn decode_api_state(bytes: &[u8]) -> Option<ApiState> {
    let mut pos = 0;
    let api = ApiId(get_u32(bytes, &mut pos)?);
    let payload = get_bytes(bytes, &mut pos)?;
    done(bytes, pos)?;
    Some(ApiState { api, payload })
}

pub(crate) fn encode_extra(kind: u16, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, kind);
    put_bytes(&mut out, bytes);
    out
}

pub(crate) fn decode_extra(bytes: &[u8]) -> Option<(u16, Vec<u8>)> {
    let mut pos = 0;
    let kind = get_u16(bytes, &mut pos)?;
    let payload = get_bytes(bytes, &mut pos)?;
    done(bytes, pos)?;
    Some((kind, payload))
}
