use crate::PackError;
use std::io::Read;

/// Appends `v` as a LEB128 varint.
pub fn write_uvarint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Reads a LEB128 varint from a slice, advancing `pos`. `None` when the
/// slice ends mid-varint or the value overflows 64 bits.
pub fn read_uvarint_slice(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut v = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        if shift == 63 && byte > 1 {
            return None;
        }
        v |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(v);
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}

/// Reads a LEB128 varint, advancing `offset` by the bytes consumed.
pub(crate) fn read_uvarint<R: Read>(r: &mut R, offset: &mut u64) -> Result<u64, PackError> {
    let start = *offset;
    let mut v = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        *offset += 1;
        if shift == 63 && byte[0] > 1 {
            return Err(PackError::BadRecord {
                offset: start,
                reason: "varint overflows 64 bits",
            });
        }
        v |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(v);
        }
        shift += 7;
        if shift > 63 {
            return Err(PackError::BadRecord {
                offset: start,
                reason: "varint overflows 64 bits",
            });
        }
    }
}
