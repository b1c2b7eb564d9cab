//! Binary decoder for module images
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic          4 bytes  "MBIM"
//! format         u16      currently 1
//! name           string   u32 length + UTF-8 bytes
//! version        string
//! host_range     2 x (u8 presence + 3 x u32) inclusive-min / exclusive-max
//! string heap    u32 count + strings
//! type refs      u32 count + rows (module u32, namespace u32, name u32)
//! member refs    u32 count + rows (parent u32, kind u8, name u32,
//!                                  params u32 count + u32s, returns u32)
//! methods        u32 count + (name u32, instr u32 count + instructions)
//! ```
//!
//! The decoder owns framing errors (magic, lengths, truncation, opcode
//! bytes). Cross-table index integrity is deliberately left to the
//! scanner, which reports dangling indices as image corruption.

use crate::tables::{
    ImageError, Instr, MemberRefId, MemberRefRow, MethodDef, ModuleImage, StrId, StringHeap,
    TypeRefId, TypeRefRow,
};
use modbridge_core::identity::MemberKind;
use modbridge_core::version::{HostVersion, VersionRange};

pub(crate) const MAGIC: &[u8; 4] = b"MBIM";
pub(crate) const FORMAT_VERSION: u16 = 1;

// Opcode bytes; writer.rs encodes the same table.
pub(crate) const OP_NOP: u8 = 0x00;
pub(crate) const OP_LOAD_CONST: u8 = 0x01;
pub(crate) const OP_LOAD_FIELD: u8 = 0x02;
pub(crate) const OP_STORE_FIELD: u8 = 0x03;
pub(crate) const OP_CALL: u8 = 0x04;
pub(crate) const OP_NEW_OBJ: u8 = 0x05;
pub(crate) const OP_RET: u8 = 0x06;

pub(crate) const KIND_FIELD: u8 = 0;
pub(crate) const KIND_METHOD: u8 = 1;

/// Decode a module image from raw bytes.
///
/// The whole buffer must be consumed; trailing bytes are an error.
pub fn read_image(bytes: &[u8]) -> Result<ModuleImage, ImageError> {
    let mut r = Cursor::new(bytes);

    let magic = r.take(4)?;
    if magic != MAGIC {
        return Err(ImageError::BadMagic);
    }
    let format = r.u16()?;
    if format != FORMAT_VERSION {
        return Err(ImageError::UnsupportedFormat(format));
    }

    let name = r.string()?;
    let version = r.string()?;
    let host_range = VersionRange {
        min: r.optional_version()?,
        max: r.optional_version()?,
    };

    let mut strings = StringHeap::new();
    let count = r.u32()? as usize;
    for _ in 0..count {
        let s = r.string()?;
        strings.push_raw(s);
    }

    let count = r.u32()? as usize;
    let mut type_refs = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        type_refs.push(TypeRefRow {
            module: StrId(r.u32()?),
            namespace: StrId(r.u32()?),
            name: StrId(r.u32()?),
        });
    }

    let count = r.u32()? as usize;
    let mut member_refs = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let parent = TypeRefId(r.u32()?);
        let kind = match r.u8()? {
            KIND_FIELD => MemberKind::Field,
            KIND_METHOD => MemberKind::Method,
            other => {
                return Err(ImageError::InvalidOpcode {
                    opcode: other,
                    offset: r.pos - 1,
                })
            }
        };
        let name = StrId(r.u32()?);
        let param_count = r.u32()? as usize;
        let mut params = Vec::with_capacity(param_count.min(256));
        for _ in 0..param_count {
            params.push(StrId(r.u32()?));
        }
        let returns = StrId(r.u32()?);
        member_refs.push(MemberRefRow {
            parent,
            kind,
            name,
            params,
            returns,
        });
    }

    let count = r.u32()? as usize;
    let mut methods = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let name = StrId(r.u32()?);
        let instr_count = r.u32()? as usize;
        let mut body = Vec::with_capacity(instr_count.min(65_536));
        for _ in 0..instr_count {
            body.push(r.instruction()?);
        }
        methods.push(MethodDef { name, body });
    }

    if r.pos != bytes.len() {
        return Err(ImageError::TrailingBytes {
            remaining: bytes.len() - r.pos,
        });
    }

    Ok(ModuleImage {
        name,
        version,
        host_range,
        strings,
        type_refs,
        member_refs,
        methods,
    })
}

/// Bounds-checked little-endian cursor
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ImageError> {
        if self.pos + n > self.buf.len() {
            return Err(ImageError::Truncated { offset: self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ImageError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ImageError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ImageError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, ImageError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn string(&mut self) -> Result<String, ImageError> {
        let start = self.pos;
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ImageError::InvalidUtf8 { offset: start })
    }

    fn optional_version(&mut self) -> Result<Option<HostVersion>, ImageError> {
        match self.u8()? {
            0 => Ok(None),
            _ => Ok(Some(HostVersion::new(self.u32()?, self.u32()?, self.u32()?))),
        }
    }

    fn instruction(&mut self) -> Result<Instr, ImageError> {
        let offset = self.pos;
        let opcode = self.u8()?;
        Ok(match opcode {
            OP_NOP => Instr::Nop,
            OP_LOAD_CONST => Instr::LoadConst(self.i64()?),
            OP_LOAD_FIELD => Instr::LoadField(MemberRefId(self.u32()?)),
            OP_STORE_FIELD => Instr::StoreField(MemberRefId(self.u32()?)),
            OP_CALL => Instr::Call(MemberRefId(self.u32()?)),
            OP_NEW_OBJ => Instr::NewObj(TypeRefId(self.u32()?)),
            OP_RET => Instr::Ret,
            opcode => return Err(ImageError::InvalidOpcode { opcode, offset }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_magic_is_rejected() {
        let err = read_image(b"ELF\x7f rest of buffer").unwrap_err();
        assert!(matches!(err, ImageError::BadMagic));
    }

    #[test]
    fn empty_buffer_is_truncated() {
        let err = read_image(&[]).unwrap_err();
        assert!(matches!(err, ImageError::Truncated { offset: 0 }));
    }

    #[test]
    fn unsupported_format_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&99u16.to_le_bytes());
        let err = read_image(&bytes).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat(99)));
    }

    #[test]
    fn truncated_mid_string() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes()); // name length way past end
        bytes.extend_from_slice(b"Mod");
        let err = read_image(&bytes).unwrap_err();
        assert!(matches!(err, ImageError::Truncated { .. }));
    }
}
