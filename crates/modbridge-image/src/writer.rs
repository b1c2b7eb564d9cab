//! Binary encoder for module images
//!
//! Inverse of [`crate::reader`]; see the layout comment there. Encoding
//! never fails: every in-memory image has a byte representation, even one
//! with dangling indices (the validator, not the encoder, polices those).

use crate::reader::{
    FORMAT_VERSION, KIND_FIELD, KIND_METHOD, MAGIC, OP_CALL, OP_LOAD_CONST, OP_LOAD_FIELD, OP_NEW_OBJ,
    OP_NOP, OP_RET, OP_STORE_FIELD,
};
use crate::tables::{Instr, ModuleImage};
use modbridge_core::identity::MemberKind;
use modbridge_core::version::HostVersion;

/// Encode a module image to bytes
pub fn write_image(image: &ModuleImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

    write_string(&mut out, &image.name);
    write_string(&mut out, &image.version);
    write_optional_version(&mut out, &image.host_range.min);
    write_optional_version(&mut out, &image.host_range.max);

    write_u32(&mut out, image.strings.len() as u32);
    for s in image.strings.iter() {
        write_string(&mut out, s);
    }

    write_u32(&mut out, image.type_refs.len() as u32);
    for row in &image.type_refs {
        write_u32(&mut out, row.module.0);
        write_u32(&mut out, row.namespace.0);
        write_u32(&mut out, row.name.0);
    }

    write_u32(&mut out, image.member_refs.len() as u32);
    for row in &image.member_refs {
        write_u32(&mut out, row.parent.0);
        out.push(match row.kind {
            MemberKind::Field => KIND_FIELD,
            MemberKind::Method => KIND_METHOD,
        });
        write_u32(&mut out, row.name.0);
        write_u32(&mut out, row.params.len() as u32);
        for p in &row.params {
            write_u32(&mut out, p.0);
        }
        write_u32(&mut out, row.returns.0);
    }

    write_u32(&mut out, image.methods.len() as u32);
    for method in &image.methods {
        write_u32(&mut out, method.name.0);
        write_u32(&mut out, method.body.len() as u32);
        for instr in &method.body {
            write_instruction(&mut out, instr);
        }
    }

    out
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn write_optional_version(out: &mut Vec<u8>, version: &Option<HostVersion>) {
    match version {
        None => out.push(0),
        Some(v) => {
            out.push(1);
            write_u32(out, v.major);
            write_u32(out, v.minor);
            write_u32(out, v.patch);
        }
    }
}

fn write_instruction(out: &mut Vec<u8>, instr: &Instr) {
    match instr {
        Instr::Nop => out.push(OP_NOP),
        Instr::LoadConst(v) => {
            out.push(OP_LOAD_CONST);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Instr::LoadField(id) => {
            out.push(OP_LOAD_FIELD);
            write_u32(out, id.0);
        }
        Instr::StoreField(id) => {
            out.push(OP_STORE_FIELD);
            write_u32(out, id.0);
        }
        Instr::Call(id) => {
            out.push(OP_CALL);
            write_u32(out, id.0);
        }
        Instr::NewObj(id) => {
            out.push(OP_NEW_OBJ);
            write_u32(out, id.0);
        }
        Instr::Ret => out.push(OP_RET),
    }
}
