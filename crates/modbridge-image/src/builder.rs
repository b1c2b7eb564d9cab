//! Programmatic image construction
//!
//! Used by tests and tooling to assemble module images without hand-rolling
//! heap indices. The builder deduplicates type refs by identity, so adding
//! the same type twice yields the same id.

use crate::tables::{
    Instr, MemberRefId, MemberRefRow, MethodDef, ModuleImage, StringHeap, TypeRefId, TypeRefRow,
};
use crate::writer::write_image;
use modbridge_core::identity::MemberKind;
use modbridge_core::version::VersionRange;

/// Builder for [`ModuleImage`]
pub struct ImageBuilder {
    image: ModuleImage,
}

impl ImageBuilder {
    /// Start a new image with the given declared identity
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            image: ModuleImage::new(name, version),
        }
    }

    /// Declare the host compatibility range
    pub fn host_range(&mut self, range: VersionRange) -> &mut Self {
        self.image.host_range = range;
        self
    }

    /// Add (or reuse) a type reference
    pub fn type_ref(&mut self, module: &str, namespace: &str, name: &str) -> TypeRefId {
        let module = self.image.strings.intern(module);
        let namespace = self.image.strings.intern(namespace);
        let name = self.image.strings.intern(name);
        let row = TypeRefRow {
            module,
            namespace,
            name,
        };
        if let Some(pos) = self.image.type_refs.iter().position(|r| *r == row) {
            return TypeRefId(pos as u32);
        }
        self.image.type_refs.push(row);
        TypeRefId((self.image.type_refs.len() - 1) as u32)
    }

    /// Add a field reference on the given declaring type
    pub fn field_ref(&mut self, parent: TypeRefId, name: &str, shape: &str) -> MemberRefId {
        let name = self.image.strings.intern(name);
        let returns = self.image.strings.intern(shape);
        self.image.member_refs.push(MemberRefRow {
            parent,
            kind: MemberKind::Field,
            name,
            params: Vec::new(),
            returns,
        });
        MemberRefId((self.image.member_refs.len() - 1) as u32)
    }

    /// Add a method reference on the given declaring type
    pub fn method_ref(
        &mut self,
        parent: TypeRefId,
        name: &str,
        params: Vec<String>,
        returns: &str,
    ) -> MemberRefId {
        let name = self.image.strings.intern(name);
        let params = params
            .iter()
            .map(|p| self.image.strings.intern(p))
            .collect();
        let returns = self.image.strings.intern(returns);
        self.image.member_refs.push(MemberRefRow {
            parent,
            kind: MemberKind::Method,
            name,
            params,
            returns,
        });
        MemberRefId((self.image.member_refs.len() - 1) as u32)
    }

    /// Add a method definition with its instruction stream
    pub fn method(&mut self, name: &str, body: Vec<Instr>) -> &mut Self {
        let name = self.image.strings.intern(name);
        self.image.methods.push(MethodDef { name, body });
        self
    }

    /// Finish building
    pub fn build(&mut self) -> ModuleImage {
        self.image.clone()
    }

    /// Finish building and encode to bytes
    pub fn encode(&mut self) -> Vec<u8> {
        write_image(&self.image)
    }
}
