//! In-memory module image model
//!
//! Mirrors the on-disk layout: a string heap, a type-ref table, a
//! member-ref table, and method bodies. Instruction operands are indices
//! into the ref tables; ref-table rows index the heap. Cross-table
//! integrity is NOT guaranteed by construction - the scanner and the
//! post-rewrite validator check it and treat dangling indices as image
//! corruption.

use modbridge_core::identity::{MemberIdentity, MemberKind, Signature, TypeIdentity};
use modbridge_core::version::VersionRange;
use serde::{Deserialize, Serialize};

/// Index into the string heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrId(pub u32);

/// Index into the type-ref table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRefId(pub u32);

/// Index into the member-ref table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRefId(pub u32);

/// Deduplicating string heap
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StringHeap {
    entries: Vec<String>,
}

impl StringHeap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the id of an existing identical entry
    /// when there is one.
    pub fn intern(&mut self, value: &str) -> StrId {
        if let Some(pos) = self.entries.iter().position(|e| e == value) {
            return StrId(pos as u32);
        }
        self.entries.push(value.to_string());
        StrId((self.entries.len() - 1) as u32)
    }

    /// Look up a heap entry
    pub fn get(&self, id: StrId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(String::as_str)
    }

    /// Number of heap entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the heap is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in heap order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Append a raw entry without deduplication (decoder use)
    pub(crate) fn push_raw(&mut self, value: String) {
        self.entries.push(value);
    }
}

/// A reference to a type declared outside this module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRefRow {
    /// Declaring module name
    pub module: StrId,

    /// Namespace (heap entry may be empty)
    pub namespace: StrId,

    /// Simple type name
    pub name: StrId,
}

/// A reference to a member declared outside this module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRefRow {
    /// Declaring type
    pub parent: TypeRefId,

    /// Field or method
    pub kind: MemberKind,

    /// Member name
    pub name: StrId,

    /// Parameter shapes, in order
    pub params: Vec<StrId>,

    /// Return shape
    pub returns: StrId,
}

/// A method defined by the module itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: StrId,

    /// Instruction stream
    pub body: Vec<Instr>,
}

/// One instruction in a method body.
///
/// The operand-carrying variants are the only places a method body can
/// reach outside the module; everything else is inert for rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    Nop,
    LoadConst(i64),
    LoadField(MemberRefId),
    StoreField(MemberRefId),
    Call(MemberRefId),
    NewObj(TypeRefId),
    Ret,
}

impl Instr {
    /// Member-ref operand, if this instruction carries one
    pub fn member_operand(&self) -> Option<MemberRefId> {
        match self {
            Self::LoadField(id) | Self::StoreField(id) | Self::Call(id) => Some(*id),
            _ => None,
        }
    }

    /// Type-ref operand, if this instruction carries one
    pub fn type_operand(&self) -> Option<TypeRefId> {
        match self {
            Self::NewObj(id) => Some(*id),
            _ => None,
        }
    }
}

/// A decoded extension module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleImage {
    /// Module name, as declared by the author
    pub name: String,

    /// Module's own version string
    pub version: String,

    /// Host versions the author declared compatibility with
    pub host_range: VersionRange,

    /// String heap
    pub strings: StringHeap,

    /// External type references
    pub type_refs: Vec<TypeRefRow>,

    /// External member references
    pub member_refs: Vec<MemberRefRow>,

    /// Methods defined by the module
    pub methods: Vec<MethodDef>,
}

impl ModuleImage {
    /// Create an empty image with the given declared identity
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            host_range: VersionRange::any(),
            strings: StringHeap::new(),
            type_refs: Vec::new(),
            member_refs: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Resolve a heap string, failing on a dangling index
    pub fn str(&self, id: StrId) -> Result<&str, ImageError> {
        self.strings.get(id).ok_or(ImageError::StringIndexOutOfRange(id.0))
    }

    /// Type-ref row by id
    pub fn type_ref(&self, id: TypeRefId) -> Result<&TypeRefRow, ImageError> {
        self.type_refs
            .get(id.0 as usize)
            .ok_or(ImageError::TypeRefOutOfRange(id.0))
    }

    /// Member-ref row by id
    pub fn member_ref(&self, id: MemberRefId) -> Result<&MemberRefRow, ImageError> {
        self.member_refs
            .get(id.0 as usize)
            .ok_or(ImageError::MemberRefOutOfRange(id.0))
    }

    /// Canonical identity of a referenced type
    pub fn type_identity(&self, id: TypeRefId) -> Result<TypeIdentity, ImageError> {
        let row = self.type_ref(id)?;
        Ok(TypeIdentity::new(
            self.str(row.module)?,
            self.str(row.namespace)?,
            self.str(row.name)?,
        ))
    }

    /// Canonical identity of a referenced member, using the declaring type
    /// as recorded in the tables.
    pub fn member_identity(&self, id: MemberRefId) -> Result<MemberIdentity, ImageError> {
        let row = self.member_ref(id)?;
        let declaring = self.type_identity(row.parent)?;
        self.member_identity_with_declaring(id, declaring)
    }

    /// Canonical identity of a referenced member against a substituted
    /// declaring type (used when a type rule has already retargeted the
    /// parent).
    pub fn member_identity_with_declaring(
        &self,
        id: MemberRefId,
        declaring: TypeIdentity,
    ) -> Result<MemberIdentity, ImageError> {
        let row = self.member_ref(id)?;
        let mut params = Vec::with_capacity(row.params.len());
        for p in &row.params {
            params.push(self.str(*p)?.to_string());
        }
        let signature = Signature::new(params, self.str(row.returns)?);
        Ok(MemberIdentity::new(
            declaring,
            row.kind,
            self.str(row.name)?,
            signature,
        ))
    }
}

/// Image decoding and integrity errors
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("not a module image (bad magic)")]
    BadMagic,

    #[error("unsupported image format version {0}")]
    UnsupportedFormat(u16),

    #[error("image truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unknown opcode 0x{opcode:02x} at byte {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("{remaining} trailing bytes after image end")]
    TrailingBytes { remaining: usize },

    #[error("string heap index {0} out of range")]
    StringIndexOutOfRange(u32),

    #[error("type ref index {0} out of range")]
    TypeRefOutOfRange(u32),

    #[error("member ref index {0} out of range")]
    MemberRefOutOfRange(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_interning_deduplicates() {
        let mut heap = StringHeap::new();
        let a = heap.intern("StardewValley");
        let b = heap.intern("Item");
        let c = heap.intern("StardewValley");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get(a), Some("StardewValley"));
    }

    #[test]
    fn dangling_string_index_is_an_error() {
        let image = ModuleImage::new("Mod", "1.0.0");
        let err = image.str(StrId(7)).unwrap_err();
        assert!(matches!(err, ImageError::StringIndexOutOfRange(7)));
    }

    #[test]
    fn member_identity_uses_parent_type() {
        let mut image = ModuleImage::new("Mod", "1.0.0");
        let module = image.strings.intern("Host");
        let ns = image.strings.intern("StardewValley");
        let name = image.strings.intern("Item");
        image.type_refs.push(TypeRefRow {
            module,
            namespace: ns,
            name,
        });
        let field = image.strings.intern("category");
        let shape = image.strings.intern("int");
        image.member_refs.push(MemberRefRow {
            parent: TypeRefId(0),
            kind: MemberKind::Field,
            name: field,
            params: vec![],
            returns: shape,
        });

        let identity = image.member_identity(MemberRefId(0)).unwrap();
        assert_eq!(identity.declaring.full_name(), "StardewValley.Item");
        assert_eq!(identity.name, "category");
        assert_eq!(identity.kind, MemberKind::Field);
    }

    #[test]
    fn instruction_operands() {
        assert_eq!(Instr::Call(MemberRefId(3)).member_operand(), Some(MemberRefId(3)));
        assert_eq!(Instr::NewObj(TypeRefId(1)).type_operand(), Some(TypeRefId(1)));
        assert_eq!(Instr::Ret.member_operand(), None);
        assert_eq!(Instr::LoadConst(42).type_operand(), None);
    }
}
