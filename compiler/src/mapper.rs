//! Maps IR types to Rust type expressions and wire metadata.

use crate::error::{ContractViolation, GenError};
use crate::layout::{Layouts, Shape};
use crate::names::{qualify, type_name};
use crate::types::{DeclName, Declaration, LibraryName, PrimitiveSubtype, Type};
use crate::verifier::DeclTable;

pub const RUNTIME: &str = "::wiregen_wire";
pub const STRING: &str = "::std::string::String";
pub const VEC: &str = "::std::vec::Vec";
pub const OPTION: &str = "::std::option::Option";
pub const BOX: &str = "::std::boxed::Box";

/// What kind of wire type a binding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    String,
    Vector,
    Array,
    Handle,
    ClientEnd,
    ServerEnd,
    Struct,
    Table,
    Union,
    Enum,
    Bits,
}

/// How absence of a nullable value is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullableEncoding {
    /// `Option<T>`; the count/presence header is zeroed.
    Presence,
    /// `Option<T>`; the inline handle slot holds the absent marker.
    Sentinel,
    /// `Option<Box<T>>`; the presence-flagged wrapper around an aggregate.
    Boxed,
}

impl TypeKind {
    /// The fixed nullability table.
    pub const fn nullable_encoding(self) -> Option<NullableEncoding> {
        match self {
            TypeKind::String | TypeKind::Vector => Some(NullableEncoding::Presence),
            TypeKind::Handle | TypeKind::ClientEnd | TypeKind::ServerEnd => Some(NullableEncoding::Sentinel),
            TypeKind::Struct | TypeKind::Table | TypeKind::Union => Some(NullableEncoding::Boxed),
            TypeKind::Primitive | TypeKind::Array | TypeKind::Enum | TypeKind::Bits => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            TypeKind::Primitive => "primitive",
            TypeKind::Array => "array",
            TypeKind::Enum => "enum",
            TypeKind::Bits => "bits",
            _ => "value",
        }
    }
}

/// Everything the emitters need to know about a type reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBinding {
    /// Fully qualified Rust type expression.
    pub rust:        String,
    pub kind:        TypeKind,
    pub shape:       Shape,
    /// Content lives outside the inline slot.
    pub out_of_line: bool,
    /// Set when the reference is nullable.
    pub nullable:    Option<NullableEncoding>,
    /// String or vector bound.
    pub max_len:     Option<u32>,
}

/// Rust spelling of each primitive.
pub fn primitive_type(subtype: PrimitiveSubtype) -> &'static str {
    match subtype {
        PrimitiveSubtype::Bool => "bool",
        PrimitiveSubtype::Int8 => "i8",
        PrimitiveSubtype::Int16 => "i16",
        PrimitiveSubtype::Int32 => "i32",
        PrimitiveSubtype::Int64 => "i64",
        PrimitiveSubtype::Uint8 => "u8",
        PrimitiveSubtype::Uint16 => "u16",
        PrimitiveSubtype::Uint32 => "u32",
        PrimitiveSubtype::Uint64 => "u64",
        PrimitiveSubtype::Float32 => "f32",
        PrimitiveSubtype::Float64 => "f64",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    table:   &'a DeclTable<'a>,
    layouts: &'a Layouts,
    library: &'a LibraryName,
}

impl<'a> TypeMapper<'a> {
    pub fn new(table: &'a DeclTable<'a>, layouts: &'a Layouts, library: &'a LibraryName) -> TypeMapper<'a> {
        TypeMapper { table, layouts, library }
    }

    pub fn table(&self) -> &'a DeclTable<'a> {
        self.table
    }

    pub fn library(&self) -> &'a LibraryName {
        self.library
    }

    pub fn layouts(&self) -> &'a Layouts {
        self.layouts
    }

    /// Rust path of a declared type, relative to the library being generated.
    pub fn decl_path(&self, name: &DeclName) -> String {
        qualify(name, self.library, &type_name(&name.name))
    }

    /// Rust path of the marker type of protocol `name`.
    pub fn marker_path(&self, name: &DeclName) -> String {
        qualify(name, self.library, &format!("{}Marker", type_name(&name.name)))
    }

    pub fn bind(&self, ty: &Type) -> Result<TypeBinding, GenError> {
        let shape = self.layouts.shape_of(ty, self.table)?;
        let (kind, rust) = match ty {
            Type::Primitive { subtype } => (TypeKind::Primitive, primitive_type(*subtype).to_string()),
            Type::String { .. } => (TypeKind::String, STRING.to_string()),
            Type::Vector { element, .. } => {
                let element = self.bind(element)?;
                (TypeKind::Vector, format!("{}<{}>", VEC, element.rust))
            }
            Type::Array { element, len } => {
                let element = self.bind(element)?;
                (TypeKind::Array, format!("[{}; {}]", element.rust, len))
            }
            Type::Handle { .. } => (TypeKind::Handle, format!("{}::Handle", RUNTIME)),
            Type::Request { protocol, .. } => {
                (TypeKind::ServerEnd, format!("{}::ServerEnd<{}>", RUNTIME, self.marker_path(protocol)))
            }
            Type::Identifier { identifier, .. } => {
                let kind = match self.table.resolve(identifier, self.library)? {
                    Declaration::Struct(_) => TypeKind::Struct,
                    Declaration::Table(_) => TypeKind::Table,
                    Declaration::Union(_) => TypeKind::Union,
                    Declaration::Enum(_) => TypeKind::Enum,
                    Declaration::Bits(_) => TypeKind::Bits,
                    Declaration::Protocol(_) => TypeKind::ClientEnd,
                    Declaration::Const(_) | Declaration::Service(_) => {
                        return Err(ContractViolation::WrongKind { name: identifier.clone(), expected: "type" }.into())
                    }
                };
                let rust = match kind {
                    TypeKind::ClientEnd => format!("{}::ClientEnd<{}>", RUNTIME, self.marker_path(identifier)),
                    _ => self.decl_path(identifier),
                };
                (kind, rust)
            }
        };

        let nullable = if ty.is_nullable() {
            match kind.nullable_encoding() {
                Some(encoding) => Some(encoding),
                None => return Err(ContractViolation::NotNullable(kind.describe()).into()),
            }
        } else {
            None
        };
        let rust = match nullable {
            None => rust,
            Some(NullableEncoding::Boxed) => format!("{}<{}<{}>>", OPTION, BOX, rust),
            Some(NullableEncoding::Presence | NullableEncoding::Sentinel) => format!("{}<{}>", OPTION, rust),
        };
        let out_of_line = match kind {
            TypeKind::String | TypeKind::Vector | TypeKind::Table | TypeKind::Union => true,
            TypeKind::Struct => nullable.is_some(),
            _ => false,
        };

        Ok(TypeBinding { rust, kind, shape, out_of_line, nullable, max_len: ty.max_len() })
    }
}
