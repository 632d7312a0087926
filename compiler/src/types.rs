//! The resolved declaration tree handed to the generator by the front end.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContractViolation, GenError};

/// A dot-separated library name such as `demo.geometry`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryName(String);

impl LibraryName {
    pub fn new(name: impl Into<String>) -> LibraryName {
        LibraryName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for LibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully qualified declaration name, written `library/Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeclName {
    pub library: LibraryName,
    pub name:    String,
}

impl DeclName {
    pub fn new(library: &str, name: &str) -> DeclName {
        DeclName { library: LibraryName::new(library), name: name.to_string() }
    }

    /// Splits a member reference such as `lib/Color.RED` into the enclosing
    /// declaration and the member name.
    pub fn split_member(&self) -> (DeclName, Option<&str>) {
        match self.name.split_once('.') {
            Some((decl, member)) => (
                DeclName { library: self.library.clone(), name: decl.to_string() },
                Some(member),
            ),
            None => (self.clone(), None),
        }
    }
}

impl TryFrom<String> for DeclName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once('/') {
            Some((library, name)) if !library.is_empty() && !name.is_empty() => {
                Ok(DeclName::new(library, name))
            }
            _ => Err(format!("expected `library/Name`, found {:?}", value)),
        }
    }
}

impl From<DeclName> for String {
    fn from(value: DeclName) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeclName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.library, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveSubtype {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl PrimitiveSubtype {
    pub fn is_integral(self) -> bool {
        !matches!(self, PrimitiveSubtype::Bool | PrimitiveSubtype::Float32 | PrimitiveSubtype::Float64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveSubtype::Float32 | PrimitiveSubtype::Float64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleSubtype {
    Handle,
    Channel,
    Event,
    Eventpair,
    Fifo,
    Interrupt,
    Job,
    Port,
    Process,
    Socket,
    Thread,
    Timer,
    Vmo,
}

/// A reference to a type, as it appears on a member or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Primitive {
        subtype: PrimitiveSubtype,
    },
    String {
        #[serde(default)]
        max_len:  Option<u32>,
        #[serde(default)]
        nullable: bool,
    },
    Vector {
        element:  Box<Type>,
        #[serde(default)]
        max_len:  Option<u32>,
        #[serde(default)]
        nullable: bool,
    },
    Array {
        element: Box<Type>,
        len:     u32,
    },
    Handle {
        subtype:  HandleSubtype,
        #[serde(default)]
        nullable: bool,
    },
    /// The server end of a channel for `protocol`.
    Request {
        protocol: DeclName,
        #[serde(default)]
        nullable: bool,
    },
    /// A declared struct, table, union, enum or bits type, or the client
    /// end of a protocol.
    Identifier {
        identifier: DeclName,
        #[serde(default)]
        nullable:   bool,
    },
}

impl Type {
    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Primitive { .. } | Type::Array { .. } => false,
            Type::String { nullable, .. }
            | Type::Vector { nullable, .. }
            | Type::Handle { nullable, .. }
            | Type::Request { nullable, .. }
            | Type::Identifier { nullable, .. } => *nullable,
        }
    }

    /// The string/vector bound, if any.
    pub fn max_len(&self) -> Option<u32> {
        match self {
            Type::String { max_len, .. } | Type::Vector { max_len, .. } => *max_len,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constant {
    /// Raw literal text; strings are unquoted.
    Literal { value: String },
    /// Another constant, or an enum/bits member written `lib/Decl.MEMBER`.
    Identifier { identifier: DeclName },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const {
    pub name:  DeclName,
    #[serde(default)]
    pub doc:   Option<String>,
    #[serde(rename = "type")]
    pub ty:    Type,
    pub value: Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name:  String,
    pub value: String,
    #[serde(default)]
    pub doc:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name:     DeclName,
    #[serde(default)]
    pub doc:      Option<String>,
    pub subtype:  PrimitiveSubtype,
    pub members:  Vec<EnumMember>,
    #[serde(default)]
    pub flexible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bits {
    pub name:     DeclName,
    #[serde(default)]
    pub doc:      Option<String>,
    pub subtype:  PrimitiveSubtype,
    pub members:  Vec<EnumMember>,
    #[serde(default)]
    pub flexible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMember {
    pub name:   String,
    #[serde(rename = "type")]
    pub ty:     Type,
    /// Byte offset within the struct; natural layout when absent.
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub doc:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    pub name:    DeclName,
    #[serde(default)]
    pub doc:     Option<String>,
    pub members: Vec<StructMember>,
}

/// A table field or union variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalMember {
    pub ordinal:  u64,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub name:     String,
    #[serde(default, rename = "type")]
    pub ty:       Option<Type>,
    #[serde(default)]
    pub doc:      Option<String>,
}

impl OrdinalMember {
    /// Name and type of a non-reserved member.
    pub fn field(&self) -> Result<Option<(&str, &Type)>, GenError> {
        if self.reserved {
            return Ok(None);
        }
        match &self.ty {
            Some(ty) if !self.name.is_empty() => Ok(Some((&self.name, ty))),
            _ => Err(ContractViolation::IncompleteMember { ordinal: self.ordinal }.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name:    DeclName,
    #[serde(default)]
    pub doc:     Option<String>,
    pub members: Vec<OrdinalMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub name:     DeclName,
    #[serde(default)]
    pub doc:      Option<String>,
    pub members:  Vec<OrdinalMember>,
    #[serde(default)]
    pub flexible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name:   String,
    #[serde(rename = "type")]
    pub ty:     Type,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name:         String,
    pub ordinal:      u64,
    #[serde(default)]
    pub doc:          Option<String>,
    /// False for events.
    pub has_request:  bool,
    #[serde(default)]
    pub request:      Vec<Parameter>,
    /// False for one-way methods.
    pub has_response: bool,
    #[serde(default)]
    pub response:     Vec<Parameter>,
    /// Error domain of a two-way method.
    #[serde(default)]
    pub error:        Option<Type>,
}

impl Method {
    pub fn is_event(&self) -> bool {
        !self.has_request && self.has_response
    }

    pub fn is_two_way(&self) -> bool {
        self.has_request && self.has_response
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name:    DeclName,
    #[serde(default)]
    pub doc:     Option<String>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMember {
    pub name:     String,
    pub protocol: DeclName,
    #[serde(default)]
    pub doc:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name:    DeclName,
    #[serde(default)]
    pub doc:     Option<String>,
    pub members: Vec<ServiceMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Const(Const),
    Enum(Enum),
    Bits(Bits),
    Struct(Struct),
    Table(Table),
    Union(Union),
    Protocol(Protocol),
    Service(Service),
}

impl Declaration {
    pub fn name(&self) -> &DeclName {
        match self {
            Declaration::Const(decl) => &decl.name,
            Declaration::Enum(decl) => &decl.name,
            Declaration::Bits(decl) => &decl.name,
            Declaration::Struct(decl) => &decl.name,
            Declaration::Table(decl) => &decl.name,
            Declaration::Union(decl) => &decl.name,
            Declaration::Protocol(decl) => &decl.name,
            Declaration::Service(decl) => &decl.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Declaration::Const(_) => "const",
            Declaration::Enum(_) => "enum",
            Declaration::Bits(_) => "bits",
            Declaration::Struct(_) => "struct",
            Declaration::Table(_) => "table",
            Declaration::Union(_) => "union",
            Declaration::Protocol(_) => "protocol",
            Declaration::Service(_) => "service",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The library to generate.
    pub name:         LibraryName,
    /// Declarations of `name` and of every library it depends on.
    pub declarations: Vec<Declaration>,
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Schema, GenError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declarations belonging to the library being generated, in declared
    /// order.
    pub fn own_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |decl| decl.name().library == self.name)
    }
}
