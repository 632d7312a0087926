//! Per-declaration code emission.
//!
//! Every emitter returns an [`Emission`]: Rust text split into a domain
//! fragment (types and their codecs) and a bindings fragment (protocol
//! machinery), plus the test-base text for protocols.

use std::collections::BTreeSet;

use crate::error::{ContractViolation, GenError};
use crate::layout::{lay_out, Shape};
use crate::mapper::{TypeBinding, TypeMapper, RUNTIME};
use crate::types::{DeclName, Declaration, LibraryName, Type};
use crate::utils::doc_comment;

pub mod bits;
pub mod consts;
pub mod enums;
pub mod protocols;
pub mod services;
pub mod structs;
pub mod tables;
pub mod unions;

pub(crate) const DATA_DERIVES: &str = "#[derive(Debug, Clone, PartialEq)]";
pub(crate) const RESULT: &str = "::std::result::Result";

/// Declaration text destined for the header and codec text destined for the
/// source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub declarations: String,
    pub codecs:       String,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.codecs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub name:              DeclName,
    pub domain:            Fragment,
    pub bindings:          Fragment,
    pub test_base:         String,
    /// Other libraries the domain fragment refers to.
    pub domain_libraries:  BTreeSet<LibraryName>,
    /// Other libraries only the bindings fragment refers to.
    pub binding_libraries: BTreeSet<LibraryName>,
}

impl Emission {
    fn domain(name: &DeclName, domain: Fragment) -> Emission {
        Emission {
            name: name.clone(),
            domain,
            bindings: Fragment::default(),
            test_base: String::new(),
            domain_libraries: BTreeSet::new(),
            binding_libraries: BTreeSet::new(),
        }
    }
}

/// Emits one declaration of the library being generated.
pub fn emit_declaration(mapper: &TypeMapper<'_>, decl: &Declaration) -> Result<Emission, GenError> {
    let mut emission = match decl {
        Declaration::Const(c) => consts::emit(mapper, c)?,
        Declaration::Enum(e) => enums::emit(e)?,
        Declaration::Bits(b) => bits::emit(b)?,
        Declaration::Struct(s) => structs::emit(mapper, s)?,
        Declaration::Table(t) => tables::emit(mapper, t)?,
        Declaration::Union(u) => unions::emit(mapper, u)?,
        Declaration::Protocol(p) => protocols::emit(mapper, p)?,
        Declaration::Service(s) => services::emit(mapper, s)?,
    };
    let domain = emission.domain_libraries.clone();
    emission.binding_libraries.retain(|library| !domain.contains(library));
    Ok(emission)
}

/// Adds every library other than `current` that `ty` refers to.
pub(crate) fn collect_libraries(ty: &Type, current: &LibraryName, into: &mut BTreeSet<LibraryName>) {
    match ty {
        Type::Vector { element, .. } | Type::Array { element, .. } => collect_libraries(element, current, into),
        Type::Request { protocol: name, .. } | Type::Identifier { identifier: name, .. } => {
            if &name.library != current {
                into.insert(name.library.clone());
            }
        }
        Type::Primitive { .. } | Type::String { .. } | Type::Handle { .. } => {}
    }
}

/// A struct field ready for emission.
#[derive(Debug, Clone)]
pub(crate) struct FieldSpec {
    pub name:    String,
    pub binding: TypeBinding,
    pub offset:  u32,
    pub doc:     Option<String>,
}

/// Binds and lays out struct-like members given as `(name, type, declared
/// offset, doc)`.
pub(crate) fn struct_fields<'m>(
    mapper: &TypeMapper<'_>,
    members: impl IntoIterator<Item = (&'m str, &'m Type, Option<u32>, Option<&'m str>)>,
) -> Result<(Vec<FieldSpec>, Shape), GenError> {
    let mut bound = Vec::new();
    for (name, ty, offset, doc) in members {
        crate::names::check_identifier(name)?;
        bound.push((crate::names::member_name(name), mapper.bind(ty)?, offset, doc.map(str::to_string)));
    }
    let layout = lay_out(bound.iter().map(|(_, binding, offset, _)| (binding.shape, *offset))).ok_or_else(|| {
        let names: Vec<&str> = bound.iter().map(|(name, ..)| name.as_str()).collect();
        ContractViolation::LayoutOverflow(format!("{{{}}}", names.join(", ")))
    })?;
    let fields = bound
        .into_iter()
        .zip(layout.offsets)
        .map(|((name, binding, _, doc), offset)| FieldSpec { name, binding, offset, doc })
        .collect();
    Ok((fields, layout.shape))
}

pub(crate) fn offset_expr(base: &str, offset: u32) -> String {
    if offset == 0 {
        base.to_string()
    } else {
        format!("{} + {}", base, offset)
    }
}

/// `<T as Decode>::decode(decoder, at)?`, with a bound check when the type
/// has one.
pub(crate) fn decode_expr(binding: &TypeBinding, at: &str) -> String {
    let decode = format!("<{} as {}::Decode>::decode(decoder, {})?", binding.rust, RUNTIME, at);
    bounded(binding, decode)
}

/// Wraps an expression producing a value of `binding` in a bound check.
pub(crate) fn bounded(binding: &TypeBinding, expr: String) -> String {
    match binding.max_len {
        Some(max) => format!("{}::bounded({}, {})?", RUNTIME, expr, max),
        None => expr,
    }
}

/// `check_bound(value, max)?;` for bounded types, nothing otherwise.
pub(crate) fn encode_bound_check(binding: &TypeBinding, value: &str, indent: &str) -> String {
    match binding.max_len {
        Some(max) => format!("{}{}::check_bound({}, {})?;\n", indent, RUNTIME, value, max),
        None => String::new(),
    }
}

pub(crate) fn layout_impl(type_name: &str, shape: Shape) -> String {
    format!(
        "impl {rt}::Layout for {name} {{\n    const INLINE_SIZE: usize = {size};\n    const INLINE_ALIGN: usize = {align};\n}}\n",
        rt = RUNTIME,
        name = type_name,
        size = shape.size,
        align = shape.alignment,
    )
}

pub(crate) fn encode_signature() -> String {
    format!(
        "    fn encode(&self, encoder: &mut {rt}::Encoder, offset: usize) -> {res}<(), {rt}::Error> {{\n",
        rt = RUNTIME,
        res = RESULT,
    )
}

pub(crate) fn decode_signature() -> String {
    format!(
        "    fn decode(decoder: &mut {rt}::Decoder<'_>, offset: usize) -> {res}<Self, {rt}::Error> {{\n",
        rt = RUNTIME,
        res = RESULT,
    )
}

pub(crate) fn boxed_impl(type_name: &str, layout: &str) -> String {
    format!(
        "impl {rt}::Boxed for {name} {{\n    const NULLABLE: {rt}::NullableLayout = {rt}::NullableLayout::{layout};\n}}\n",
        rt = RUNTIME,
        name = type_name,
        layout = layout,
    )
}

/// `pub struct Name { pub field: T, ... }`.
pub(crate) fn struct_item(type_name: &str, doc: Option<&str>, fields: &[FieldSpec]) -> String {
    let mut out = doc_comment(doc, "");
    out.push_str(DATA_DERIVES);
    out.push('\n');
    if fields.is_empty() {
        out.push_str(&format!("pub struct {} {{}}\n", type_name));
        return out;
    }
    out.push_str(&format!("pub struct {} {{\n", type_name));
    for field in fields {
        out.push_str(&doc_comment(field.doc.as_deref(), "    "));
        out.push_str(&format!("    pub {}: {},\n", field.name, field.binding.rust));
    }
    out.push_str("}\n");
    out
}

/// Layout, encode and decode impls writing each field at its offset.
pub(crate) fn struct_codec(type_name: &str, fields: &[FieldSpec], shape: Shape) -> String {
    let mut out = layout_impl(type_name, shape);

    out.push_str(&format!("\nimpl {}::Encode for {} {{\n", RUNTIME, type_name));
    out.push_str(&encode_signature());
    for field in fields {
        let value = format!("&self.{}", field.name);
        out.push_str(&encode_bound_check(&field.binding, &value, "        "));
        out.push_str(&format!(
            "        {}::Encode::encode({}, encoder, {})?;\n",
            RUNTIME,
            value,
            offset_expr("offset", field.offset),
        ));
    }
    out.push_str("        Ok(())\n    }\n}\n");

    out.push_str(&format!("\nimpl {}::Decode for {} {{\n", RUNTIME, type_name));
    out.push_str(&decode_signature());
    if fields.is_empty() {
        out.push_str("        Ok(Self {})\n");
    } else {
        out.push_str("        Ok(Self {\n");
        for field in fields {
            out.push_str(&format!(
                "            {}: {},\n",
                field.name,
                decode_expr(&field.binding, &offset_expr("offset", field.offset)),
            ));
        }
        out.push_str("        })\n");
    }
    out.push_str("    }\n}\n");

    out.push('\n');
    out.push_str(&boxed_impl(type_name, "OutOfLine"));
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::layout::Layouts;
    use crate::mapper::TypeMapper;
    use crate::types::{Declaration, Schema};
    use crate::verifier::verify_schema;

    use super::{emit_declaration, Emission};

    /// Emits the declaration named `name` from a JSON schema.
    pub fn emit_json(json: &str, name: &str) -> Emission {
        let schema = Schema::from_json(json).unwrap();
        let table = verify_schema(&schema).unwrap();
        let layouts = Layouts::compute(&table).unwrap();
        let mapper = TypeMapper::new(&table, &layouts, &schema.name);
        let decl: &Declaration = schema.declarations.iter().find(|d| d.name().name == name).unwrap();
        emit_declaration(&mapper, decl).unwrap()
    }
}
