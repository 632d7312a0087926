use crate::error::{ContractViolation, GenError};
use crate::layout::primitive_shape;
use crate::mapper::{primitive_type, OPTION, RUNTIME};
use crate::names::{const_name, type_name};
use crate::types::{Bits, PrimitiveSubtype};
use crate::utils::doc_comment;

use super::enums::integer_literal;
use super::{decode_signature, encode_signature, layout_impl, Emission, Fragment};

/// Associated constant holding every named bit. Member constants never start
/// with an underscore, so the two cannot collide.
const MASK: &str = "__MASK";

const OPERATORS: [(&str, &str, &str); 3] = [("BitOr", "bitor", "|"), ("BitAnd", "bitand", "&"), ("BitXor", "bitxor", "^")];

pub fn emit(decl: &Bits) -> Result<Emission, GenError> {
    let unsigned = matches!(
        decl.subtype,
        PrimitiveSubtype::Uint8 | PrimitiveSubtype::Uint16 | PrimitiveSubtype::Uint32 | PrimitiveSubtype::Uint64
    );
    if !unsigned {
        return Err(ContractViolation::InvalidLiteral {
            kind:  "bits subtype",
            value: primitive_type(decl.subtype).to_string(),
        }
        .into());
    }
    let name = type_name(&decl.name.name);
    let prim = primitive_type(decl.subtype);
    let mut mask: i128 = 0;
    let mut members = Vec::with_capacity(decl.members.len());
    for member in &decl.members {
        let value = integer_literal(&member.value, decl.subtype)?;
        mask |= value;
        members.push((const_name(&member.name), value, member.doc.as_deref()));
    }

    let mut declarations = doc_comment(decl.doc.as_deref(), "");
    declarations.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]\n");
    declarations.push_str(&format!("pub struct {} {{\n    bits: {},\n}}\n", name, prim));

    let mut out = format!("impl {} {{\n", name);
    for (member, value, doc) in &members {
        out.push_str(&doc_comment(*doc, "    "));
        out.push_str(&format!("    pub const {}: Self = Self {{ bits: {} }};\n", member, value));
    }
    out.push_str("    /// Every bit a member names.\n    #[doc(hidden)]\n");
    out.push_str(&format!("    pub const {}: {} = {};\n\n", MASK, prim, mask));

    let consts = [
        ("empty() -> Self".to_string(), "Self { bits: 0 }".to_string()),
        ("all() -> Self".to_string(), "Self { bits: Self::__MASK }".to_string()),
        (format!("bits(self) -> {}", prim), "self.bits".to_string()),
        (
            format!("from_bits(bits: {}) -> {}<Self>", prim, OPTION),
            "if bits & !Self::__MASK == 0 {\n            Some(Self { bits })\n        } else {\n            None\n        }".to_string(),
        ),
        (format!("from_bits_truncate(bits: {}) -> Self", prim), "Self { bits: bits & Self::__MASK }".to_string()),
        (format!("from_bits_allow_unknown(bits: {}) -> Self", prim), "Self { bits }".to_string()),
        ("is_empty(self) -> bool".to_string(), "self.bits == 0".to_string()),
        ("contains(self, other: Self) -> bool".to_string(), "self.bits & other.bits == other.bits".to_string()),
        ("intersects(self, other: Self) -> bool".to_string(), "self.bits & other.bits != 0".to_string()),
        ("has_unknown_bits(self) -> bool".to_string(), "self.bits & !Self::__MASK != 0".to_string()),
        (format!("get_unknown_bits(self) -> {}", prim), "self.bits & !Self::__MASK".to_string()),
    ];
    for (signature, body) in consts {
        out.push_str(&format!("    pub const fn {} {{\n        {}\n    }}\n\n", signature, body));
    }
    let mutators = [("insert", "|= other.bits"), ("remove", "&= !other.bits"), ("toggle", "^= other.bits")];
    let mutators: Vec<String> = mutators
        .iter()
        .map(|(method, update)| {
            format!("    pub fn {}(&mut self, other: Self) {{\n        self.bits {};\n    }}\n", method, update)
        })
        .collect();
    out.push_str(&mutators.join("\n"));
    out.push_str("}\n");

    for (trait_name, method, op) in OPERATORS {
        out.push_str(&format!(
            "\nimpl ::std::ops::{t} for {n} {{\n    type Output = Self;\n\n    fn {m}(self, rhs: Self) -> Self {{\n        Self {{ bits: self.bits {op} rhs.bits }}\n    }}\n}}\n",
            t = trait_name,
            n = name,
            m = method,
            op = op,
        ));
        out.push_str(&format!(
            "\nimpl ::std::ops::{t}Assign for {n} {{\n    fn {m}_assign(&mut self, rhs: Self) {{\n        self.bits {op}= rhs.bits;\n    }}\n}}\n",
            t = trait_name,
            n = name,
            m = method,
            op = op,
        ));
    }
    out.push_str(&format!(
        "\nimpl ::std::ops::Sub for {n} {{\n    type Output = Self;\n\n    fn sub(self, rhs: Self) -> Self {{\n        Self {{ bits: self.bits & !rhs.bits }}\n    }}\n}}\n",
        n = name
    ));
    out.push_str(&format!(
        "\nimpl ::std::ops::SubAssign for {n} {{\n    fn sub_assign(&mut self, rhs: Self) {{\n        self.bits &= !rhs.bits;\n    }}\n}}\n",
        n = name
    ));
    out.push_str(&format!(
        "\nimpl ::std::ops::Not for {n} {{\n    type Output = Self;\n\n    fn not(self) -> Self {{\n        Self {{ bits: !self.bits & Self::__MASK }}\n    }}\n}}\n\n",
        n = name
    ));

    out.push_str(&layout_impl(&name, primitive_shape(decl.subtype)));
    out.push_str(&format!("\nimpl {}::Encode for {} {{\n", RUNTIME, name));
    out.push_str(&encode_signature());
    out.push_str(&format!("        {}::Encode::encode(&self.bits, encoder, offset)\n", RUNTIME));
    out.push_str("    }\n}\n");

    out.push_str(&format!("\nimpl {}::Decode for {} {{\n", RUNTIME, name));
    out.push_str(&decode_signature());
    out.push_str(&format!("        let bits = <{} as {}::Decode>::decode(decoder, offset)?;\n", prim, RUNTIME));
    if decl.flexible {
        out.push_str("        Ok(Self::from_bits_allow_unknown(bits))\n");
    } else {
        out.push_str(&format!(
            "        Self::from_bits(bits).ok_or({}::Error::UnknownBits {{ type_name: {:?}, bits: bits as u64 }})\n",
            RUNTIME,
            decl.name.to_string(),
        ));
    }
    out.push_str("    }\n}\n");

    Ok(Emission::domain(&decl.name, Fragment { declarations, codecs: out }))
}

#[cfg(test)]
mod tests {
    use crate::emit::test_support::emit_json;

    const SCHEMA: &str = r#"{"name": "demo", "declarations": [
        {"kind": "bits", "name": "demo/Access", "subtype": "uint32", "members": [
            {"name": "read", "value": "1"},
            {"name": "WRITE", "value": "2"},
            {"name": "EXECUTE", "value": "8"}
        ]},
        {"kind": "bits", "name": "demo/Open", "subtype": "uint8", "flexible": true, "members": []},
        {"kind": "bits", "name": "demo/Signed", "subtype": "int8", "members": []}
    ]}"#;

    #[test]
    fn members_and_mask() {
        let emission = emit_json(SCHEMA, "Access");
        assert!(emission.domain.declarations.ends_with("pub struct Access {\n    bits: u32,\n}\n"));
        let codecs = &emission.domain.codecs;
        assert!(codecs.contains("pub const READ: Self = Self { bits: 1 };"));
        assert!(codecs.contains("pub const EXECUTE: Self = Self { bits: 8 };"));
        assert!(codecs.contains("pub const __MASK: u32 = 11;"));
        assert!(codecs.contains("pub const fn from_bits(bits: u32) -> ::std::option::Option<Self> {"));
        assert!(codecs.contains("self.bits &= !other.bits;"));
        assert!(codecs.contains("self.bits |= other.bits;"));
        assert!(codecs.contains("impl ::std::ops::BitXorAssign for Access {"));
        assert!(codecs.contains("UnknownBits { type_name: \"demo/Access\", bits: bits as u64 }"));
    }

    #[test]
    fn flexible_bits_accept_anything() {
        let codecs = emit_json(SCHEMA, "Open").domain.codecs;
        assert!(codecs.contains("pub const __MASK: u8 = 0;"));
        assert!(codecs.contains("Ok(Self::from_bits_allow_unknown(bits))"));
    }

    #[test]
    fn members_named_like_the_mask() {
        let schema = r#"{"name": "demo", "declarations": [
            {"kind": "bits", "name": "demo/Filter", "subtype": "uint16", "members": [
                {"name": "mask", "value": "1"},
                {"name": "__all", "value": "2"}
            ]}
        ]}"#;
        let codecs = emit_json(schema, "Filter").domain.codecs;
        assert!(codecs.contains("pub const MASK: Self = Self { bits: 1 };"));
        assert!(codecs.contains("pub const ALL: Self = Self { bits: 2 };"));
        assert_eq!(codecs.matches("pub const MASK:").count(), 1);
        assert_eq!(codecs.matches("pub const __MASK: u16 = 3;").count(), 1);
        assert!(codecs.contains("Self { bits: bits & Self::__MASK }"));
    }

    #[test]
    fn signed_bits_are_rejected() {
        let schema = crate::types::Schema::from_json(SCHEMA).unwrap();
        let crate::types::Declaration::Bits(signed) = &schema.declarations[2] else {
            panic!("expected bits");
        };
        assert!(super::emit(signed).unwrap_err().is_schema_error());
    }
}
