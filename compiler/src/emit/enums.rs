use crate::error::{ContractViolation, GenError};
use crate::layout::primitive_shape;
use crate::mapper::{primitive_type, OPTION, RUNTIME};
use crate::names::{escape_keyword, to_pascal_case, type_name};
use crate::types::{Enum, PrimitiveSubtype};
use crate::utils::doc_comment;

use super::{decode_signature, encode_signature, layout_impl, Emission, Fragment};

/// Parses an integer literal (decimal, or hex with `0x`) and checks that it
/// fits `subtype`.
pub(crate) fn integer_literal(value: &str, subtype: PrimitiveSubtype) -> Result<i128, GenError> {
    let invalid = || ContractViolation::InvalidLiteral { kind: primitive_type(subtype), value: value.to_string() };
    let text = value.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => digits.parse::<i128>(),
    }
    .map_err(|_| invalid())?;
    let parsed = if negative { -magnitude } else { magnitude };

    let (min, max): (i128, i128) = match subtype {
        PrimitiveSubtype::Int8 => (i8::MIN.into(), i8::MAX.into()),
        PrimitiveSubtype::Int16 => (i16::MIN.into(), i16::MAX.into()),
        PrimitiveSubtype::Int32 => (i32::MIN.into(), i32::MAX.into()),
        PrimitiveSubtype::Int64 => (i64::MIN.into(), i64::MAX.into()),
        PrimitiveSubtype::Uint8 => (0, u8::MAX.into()),
        PrimitiveSubtype::Uint16 => (0, u16::MAX.into()),
        PrimitiveSubtype::Uint32 => (0, u32::MAX.into()),
        PrimitiveSubtype::Uint64 => (0, u64::MAX.into()),
        PrimitiveSubtype::Bool | PrimitiveSubtype::Float32 | PrimitiveSubtype::Float64 => return Err(invalid().into()),
    };
    if parsed < min || parsed > max {
        return Err(invalid().into());
    }
    Ok(parsed)
}

pub(crate) fn variant_name(member: &str) -> String {
    escape_keyword(&to_pascal_case(member))
}

pub fn emit(decl: &Enum) -> Result<Emission, GenError> {
    let name = type_name(&decl.name.name);
    let prim = primitive_type(decl.subtype);
    let mut members = Vec::with_capacity(decl.members.len());
    for member in &decl.members {
        members.push((variant_name(&member.name), integer_literal(&member.value, decl.subtype)?, member.doc.as_deref()));
    }

    let mut out = doc_comment(decl.doc.as_deref(), "");
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]\n");
    out.push_str(&format!("pub enum {} {{\n", name));
    for (variant, _, doc) in &members {
        out.push_str(&doc_comment(*doc, "    "));
        out.push_str(&format!("    {},\n", variant));
    }
    if decl.flexible {
        out.push_str(&format!("    #[doc(hidden)]\n    __Unknown({}),\n", prim));
    }
    out.push_str("}\n");
    let declarations = out;

    let mut out = format!("impl {} {{\n", name);
    out.push_str(&format!("    pub fn from_primitive(prim: {}) -> {}<Self> {{\n", prim, OPTION));
    out.push_str("        match prim {\n");
    for (variant, value, _) in &members {
        out.push_str(&format!("            {} => Some(Self::{}),\n", value, variant));
    }
    out.push_str("            _ => None,\n        }\n    }\n\n");

    if decl.flexible {
        out.push_str(&format!("    pub fn from_primitive_allow_unknown(prim: {}) -> Self {{\n", prim));
        out.push_str("        match Self::from_primitive(prim) {\n");
        out.push_str("            Some(value) => value,\n            None => Self::__Unknown(prim),\n        }\n    }\n\n");
    }

    out.push_str(&format!("    pub const fn into_primitive(self) -> {} {{\n", prim));
    if members.is_empty() && !decl.flexible {
        out.push_str("        match self {}\n");
    } else {
        out.push_str("        match self {\n");
        for (variant, value, _) in &members {
            out.push_str(&format!("            Self::{} => {},\n", variant, value));
        }
        if decl.flexible {
            out.push_str("            Self::__Unknown(prim) => prim,\n");
        }
        out.push_str("        }\n");
    }
    out.push_str("    }\n");

    if decl.flexible {
        out.push_str("\n    pub fn is_unknown(&self) -> bool {\n");
        out.push_str("        matches!(self, Self::__Unknown(_))\n    }\n");
    }
    out.push_str("}\n\n");

    out.push_str(&layout_impl(&name, primitive_shape(decl.subtype)));
    out.push_str(&format!("\nimpl {}::Encode for {} {{\n", RUNTIME, name));
    out.push_str(&encode_signature());
    out.push_str(&format!("        {}::Encode::encode(&self.into_primitive(), encoder, offset)\n", RUNTIME));
    out.push_str("    }\n}\n");

    out.push_str(&format!("\nimpl {}::Decode for {} {{\n", RUNTIME, name));
    out.push_str(&decode_signature());
    out.push_str(&format!("        let prim = <{} as {}::Decode>::decode(decoder, offset)?;\n", prim, RUNTIME));
    if decl.flexible {
        out.push_str("        Ok(Self::from_primitive_allow_unknown(prim))\n");
    } else {
        out.push_str(&format!(
            "        Self::from_primitive(prim).ok_or({}::Error::UnknownEnumValue {{ type_name: {:?}, value: prim as u64 }})\n",
            RUNTIME,
            decl.name.to_string(),
        ));
    }
    out.push_str("    }\n}\n");

    Ok(Emission::domain(&decl.name, Fragment { declarations, codecs: out }))
}
