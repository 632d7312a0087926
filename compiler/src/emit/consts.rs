use std::collections::BTreeSet;

use crate::error::{ContractViolation, GenError};
use crate::mapper::{primitive_type, TypeMapper};
use crate::names::{const_name, qualify};
use crate::types::{Const, Constant, DeclName, Declaration, PrimitiveSubtype, Type};
use crate::utils::doc_comment;

use super::enums::{integer_literal, variant_name};
use super::{collect_libraries, Emission, Fragment};

pub fn emit(mapper: &TypeMapper<'_>, decl: &Const) -> Result<Emission, GenError> {
    let (rust, value) = match &decl.ty {
        Type::Primitive { subtype } => (primitive_type(*subtype).to_string(), primitive_value(mapper, *subtype, &decl.value)?),
        Type::String { .. } => {
            let value = match &decl.value {
                Constant::Literal { value } => format!("{:?}", value),
                Constant::Identifier { identifier } => reference(mapper, identifier, Target::Value)?,
            };
            ("&str".to_string(), value)
        }
        Type::Identifier { identifier, nullable: false } => {
            let value = match &decl.value {
                Constant::Literal { value } => typed_literal(mapper, identifier, value)?,
                Constant::Identifier { identifier } => reference(mapper, identifier, Target::Value)?,
            };
            (mapper.decl_path(identifier), value)
        }
        _ => {
            return Err(ContractViolation::WrongKind {
                name:     decl.name.clone(),
                expected: "constant of primitive, string, enum or bits type",
            }
            .into())
        }
    };

    let mut libraries = BTreeSet::new();
    collect_libraries(&decl.ty, mapper.library(), &mut libraries);
    if let Constant::Identifier { identifier } = &decl.value {
        if &identifier.library != mapper.library() {
            libraries.insert(identifier.library.clone());
        }
    }

    let mut declarations = doc_comment(decl.doc.as_deref(), "");
    declarations.push_str(&format!("pub const {}: {} = {};\n", const_name(&decl.name.name), rust, value));
    let mut emission = Emission::domain(&decl.name, Fragment { declarations, codecs: String::new() });
    emission.domain_libraries = libraries;
    Ok(emission)
}

/// What a referenced enum or bits member should evaluate to.
#[derive(Clone, Copy)]
enum Target {
    /// The member itself.
    Value,
    /// The member's underlying primitive.
    Primitive,
}

fn reference(mapper: &TypeMapper<'_>, identifier: &DeclName, target: Target) -> Result<String, GenError> {
    let (decl_name, member) = identifier.split_member();
    let decl = mapper.table().resolve(&decl_name, &"constant")?;
    let path = match (decl, member) {
        (Declaration::Const(_), None) => return Ok(qualify(&decl_name, mapper.library(), &const_name(&decl_name.name))),
        (Declaration::Enum(_), Some(member)) => format!("{}::{}", mapper.decl_path(&decl_name), variant_name(member)),
        (Declaration::Bits(_), Some(member)) => format!("{}::{}", mapper.decl_path(&decl_name), const_name(member)),
        _ => return Err(ContractViolation::WrongKind { name: identifier.clone(), expected: "constant value" }.into()),
    };
    Ok(match (target, decl) {
        (Target::Primitive, Declaration::Enum(_)) => format!("{}.into_primitive()", path),
        (Target::Primitive, _) => format!("{}.bits()", path),
        (Target::Value, _) => path,
    })
}

fn primitive_value(mapper: &TypeMapper<'_>, subtype: PrimitiveSubtype, value: &Constant) -> Result<String, GenError> {
    let literal = match value {
        Constant::Literal { value } => value.trim(),
        Constant::Identifier { identifier } => return reference(mapper, identifier, Target::Primitive),
    };
    let invalid = || ContractViolation::InvalidLiteral { kind: primitive_type(subtype), value: literal.to_string() };
    match subtype {
        PrimitiveSubtype::Bool => match literal {
            "true" | "false" => Ok(literal.to_string()),
            _ => Err(invalid().into()),
        },
        PrimitiveSubtype::Float32 | PrimitiveSubtype::Float64 => {
            let parsed: f64 = literal.parse().map_err(|_| invalid())?;
            if !parsed.is_finite() {
                return Err(invalid().into());
            }
            if literal.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
                Ok(literal.to_string())
            } else {
                Ok(format!("{}.0", literal))
            }
        }
        _ => Ok(integer_literal(literal, subtype)?.to_string()),
    }
}

/// A literal written against an enum or bits type.
fn typed_literal(mapper: &TypeMapper<'_>, ty: &DeclName, literal: &str) -> Result<String, GenError> {
    let path = mapper.decl_path(ty);
    match mapper.table().resolve(ty, &"constant")? {
        Declaration::Enum(e) => {
            let wanted = integer_literal(literal, e.subtype)?;
            for member in &e.members {
                if integer_literal(&member.value, e.subtype)? == wanted {
                    return Ok(format!("{}::{}", path, variant_name(&member.name)));
                }
            }
            Err(ContractViolation::InvalidLiteral { kind: "enum member", value: literal.to_string() }.into())
        }
        Declaration::Bits(b) => {
            Ok(format!("{}::from_bits_allow_unknown({})", path, integer_literal(literal, b.subtype)?))
        }
        _ => Err(ContractViolation::WrongKind { name: ty.clone(), expected: "constant type" }.into()),
    }
}

#[cfg(test)]
mod tests {
    use crate::emit::test_support::emit_json;

    const SCHEMA: &str = r#"{"name": "demo", "declarations": [
        {"kind": "enum", "name": "demo/Color", "subtype": "uint8", "members": [{"name": "RED", "value": "1"}]},
        {"kind": "bits", "name": "demo/Access", "subtype": "uint8", "members": [{"name": "READ", "value": "1"}]},
        {"kind": "const", "name": "demo/MaxPoints", "doc": "Upper bound.", "type": {"kind": "primitive", "subtype": "uint32"},
         "value": {"kind": "literal", "value": "0x20"}},
        {"kind": "const", "name": "demo/SCALE", "type": {"kind": "primitive", "subtype": "float64"},
         "value": {"kind": "literal", "value": "2"}},
        {"kind": "const", "name": "demo/GREETING", "type": {"kind": "string"},
         "value": {"kind": "literal", "value": "say \"hi\""}},
        {"kind": "const", "name": "demo/DEFAULT_COLOR", "type": {"kind": "identifier", "identifier": "demo/Color"},
         "value": {"kind": "identifier", "identifier": "demo/Color.RED"}},
        {"kind": "const", "name": "demo/LITERAL_COLOR", "type": {"kind": "identifier", "identifier": "demo/Color"},
         "value": {"kind": "literal", "value": "1"}},
        {"kind": "const", "name": "demo/RAW_ACCESS", "type": {"kind": "primitive", "subtype": "uint8"},
         "value": {"kind": "identifier", "identifier": "demo/Access.READ"}},
        {"kind": "const", "name": "demo/REMOTE", "type": {"kind": "primitive", "subtype": "uint32"},
         "value": {"kind": "identifier", "identifier": "other/LIMIT"}},
        {"kind": "const", "name": "other/LIMIT", "type": {"kind": "primitive", "subtype": "uint32"},
         "value": {"kind": "literal", "value": "3"}}
    ]}"#;

    fn declaration(name: &str) -> String {
        emit_json(SCHEMA, name).domain.declarations
    }

    #[test]
    fn literals() {
        assert_eq!(declaration("MaxPoints"), "/// Upper bound.\npub const MAX_POINTS: u32 = 32;\n");
        assert_eq!(declaration("SCALE"), "pub const SCALE: f64 = 2.0;\n");
        assert_eq!(declaration("GREETING"), "pub const GREETING: &str = \"say \\\"hi\\\"\";\n");
        assert_eq!(declaration("LITERAL_COLOR"), "pub const LITERAL_COLOR: Color = Color::Red;\n");
    }

    #[test]
    fn references() {
        assert_eq!(declaration("DEFAULT_COLOR"), "pub const DEFAULT_COLOR: Color = Color::Red;\n");
        assert_eq!(declaration("RAW_ACCESS"), "pub const RAW_ACCESS: u8 = Access::READ.bits();\n");
        let remote = emit_json(SCHEMA, "REMOTE");
        assert_eq!(remote.domain.declarations, "pub const REMOTE: u32 = other::LIMIT;\n");
        assert_eq!(remote.domain_libraries.len(), 1);
    }
}
