use std::collections::BTreeSet;

use crate::error::GenError;
use crate::layout::TABLE_SHAPE;
use crate::mapper::{TypeBinding, TypeMapper, OPTION, RUNTIME};
use crate::names::{member_name, type_name};
use crate::types::Table;
use crate::utils::doc_comment;

use super::{
    bounded, boxed_impl, collect_libraries, decode_signature, encode_bound_check, encode_signature, layout_impl,
    Emission, Fragment,
};

struct TableField {
    ordinal: u64,
    name:    String,
    binding: TypeBinding,
    doc:     Option<String>,
}

/// Tables become structs of optional fields. Unknown ordinals are skipped on
/// decode, so older readers accept newer writers.
pub fn emit(mapper: &TypeMapper<'_>, decl: &Table) -> Result<Emission, GenError> {
    let name = type_name(&decl.name.name);
    let mut fields = Vec::new();
    let mut libraries = BTreeSet::new();
    for member in &decl.members {
        if let Some((field, ty)) = member.field()? {
            collect_libraries(ty, mapper.library(), &mut libraries);
            fields.push(TableField {
                ordinal: member.ordinal,
                name:    member_name(field),
                binding: mapper.bind(ty)?,
                doc:     member.doc.clone(),
            });
        }
    }
    fields.sort_by_key(|f| f.ordinal);

    let mut emission = Emission::domain(
        &decl.name,
        Fragment {
            declarations: declaration(&name, decl.doc.as_deref(), &fields),
            codecs:       codec(&name, &fields),
        },
    );
    emission.domain_libraries = libraries;
    Ok(emission)
}

fn declaration(name: &str, doc: Option<&str>, fields: &[TableField]) -> String {
    let mut out = doc_comment(doc, "");
    out.push_str("#[derive(Debug, Clone, PartialEq, Default)]\n");
    if fields.is_empty() {
        out.push_str(&format!("pub struct {} {{}}\n", name));
        return out;
    }
    out.push_str(&format!("pub struct {} {{\n", name));
    for field in fields {
        out.push_str(&doc_comment(field.doc.as_deref(), "    "));
        out.push_str(&format!("    pub {}: {}<{}>,\n", field.name, OPTION, field.binding.rust));
    }
    out.push_str("}\n");
    out
}

fn codec(name: &str, fields: &[TableField]) -> String {
    let mut out = layout_impl(name, TABLE_SHAPE);

    out.push_str(&format!("\nimpl {}::Encode for {} {{\n", RUNTIME, name));
    out.push_str(&encode_signature());
    if fields.is_empty() {
        out.push_str("        let max_ordinal: u64 = 0;\n");
    } else {
        out.push_str("        let max_ordinal: u64 = ");
        for field in fields.iter().rev() {
            out.push_str(&format!("if self.{}.is_some() {{\n            {}\n        }} else ", field.name, field.ordinal));
        }
        out.push_str("{\n            0\n        };\n");
    }
    out.push_str(&format!(
        "        let envelopes = {}::encode_table_header(encoder, offset, max_ordinal)?;\n",
        RUNTIME
    ));
    for field in fields {
        out.push_str(&format!("        if let Some(value) = &self.{} {{\n", field.name));
        out.push_str(&encode_bound_check(&field.binding, "value", "            "));
        out.push_str(&format!(
            "            {}::encode_envelope(encoder, envelopes + {}, value)?;\n        }}\n",
            RUNTIME,
            (field.ordinal - 1) * 16,
        ));
    }
    out.push_str("        Ok(())\n    }\n}\n");

    out.push_str(&format!("\nimpl {}::Decode for {} {{\n", RUNTIME, name));
    out.push_str(&decode_signature());
    out.push_str(&format!("        let header = {}::TableHeader::decode(decoder, offset)?;\n", RUNTIME));
    out.push_str("        let mut value = Self::default();\n");
    out.push_str("        for ordinal in 1..=header.max_ordinal {\n");
    out.push_str("            let envelope = header.envelope(decoder, ordinal)?;\n");
    out.push_str("            if !envelope.is_present() {\n                continue;\n            }\n");
    out.push_str("            match ordinal {\n");
    for field in fields {
        let decode = format!(
            "{}::decode_envelope::<{}>(decoder, &envelope)?",
            RUNTIME, field.binding.rust
        );
        out.push_str(&format!(
            "                {} => value.{} = Some({}),\n",
            field.ordinal,
            field.name,
            bounded(&field.binding, decode),
        ));
    }
    out.push_str(&format!(
        "                _ => {{\n                    {}::skip_envelope(decoder, &envelope)?;\n                }}\n",
        RUNTIME
    ));
    out.push_str("            }\n        }\n        Ok(value)\n    }\n}\n");

    out.push('\n');
    out.push_str(&boxed_impl(name, "Table"));
    out
}

#[cfg(test)]
mod tests {
    use crate::emit::test_support::emit_json;

    const SCHEMA: &str = r#"{"name": "demo", "declarations": [
        {"kind": "table", "name": "demo/Settings", "members": [
            {"ordinal": 3, "name": "title", "type": {"kind": "string", "max_len": 16}},
            {"ordinal": 1, "name": "volume", "type": {"kind": "primitive", "subtype": "uint8"}},
            {"ordinal": 2, "reserved": true}
        ]},
        {"kind": "table", "name": "demo/Nothing", "members": []}
    ]}"#;

    #[test]
    fn fields_are_optional_and_ordered_by_ordinal() {
        let emission = emit_json(SCHEMA, "Settings");
        let decl = &emission.domain.declarations;
        assert!(decl.starts_with("#[derive(Debug, Clone, PartialEq, Default)]\npub struct Settings {\n"));
        let volume = decl.find("pub volume: ::std::option::Option<u8>,").unwrap();
        let title = decl.find("pub title: ::std::option::Option<::std::string::String>,").unwrap();
        assert!(volume < title);
    }

    #[test]
    fn envelopes_by_ordinal_and_unknowns_skipped() {
        let codecs = emit_json(SCHEMA, "Settings").domain.codecs;
        assert!(codecs.contains("const INLINE_SIZE: usize = 16;"));
        assert!(codecs.contains("let max_ordinal: u64 = if self.title.is_some() {\n            3\n        } else if self.volume.is_some() {"));
        assert!(codecs.contains("::wiregen_wire::encode_envelope(encoder, envelopes + 0, value)?;"));
        assert!(codecs.contains("::wiregen_wire::check_bound(value, 16)?;"));
        assert!(codecs.contains("::wiregen_wire::encode_envelope(encoder, envelopes + 32, value)?;"));
        assert!(codecs.contains("1 => value.volume = Some(::wiregen_wire::decode_envelope::<u8>(decoder, &envelope)?),"));
        assert!(codecs.contains("::wiregen_wire::skip_envelope(decoder, &envelope)?;"));
        assert!(codecs.contains("::wiregen_wire::NullableLayout::Table"));
    }

    #[test]
    fn empty_table() {
        let emission = emit_json(SCHEMA, "Nothing");
        assert!(emission.domain.declarations.ends_with("pub struct Nothing {}\n"));
        assert!(emission.domain.codecs.contains("let max_ordinal: u64 = 0;"));
    }
}
