use std::collections::BTreeSet;

use crate::error::GenError;
use crate::mapper::TypeMapper;
use crate::names::type_name;
use crate::types::Struct;

use super::{collect_libraries, struct_codec, struct_fields, struct_item, Emission, Fragment};

pub fn emit(mapper: &TypeMapper<'_>, decl: &Struct) -> Result<Emission, GenError> {
    let name = type_name(&decl.name.name);
    let (fields, shape) = struct_fields(
        mapper,
        decl.members.iter().map(|m| (m.name.as_str(), &m.ty, m.offset, m.doc.as_deref())),
    )?;

    let mut libraries = BTreeSet::new();
    for member in &decl.members {
        collect_libraries(&member.ty, mapper.library(), &mut libraries);
    }

    let mut emission = Emission::domain(
        &decl.name,
        Fragment {
            declarations: struct_item(&name, decl.doc.as_deref(), &fields),
            codecs:       struct_codec(&name, &fields, shape),
        },
    );
    emission.domain_libraries = libraries;
    Ok(emission)
}

#[cfg(test)]
mod tests {
    use crate::emit::test_support::emit_json;

    const SCHEMA: &str = r#"{"name": "demo", "declarations": [
        {"kind": "struct", "name": "demo/Point", "doc": "A point on the plane.", "members": [
            {"name": "x", "type": {"kind": "primitive", "subtype": "int32"}},
            {"name": "y", "type": {"kind": "primitive", "subtype": "int32"}}
        ]},
        {"kind": "struct", "name": "demo/Label", "members": [
            {"name": "flag", "type": {"kind": "primitive", "subtype": "bool"}},
            {"name": "text", "type": {"kind": "string", "max_len": 32}},
            {"name": "at", "type": {"kind": "identifier", "identifier": "demo/Point", "nullable": true}},
            {"name": "origin", "type": {"kind": "identifier", "identifier": "other/Origin"}}
        ]},
        {"kind": "struct", "name": "demo/Empty", "members": []},
        {"kind": "struct", "name": "other/Origin", "members": []}
    ]}"#;

    #[test]
    fn point_is_eight_bytes_with_fixed_offsets() {
        let emission = emit_json(SCHEMA, "Point");
        assert_eq!(
            emission.domain.declarations,
            "/// A point on the plane.\n\
             #[derive(Debug, Clone, PartialEq)]\n\
             pub struct Point {\n    pub x: i32,\n    pub y: i32,\n}\n"
        );
        let codecs = &emission.domain.codecs;
        assert!(codecs.contains("const INLINE_SIZE: usize = 8;"));
        assert!(codecs.contains("const INLINE_ALIGN: usize = 4;"));
        assert!(codecs.contains("::wiregen_wire::Encode::encode(&self.x, encoder, offset)?;"));
        assert!(codecs.contains("::wiregen_wire::Encode::encode(&self.y, encoder, offset + 4)?;"));
        assert!(codecs.contains("y: <i32 as ::wiregen_wire::Decode>::decode(decoder, offset + 4)?,"));
        assert!(codecs.contains("::wiregen_wire::NullableLayout::OutOfLine"));
        assert!(emission.bindings.is_empty());
        assert!(emission.domain_libraries.is_empty());
    }

    #[test]
    fn bounds_boxes_and_foreign_types() {
        let emission = emit_json(SCHEMA, "Label");
        let decl = &emission.domain.declarations;
        assert!(decl.contains("pub text: ::std::string::String,"));
        assert!(decl.contains("pub at: ::std::option::Option<::std::boxed::Box<Point>>,"));
        assert!(decl.contains("pub origin: other::Origin,"));

        let codecs = &emission.domain.codecs;
        assert!(codecs.contains("::wiregen_wire::check_bound(&self.text, 32)?;"));
        assert!(codecs.contains(
            "text: ::wiregen_wire::bounded(<::std::string::String as ::wiregen_wire::Decode>::decode(decoder, offset + 8)?, 32)?,"
        ));
        assert!(codecs.contains("const INLINE_SIZE: usize = 40;"));
        assert_eq!(emission.domain_libraries.iter().map(|l| l.as_str()).collect::<Vec<_>>(), vec!["other"]);
    }

    #[test]
    fn empty_struct() {
        let emission = emit_json(SCHEMA, "Empty");
        assert!(emission.domain.declarations.ends_with("pub struct Empty {}\n"));
        assert!(emission.domain.codecs.contains("const INLINE_SIZE: usize = 1;"));
        assert!(emission.domain.codecs.contains("Ok(Self {})"));
    }
}
