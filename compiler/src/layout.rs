//! Inline sizes and alignments of wire types.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{ContractViolation, GenError};
use crate::types::{DeclName, Declaration, PrimitiveSubtype, Type};
use crate::verifier::DeclTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape {
    pub size:      u32,
    pub alignment: u32,
}

impl Shape {
    pub const fn new(size: u32, alignment: u32) -> Shape {
        Shape { size, alignment }
    }
}

/// Count and presence marker.
pub const SEQUENCE_SHAPE: Shape = Shape::new(16, 8);
/// Presence marker of an out-of-line struct.
pub const POINTER_SHAPE: Shape = Shape::new(8, 8);
pub const HANDLE_SHAPE: Shape = Shape::new(4, 4);
/// Vector of envelopes.
pub const TABLE_SHAPE: Shape = Shape::new(16, 8);
/// Ordinal and envelope.
pub const UNION_SHAPE: Shape = Shape::new(24, 8);

pub fn primitive_shape(subtype: PrimitiveSubtype) -> Shape {
    let size = match subtype {
        PrimitiveSubtype::Bool | PrimitiveSubtype::Int8 | PrimitiveSubtype::Uint8 => 1,
        PrimitiveSubtype::Int16 | PrimitiveSubtype::Uint16 => 2,
        PrimitiveSubtype::Int32 | PrimitiveSubtype::Uint32 | PrimitiveSubtype::Float32 => 4,
        PrimitiveSubtype::Int64 | PrimitiveSubtype::Uint64 | PrimitiveSubtype::Float64 => 8,
    };
    Shape::new(size, size)
}

fn align_to(value: u32, alignment: u32) -> Option<u32> {
    Some(value.checked_add(alignment - 1)? / alignment * alignment)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructLayout {
    #[serde(flatten)]
    pub shape:   Shape,
    /// Byte offset of each member, in declared order.
    pub offsets: Vec<u32>,
}

/// Lays out members in order: each starts at its declared offset, or at the
/// cursor rounded up to its alignment. An empty struct occupies one byte.
/// Returns `None` when the struct would be 4 GiB or larger.
pub fn lay_out(members: impl IntoIterator<Item = (Shape, Option<u32>)>) -> Option<StructLayout> {
    let mut offsets = Vec::new();
    let mut cursor = 0u32;
    let mut alignment = 1;
    for (shape, declared) in members {
        let offset = match declared {
            Some(offset) => offset,
            None => align_to(cursor, shape.alignment)?,
        };
        offsets.push(offset);
        cursor = cursor.max(offset.checked_add(shape.size)?);
        alignment = alignment.max(shape.alignment);
    }
    let size = if offsets.is_empty() { 1 } else { align_to(cursor, alignment)? };
    Some(StructLayout { shape: Shape::new(size, alignment), offsets })
}

/// Layout of every struct in the schema, dependency libraries included.
#[derive(Debug, Default, Serialize)]
pub struct Layouts {
    structs: BTreeMap<DeclName, StructLayout>,
}

impl Layouts {
    /// Computes all struct layouts. A struct that contains itself by value,
    /// directly or through other structs and arrays, is a contract violation.
    pub fn compute(table: &DeclTable<'_>) -> Result<Layouts, GenError> {
        let mut builder = Builder { table, done: HashMap::new(), visiting: Vec::new() };
        for decl in table.iter() {
            if let Declaration::Struct(s) = decl {
                builder.struct_layout(&s.name)?;
            }
        }
        Ok(Layouts { structs: builder.done.into_iter().collect() })
    }

    pub fn get(&self, name: &DeclName) -> Option<&StructLayout> {
        self.structs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeclName, &StructLayout)> {
        self.structs.iter()
    }

    /// Shape of `ty` once every struct layout is known.
    pub fn shape_of(&self, ty: &Type, table: &DeclTable<'_>) -> Result<Shape, GenError> {
        type_shape(ty, table, &mut |name| match self.get(name) {
            Some(layout) => Ok(layout.shape),
            None => Err(ContractViolation::UnresolvedType {
                name: name.to_string(),
                from: "struct layout".to_string(),
            }
            .into()),
        })
    }
}

struct Builder<'t, 'a> {
    table:    &'t DeclTable<'a>,
    done:     HashMap<DeclName, StructLayout>,
    visiting: Vec<DeclName>,
}

impl Builder<'_, '_> {
    fn struct_layout(&mut self, name: &DeclName) -> Result<Shape, GenError> {
        if let Some(layout) = self.done.get(name) {
            return Ok(layout.shape);
        }
        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            let cycle: Vec<String> = self.visiting[start..].iter().map(|n| n.to_string()).collect();
            return Err(ContractViolation::LayoutCycle(cycle.join(" -> ")).into());
        }
        let Some(Declaration::Struct(decl)) = self.table.get(name) else {
            return Err(ContractViolation::WrongKind { name: name.clone(), expected: "struct" }.into());
        };

        self.visiting.push(name.clone());
        let mut members = Vec::with_capacity(decl.members.len());
        for member in &decl.members {
            let table = self.table;
            let shape = type_shape(&member.ty, table, &mut |n| self.struct_layout(n))?;
            members.push((shape, member.offset));
        }
        self.visiting.pop();

        let layout = lay_out(members).ok_or_else(|| ContractViolation::LayoutOverflow(name.to_string()))?;
        let shape = layout.shape;
        self.done.insert(name.clone(), layout);
        Ok(shape)
    }
}

fn type_shape(
    ty: &Type,
    table: &DeclTable<'_>,
    struct_shape: &mut dyn FnMut(&DeclName) -> Result<Shape, GenError>,
) -> Result<Shape, GenError> {
    match ty {
        Type::Primitive { subtype } => Ok(primitive_shape(*subtype)),
        Type::String { .. } | Type::Vector { .. } => Ok(SEQUENCE_SHAPE),
        Type::Array { element, len } => {
            let element = type_shape(element, table, struct_shape)?;
            match element.size.checked_mul(*len) {
                Some(size) => Ok(Shape::new(size, element.alignment)),
                None => Err(ContractViolation::LayoutOverflow(format!("an array of {} elements", len)).into()),
            }
        }
        Type::Handle { .. } | Type::Request { .. } => Ok(HANDLE_SHAPE),
        Type::Identifier { identifier, nullable } => {
            match (table.resolve(identifier, &"type shape")?, nullable) {
                (Declaration::Struct(_), false) => struct_shape(identifier),
                (Declaration::Struct(_), true) => Ok(POINTER_SHAPE),
                (Declaration::Table(_), _) => Ok(TABLE_SHAPE),
                (Declaration::Union(_), _) => Ok(UNION_SHAPE),
                (Declaration::Enum(e), false) => Ok(primitive_shape(e.subtype)),
                (Declaration::Bits(b), false) => Ok(primitive_shape(b.subtype)),
                (Declaration::Enum(_) | Declaration::Bits(_), true) => {
                    Err(ContractViolation::NotNullable("enum or bits").into())
                }
                (Declaration::Protocol(_), _) => Ok(HANDLE_SHAPE),
                (Declaration::Const(_) | Declaration::Service(_), _) => Err(ContractViolation::WrongKind {
                    name:     identifier.clone(),
                    expected: "type",
                }
                .into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Schema;
    use crate::verifier::verify_schema;

    fn layouts(json: &str) -> Result<Layouts, GenError> {
        let schema = Schema::from_json(json).unwrap();
        let table = verify_schema(&schema).unwrap();
        Layouts::compute(&table)
    }

    #[test]
    fn natural_layout_with_padding() {
        let layout = lay_out([
            (primitive_shape(PrimitiveSubtype::Uint8), None),
            (primitive_shape(PrimitiveSubtype::Uint64), None),
            (primitive_shape(PrimitiveSubtype::Uint16), None),
        ])
        .unwrap();
        assert_eq!(layout.offsets, vec![0, 8, 16]);
        assert_eq!(layout.shape, Shape::new(24, 8));
    }

    #[test]
    fn declared_offsets_win() {
        let layout = lay_out([
            (primitive_shape(PrimitiveSubtype::Uint64), Some(0)),
            (primitive_shape(PrimitiveSubtype::Uint64), Some(8)),
            (primitive_shape(PrimitiveSubtype::Uint32), Some(16)),
        ])
        .unwrap();
        assert_eq!(layout.shape, Shape::new(24, 8));
    }

    #[test]
    fn empty_struct_is_one_byte() {
        assert_eq!(lay_out([]).unwrap().shape, Shape::new(1, 1));
    }

    #[test]
    fn oversized_layouts_are_rejected() {
        assert_eq!(lay_out([(primitive_shape(PrimitiveSubtype::Uint64), Some(u32::MAX - 4))]), None);
        assert_eq!(lay_out([(Shape::new(u32::MAX - 2, 1), None), (primitive_shape(PrimitiveSubtype::Uint32), None)]), None);

        let err = layouts(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/Huge", "members": [
                    {"name": "cells", "type": {"kind": "array", "len": 4294967295, "element": {"kind": "primitive", "subtype": "uint64"}}}
                ]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GenError::InputContract(ContractViolation::LayoutOverflow(_))));
        assert!(err.is_schema_error());

        let err = layouts(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/Wide", "members": [
                    {"name": "left", "type": {"kind": "array", "len": 4294967295, "element": {"kind": "primitive", "subtype": "uint8"}}},
                    {"name": "right", "type": {"kind": "primitive", "subtype": "uint8"}}
                ]}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Schema contract violation: The wire layout of a/Wide does not fit in 32 bits");
    }

    #[test]
    fn nested_structs_and_arrays() {
        let layouts = layouts(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/Line", "members": [
                    {"name": "ends", "type": {"kind": "array", "len": 2, "element": {"kind": "identifier", "identifier": "a/Point"}}},
                    {"name": "label", "type": {"kind": "string", "nullable": true}}
                ]},
                {"kind": "struct", "name": "a/Point", "members": [
                    {"name": "x", "type": {"kind": "primitive", "subtype": "int32"}},
                    {"name": "y", "type": {"kind": "primitive", "subtype": "int32"}}
                ]}
            ]}"#,
        )
        .unwrap();
        let point = layouts.get(&DeclName::new("a", "Point")).unwrap();
        assert_eq!(point.shape, Shape::new(8, 4));
        let line = layouts.get(&DeclName::new("a", "Line")).unwrap();
        assert_eq!(line.offsets, vec![0, 16]);
        assert_eq!(line.shape, Shape::new(32, 8));
    }

    #[test]
    fn cycles_through_values_are_rejected() {
        let err = layouts(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/A", "members": [
                    {"name": "b", "type": {"kind": "identifier", "identifier": "a/B"}}
                ]},
                {"kind": "struct", "name": "a/B", "members": [
                    {"name": "a", "type": {"kind": "identifier", "identifier": "a/A"}}
                ]}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema contract violation: Declarations a/A -> a/B contain each other by value"
        );
    }

    #[test]
    fn cycles_through_boxes_are_fine() {
        let layouts = layouts(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/Node", "members": [
                    {"name": "value", "type": {"kind": "primitive", "subtype": "uint32"}},
                    {"name": "next", "type": {"kind": "identifier", "identifier": "a/Node", "nullable": true}}
                ]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(layouts.get(&DeclName::new("a", "Node")).unwrap().shape, Shape::new(16, 8));
    }
}
