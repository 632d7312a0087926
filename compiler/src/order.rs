use std::collections::{BTreeSet, HashMap};

use crate::error::{ContractViolation, GenError};
use crate::types::{Constant, DeclName, Declaration, Schema, Type};
use crate::verifier::DeclTable;

/// Orders the declarations of the library being generated so that every
/// declaration comes after the ones it holds by value. Among declarations
/// whose dependencies are satisfied, the one declared first goes first.
///
/// Nullable references, vectors, protocols and services add no ordering
/// constraint.
pub fn declaration_order<'a>(schema: &'a Schema, table: &DeclTable<'a>) -> Result<Vec<&'a Declaration>, GenError> {
    let decls: Vec<&Declaration> = schema.own_declarations().collect();
    let index: HashMap<&DeclName, usize> = decls.iter().enumerate().map(|(i, d)| (d.name(), i)).collect();

    let mut blocked_by = vec![0usize; decls.len()];
    let mut unblocks: Vec<Vec<usize>> = vec![Vec::new(); decls.len()];
    for (i, decl) in decls.iter().enumerate() {
        let mut deps = BTreeSet::new();
        value_dependencies(decl, table, &mut |name| {
            if let Some(&j) = index.get(name) {
                if j != i {
                    deps.insert(j);
                }
            }
        });
        blocked_by[i] = deps.len();
        for j in deps {
            unblocks[j].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..decls.len()).filter(|&i| blocked_by[i] == 0).collect();
    let mut ordered = Vec::with_capacity(decls.len());
    while let Some(i) = ready.pop_first() {
        ordered.push(decls[i]);
        for &k in &unblocks[i] {
            blocked_by[k] -= 1;
            if blocked_by[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if ordered.len() != decls.len() {
        let stuck: Vec<String> = (0..decls.len())
            .filter(|&i| blocked_by[i] > 0)
            .map(|i| decls[i].name().to_string())
            .collect();
        return Err(ContractViolation::LayoutCycle(stuck.join(", ")).into());
    }
    Ok(ordered)
}

fn value_dependencies(decl: &Declaration, table: &DeclTable<'_>, visit: &mut dyn FnMut(&DeclName)) {
    match decl {
        Declaration::Const(c) => {
            type_dependencies(&c.ty, table, visit);
            if let Constant::Identifier { identifier } = &c.value {
                visit(&identifier.split_member().0);
            }
        }
        Declaration::Struct(s) => {
            for member in &s.members {
                type_dependencies(&member.ty, table, visit);
            }
        }
        Declaration::Table(t) => {
            for ty in t.members.iter().filter_map(|m| m.ty.as_ref()) {
                type_dependencies(ty, table, visit);
            }
        }
        Declaration::Union(u) => {
            for ty in u.members.iter().filter_map(|m| m.ty.as_ref()) {
                type_dependencies(ty, table, visit);
            }
        }
        Declaration::Enum(_) | Declaration::Bits(_) | Declaration::Protocol(_) | Declaration::Service(_) => {}
    }
}

fn type_dependencies(ty: &Type, table: &DeclTable<'_>, visit: &mut dyn FnMut(&DeclName)) {
    match ty {
        Type::Array { element, .. } => type_dependencies(element, table, visit),
        Type::Identifier { identifier, nullable: false } => {
            if !matches!(table.get(identifier), Some(Declaration::Protocol(_))) {
                visit(identifier);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::verify_schema;

    fn order(json: &str) -> Result<Vec<String>, GenError> {
        let schema = Schema::from_json(json).unwrap();
        let table = verify_schema(&schema).unwrap();
        Ok(declaration_order(&schema, &table)?.iter().map(|d| d.name().name.clone()).collect())
    }

    #[test]
    fn dependencies_first_then_declared_order() {
        let names = order(
            r#"{"name": "a", "declarations": [
                {"kind": "protocol", "name": "a/P", "methods": []},
                {"kind": "struct", "name": "a/Line", "members": [
                    {"name": "start", "type": {"kind": "identifier", "identifier": "a/Point"}},
                    {"name": "owner", "type": {"kind": "identifier", "identifier": "a/P"}}
                ]},
                {"kind": "struct", "name": "a/Other", "members": []},
                {"kind": "struct", "name": "a/Point", "members": [
                    {"name": "c", "type": {"kind": "identifier", "identifier": "a/Color"}}
                ]},
                {"kind": "enum", "name": "a/Color", "subtype": "uint8", "members": []}
            ]}"#,
        )
        .unwrap();
        assert_eq!(names, vec!["P", "Other", "Color", "Point", "Line"]);
    }

    #[test]
    fn nullable_and_vector_references_do_not_order() {
        let names = order(
            r#"{"name": "a", "declarations": [
                {"kind": "struct", "name": "a/Tree", "members": [
                    {"name": "children", "type": {"kind": "vector", "element": {"kind": "identifier", "identifier": "a/Tree"}}},
                    {"name": "leaf", "type": {"kind": "identifier", "identifier": "a/Leaf", "nullable": true}}
                ]},
                {"kind": "struct", "name": "a/Leaf", "members": []}
            ]}"#,
        )
        .unwrap();
        assert_eq!(names, vec!["Tree", "Leaf"]);
    }

    #[test]
    fn cycles_through_tables_are_reported() {
        let err = order(
            r#"{"name": "a", "declarations": [
                {"kind": "table", "name": "a/T", "members": [
                    {"ordinal": 1, "name": "s", "type": {"kind": "identifier", "identifier": "a/S"}}
                ]},
                {"kind": "struct", "name": "a/S", "members": [
                    {"name": "t", "type": {"kind": "identifier", "identifier": "a/T"}}
                ]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GenError::InputContract(ContractViolation::LayoutCycle(_))));
    }
}
