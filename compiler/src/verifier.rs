use std::collections::{BTreeSet, HashMap};

use crate::{
    error::{ContractViolation, GenError},
    names::check_identifier,
    types::{Constant, DeclName, Declaration, OrdinalMember, Schema, Type},
    utils::quote,
};

/// Declarations indexed by name, in the order the schema lists them.
#[derive(Debug)]
pub struct DeclTable<'a> {
    by_name: HashMap<&'a DeclName, &'a Declaration>,
    ordered: Vec<&'a Declaration>,
}

impl<'a> DeclTable<'a> {
    pub fn get(&self, name: &DeclName) -> Option<&'a Declaration> {
        self.by_name.get(name).copied()
    }

    /// Like [`DeclTable::get`], reporting `from` as the referrer on failure.
    pub fn resolve(&self, name: &DeclName, from: &dyn std::fmt::Display) -> Result<&'a Declaration, GenError> {
        self.get(name).ok_or_else(|| {
            ContractViolation::UnresolvedType { name: name.to_string(), from: from.to_string() }.into()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Declaration> + '_ {
        self.ordered.iter().copied()
    }
}

/// Checks the promises the front end makes about a declaration tree and
/// indexes it. Fails on the first broken promise.
pub fn verify_schema(schema: &Schema) -> Result<DeclTable<'_>, GenError> {
    let mut by_name = HashMap::new();

    // 1) Check duplicate declaration names
    for decl in &schema.declarations {
        check_identifier(&decl.name().name)?;
        if by_name.insert(decl.name(), decl).is_some() {
            return Err(ContractViolation::DuplicateDeclaration(decl.name().clone()).into());
        }
    }
    let table = DeclTable { by_name, ordered: schema.declarations.iter().collect() };

    // 2) Check every reference, member name and ordinal
    for decl in &schema.declarations {
        let from = decl.name();
        match decl {
            Declaration::Const(c) => {
                check_type(&table, &c.ty, from)?;
                if let Constant::Identifier { identifier } = &c.value {
                    check_constant_reference(&table, identifier, from)?;
                }
            }
            Declaration::Enum(e) => {
                for member in &e.members {
                    check_identifier(&member.name)?;
                }
            }
            Declaration::Bits(b) => {
                for member in &b.members {
                    check_identifier(&member.name)?;
                }
            }
            Declaration::Struct(s) => {
                for member in &s.members {
                    check_identifier(&member.name)?;
                    check_type(&table, &member.ty, from)?;
                }
            }
            Declaration::Table(t) => check_ordinal_members(&table, &t.members, from)?,
            Declaration::Union(u) => check_ordinal_members(&table, &u.members, from)?,
            Declaration::Protocol(p) => {
                let mut ordinals = BTreeSet::new();
                for method in &p.methods {
                    check_identifier(&method.name)?;
                    if !ordinals.insert(method.ordinal) {
                        return Err(duplicate_ordinal(from, method.ordinal));
                    }
                    for param in method.request.iter().chain(&method.response) {
                        check_identifier(&param.name)?;
                        check_type(&table, &param.ty, from)?;
                    }
                    if let Some(error) = &method.error {
                        check_type(&table, error, from)?;
                    }
                }
            }
            Declaration::Service(s) => {
                for member in &s.members {
                    check_identifier(&member.name)?;
                    match table.resolve(&member.protocol, from)? {
                        Declaration::Protocol(_) => {}
                        _ => return Err(wrong_kind(&member.protocol, "protocol")),
                    }
                }
            }
        }
    }

    Ok(table)
}

fn check_ordinal_members(table: &DeclTable<'_>, members: &[OrdinalMember], from: &DeclName) -> Result<(), GenError> {
    let mut ordinals = BTreeSet::new();
    for member in members {
        if member.ordinal == 0 {
            return Err(ContractViolation::InvalidOrdinal { ordinal: 0 }.into());
        }
        if !ordinals.insert(member.ordinal) {
            return Err(duplicate_ordinal(from, member.ordinal));
        }
        if let Some((name, ty)) = member.field()? {
            check_identifier(name)?;
            check_type(table, ty, from)?;
        }
    }
    Ok(())
}

fn check_type(table: &DeclTable<'_>, ty: &Type, from: &DeclName) -> Result<(), GenError> {
    match ty {
        Type::Primitive { .. } | Type::String { .. } | Type::Handle { .. } => Ok(()),
        Type::Vector { element, .. } | Type::Array { element, .. } => check_type(table, element, from),
        Type::Request { protocol, .. } => match table.resolve(protocol, from)? {
            Declaration::Protocol(_) => Ok(()),
            _ => Err(wrong_kind(protocol, "protocol")),
        },
        Type::Identifier { identifier, .. } => match table.resolve(identifier, from)? {
            Declaration::Const(_) | Declaration::Service(_) => Err(wrong_kind(identifier, "type")),
            _ => Ok(()),
        },
    }
}

fn check_constant_reference(table: &DeclTable<'_>, identifier: &DeclName, from: &DeclName) -> Result<(), GenError> {
    let (decl_name, member) = identifier.split_member();
    let decl = table.resolve(&decl_name, from)?;
    let members = match (decl, member) {
        (Declaration::Const(_), None) => return Ok(()),
        (Declaration::Enum(e), Some(_)) => &e.members,
        (Declaration::Bits(b), Some(_)) => &b.members,
        _ => return Err(wrong_kind(identifier, "constant value")),
    };
    if members.iter().any(|m| Some(m.name.as_str()) == member) {
        Ok(())
    } else {
        Err(ContractViolation::UnresolvedType {
            name: quote(&identifier.to_string()),
            from: from.to_string(),
        }
        .into())
    }
}

fn duplicate_ordinal(decl: &DeclName, ordinal: u64) -> GenError {
    ContractViolation::DuplicateOrdinal { decl: decl.clone(), ordinal }.into()
}

fn wrong_kind(name: &DeclName, expected: &'static str) -> GenError {
    ContractViolation::WrongKind { name: name.clone(), expected }.into()
}
