use std::collections::BTreeSet;

use crate::error::GenError;
use crate::mapper::{TypeMapper, RUNTIME};
use crate::names::{member_name, type_name};
use crate::types::Service;
use crate::utils::doc_comment;

use super::{Emission, Fragment, RESULT};

/// A service groups named protocol members. Its client opens a member by
/// handing the server end of a channel to a `ServiceDirectory`.
pub fn emit(mapper: &TypeMapper<'_>, decl: &Service) -> Result<Emission, GenError> {
    let service = type_name(&decl.name.name);
    let marker = format!("{}Marker", service);
    let wire_name = format!("{}.{}", decl.name.library, decl.name.name);

    let members: Vec<String> = decl.members.iter().map(|m| format!("{:?}", m.name)).collect();
    let mut declarations = doc_comment(decl.doc.as_deref(), "");
    declarations.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    declarations.push_str(&format!("pub struct {};\n\n", marker));
    declarations.push_str(&format!(
        "impl {m} {{\n    pub const NAME: &'static str = {n:?};\n    pub const MEMBERS: &'static [&'static str] = &[{members}];\n}}\n\n",
        m = marker,
        n = wire_name,
        members = members.join(", "),
    ));
    declarations.push_str(&format!(
        "pub struct {}Client<D: {}::ServiceDirectory> {{\n    directory: D,\n}}\n",
        service, RUNTIME
    ));

    let mut libraries = BTreeSet::new();
    let mut methods = vec![format!(
        "impl<D: {rt}::ServiceDirectory> {s}Client<D> {{\n    pub fn new(directory: D) -> Self {{\n        Self {{ directory }}\n    }}\n",
        rt = RUNTIME,
        s = service,
    )];
    for member in &decl.members {
        if member.protocol.library != *mapper.library() {
            libraries.insert(member.protocol.library.clone());
        }
        let mut out = doc_comment(member.doc.as_deref(), "    ");
        out.push_str(&format!(
            "    pub fn connect_to_{f}(&self, server_end: {rt}::ServerEnd<{p}>) -> {res}<(), {rt}::Error> {{\n        self.directory.connect({m}::NAME, {n:?}, server_end.into_handle())\n    }}\n",
            f = member_name(&member.name),
            rt = RUNTIME,
            p = mapper.marker_path(&member.protocol),
            res = RESULT,
            m = marker,
            n = member.name,
        ));
        methods.push(out);
    }
    let codecs = format!("{}}}\n", methods.join("\n"));

    let mut emission = Emission::domain(&decl.name, Fragment::default());
    emission.bindings = Fragment { declarations, codecs };
    emission.binding_libraries = libraries;
    Ok(emission)
}

#[cfg(test)]
mod tests {
    use crate::emit::test_support::emit_json;

    const SCHEMA: &str = r#"{"name": "demo", "declarations": [
        {"kind": "protocol", "name": "demo/Calculator", "methods": []},
        {"kind": "protocol", "name": "other/Clock", "methods": []},
        {"kind": "service", "name": "demo/Toolbox", "members": [
            {"name": "calculator", "protocol": "demo/Calculator"},
            {"name": "clock", "protocol": "other/Clock", "doc": "Wall time."}
        ]}
    ]}"#;

    #[test]
    fn service_is_a_binding() {
        let emission = emit_json(SCHEMA, "Toolbox");
        assert!(emission.domain.is_empty());
        let decl = &emission.bindings.declarations;
        assert!(decl.contains("pub const NAME: &'static str = \"demo.Toolbox\";"));
        assert!(decl.contains("pub const MEMBERS: &'static [&'static str] = &[\"calculator\", \"clock\"];"));
        assert!(decl.contains("pub struct ToolboxClient<D: ::wiregen_wire::ServiceDirectory> {"));
    }

    #[test]
    fn members_connect_through_the_directory() {
        let emission = emit_json(SCHEMA, "Toolbox");
        let codecs = &emission.bindings.codecs;
        assert!(codecs.contains(
            "pub fn connect_to_calculator(&self, server_end: ::wiregen_wire::ServerEnd<CalculatorMarker>)"
        ));
        assert!(codecs.contains("    /// Wall time.\n    pub fn connect_to_clock(&self, server_end: ::wiregen_wire::ServerEnd<other::ClockMarker>)"));
        assert!(codecs.contains("self.directory.connect(ToolboxMarker::NAME, \"clock\", server_end.into_handle())"));
        assert_eq!(emission.binding_libraries.len(), 1);
    }
}
