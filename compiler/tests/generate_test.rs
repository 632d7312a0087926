use proptest::prelude::*;

use wiregen_compiler::error::{ConfigError, ContractViolation};
use wiregen_compiler::names::resolve_library;
use wiregen_compiler::types::LibraryName;
use wiregen_compiler::{generate, Config, FileRole, Formatter, GenError, Mode, Output, Schema};

const GEOMETRY: &str = include_str!("../../example/schema/geometry.json");

fn geometry() -> Schema {
    Schema::from_json(GEOMETRY).expect("geometry schema parses")
}

fn config() -> Config {
    Config::new("out/demo/geometry/wire", "out")
}

fn text(output: &Output, role: FileRole) -> &str {
    output[&role].text().expect("generated files are UTF-8")
}

#[test]
fn geometry_generates_every_role() {
    let output = generate(&geometry(), &config(), &Formatter::Disabled).expect("generate failed");

    let names: Vec<&str> = output.values().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        ["out/demo/geometry/wire.rs", "out/demo/geometry/wire_impl.rs", "out/demo/geometry/wire_test_base.rs"]
    );

    let header = text(&output, FileRole::Header);
    assert!(header.contains("// Header: demo/geometry/wire.rs\n"));
    assert!(header.contains("pub mod demo {\npub mod geometry {\n"));
    assert!(header.contains("pub const MAX_POINTS: u32 = 16;"));
    assert!(header.contains("pub struct CanvasMarker;"));
    assert!(header.contains("pub trait Canvas {"));
    assert!(header.contains("pub struct StudioClient<D: ::wiregen_wire::ServiceDirectory>"));

    let point = header.find("pub struct Point {").expect("Point declared");
    let circle = header.find("pub struct Circle {").expect("Circle declared");
    assert!(point < circle);

    assert!(text(&output, FileRole::TestBase).contains("pub trait CanvasTestBase {"));
}

#[test]
fn domain_objects_only_is_a_subset() {
    let schema = geometry();
    let full = generate(&schema, &config(), &Formatter::Disabled).expect("monolithic");
    let domain = generate(&schema, &config().with_mode(Mode::DomainObjectsOnly), &Formatter::Disabled)
        .expect("domain objects only");

    assert_eq!(domain.len(), 2);
    assert!(!domain.contains_key(&FileRole::TestBase));

    let full_source = text(&full, FileRole::Source);
    let domain_source = text(&domain, FileRole::Source);
    assert!(full_source.starts_with(domain_source));

    let domain_header = text(&domain, FileRole::Header);
    assert!(domain_header.contains("pub struct CanvasMarker;"));
    assert!(domain_header.contains("pub enum Shape {"));
    for binding in ["pub trait Canvas {", "CanvasSyncProxy", "StudioClient", "pub mod testing"] {
        assert!(!domain_header.contains(binding), "{} leaked into domain-only output", binding);
    }
    for line in domain_header.lines() {
        assert!(text(&full, FileRole::Header).contains(line), "{:?} missing from monolithic header", line);
    }
}

#[test]
fn errors_are_classified() {
    let err = generate(&geometry(), &Config::new("out/x", ""), &Formatter::Disabled).unwrap_err();
    assert!(matches!(err, GenError::Config(ConfigError::MissingOption("include_base"))));
    assert!(!err.is_schema_error());

    let mut schema = geometry();
    schema.declarations.retain(|decl| decl.name().name != "Point");
    let err = generate(&schema, &config(), &Formatter::Disabled).unwrap_err();
    assert!(err.is_schema_error());
    assert!(matches!(err, GenError::InputContract(ContractViolation::UnresolvedType { .. })));

    let mut schema = geometry();
    schema.name = LibraryName::new("Demo.Geometry");
    let err = generate(&schema, &config(), &Formatter::Disabled).unwrap_err();
    assert!(matches!(err, GenError::InputContract(ContractViolation::MalformedLibraryName(_))));

    let formatter = Formatter::external("/nonexistent/wiregen-formatter");
    let err = generate(&geometry(), &config(), &formatter).unwrap_err();
    assert!(err.is_toolchain_error());
    assert!(err.to_string().contains("out/demo/geometry/wire.rs"));
}

#[test]
fn malformed_json_is_a_schema_error() {
    let err = Schema::from_json("{\"name\": \"demo\"").unwrap_err();
    assert!(err.is_schema_error());
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}"
}

fn primitive() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["bool", "int8", "uint16", "int32", "uint64", "float32", "float64"])
}

/// A library of structs whose fields are primitives or earlier structs.
fn struct_schema() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec((primitive(), any::<bool>()), 0..5), 1..5).prop_map(|structs| {
        let decls: Vec<String> = structs
            .iter()
            .enumerate()
            .map(|(i, fields)| {
                let members: Vec<String> = fields
                    .iter()
                    .enumerate()
                    .map(|(j, (subtype, nested))| {
                        let ty = if *nested && i > 0 {
                            format!(r#"{{"kind": "identifier", "identifier": "gen.props/S{}"}}"#, i - 1)
                        } else {
                            format!(r#"{{"kind": "primitive", "subtype": "{}"}}"#, subtype)
                        };
                        format!(r#"{{"name": "f{}", "type": {}}}"#, j, ty)
                    })
                    .collect();
                format!(r#"{{"kind": "struct", "name": "gen.props/S{}", "members": [{}]}}"#, i, members.join(", "))
            })
            .collect();
        format!(r#"{{"name": "gen.props", "declarations": [{}]}}"#, decls.join(", "))
    })
}

proptest! {
    #[test]
    fn generation_is_deterministic(json in struct_schema()) {
        let schema = Schema::from_json(&json).unwrap();
        let config = Config::new("out/gen/props/wire", "out");
        let first = generate(&schema, &config, &Formatter::Disabled).unwrap();
        let second = generate(&schema.clone(), &config, &Formatter::Disabled).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn namespace_follows_library_segments(
        segments in prop::collection::vec(segment(), 1..4),
        stem in prop::collection::vec(segment(), 1..3),
    ) {
        let library = LibraryName::new(segments.join("."));
        let config = Config::new("out/lib", "base").with_include_stem(stem.join("/"));
        let paths = resolve_library(&library, &config).unwrap();

        prop_assert_eq!(paths.namespace.len(), segments.len());
        prop_assert_eq!(paths.include_dir.clone(), format!("base/{}", segments.join("/")));
        prop_assert_eq!(paths.include_path, format!("base/{}/{}", segments.join("/"), stem.join("/")));
    }
}
