//! Groups ordered emissions into the header, source and test-base files.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::{Config, Mode};
use crate::emit::Emission;
use crate::error::GenError;
use crate::names::{resolve_library, LibraryPaths};
use crate::types::LibraryName;

const LINTS: &str = "#[allow(\n    dead_code,\n    non_camel_case_types,\n    non_snake_case,\n    unreachable_patterns,\n    unused_imports,\n    unused_mut,\n    unused_variables,\n    clippy::all\n)]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// Declarations, wrapped in the library's modules.
    Header,
    /// Codecs and impls, pulled into the header with `include!`.
    Source,
    /// Test-base traits, pulled into the header's `testing` module.
    TestBase,
}

impl FileRole {
    pub fn suffix(self) -> &'static str {
        match self {
            FileRole::Header => ".rs",
            FileRole::Source => "_impl.rs",
            FileRole::TestBase => "_test_base.rs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub role:     FileRole,
    /// `output_base` plus the role suffix.
    pub name:     String,
    pub contents: Vec<u8>,
}

impl GeneratedFile {
    fn new(role: FileRole, config: &Config, contents: String) -> GeneratedFile {
        GeneratedFile { role, name: file_name(config, role), contents: contents.into_bytes() }
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.contents)
    }
}

pub fn file_name(config: &Config, role: FileRole) -> String {
    format!("{}{}", config.output_base, role.suffix())
}

/// The name another file in the same directory includes `role` by.
fn include_name(config: &Config, role: FileRole) -> String {
    let stem = config.output_base.rsplit('/').next().unwrap_or(&config.output_base);
    format!("{}{}", stem, role.suffix())
}

/// Path of the header relative to the include base, when it lies under it.
pub fn primary_header_path(config: &Config) -> String {
    let header = file_name(config, FileRole::Header);
    let base = config.include_base.trim_end_matches('/');
    match header.strip_prefix(base).and_then(|rest| rest.strip_prefix('/')) {
        Some(relative) if !base.is_empty() => relative.to_string(),
        _ => header,
    }
}

fn banner(library: &LibraryPaths, config: &Config) -> String {
    format!(
        "// WARNING: This file is machine generated by wiregen. Do not edit.\n// Library: {}\n// Header: {}\n",
        library.library,
        primary_header_path(config)
    )
}

/// Assembles every file the configured mode produces.
pub fn assemble(library: &LibraryPaths, config: &Config, emissions: &[Emission]) -> Result<Vec<GeneratedFile>, GenError> {
    let monolithic = config.mode == Mode::Monolithic;
    let mut files = vec![
        GeneratedFile::new(FileRole::Header, config, header(library, config, emissions, monolithic)?),
        GeneratedFile::new(FileRole::Source, config, source(library, config, emissions, monolithic)),
    ];
    if monolithic {
        files.push(GeneratedFile::new(FileRole::TestBase, config, test_base(library, config, emissions)));
    }
    Ok(files)
}

fn join_blocks<'e>(blocks: impl Iterator<Item = &'e String>) -> Vec<&'e str> {
    blocks.map(String::as_str).filter(|block| !block.is_empty()).collect()
}

fn header(library: &LibraryPaths, config: &Config, emissions: &[Emission], monolithic: bool) -> Result<String, GenError> {
    let mut dependencies: BTreeSet<&LibraryName> = BTreeSet::new();
    for emission in emissions {
        dependencies.extend(&emission.domain_libraries);
        if monolithic {
            dependencies.extend(&emission.binding_libraries);
        }
    }

    let mut out = banner(library, config);
    out.push('\n');
    out.push_str(LINTS);
    out.push('\n');
    for segment in &library.namespace {
        out.push_str(&format!("pub mod {} {{\n", segment));
    }

    if !dependencies.is_empty() {
        out.push('\n');
        let up = "super::".repeat(library.namespace.len());
        for dependency in dependencies {
            let paths = resolve_library(dependency, config)?;
            out.push_str(&format!(
                "use {}{} as {}; // {}\n",
                up,
                paths.module_path(),
                paths.alias,
                paths.include_path
            ));
        }
    }

    let mut blocks = join_blocks(emissions.iter().map(|e| &e.domain.declarations));
    if monolithic {
        blocks.extend(join_blocks(emissions.iter().map(|e| &e.bindings.declarations)));
    }
    for block in blocks {
        out.push('\n');
        out.push_str(block);
    }

    out.push_str(&format!("\ninclude!({:?});\n", include_name(config, FileRole::Source)));
    if monolithic && emissions.iter().any(|e| !e.test_base.is_empty()) {
        out.push_str(&format!(
            "\npub mod testing {{\n    use super::*;\n\n    include!({:?});\n}}\n",
            include_name(config, FileRole::TestBase)
        ));
    }

    for segment in library.namespace.iter().rev() {
        out.push_str(&format!("}} // mod {}\n", segment));
    }
    Ok(out)
}

fn source(library: &LibraryPaths, config: &Config, emissions: &[Emission], monolithic: bool) -> String {
    let mut blocks = join_blocks(emissions.iter().map(|e| &e.domain.codecs));
    if monolithic {
        blocks.extend(join_blocks(emissions.iter().map(|e| &e.bindings.codecs)));
    }
    let mut out = banner(library, config);
    for block in blocks {
        out.push('\n');
        out.push_str(block);
    }
    out
}

fn test_base(library: &LibraryPaths, config: &Config, emissions: &[Emission]) -> String {
    let mut out = banner(library, config);
    for block in join_blocks(emissions.iter().map(|e| &e.test_base)) {
        out.push('\n');
        out.push_str(block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Fragment;
    use crate::types::DeclName;

    fn emission(name: &str, domain: &str, bindings: &str, test_base: &str) -> Emission {
        Emission {
            name:              DeclName::new("a.b", name),
            domain:            Fragment { declarations: format!("pub struct {};\n", name), codecs: domain.to_string() },
            bindings:          Fragment { declarations: bindings.to_string(), codecs: bindings.to_string() },
            test_base:         test_base.to_string(),
            domain_libraries:  BTreeSet::new(),
            binding_libraries: BTreeSet::new(),
        }
    }

    fn assemble_text(config: &Config, emissions: &[Emission]) -> Vec<(FileRole, String, String)> {
        let library = resolve_library(&LibraryName::new("a.b"), config).unwrap();
        assemble(&library, config, emissions)
            .unwrap()
            .into_iter()
            .map(|f| (f.role, f.name.clone(), f.text().unwrap().to_string()))
            .collect()
    }

    #[test]
    fn header_wraps_declarations_in_modules() {
        let config = Config::new("gen/a/b/wire", "gen");
        let mut first = emission("First", "// first codec\n", "", "");
        first.domain_libraries.insert(LibraryName::new("d.e"));
        let files = assemble_text(&config, &[first, emission("Second", "", "// bindings\n", "// test base\n")]);

        let (role, name, header) = &files[0];
        assert_eq!(*role, FileRole::Header);
        assert_eq!(name, "gen/a/b/wire.rs");
        assert!(header.starts_with(
            "// WARNING: This file is machine generated by wiregen. Do not edit.\n// Library: a.b\n// Header: a/b/wire.rs\n"
        ));
        assert!(header.contains("pub mod a {\npub mod b {\n\nuse super::super::d::e as d_e; // gen/d/e/rust/wire\n"));
        assert!(header.contains("\npub struct First;\n\npub struct Second;\n\n// bindings\n"));
        assert!(header.contains("\ninclude!(\"wire_impl.rs\");\n"));
        assert!(header.contains("pub mod testing {\n    use super::*;\n\n    include!(\"wire_test_base.rs\");\n}\n"));
        assert!(header.ends_with("} // mod b\n} // mod a\n"));

        let (_, name, test_base) = &files[2];
        assert_eq!(name, "gen/a/b/wire_test_base.rs");
        assert!(test_base.ends_with("\n// test base\n"));
    }

    #[test]
    fn domain_only_output_is_a_subset() {
        let emissions = [emission("First", "// first codec\n", "// bindings\n", "// test base\n")];
        let mut binding_only = emissions[0].clone();
        binding_only.binding_libraries.insert(LibraryName::new("z"));
        let emissions = [binding_only];

        let full = assemble_text(&Config::new("out/x", "out"), &emissions);
        let domain = assemble_text(&Config::new("out/x", "out").with_mode(Mode::DomainObjectsOnly), &emissions);
        assert_eq!(full.len(), 3);
        assert_eq!(domain.len(), 2);

        assert!(full[1].2.starts_with(&domain[1].2));
        assert!(!domain[0].2.contains("// bindings"));
        assert!(!domain[0].2.contains("use super::z"));
        assert!(!domain[0].2.contains("pub mod testing"));
        assert!(full[0].2.contains("use super::super::z as z; // out/z/rust/wire\n"));
    }

    #[test]
    fn header_path_outside_include_base() {
        assert_eq!(primary_header_path(&Config::new("out/x", "elsewhere")), "out/x.rs");
        assert_eq!(primary_header_path(&Config::new("out/x", "out/")), "x.rs");
    }
}
