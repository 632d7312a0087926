//! Library paths and identifier spelling for generated Rust.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Config;
use crate::error::{ContractViolation, GenError};
use crate::types::{DeclName, LibraryName};

lazy_static! {
    static ref LIBRARY_SEGMENT: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
    static ref IDENTIFIER:      Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub const RUST_KEYWORDS: [&str; 51] = [
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "try",
    "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while",
];

/// Where a library's generated code lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    pub library:      LibraryName,
    /// One module per library segment, keyword-escaped.
    pub namespace:    Vec<String>,
    /// `IncludeBase/a/b/c`.
    pub include_dir:  String,
    /// `IncludeBase/a/b/c/<IncludeStem>`.
    pub include_path: String,
    /// Local name a dependent library imports this one under.
    pub alias:        String,
}

impl LibraryPaths {
    /// The module path, e.g. `a::b::c`.
    pub fn module_path(&self) -> String {
        self.namespace.join("::")
    }
}

/// Resolves the namespace and include locations of `library`.
pub fn resolve_library(library: &LibraryName, config: &Config) -> Result<LibraryPaths, GenError> {
    let segments: Vec<&str> = library.segments().collect();
    if library.as_str().is_empty() || !segments.iter().all(|s| LIBRARY_SEGMENT.is_match(s)) {
        return Err(ContractViolation::MalformedLibraryName(library.to_string()).into());
    }

    let directory = segments.join("/");
    let include_dir = join_path(&config.include_base, &directory);
    let include_path = join_path(&include_dir, &config.include_stem);

    Ok(LibraryPaths {
        library: library.clone(),
        namespace: segments.iter().map(|s| escape_keyword(s)).collect(),
        include_dir,
        include_path,
        alias: escape_keyword(&segments.join("_")),
    })
}

/// Joins with `/` regardless of platform so output never depends on the host.
fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Checks that a member or declaration name can be spelled in Rust.
pub fn check_identifier(name: &str) -> Result<(), GenError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ContractViolation::InvalidLiteral { kind: "identifier", value: name.to_string() }.into())
    }
}

/// Appends `_` to names that collide with Rust keywords.
pub fn escape_keyword(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Splits an identifier into words at underscores, lower-to-upper
/// transitions, and the end of an acronym (`HTTPServer` → `HTTP`, `Server`).
fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if c == '_' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `process_koid` → `ProcessKoid`, `FATAL_PAGE_FAULT` → `FatalPageFault`.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().to_string() + &chars.as_str().to_lowercase(),
            }
        })
        .collect()
}

/// `OnException` → `on_exception`, `sessionID` → `session_id`.
pub fn to_snake_case(s: &str) -> String {
    split_words(s).iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("_")
}

/// `maxPoints` → `MAX_POINTS`.
pub fn to_upper_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// Rust name of a declared type.
pub fn type_name(name: &str) -> String {
    escape_keyword(&to_pascal_case(name))
}

/// Rust name of a field, parameter or method.
pub fn member_name(name: &str) -> String {
    escape_keyword(&to_snake_case(name))
}

/// Rust name of a constant.
pub fn const_name(name: &str) -> String {
    escape_keyword(&to_upper_snake_case(name))
}

/// Prefixes `local` with the alias of `name`'s library when it lives outside
/// `current`.
pub fn qualify(name: &DeclName, current: &LibraryName, local: &str) -> String {
    if &name.library == current {
        local.to_string()
    } else {
        let alias = escape_keyword(&name.library.segments().collect::<Vec<_>>().join("_"));
        format!("{}::{}", alias, local)
    }
}
