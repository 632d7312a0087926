use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::types::DeclName;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("Schema contract violation: {0}")]
    InputContract(#[from] ContractViolation),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Formatter failed: {0}")]
    Formatter(#[from] FormatterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    /// The declaration tree broke a promise the front end made.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, GenError::InputContract(_) | GenError::Json(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, GenError::Config(_))
    }

    /// The environment, not the schema, is at fault.
    pub fn is_toolchain_error(&self) -> bool {
        matches!(self, GenError::Formatter(_) | GenError::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("Malformed library name {0:?}")]
    MalformedLibraryName(String),

    #[error("The declaration {0} is defined twice")]
    DuplicateDeclaration(DeclName),

    #[error("The type {name} referenced from {from} is not defined")]
    UnresolvedType { name: String, from: String },

    #[error("{name} cannot be used as a {expected}")]
    WrongKind { name: DeclName, expected: &'static str },

    #[error("Ordinal {ordinal} is used twice in {decl}")]
    DuplicateOrdinal { decl: DeclName, ordinal: u64 },

    #[error("Ordinal {ordinal} is not a valid member ordinal")]
    InvalidOrdinal { ordinal: u64 },

    #[error("Member with ordinal {ordinal} is not reserved but has no name or type")]
    IncompleteMember { ordinal: u64 },

    #[error("A {0} type cannot be nullable")]
    NotNullable(&'static str),

    #[error("Declarations {0} contain each other by value")]
    LayoutCycle(String),

    #[error("The wire layout of {0} does not fit in 32 bits")]
    LayoutOverflow(String),

    #[error("Invalid {kind} literal {value:?}")]
    InvalidLiteral { kind: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required option `{0}`")]
    MissingOption(&'static str),
}

#[derive(Debug, Error)]
pub enum FormatterError {
    #[error("could not run {} on {file}: {source}", path.display())]
    Spawn {
        path:   PathBuf,
        file:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with {status} on {file}: {stderr}", path.display())]
    Exit {
        path:   PathBuf,
        file:   String,
        status: ExitStatus,
        stderr: String,
    },
}
