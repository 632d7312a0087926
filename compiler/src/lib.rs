//! wiregen-compiler
//!
//! Turns a resolved IDL declaration tree into Rust source:
//!  1) a verifier and layout engine for the incoming schema ([`verify_schema`], [`Layouts`]),
//!  2) per-declaration emitters for constants, enums, bits, structs, tables, unions,
//!     protocols and services ([`emit`]),
//!  3) a file assembler grouping emissions into header, source and test-base files,
//!  4) an optional external formatter pass ([`Formatter`]),
//!  5) the [`generate`] driver tying the stages together, and the [`GenError`] type.

pub mod assembler;
pub mod config;
pub mod emit;
pub mod error;
pub mod format;
pub mod generator;
pub mod layout;
pub mod mapper;
pub mod names;
pub mod order;
pub mod types;
pub mod utils;
pub mod verifier;

pub use assembler::{FileRole, GeneratedFile};
pub use config::{Config, Mode};
pub use error::GenError;
pub use format::Formatter;
pub use generator::{compute_layouts, generate, Output};
pub use layout::Layouts;
pub use types::Schema;
pub use verifier::verify_schema;
