//! The generation pipeline: one pure pass from a schema to file contents.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use crate::assembler::{assemble, FileRole, GeneratedFile};
use crate::config::Config;
use crate::emit::{emit_declaration, Emission};
use crate::error::GenError;
use crate::format::Formatter;
use crate::layout::Layouts;
use crate::mapper::TypeMapper;
use crate::names::resolve_library;
use crate::order::declaration_order;
use crate::types::Schema;
use crate::verifier::verify_schema;

/// Every generated file, keyed by role.
pub type Output = BTreeMap<FileRole, GeneratedFile>;

/// Generates the files for `schema.name`. Nothing is returned unless every
/// stage succeeds.
#[instrument(level = "debug", skip_all, fields(library = %schema.name, mode = ?config.mode))]
pub fn generate(schema: &Schema, config: &Config, formatter: &Formatter) -> Result<Output, GenError> {
    config.validate()?;
    let library = resolve_library(&schema.name, config)?;
    let table = verify_schema(schema)?;
    let layouts = Layouts::compute(&table)?;
    debug!(declarations = schema.declarations.len(), "Loaded");

    let ordered = declaration_order(schema, &table)?;
    debug!(declarations = ordered.len(), "Ordered");

    let mapper = TypeMapper::new(&table, &layouts, &schema.name);
    let emissions = ordered
        .par_iter()
        .map(|decl| {
            trace!(name = %decl.name(), kind = decl.kind_name(), "Emitting");
            emit_declaration(&mapper, decl)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<Vec<Emission>, GenError>>()?;
    debug!(emissions = emissions.len(), "Emitted");

    let files = assemble(&library, config, &emissions)?;
    debug!(files = files.len(), "Assembled");

    let mut output = Output::new();
    for file in files {
        let file = formatter.apply(file)?;
        output.insert(file.role, file);
    }
    debug!("Formatted");
    Ok(output)
}

/// Struct layouts of every library in `schema`, for inspection.
pub fn compute_layouts(schema: &Schema) -> Result<Layouts, GenError> {
    let table = verify_schema(schema)?;
    Layouts::compute(&table)
}
