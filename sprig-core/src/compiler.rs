//! Compilation driver.
//!
//! Runs the front end over a source string, appends the prints selected
//! by [`CompileOptions`], and assembles a module that imports the host
//! print function and exports the single entry function.

use crate::builtins::{ENTRY_EXPORT, HOST_IMPORTS};
use crate::error::CoreError;
use crate::lexer::lex;
use crate::module::ModuleBuilder;
use crate::node::Program;
use crate::parser::parse;

/// Which variables the compiled program hands to the host print import
/// once the source has run to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PrintMode {
    /// Every top-level declaration, in declaration order.
    #[default]
    TopLevel,
    /// Exactly these top-level names, in this order.
    Names(Vec<String>),
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub prints: PrintMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
    /// Top-level declared names, in declaration order.
    pub declarations: Vec<String>,
    /// Number of locals in the compiled function.
    pub local_count: u32,
}

/// Compile `source` into a binary module with default options.
pub fn compile(source: &str) -> Result<Vec<u8>, CoreError> {
    compile_wasm(source, &CompileOptions::default()).map(|artifact| artifact.wasm)
}

pub fn compile_wasm(
    source: &str,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let lowered = lower(source, options)?;
    let wasm = assemble(&lowered.program)?;
    Ok(CompilationArtifact {
        wasm,
        declarations: lowered.declarations,
        local_count: lowered.program.local_count,
    })
}

struct Lowered {
    program: Program,
    declarations: Vec<String>,
}

/// Run the front end: lex, parse, and append the requested prints.
fn lower(source: &str, options: &CompileOptions) -> Result<Lowered, CoreError> {
    let tokens = lex(source)?;
    let mut builder = parse(&tokens)?;
    let declarations = builder.top_level_names();

    match &options.prints {
        PrintMode::TopLevel => {
            for name in &declarations {
                builder.print(name)?;
            }
        }
        PrintMode::Names(names) => {
            for name in names {
                builder.print(name)?;
            }
        }
        PrintMode::Nothing => {}
    }

    Ok(Lowered {
        program: builder.finish()?,
        declarations,
    })
}

/// Lay out the module: host imports, then the single entry function.
pub fn assemble(program: &Program) -> Result<Vec<u8>, CoreError> {
    let mut module = ModuleBuilder::new();
    let mut import_types = Vec::with_capacity(HOST_IMPORTS.len());
    for import in HOST_IMPORTS {
        import_types.push(module.add_type(import.params, import.results));
    }
    let entry_type = module.add_type(0, 0);

    for (import, type_index) in HOST_IMPORTS.iter().zip(import_types) {
        module.add_import(import.module, import.field, type_index)?;
    }
    let entry = module.add_function(entry_type, program)?;
    module.add_export(ENTRY_EXPORT, entry)?;
    Ok(module.finish())
}
