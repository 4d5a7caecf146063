use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sprig_core::builtins::{ENTRY_EXPORT, PRINT};
use sprig_core::{CompileOptions, PrintMode, compile_wasm};
use wasmi::{Caller, Engine, Linker, Module, Store};

/// Compile a Sprig program into a WebAssembly module.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; reads stdin when omitted
    #[arg(short, long)]
    input: Option<String>,

    /// Output path; defaults to the input's file stem with a `.wasm` extension
    #[arg(short, long)]
    output: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Print only this top-level variable at the end (repeatable)"
    )]
    print: Vec<String>,

    #[arg(long, help = "Do not print any variable at the end")]
    no_print: bool,

    #[arg(long, help = "Run the module after writing it")]
    run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = match &cli.input {
        Some(path) => {
            println!("Input file: {path}");
            fs::read_to_string(path).with_context(|| format!("failed to read input file {path}"))?
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let output = output_path(&cli)?;

    if cli.no_print && !cli.print.is_empty() {
        eprintln!("--print is ignored when --no-print is given");
    }
    let prints = if cli.no_print {
        PrintMode::Nothing
    } else if cli.print.is_empty() {
        PrintMode::TopLevel
    } else {
        PrintMode::Names(cli.print.clone())
    };

    let artifact = compile_wasm(&source, &CompileOptions { prints })?;
    println!("Declared: {}", artifact.declarations.join(", "));

    write_output(&output, &artifact.wasm)?;
    println!("Output file: {}", output.display());

    if cli.run {
        for value in run_wasm(&artifact.wasm)? {
            println!("{}: {value}", PRINT.field);
        }
    }
    Ok(())
}

fn output_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.output {
        return Ok(PathBuf::from(path));
    }
    let input = cli
        .input
        .as_ref()
        .context("--output is required when reading from stdin")?;
    let stem = Path::new(input)
        .file_stem()
        .with_context(|| format!("cannot derive an output name from {input}"))?;
    let mut output = PathBuf::from(stem);
    output.set_extension("wasm");
    Ok(output)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

/// Execute the entry export, collecting every value the module prints.
fn run_wasm(wasm: &[u8]) -> Result<Vec<i32>> {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).context("failed to compile wasm artifact")?;
    let mut linker = Linker::new(&engine);
    linker
        .func_wrap(
            PRINT.module,
            PRINT.field,
            |mut caller: Caller<'_, Vec<i32>>, value: i32| {
                caller.data_mut().push(value);
            },
        )
        .map_err(|err| anyhow::anyhow!("failed to link {}: {err}", PRINT.field))?;
    let mut store = Store::new(&engine, Vec::new());
    let instance = linker
        .instantiate_and_start(&mut store, &module)
        .context("failed to instantiate module")?;
    let entry = instance
        .get_typed_func::<(), ()>(&store, ENTRY_EXPORT)
        .context("exported entry function missing or has wrong type")?;
    entry
        .call(&mut store, ())
        .context("failed to execute entry function")?;
    Ok(store.into_data())
}
