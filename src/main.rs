use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;

use jsback::codegen;
use jsback::config::CodegenOptions;
use jsback::diag::CompileError;
use jsback::ir::Module;

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pre-legalized SSA IR module (JSON)
    input: String,

    /// Output path; defaults to the input with a .js extension
    #[clap(short, long)]
    output: Option<String>,

    /// Use Math.fround for precise float32 semantics
    #[clap(long)]
    precise_f32: bool,

    /// Target shared-memory threading; volatile accesses become atomic
    #[clap(long)]
    enable_pthreads: bool,

    /// Warn on unaligned loads and stores
    #[clap(long)]
    warn_unaligned: bool,

    /// Silence warnings about NaN literals with custom bit patterns
    #[clap(long)]
    no_nan_warnings: bool,

    /// Function-table slots reserved for functions added at runtime
    #[clap(long, default_value_t = 0)]
    reserved_function_pointers: u32,

    /// Emulate function pointers instead of using function tables
    #[clap(long)]
    emulated_function_pointers: bool,

    /// Extra emitted assertions
    #[clap(long, default_value_t = 0)]
    assertions: u32,

    /// Forbid function pointers from sharing an index across tables
    #[clap(long)]
    no_aliasing_function_pointers: bool,

    /// Where global data starts in linear memory
    #[clap(long, default_value_t = 8)]
    global_base: u32,

    /// Emit relocatable code
    #[clap(long)]
    relocatable: bool,

    /// Optimization level of the surrounding build
    #[clap(short = 'O', default_value_t = 2)]
    opt_level: u32,
}

fn load_module(path: &str) -> Result<Module, CompileError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| CompileError::Io(PathBuf::from(path), e))?;
    Ok(serde_json::from_str(&source)?)
}

fn main() {
    let args = Args::parse();
    let opts = CodegenOptions {
        precise_f32: args.precise_f32,
        enable_pthreads: args.enable_pthreads,
        warn_unaligned: args.warn_unaligned,
        warn_noncanonical_nans: !args.no_nan_warnings,
        reserved_function_pointers: args.reserved_function_pointers,
        emulated_function_pointers: args.emulated_function_pointers,
        assertions: args.assertions,
        no_aliasing_function_pointers: args.no_aliasing_function_pointers,
        global_base: args.global_base,
        relocatable: args.relocatable,
        opt_level: args.opt_level,
    };

    let module = match load_module(&args.input) {
        Ok(module) => module,
        Err(e) => {
            println!("[ERROR] {e}");
            std::process::exit(1);
        }
    };

    let output = match codegen::translate(&module, &opts) {
        Ok(output) => output,
        Err(e) => {
            println!("[ERROR] {e}");
            std::process::exit(1);
        }
    };

    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }

    let output_path = match &args.output {
        Some(path) => PathBuf::from(path),
        None => Path::new(&args.input).with_extension("js"),
    };
    match std::fs::write(&output_path, output.code) {
        Ok(()) => println!("[SUCCESS] output written to {}", output_path.display()),
        Err(e) => {
            println!("[ERROR] failed to write {}: {e}", output_path.display());
            std::process::exit(1);
        }
    }
}
