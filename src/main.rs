//! GLSL include preprocessor and validator

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::info;

use glsl_prep::{BatchRunner, GlslangValidator, PreprocessorBuilder};

/// Expands #include directives in GLSL sources and validates the result
#[derive(Parser)]
#[command(name = "glsl-prep")]
#[command(version = "0.1.0")]
#[command(about = "A GLSL #include preprocessor and offline shader validator")]
#[command(long_about = None)]
struct Args {
    /// Directory containing the shader sources
    #[arg(long, value_name = "DIR", default_value = "glshaders")]
    root: PathBuf,

    /// Directory flattened sources are written to (default: <ROOT>/build)
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Validator program, run with each flattened source as its only argument
    #[arg(long, value_name = "PROGRAM", default_value = "glslang")]
    validator: String,

    /// Max include depth
    #[arg(long, default_value = "100")]
    max_depth: usize,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(args: Args) -> Result<bool> {
    if !args.root.is_dir() {
        anyhow::bail!("Shader root is not a directory: {}", args.root.display());
    }

    let mut builder = PreprocessorBuilder::new()
        .shader_root(&args.root)
        .max_include_depth(args.max_depth);
    if let Some(build_dir) = args.build_dir {
        builder = builder.build_directory(build_dir);
    }

    let mut runner = BatchRunner::new(builder.build(), GlslangValidator::new(args.validator));
    let report = runner.run(&mut io::stdout().lock())?;

    info!(
        "{} sources processed, {} failed",
        report.outcomes.len(),
        report.failures().count()
    );
    Ok(report.is_success())
}

/// Process status for the outcome of `run`
fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) | Err(_) => 1,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = run(args);
    if let Err(e) = &result {
        eprintln!("Error: {}", e);

        // Print error chain
        for cause in e.chain().skip(1) {
            eprintln!("  Caused by: {}", cause);
        }
    }

    ExitCode::from(exit_status(&result))
}
