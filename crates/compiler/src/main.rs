//! Mica compiler CLI.
//!
//! Subcommands: `build` (source to executable, or `--emit-ir` for the
//! textual IR), `run` (build a temporary executable and execute it),
//! `target-info` (print the resolved build target), and `completions`.
//! Set `RUST_LOG=micac=debug` for per-phase tracing output on stderr.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use micac::{CompileError, CompilerConfig};

#[derive(ClapParser)]
#[command(name = "micac")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mica compiler - compile .mica programs to executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .mica file to an executable
    Build {
        /// Input .mica source file
        input: PathBuf,

        /// Output path (defaults to the input filename without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the intermediate LLVM IR file (.ll)
        #[arg(long)]
        keep_ir: bool,

        /// Stop after writing the textual IR; no object or link step
        #[arg(long)]
        emit_ir: bool,

        /// Target triple (defaults to the host)
        #[arg(long)]
        target: Option<String>,
    },

    /// Build and run a .mica program
    Run {
        /// Input .mica source file
        input: PathBuf,

        /// Target triple (defaults to the host)
        #[arg(long)]
        target: Option<String>,
    },

    /// Print the resolved build-target description
    TargetInfo {
        /// Target triple (defaults to the host)
        #[arg(long)]
        target: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            keep_ir,
            emit_ir,
            target,
        } => {
            let output = output.unwrap_or_else(|| default_output(&input, emit_ir));
            let config = load_config(&input, target, keep_ir);
            run_build(&input, &output, emit_ir, &config);
        }
        Commands::Run { input, target } => {
            let config = load_config(&input, target, false);
            run_run(&input, &config);
        }
        Commands::TargetInfo { target } => {
            let mut config = CompilerConfig::new();
            config.target = target;
            print_target_info(&config);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "micac", &mut io::stdout());
        }
    }
}

/// Default output path: the input filename without its extension, or with
/// `.ll` when only IR is requested.
fn default_output(input: &Path, emit_ir: bool) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    if emit_ir {
        PathBuf::from(stem).with_extension("ll")
    } else {
        PathBuf::from(stem)
    }
}

/// Merge the optional `mica.toml` next to the input with command-line
/// flags; flags win.
fn load_config(input: &Path, target: Option<String>, keep_ir: bool) -> CompilerConfig {
    let mut config = input
        .parent()
        .map(|dir| dir.join("mica.toml"))
        .filter(|path| path.exists())
        .map(|path| match CompilerConfig::load(&path) {
            Ok(config) => config,
            Err(message) => {
                eprintln!("warning: {}", message);
                CompilerConfig::new()
            }
        })
        .unwrap_or_default();

    if target.is_some() {
        config.target = target;
    }
    if keep_ir {
        config.keep_ir = true;
    }
    config
}

fn run_build(input: &Path, output: &Path, emit_ir: bool, config: &CompilerConfig) {
    let result = if emit_ir {
        micac::emit_ir(input, output, config)
    } else {
        micac::compile_file(input, output, config)
    };
    match result {
        Ok(warnings) => print_warnings(&warnings),
        Err(error) => fail(&error),
    }
}

fn run_run(input: &Path, config: &CompilerConfig) {
    match micac::run_file(input, config) {
        Ok((code, warnings)) => {
            print_warnings(&warnings);
            process::exit(code);
        }
        Err(error) => fail(&error),
    }
}

fn print_target_info(config: &CompilerConfig) {
    let target = micac::resolve_target(config);
    println!("target:        {}", target.name());
    println!("triple:        {}", target.to_triple_string());
    println!("pointer size:  {} bytes", target.pointer_size());
    println!("libc:          {}", target.libc_name());
    println!("PIC required:  {}", target.requires_pic());
    println!("PIE required:  {}", target.requires_pie());
    println!("links libc:    {}", target.requires_libc());
    println!("dynamic link:  {}", target.can_dynamic_link());
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

fn fail(error: &CompileError) -> ! {
    eprintln!("error: {}", error);
    process::exit(1);
}
