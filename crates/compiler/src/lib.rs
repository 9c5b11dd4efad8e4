//! Mica compiler library.
//!
//! Compiles `.mica` source to textual LLVM IR and drives clang for object
//! emission, linking, and run mode. The pipeline is strictly forward:
//! bytes -> tokens -> AST -> IR. The first error at any stage aborts
//! compilation; scanner warnings for isolated unexpected characters ride
//! along on the side channel and are surfaced by the caller.

pub mod abi;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod target;

pub use abi::{CAbi, CallConv, Linkage};
pub use ast::{BinaryOp, Expr, Function, Param, Program};
pub use codegen::{CodeGen, IrType};
pub use config::CompilerConfig;
pub use error::CompileError;
pub use parser::Parser;
pub use scanner::{ScanOutput, Scanner, Token, TokenKind};
pub use target::{Abi, Arch, Os, Target};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

/// Minimum clang/LLVM version required. The generated IR uses opaque
/// pointers (`ptr`), which need LLVM 15+.
const MIN_CLANG_VERSION: u32 = 15;

/// Cache for the clang version check; it runs once per process.
static CLANG_VERSION_CHECKED: OnceLock<Result<u32, String>> = OnceLock::new();

/// Result of lowering one translation unit to IR.
pub struct CompileResult {
    /// The textual IR module.
    pub ir: String,
    /// Scanner side-channel diagnostics.
    pub warnings: Vec<String>,
    /// Whether a `main` function was defined (required for linking and
    /// run mode, not for IR emission).
    pub has_main: bool,
    /// Whether `main` has no return type; run mode reports success for a
    /// void `main` instead of trusting the process status.
    pub main_returns_void: bool,
}

/// Lower source text to an IR module for the given target.
pub fn compile_source_to_ir(source: &str, target: Target) -> Result<CompileResult, CompileError> {
    let scanned = Scanner::new(source).scan()?;
    debug!(tokens = scanned.tokens.len(), "scanned");

    let program = Parser::new(scanned.tokens).parse()?;
    debug!(functions = program.functions.len(), "parsed");

    let main = program.find_function("main");
    let has_main = main.is_some();
    let main_returns_void = main.is_some_and(|f| f.return_type.is_none());

    let mut codegen = CodeGen::new(target);
    let ir = codegen.codegen_program(&program)?;
    debug!(ir_bytes = ir.len(), "generated IR");

    Ok(CompileResult {
        ir,
        warnings: scanned.warnings,
        has_main,
        main_returns_void,
    })
}

/// Resolve the build target from configuration, falling back to the host.
pub fn resolve_target(config: &CompilerConfig) -> Target {
    match &config.target {
        Some(triple) => Target::from_triple(triple),
        None => Target::host(),
    }
}

/// Compile a source file and write the textual IR only.
pub fn emit_ir(input: &Path, ir_path: &Path, config: &CompilerConfig) -> Result<Vec<String>, CompileError> {
    let source = read_source(input)?;
    let result = compile_source_to_ir(&source, resolve_target(config))?;
    fs::write(ir_path, &result.ir)
        .map_err(|e| CompileError::io(format!("failed to write '{}': {}", ir_path.display(), e)))?;
    Ok(result.warnings)
}

/// Compile a source file to an executable: IR, then a host object file,
/// then a link against the C library.
pub fn compile_file(
    input: &Path,
    output: &Path,
    config: &CompilerConfig,
) -> Result<Vec<String>, CompileError> {
    let source = read_source(input)?;
    let target = resolve_target(config);
    let result = compile_source_to_ir(&source, target)?;
    if !result.has_main {
        return Err(CompileError::semantic("no 'main' function defined"));
    }
    build_executable(&result.ir, output, target, config)?;
    Ok(result.warnings)
}

/// Build a temporary executable and run it. Returns the program's exit
/// code alongside any scanner warnings; a void `main` exits successfully.
pub fn run_file(input: &Path, config: &CompilerConfig) -> Result<(i32, Vec<String>), CompileError> {
    let source = read_source(input)?;
    let target = resolve_target(config);
    let result = compile_source_to_ir(&source, target)?;
    if !result.has_main {
        return Err(CompileError::semantic("no 'main' function defined"));
    }

    let exe_path = temp_executable_path(input);
    build_executable(&result.ir, &exe_path, target, config)?;

    debug!(?exe_path, "running");
    let status = Command::new(&exe_path)
        .status()
        .map_err(|e| CompileError::io(format!("failed to run '{}': {}", exe_path.display(), e)));
    fs::remove_file(&exe_path).ok();
    let status = status?;

    let code = if result.main_returns_void {
        0
    } else {
        status.code().unwrap_or(1)
    };
    Ok((code, result.warnings))
}

/// Write the IR next to `output`, emit a host object file, and link it.
fn build_executable(
    ir: &str,
    output: &Path,
    target: Target,
    config: &CompilerConfig,
) -> Result<(), CompileError> {
    let ir_path = output.with_extension("ll");
    fs::write(&ir_path, ir)
        .map_err(|e| CompileError::io(format!("failed to write '{}': {}", ir_path.display(), e)))?;

    check_clang_version()?;

    // Object emission
    let object_path = output.with_extension("o");
    let mut emit = Command::new("clang");
    emit.arg("-c").arg(&ir_path).arg("-o").arg(&object_path);
    if target.requires_pic() {
        emit.arg("-fPIC");
    }
    debug!(?object_path, "emitting object file");
    let emitted = run_clang(emit);

    // Link
    let linked = emitted.and_then(|_| {
        let mut link = Command::new("clang");
        link.arg(&object_path).arg("-o").arg(output);
        for path in &config.library_paths {
            link.arg("-L").arg(path);
        }
        for lib in &config.libraries {
            link.arg("-l").arg(lib);
        }
        debug!(?output, "linking");
        run_clang(link)
    });

    fs::remove_file(&object_path).ok();
    if !config.keep_ir {
        fs::remove_file(&ir_path).ok();
    }
    linked
}

fn read_source(input: &Path) -> Result<String, CompileError> {
    fs::read_to_string(input)
        .map_err(|e| CompileError::io(format!("failed to read '{}': {}", input.display(), e)))
}

fn temp_executable_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    std::env::temp_dir().join(format!("mica-{}-{}", stem, std::process::id()))
}

fn run_clang(mut command: Command) -> Result<(), CompileError> {
    let output = command
        .output()
        .map_err(|e| CompileError::backend(format!("failed to run clang: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CompileError::backend(format!(
            "clang failed:\n{}",
            stderr
        )));
    }
    Ok(())
}

/// Check that clang is available and recent enough for opaque pointers.
/// The result is cached for the life of the process.
fn check_clang_version() -> Result<u32, CompileError> {
    CLANG_VERSION_CHECKED
        .get_or_init(|| {
            let output = Command::new("clang")
                .arg("--version")
                .output()
                .map_err(|e| {
                    format!(
                        "failed to run clang: {}. Install clang {} or later.",
                        e, MIN_CLANG_VERSION
                    )
                })?;

            if !output.status.success() {
                return Err(format!(
                    "clang --version exited with {:?}",
                    output.status.code()
                ));
            }

            let text = String::from_utf8_lossy(&output.stdout);
            let version = parse_clang_version(&text).ok_or_else(|| {
                format!(
                    "could not parse clang version from: {}",
                    text.lines().next().unwrap_or(&text)
                )
            })?;

            // Apple clang numbers differ; Apple clang 14 carries LLVM 15
            let minimum = if text.contains("Apple clang") {
                MIN_CLANG_VERSION - 1
            } else {
                MIN_CLANG_VERSION
            };
            if version < minimum {
                return Err(format!(
                    "clang {} found, but {} or later is required (opaque pointers)",
                    version, minimum
                ));
            }

            Ok(version)
        })
        .clone()
        .map_err(CompileError::Backend)
}

/// Pull the major version out of `clang --version` output.
fn parse_clang_version(output: &str) -> Option<u32> {
    for line in output.lines() {
        if line.contains("clang version")
            && let Some(idx) = line.find("version ")
        {
            let digits: String = line[idx + 8..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return digits.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clang_available() -> bool {
        Command::new("clang").arg("--version").output().is_ok()
    }

    #[test]
    fn test_parse_clang_version_variants() {
        assert_eq!(
            parse_clang_version("clang version 15.0.0 (https://llvm.org)\nTarget: x86_64"),
            Some(15)
        );
        assert_eq!(
            parse_clang_version("Apple clang version 14.0.3 (clang-1403.0.22.14.1)"),
            Some(14)
        );
        assert_eq!(
            parse_clang_version("Ubuntu clang version 18.1.3\nTarget: x86_64-pc-linux-gnu"),
            Some(18)
        );
        assert_eq!(parse_clang_version("no version here"), None);
    }

    #[test]
    fn test_compile_source_reports_has_main() {
        let with_main = compile_source_to_ir("fn main() { }", Target::host()).unwrap();
        assert!(with_main.has_main);
        let without = compile_source_to_ir("fn f() { }", Target::host()).unwrap();
        assert!(!without.has_main);
    }

    #[test]
    fn test_compile_source_surfaces_scanner_warnings() {
        let result = compile_source_to_ir("fn main() { } #", Target::host()).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("unexpected character"));
    }

    #[test]
    fn test_resolve_target_prefers_config() {
        let config = CompilerConfig::new().with_target("aarch64-unknown-linux-gnu");
        assert_eq!(resolve_target(&config).arch, Arch::Aarch64);
        assert_eq!(resolve_target(&CompilerConfig::new()), Target::host());
    }

    #[test]
    fn test_emit_ir_writes_module() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        let ll = dir.path().join("t.ll");
        fs::write(&input, "fn main() -> u32 { return 0; }").unwrap();
        emit_ir(&input, &ll, &CompilerConfig::new()).unwrap();
        let ir = fs::read_to_string(&ll).unwrap();
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_compile_file_requires_main() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        fs::write(&input, "fn f() { }").unwrap();
        let err = compile_file(&input, &dir.path().join("t"), &CompilerConfig::new()).unwrap_err();
        assert!(err.to_string().contains("no 'main' function"), "{}", err);
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = emit_ir(
            Path::new("/nonexistent/input.mica"),
            Path::new("/tmp/out.ll"),
            &CompilerConfig::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Io(_)));
    }

    #[test]
    fn test_run_exit_code_roundtrip() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        fs::write(
            &input,
            "fn add(a: u32, b: u32) -> u32 { return a + b; }\n\
             fn main() -> u32 { return add(2, 3); }",
        )
        .unwrap();
        let (code, warnings) = run_file(&input, &CompilerConfig::new()).unwrap();
        assert_eq!(code, 5);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_run_prints_lines() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        let exe = dir.path().join("t");
        fs::write(
            &input,
            "fn main() -> u32 { for i in 0:3 { println(\"hi\"); } return 0; }",
        )
        .unwrap();
        compile_file(&input, &exe, &CompilerConfig::new()).unwrap();
        let output = Command::new(&exe).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\nhi\nhi\n");
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn test_while_break_counts_to_two() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        fs::write(
            &input,
            "fn main() -> u32 { var i: u32 = 0; while (i < 5) { if (i == 2) { break; } \
             i = i + 1; } return i; }",
        )
        .unwrap();
        let (code, _) = run_file(&input, &CompilerConfig::new()).unwrap();
        assert_eq!(code, 2);
    }

    #[test]
    fn test_extern_puts_prints() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        let exe = dir.path().join("t");
        fs::write(
            &input,
            "fn main() -> u32 { println(\"ok\"); return 0; }",
        )
        .unwrap();
        compile_file(&input, &exe, &CompilerConfig::new()).unwrap();
        let output = Command::new(&exe).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
    }

    #[test]
    fn test_void_main_exits_success() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        fs::write(&input, "fn main() { println(\"bye\"); }").unwrap();
        let (code, _) = run_file(&input, &CompilerConfig::new()).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_extern_declared_puts_runs() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        let exe = dir.path().join("t");
        fs::write(
            &input,
            "extern fn puts(s: str) -> i32;\n\
             fn main() -> u32 { puts(\"ok\"); return 0; }",
        )
        .unwrap();
        compile_file(&input, &exe, &CompilerConfig::new()).unwrap();
        let output = Command::new(&exe).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
        assert_eq!(output.status.code(), Some(0));
    }

    #[test]
    fn test_keep_ir_leaves_ll_file() {
        if !clang_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.mica");
        let exe = dir.path().join("t");
        fs::write(&input, "fn main() -> u32 { return 0; }").unwrap();

        let mut config = CompilerConfig::new();
        config.keep_ir = true;
        compile_file(&input, &exe, &config).unwrap();
        assert!(dir.path().join("t.ll").exists());

        config.keep_ir = false;
        compile_file(&input, &exe, &config).unwrap();
        assert!(!dir.path().join("t.ll").exists());
    }
}
