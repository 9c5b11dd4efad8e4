//! Structural IR verification.
//!
//! Runs over each emitted function's text after lowering. The invariant is
//! the single-terminator rule: every block ends with exactly one terminator
//! (`ret`, `br`, `unreachable`) and no instruction follows it. A function
//! that falls off the end without a terminator — a typed function missing a
//! return on some path — fails here, which is fatal to the compilation.

use crate::error::CompileError;

/// Verify one function's emitted text (the `define` line through the
/// closing brace).
pub(super) fn verify_function(name: &str, text: &str) -> Result<(), CompileError> {
    let mut blocks: Vec<(&str, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("define ") || trimmed == "}" {
            continue;
        }
        if let Some(label) = trimmed.strip_suffix(':') {
            blocks.push((label, Vec::new()));
        } else if let Some((_, instructions)) = blocks.last_mut() {
            instructions.push(trimmed);
        } else {
            return Err(CompileError::backend(format!(
                "IR verification failed in function '{}': instruction before the entry block",
                name
            )));
        }
    }

    for (label, instructions) in &blocks {
        let mut terminated = false;
        for instruction in instructions {
            if terminated {
                return Err(CompileError::backend(format!(
                    "IR verification failed in function '{}': block '{}' has an instruction \
                     after its terminator",
                    name, label
                )));
            }
            if is_terminator(instruction) {
                terminated = true;
            }
        }
        if !terminated {
            return Err(CompileError::backend(format!(
                "IR verification failed in function '{}': block '{}' lacks a terminator",
                name, label
            )));
        }
    }

    Ok(())
}

fn is_terminator(instruction: &str) -> bool {
    instruction == "ret void"
        || instruction.starts_with("ret ")
        || instruction.starts_with("br ")
        || instruction == "unreachable"
}
