//! LLVM IR code generation.
//!
//! This module lowers a parsed program to LLVM IR as text (opaque
//! pointers, LLVM 15+). One [`CodeGen`] lowers one module.
//!
//! # Key Concepts
//!
//! ## Value Representation
//!
//! Integers lower to `i8`/`i16`/`i32`/`i64` (literals pick the narrowest
//! width whose signed or unsigned range fits), booleans to `i1`, and every
//! slice-like type (`str`, `[]T`) to the two-field aggregate
//! `{ ptr, i64 }` — byte pointer plus 64-bit length.
//!
//! ## Storage and Scoping
//!
//! Each parameter and local gets an `alloca` slot; reads load from the
//! slot, writes store to it. The symbol environment is function-flat: a
//! declaration inside a nested block stays visible for the rest of the
//! function. The for-loop variable is the one exception — its binding is
//! restored (or removed) when the loop exits.
//!
//! ## Comparison Signedness
//!
//! The comparison operators `<`, `<=`, `>`, `>=` emit unsigned `icmp`,
//! while the for-range bound check emits signed `slt` and number literals
//! narrow through signed ranges. This asymmetry is observable and is kept
//! deliberately.
//!
//! ## Blocks and Terminators
//!
//! Emission is linear: blocks are written in execution order and a
//! `terminated` flag tracks whether the current block already ends in a
//! terminator. Nothing ever emits into a terminated block — statements
//! after a `return`/`break`/`continue` are unreachable and skipped, and
//! branch helpers check the flag first. After lowering, each function runs
//! through a structural verifier that enforces the single-terminator rule.
//!
//! # Module Structure
//!
//! - `state.rs`: the CodeGen struct, values, slots, loop frames
//! - `types.rs`: textual type names to IR types
//! - `program.rs`: whole-module assembly
//! - `functions.rs`: prototypes, parameter slots, block helpers
//! - `statements.rs`: literals, variables, operators, stores
//! - `control_flow.rs`: if/while/for/break/continue
//! - `builtins.rs`: print/println interception, user calls
//! - `globals.rs`: string-literal constants
//! - `verify.rs`: single-terminator verification

mod builtins;
mod control_flow;
mod functions;
mod globals;
mod program;
mod state;
mod statements;
mod types;
mod verify;

pub use state::CodeGen;
pub use types::IrType;

#[cfg(test)]
mod tests {
    use super::verify::verify_function;
    use super::CodeGen;
    use crate::error::CompileError;
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use crate::target::Target;

    fn compile(source: &str) -> Result<String, CompileError> {
        let out = Scanner::new(source).scan()?;
        let program = Parser::new(out.tokens).parse()?;
        let mut codegen = CodeGen::new(Target::from_triple("x86_64-unknown-linux-gnu"));
        codegen.codegen_program(&program)
    }

    fn compile_ok(source: &str) -> String {
        compile(source).expect("program should compile")
    }

    /// Split a module into per-function texts (define line through brace).
    fn function_bodies(ir: &str) -> Vec<String> {
        let mut bodies = Vec::new();
        let mut current: Option<String> = None;
        for line in ir.lines() {
            if line.starts_with("define ") {
                current = Some(String::new());
            }
            if let Some(body) = current.as_mut() {
                body.push_str(line);
                body.push('\n');
                if line == "}" {
                    bodies.push(current.take().unwrap());
                }
            }
        }
        bodies
    }

    #[test]
    fn test_codegen_return_zero() {
        let ir = compile_ok("fn main() -> u32 { return 0; }");
        assert!(ir.contains("target triple = \"x86_64-unknown-linux-gnu\""));
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32"));
    }

    #[test]
    fn test_codegen_user_call_with_params() {
        let ir = compile_ok(
            "fn add(a: u32, b: u32) -> u32 { return a + b; }\n\
             fn main() -> u32 { return add(2, 3); }",
        );
        assert!(ir.contains("define internal i32 @add(i32 %a.arg, i32 %b.arg)"));
        assert!(ir.contains("%a.addr = alloca i32"));
        assert!(ir.contains("store i32 %a.arg, ptr %a.addr"));
        assert!(ir.contains("add i32"));
        assert!(ir.contains("call i32 @add(i32"));
    }

    #[test]
    fn test_codegen_for_println() {
        let ir = compile_ok("fn main() -> u32 { for i in 0:3 { println(\"hi\"); } return 0; }");
        assert!(ir.contains("@.str.0 = private unnamed_addr constant [3 x i8] c\"hi\\00\""));
        assert!(ir.contains("declare i32 @puts(ptr)"));
        assert!(ir.contains("extractvalue { ptr, i64 } { ptr @.str.0, i64 2 }, 0"));
        assert!(ir.contains("call i32 @puts(ptr %"));
        // The bound check is signed, 0:3 narrows to i8
        assert!(ir.contains("icmp slt i8"));
        assert!(ir.contains("for_cond"));
        assert!(ir.contains("for_incr"));
        assert!(ir.contains("for_after"));
    }

    #[test]
    fn test_codegen_while_if_break_assignment() {
        let ir = compile_ok(
            "fn main() -> u32 { var i: u32 = 0; while (i < 5) { if (i == 2) { break; } \
             i = i + 1; } return i; }",
        );
        // Comparison operators are unsigned
        assert!(ir.contains("icmp ult i32"));
        // break targets the loop's after-block
        assert!(ir.contains("br label %while_after"));
        assert!(ir.contains("store i32"));
    }

    #[test]
    fn test_codegen_extern_puts() {
        let ir = compile_ok(
            "extern fn puts(s: str) -> i32;\n\
             fn main() -> u32 { puts(\"ok\"); return 0; }",
        );
        assert!(ir.contains("declare i32 @puts({ ptr, i64 })"));
        assert!(ir.contains("call i32 @puts({ ptr, i64 } { ptr @.str.0, i64 2 })"));
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_break_outside_loop_rejected() {
        let err = compile("fn main() { break; }").unwrap_err();
        assert!(err.to_string().contains("break outside of a loop"), "{}", err);
    }

    #[test]
    fn test_continue_outside_loop_rejected() {
        let err = compile("fn main() { if (true) { continue; } }").unwrap_err();
        assert!(
            err.to_string().contains("continue outside of a loop"),
            "{}",
            err
        );
    }

    #[test]
    fn test_linkage_rule() {
        let ir = compile_ok(
            "fn helper() -> u32 { return 1; }\n\
             export fn entry() -> u32 { return helper(); }\n\
             fn main() -> u32 { return entry(); }",
        );
        // Internal for plain user functions, external (default) for
        // export and main
        assert!(ir.contains("define internal i32 @helper()"));
        assert!(ir.contains("define i32 @entry()"));
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_single_terminator_in_every_block() {
        // Property: every emitted block of every accepted program ends in
        // exactly one terminator.
        let programs = [
            "fn main() -> u32 { return 0; }",
            "fn main() { }",
            "fn main() -> u32 { if (true) { return 1; } return 2; }",
            "fn main() -> u32 { if (true) { return 1; } else { return 2; } }",
            "fn main() -> u32 { var i: u32 = 0; while (i < 3) { i = i + 1; } return i; }",
            "fn main() -> u32 { for i in 0:4 { if (i == 2) { break; } continue; } return 0; }",
            "fn f() -> u32 { return 7; } fn main() -> u32 { return f(); }",
        ];
        for source in programs {
            let ir = compile_ok(source);
            for body in function_bodies(&ir) {
                verify_function("test", &body).expect("verified function");
            }
        }
    }

    #[test]
    fn test_if_with_both_branches_returning() {
        // Every path returns; no merge block is emitted and the function
        // verifies.
        let ir = compile_ok("fn main() -> u32 { if (true) { return 1; } else { return 2; } }");
        assert_eq!(ir.matches("ret i32").count(), 2);
        assert!(!ir.contains("if_merge"));
        for body in function_bodies(&ir) {
            verify_function("test", &body).expect("verified function");
        }
    }

    #[test]
    fn test_if_with_one_returning_branch_keeps_merge() {
        let ir = compile_ok("fn main() -> u32 { if (true) { return 1; } else { } return 2; }");
        assert!(ir.contains("if_merge"));
        assert_eq!(ir.matches("ret i32").count(), 2);
    }

    #[test]
    fn test_nested_loop_break_targets_innermost() {
        let ir = compile_ok(
            "fn main() { var n: u32 = 0; while (n < 3) { for i in 0:3 { break; } n = n + 1; } }",
        );
        // The inner break branches to the for-loop's after block, not the
        // while-loop's
        let break_to_for = ir.contains("br label %for_after");
        assert!(break_to_for);
        let body_start = ir.find("for_body").unwrap();
        let after_pos = ir[body_start..].find("br label %").unwrap();
        assert!(ir[body_start + after_pos..].starts_with("br label %for_after"));
    }

    #[test]
    fn test_continue_targets_incr_block() {
        let ir = compile_ok("fn main() { for i in 0:3 { continue; } }");
        assert!(ir.contains("br label %for_incr"));
    }

    #[test]
    fn test_void_function_implicit_return() {
        let ir = compile_ok("fn poke() { } fn main() { poke(); }");
        assert!(ir.contains("define internal void @poke()"));
        assert!(ir.contains("ret void"));
        assert!(ir.contains("call void @poke()"));
    }

    #[test]
    fn test_typed_function_without_return_fails_verification() {
        let err = compile("fn f() -> u32 { }").unwrap_err();
        assert!(err.to_string().contains("lacks a terminator"), "{}", err);
    }

    #[test]
    fn test_unknown_variable() {
        let err = compile("fn main() -> u32 { return nope; }").unwrap_err();
        assert!(err.to_string().contains("unknown variable 'nope'"), "{}", err);
    }

    #[test]
    fn test_unknown_function() {
        let err = compile("fn main() { missing(); }").unwrap_err();
        assert!(
            err.to_string().contains("unknown function 'missing'"),
            "{}",
            err
        );
    }

    #[test]
    fn test_forward_reference_is_unknown() {
        // Call sites resolve against functions already emitted
        let err = compile("fn main() -> u32 { return later(); } fn later() -> u32 { return 1; }")
            .unwrap_err();
        assert!(err.to_string().contains("unknown function"), "{}", err);
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = compile(
            "fn f(a: u32) -> u32 { return a; } fn main() -> u32 { return f(1, 2); }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("expects 1 argument(s), got 2"), "{}", err);
    }

    #[test]
    fn test_assign_to_const_rejected() {
        let err = compile("fn main() { const x: u32 = 1; x = 2; }").unwrap_err();
        assert!(
            err.to_string().contains("cannot assign to constant 'x'"),
            "{}",
            err
        );
    }

    #[test]
    fn test_assign_to_unknown_rejected() {
        let err = compile("fn main() { x = 2; }").unwrap_err();
        assert!(err.to_string().contains("unknown variable 'x'"), "{}", err);
    }

    #[test]
    fn test_returning_void_call_rejected() {
        let err = compile("fn poke() { } fn main() -> u32 { return poke(); }").unwrap_err();
        assert!(
            err.to_string()
                .contains("cannot return the result of a void function"),
            "{}",
            err
        );
    }

    #[test]
    fn test_void_call_as_initializer_rejected() {
        let err = compile("fn poke() { } fn main() { var x: u8 = poke(); }").unwrap_err();
        assert!(err.to_string().contains("type mismatch"), "{}", err);
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let err = compile("fn f() { } fn f() { }").unwrap_err();
        assert!(err.to_string().contains("already defined"), "{}", err);
    }

    #[test]
    fn test_print_uses_printf_with_format() {
        let ir = compile_ok("fn main() { print(\"x\"); }");
        assert!(ir.contains("declare i32 @printf(ptr, ...)"));
        assert!(ir.contains("c\"%s\\00\""));
        assert!(ir.contains("call i32 (ptr, ...) @printf(ptr @.str."));
    }

    #[test]
    fn test_builtin_other_forms_not_implemented() {
        for source in [
            "fn main() { printf(\"x\"); }",
            "fn main() { println(\"a\", \"b\"); }",
            "fn main() { print(); }",
        ] {
            let err = compile(source).unwrap_err();
            assert!(err.to_string().contains("not implemented"), "{}", err);
        }
    }

    #[test]
    fn test_builtin_declare_skipped_when_user_declares_symbol() {
        // A user extern of puts plus a println must not produce two
        // conflicting @puts declarations.
        let ir = compile_ok(
            "extern fn puts(s: str) -> i32;\n\
             fn main() -> u32 { puts(\"a\"); println(\"b\"); return 0; }",
        );
        assert_eq!(ir.matches("declare i32 @puts").count(), 1);
        assert!(ir.contains("declare i32 @puts({ ptr, i64 })"));
        assert!(!ir.contains("declare i32 @puts(ptr)"));
    }

    #[test]
    fn test_string_bytes_kept_verbatim() {
        // No escape processing: backslash-n is two bytes
        let ir = compile_ok("fn main() { println(\"a\\nb\"); }");
        assert!(ir.contains("[5 x i8] c\"a\\5Cnb\\00\""));
        assert!(ir.contains("i64 4 }"));
    }

    #[test]
    fn test_string_literals_deduplicated() {
        let ir = compile_ok("fn main() { println(\"x\"); println(\"x\"); }");
        assert_eq!(ir.matches("@.str.0 = ").count(), 1);
        assert!(!ir.contains("@.str.1 ="));
    }

    #[test]
    fn test_return_uses_declared_width() {
        let ir = compile_ok("fn f() -> u16 { return 300; } fn main() { f(); }");
        assert!(ir.contains("ret i16 300"));
    }

    #[test]
    fn test_operands_widened_with_zext() {
        let ir = compile_ok("fn main() -> u32 { var i: u32 = 9; if (i < 5) { } return i; }");
        assert!(ir.contains("zext i8 5 to i32"));
        assert!(ir.contains("icmp ult i32"));
    }

    #[test]
    fn test_var_decl_without_init_zeroes_slot() {
        let ir = compile_ok("fn main() { var s: str; var n: u32; }");
        assert!(ir.contains("store { ptr, i64 } zeroinitializer, ptr %s.addr"));
        assert!(ir.contains("store i32 0, ptr %n.addr"));
    }

    #[test]
    fn test_for_variable_shadow_restored() {
        // Outer `i` stays u32 after the loop; the loop variable was i8
        let ir = compile_ok(
            "fn main() -> u32 { var i: u32 = 7; for i in 0:3 { } return i; }",
        );
        assert!(ir.contains("%i.addr = alloca i32"));
        assert!(ir.contains("%i.addr1 = alloca i8"));
        // The final return loads the outer u32 slot
        let ret_pos = ir.rfind("load i32, ptr %i.addr\n").unwrap();
        assert!(ir[ret_pos..].contains("ret i32"));
    }

    #[test]
    fn test_windows_msvc_uses_win64cc() {
        let source = "fn main2() -> u32 { return 0; }\n\
                      fn main() -> u32 { return main2(); }";
        let out = Scanner::new(source).scan().unwrap();
        let program = Parser::new(out.tokens).parse().unwrap();
        let mut codegen = CodeGen::new(Target::from_triple("x86_64-pc-windows-msvc"));
        let ir = codegen.codegen_program(&program).unwrap();
        assert!(ir.contains("define internal win64cc i32 @main2()"));
        assert!(ir.contains("call win64cc i32 @main2()"));
        assert!(ir.contains("target triple = \"x86_64-unknown-windows-msvc\""));
    }

    #[test]
    fn test_mismatched_slice_argument_rejected() {
        let err = compile(
            "extern fn puts(s: str) -> i32; fn main() { puts(1); }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("type mismatch"), "{}", err);
    }

    #[test]
    fn test_statements_after_return_are_skipped() {
        let ir = compile_ok("fn main() -> u32 { return 1; return 2; }");
        // The unreachable second return is not emitted
        assert_eq!(ir.matches("ret i32").count(), 1);
    }
}
