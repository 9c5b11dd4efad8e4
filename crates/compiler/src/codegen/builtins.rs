//! Call lowering: the print built-ins and user function calls.
//!
//! `print`, `println` and `printf` scan as plain identifiers; their call
//! sites are intercepted here and lowered onto the C library's `printf`
//! (variadic) and `puts`, declared on first use. Everything else resolves
//! against the functions emitted so far.

use std::fmt::Write as _;

use crate::ast::Expr;
use crate::error::CompileError;

use super::state::Value;
use super::types::IrType;
use super::CodeGen;

const BUILTINS: [&str; 3] = ["print", "println", "printf"];

impl CodeGen {
    pub(super) fn lower_call(
        &mut self,
        callee: &str,
        args: &[Expr],
    ) -> Result<Value, CompileError> {
        if BUILTINS.contains(&callee) {
            return self.lower_builtin_call(callee, args);
        }

        let sig = self
            .functions
            .get(callee)
            .cloned()
            .ok_or_else(|| CompileError::semantic(format!("unknown function '{}'", callee)))?;
        if sig.params.len() != args.len() {
            return Err(CompileError::semantic(format!(
                "function '{}' expects {} argument(s), got {}",
                callee,
                sig.params.len(),
                args.len()
            )));
        }

        let mut operands = Vec::with_capacity(args.len());
        for (arg, &ty) in args.iter().zip(&sig.params) {
            let value = self.lower_expr(arg)?;
            let value = self.coerce(value, ty, &format!("argument to '{}'", callee))?;
            operands.push(value.typed());
        }

        let cc = self.abi.calling_convention().ir_prefix();
        if sig.ret == IrType::Void {
            writeln!(
                &mut self.output,
                "  call {}void @{}({})",
                cc,
                callee,
                operands.join(", ")
            )?;
            // A void result: usable only as a statement, never as an operand
            Ok(Value::new("0", IrType::Void))
        } else {
            let temp = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{} = call {}{} @{}({})",
                temp,
                cc,
                sig.ret.ir_name(),
                callee,
                operands.join(", ")
            )?;
            Ok(Value::new(format!("%{}", temp), sig.ret))
        }
    }

    fn lower_builtin_call(&mut self, callee: &str, args: &[Expr]) -> Result<Value, CompileError> {
        match (callee, args) {
            ("println", [arg]) => {
                let value = self.lower_expr(arg)?;
                let operand = self.slice_pointer_or_value(value)?;
                self.need_puts = true;
                let temp = self.fresh_temp();
                writeln!(&mut self.output, "  %{} = call i32 @puts({})", temp, operand)?;
                Ok(Value::new(format!("%{}", temp), IrType::I32))
            }
            ("print", [arg]) => {
                let value = self.lower_expr(arg)?;
                let operand = self.slice_pointer_or_value(value)?;
                let (format_global, _) = self.string_global("%s")?;
                self.need_printf = true;
                let temp = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{} = call i32 (ptr, ...) @printf(ptr {}, {})",
                    temp, format_global, operand
                )?;
                Ok(Value::new(format!("%{}", temp), IrType::I32))
            }
            _ => Err(CompileError::semantic(format!(
                "built-in '{}' call form not implemented",
                callee
            ))),
        }
    }

    /// Slice-like values contribute their byte pointer (field 0); anything
    /// else is passed through unchanged.
    fn slice_pointer_or_value(&mut self, value: Value) -> Result<String, CompileError> {
        if value.ty == IrType::Void {
            return Err(CompileError::semantic(
                "cannot pass a void value to a built-in",
            ));
        }
        if value.ty != IrType::Slice {
            return Ok(value.typed());
        }
        let temp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = extractvalue {}, 0",
            temp,
            value.typed()
        )?;
        Ok(format!("ptr %{}", temp))
    }
}
