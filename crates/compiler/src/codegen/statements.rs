//! Statement and expression lowering.
//!
//! Statements used in expression position yield a dummy zero value. The
//! comparison operators `<`, `<=`, `>`, `>=` lower to unsigned comparisons
//! even though number literals narrow through signed ranges; the for-range
//! bound check in `control_flow.rs` is the one signed comparison.

use std::fmt::Write as _;

use crate::ast::{BinaryOp, Expr};
use crate::error::CompileError;

use super::state::{Slot, Value};
use super::types::IrType;
use super::CodeGen;

impl CodeGen {
    /// Lower a statement list. Once the insertion block is terminated the
    /// remaining statements are unreachable and are not lowered; nothing
    /// may emit into a terminated block.
    pub(super) fn lower_body(&mut self, body: &[Expr]) -> Result<(), CompileError> {
        for expr in body {
            if self.terminated {
                break;
            }
            self.lower_expr(expr)?;
        }
        Ok(())
    }

    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        match expr {
            Expr::Number(value) => Ok(Value::new(
                value.to_string(),
                IrType::narrowest_for(*value),
            )),
            Expr::Bool(value) => Ok(Value::new(if *value { "1" } else { "0" }, IrType::I1)),
            Expr::Str(bytes) => {
                let (global, len) = self.string_global(bytes)?;
                Ok(Value::new(
                    format!("{{ ptr {}, i64 {} }}", global, len),
                    IrType::Slice,
                ))
            }
            Expr::Variable(name) => self.lower_variable(name),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            Expr::Call { callee, args } => self.lower_call(callee, args),
            Expr::Return(value) => self.lower_return(value),
            Expr::VarDecl {
                name,
                ty,
                is_const,
                init,
            } => self.lower_var_decl(name, ty, *is_const, init.as_deref()),
            Expr::Assign { name, value } => self.lower_assign(name, value),
            Expr::If {
                cond,
                then_body,
                else_body,
            } => self.lower_if(cond, then_body, else_body),
            Expr::While { cond, body } => self.lower_while(cond, body),
            Expr::For {
                var,
                start,
                end,
                body,
            } => self.lower_for(var, start, end, body),
            Expr::Break => self.lower_break(),
            Expr::Continue => self.lower_continue(),
        }
    }

    fn lower_variable(&mut self, name: &str) -> Result<Value, CompileError> {
        let slot = self
            .locals
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::semantic(format!("unknown variable '{}'", name)))?;
        let temp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = load {}, ptr %{}",
            temp,
            slot.ty.ir_name(),
            slot.ptr
        )?;
        Ok(Value::new(format!("%{}", temp), slot.ty))
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value, CompileError> {
        let lhs = self.lower_expr(lhs)?;
        let rhs = self.lower_expr(rhs)?;
        if !lhs.ty.is_integer() || !rhs.ty.is_integer() {
            return Err(CompileError::semantic(format!(
                "operator '{}' requires integer operands",
                op.symbol()
            )));
        }
        let (lhs, rhs) = self.unify_widths(lhs, rhs)?;
        let temp = self.fresh_temp();
        let value = match op {
            BinaryOp::Add => {
                writeln!(
                    &mut self.output,
                    "  %{} = add {}, {}",
                    temp,
                    lhs.typed(),
                    rhs.repr
                )?;
                Value::new(format!("%{}", temp), lhs.ty)
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
            | BinaryOp::Ge => {
                let cmp = match op {
                    BinaryOp::Eq => "eq",
                    BinaryOp::Ne => "ne",
                    // Unsigned by definition in this dialect
                    BinaryOp::Lt => "ult",
                    BinaryOp::Le => "ule",
                    BinaryOp::Gt => "ugt",
                    BinaryOp::Ge => "uge",
                    BinaryOp::Add => unreachable!(),
                };
                writeln!(
                    &mut self.output,
                    "  %{} = icmp {} {}, {}",
                    temp,
                    cmp,
                    lhs.typed(),
                    rhs.repr
                )?;
                Value::new(format!("%{}", temp), IrType::I1)
            }
        };
        Ok(value)
    }

    fn lower_return(&mut self, value: &Expr) -> Result<Value, CompileError> {
        if self.current_ret == IrType::Void {
            return Err(CompileError::semantic(
                "cannot return a value from a function without a return type",
            ));
        }
        let value = self.lower_expr(value)?;
        if value.ty == IrType::Void {
            return Err(CompileError::semantic(
                "cannot return the result of a void function",
            ));
        }
        let value = self.coerce(value, self.current_ret, "return value")?;
        writeln!(&mut self.output, "  ret {}", value.typed())?;
        self.terminated = true;
        Ok(Value::dummy())
    }

    fn lower_var_decl(
        &mut self,
        name: &str,
        ty: &str,
        is_const: bool,
        init: Option<&Expr>,
    ) -> Result<Value, CompileError> {
        let ty = IrType::from_name(ty)?;
        let slot = self.fresh_slot(name);
        writeln!(&mut self.output, "  %{} = alloca {}", slot, ty.ir_name())?;
        let value = match init {
            Some(init) => {
                let value = self.lower_expr(init)?;
                self.coerce(value, ty, &format!("initializer of '{}'", name))?
            }
            None => Value::new(ty.zero_value(), ty),
        };
        writeln!(&mut self.output, "  store {}, ptr %{}", value.typed(), slot)?;
        self.locals.insert(
            name.to_string(),
            Slot {
                ptr: slot,
                ty,
                is_const,
            },
        );
        Ok(Value::dummy())
    }

    fn lower_assign(&mut self, name: &str, value: &Expr) -> Result<Value, CompileError> {
        let slot = self
            .locals
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::semantic(format!("unknown variable '{}'", name)))?;
        if slot.is_const {
            return Err(CompileError::semantic(format!(
                "cannot assign to constant '{}'",
                name
            )));
        }
        let value = self.lower_expr(value)?;
        let value = self.coerce(value, slot.ty, &format!("assignment to '{}'", name))?;
        writeln!(
            &mut self.output,
            "  store {}, ptr %{}",
            value.typed(),
            slot.ptr
        )?;
        Ok(Value::dummy())
    }

    /// Zero-extend the narrower operand so both sides of a binary op share
    /// one width.
    fn unify_widths(&mut self, lhs: Value, rhs: Value) -> Result<(Value, Value), CompileError> {
        if lhs.ty.bit_width() == rhs.ty.bit_width() {
            return Ok((lhs, rhs));
        }
        if lhs.ty.bit_width() < rhs.ty.bit_width() {
            let ty = rhs.ty;
            let lhs = self.zext(lhs, ty)?;
            Ok((lhs, rhs))
        } else {
            let ty = lhs.ty;
            let rhs = self.zext(rhs, ty)?;
            Ok((lhs, rhs))
        }
    }

    fn zext(&mut self, value: Value, to: IrType) -> Result<Value, CompileError> {
        let temp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = zext {} to {}",
            temp,
            value.typed(),
            to.ir_name()
        )?;
        Ok(Value::new(format!("%{}", temp), to))
    }

    fn trunc(&mut self, value: Value, to: IrType) -> Result<Value, CompileError> {
        let temp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = trunc {} to {}",
            temp,
            value.typed(),
            to.ir_name()
        )?;
        Ok(Value::new(format!("%{}", temp), to))
    }

    /// Adjust `value` to `ty` for a store, argument, or return. Integers
    /// widen with zext and narrow with trunc; aggregates never coerce.
    pub(super) fn coerce(
        &mut self,
        value: Value,
        ty: IrType,
        context: &str,
    ) -> Result<Value, CompileError> {
        if value.ty == ty {
            return Ok(value);
        }
        if value.ty.is_integer() && ty.is_integer() {
            return if value.ty.bit_width() < ty.bit_width() {
                self.zext(value, ty)
            } else {
                self.trunc(value, ty)
            };
        }
        Err(CompileError::semantic(format!(
            "type mismatch in {}: expected {}, found {}",
            context,
            ty.ir_name(),
            value.ty.ir_name()
        )))
    }
}
