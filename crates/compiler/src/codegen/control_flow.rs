//! Control-flow lowering: if/else, while, for, break, continue.
//!
//! Loop contexts live on an explicit stack: each loop pushes its
//! (continue, break) targets around its body and pops them on exit, so
//! `break` and `continue` always resolve to the lexically innermost loop.

use std::fmt::Write as _;

use crate::ast::Expr;
use crate::error::CompileError;

use super::state::{LoopFrame, Slot, Value};
use super::types::IrType;
use super::CodeGen;

impl CodeGen {
    /// Coerce a condition value to one bit: `cond != 0`.
    fn coerce_condition(&mut self, value: Value) -> Result<String, CompileError> {
        if !value.ty.is_integer() {
            return Err(CompileError::semantic(
                "condition must be an integer or boolean value",
            ));
        }
        let temp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = icmp ne {}, 0",
            temp,
            value.typed()
        )?;
        Ok(temp)
    }

    pub(super) fn lower_if(
        &mut self,
        cond: &Expr,
        then_body: &[Expr],
        else_body: &[Expr],
    ) -> Result<Value, CompileError> {
        let cond = self.lower_expr(cond)?;
        let flag = self.coerce_condition(cond)?;

        let then_block = self.fresh_block("if_then");
        let else_block = self.fresh_block("if_else");
        let merge_block = self.fresh_block("if_merge");

        self.cond_branch(&flag, &then_block, &else_block)?;

        self.start_block(&then_block)?;
        self.lower_body(then_body)?;
        let then_falls_through = !self.terminated;
        self.branch(&merge_block)?;

        self.start_block(&else_block)?;
        self.lower_body(else_body)?;
        let else_falls_through = !self.terminated;
        self.branch(&merge_block)?;

        // Both branches terminated on their own: nothing branches to the
        // merge block, so it is not emitted and the statement list stays
        // terminated.
        if !then_falls_through && !else_falls_through {
            return Ok(Value::dummy());
        }

        self.start_block(&merge_block)?;
        Ok(Value::dummy())
    }

    pub(super) fn lower_while(
        &mut self,
        cond: &Expr,
        body: &[Expr],
    ) -> Result<Value, CompileError> {
        let cond_block = self.fresh_block("while_cond");
        let body_block = self.fresh_block("while_body");
        let after_block = self.fresh_block("while_after");

        self.branch(&cond_block)?;
        self.loop_stack.push(LoopFrame {
            continue_target: cond_block.clone(),
            break_target: after_block.clone(),
        });

        self.start_block(&cond_block)?;
        let cond = self.lower_expr(cond)?;
        let flag = self.coerce_condition(cond)?;
        self.cond_branch(&flag, &body_block, &after_block)?;

        self.start_block(&body_block)?;
        self.lower_body(body)?;
        self.branch(&cond_block)?;

        self.loop_stack.pop();
        self.start_block(&after_block)?;
        Ok(Value::dummy())
    }

    pub(super) fn lower_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        body: &[Expr],
    ) -> Result<Value, CompileError> {
        // Both bounds are evaluated once, before the loop
        let start = self.lower_expr(start)?;
        let end = self.lower_expr(end)?;
        if !start.ty.is_integer() || !end.ty.is_integer() {
            return Err(CompileError::semantic(
                "for-range bounds must be integer values",
            ));
        }

        // The loop variable takes the start bound's type; the end bound is
        // sign-extended or truncated to match.
        let var_ty = start.ty;
        let end = if end.ty == var_ty {
            end
        } else {
            self.resize_signed(end, var_ty)?
        };

        let slot = self.fresh_slot(var);
        writeln!(&mut self.output, "  %{} = alloca {}", slot, var_ty.ir_name())?;
        writeln!(&mut self.output, "  store {}, ptr %{}", start.typed(), slot)?;
        // Save any shadowed binding for restoration after the loop
        let shadowed = self.locals.insert(
            var.to_string(),
            Slot {
                ptr: slot.clone(),
                ty: var_ty,
                is_const: false,
            },
        );

        let cond_block = self.fresh_block("for_cond");
        let body_block = self.fresh_block("for_body");
        let incr_block = self.fresh_block("for_incr");
        let after_block = self.fresh_block("for_after");

        self.loop_stack.push(LoopFrame {
            continue_target: incr_block.clone(),
            break_target: after_block.clone(),
        });
        self.branch(&cond_block)?;

        // The bound check is signed, unlike the comparison operators
        self.start_block(&cond_block)?;
        let current = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = load {}, ptr %{}",
            current,
            var_ty.ir_name(),
            slot
        )?;
        let flag = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = icmp slt {} %{}, {}",
            flag,
            var_ty.ir_name(),
            current,
            end.repr
        )?;
        self.cond_branch(&flag, &body_block, &after_block)?;

        self.start_block(&body_block)?;
        self.lower_body(body)?;
        self.branch(&incr_block)?;

        self.start_block(&incr_block)?;
        let loaded = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = load {}, ptr %{}",
            loaded,
            var_ty.ir_name(),
            slot
        )?;
        let bumped = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{} = add {} %{}, 1",
            bumped,
            var_ty.ir_name(),
            loaded
        )?;
        writeln!(
            &mut self.output,
            "  store {} %{}, ptr %{}",
            var_ty.ir_name(),
            bumped,
            slot
        )?;
        self.branch(&cond_block)?;

        self.loop_stack.pop();
        self.start_block(&after_block)?;

        // The loop variable's binding does not outlive the loop
        match shadowed {
            Some(outer) => {
                self.locals.insert(var.to_string(), outer);
            }
            None => {
                self.locals.remove(var);
            }
        }
        Ok(Value::dummy())
    }

    pub(super) fn lower_break(&mut self) -> Result<Value, CompileError> {
        let frame = self
            .loop_stack
            .last()
            .cloned()
            .ok_or_else(|| CompileError::semantic("break outside of a loop"))?;
        writeln!(&mut self.output, "  br label %{}", frame.break_target)?;
        self.terminated = true;
        Ok(Value::dummy())
    }

    pub(super) fn lower_continue(&mut self) -> Result<Value, CompileError> {
        let frame = self
            .loop_stack
            .last()
            .cloned()
            .ok_or_else(|| CompileError::semantic("continue outside of a loop"))?;
        writeln!(&mut self.output, "  br label %{}", frame.continue_target)?;
        self.terminated = true;
        Ok(Value::dummy())
    }

    /// Resize an integer with signed semantics: sext when widening, trunc
    /// when narrowing. Used only for the for-range end bound.
    fn resize_signed(&mut self, value: Value, to: IrType) -> Result<Value, CompileError> {
        let temp = self.fresh_temp();
        let op = if value.ty.bit_width() < to.bit_width() {
            "sext"
        } else {
            "trunc"
        };
        writeln!(
            &mut self.output,
            "  %{} = {} {} to {}",
            temp,
            op,
            value.typed(),
            to.ir_name()
        )?;
        Ok(Value::new(format!("%{}", temp), to))
    }
}
