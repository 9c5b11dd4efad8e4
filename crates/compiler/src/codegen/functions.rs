//! Per-function code generation.
//!
//! Each function is lowered in declaration order: prototype, entry block,
//! parameter slots, body, implicit return for void functions, then a
//! structural verification pass over the emitted text. Call sites resolve
//! against the signatures registered here, so a callee must be declared or
//! defined before its callers; a function sees its own signature while its
//! body is lowered, which permits self-recursion.

use std::fmt::Write as _;

use crate::ast::Function;
use crate::error::CompileError;

use super::state::{FnSig, Slot};
use super::types::IrType;
use super::verify::verify_function;
use super::CodeGen;

impl CodeGen {
    pub(super) fn emit_function(&mut self, function: &Function) -> Result<(), CompileError> {
        if self.functions.contains_key(&function.name) {
            return Err(CompileError::semantic_at(
                format!("function '{}' is already defined", function.name),
                function.line,
            ));
        }

        let mut param_types = Vec::with_capacity(function.params.len());
        for param in &function.params {
            param_types.push(IrType::from_name(&param.ty)?);
        }
        let ret = match &function.return_type {
            Some(name) => IrType::from_name(name)?,
            None => IrType::Void,
        };

        let cc = self.abi.calling_convention().ir_prefix();

        if function.is_extern {
            let params: Vec<&str> = param_types.iter().map(|t| t.ir_name()).collect();
            let symbol = self.abi.extern_name(&function.name);
            writeln!(
                &mut self.output,
                "declare {}{} @{}({})",
                cc,
                ret.ir_name(),
                symbol,
                params.join(", ")
            )?;
            writeln!(&mut self.output)?;
            self.functions
                .insert(function.name.clone(), FnSig { params: param_types, ret });
            return Ok(());
        }

        self.functions.insert(
            function.name.clone(),
            FnSig {
                params: param_types.clone(),
                ret,
            },
        );

        let linkage = self.abi.linkage_for(function).ir_prefix();
        let params_text: Vec<String> = function
            .params
            .iter()
            .zip(&param_types)
            .map(|(param, ty)| format!("{} %{}.arg", ty.ir_name(), param.name))
            .collect();

        let start = self.output.len();
        writeln!(
            &mut self.output,
            "define {}{}{} @{}({}) {{",
            linkage,
            cc,
            ret.ir_name(),
            function.name,
            params_text.join(", ")
        )?;

        // Fresh function state: flat symbol environment, no loop context
        self.locals.clear();
        self.slot_names.clear();
        self.loop_stack.clear();
        self.current_ret = ret;
        self.start_block("entry")?;

        // One stack slot per parameter, initialized from the incoming value
        for (param, &ty) in function.params.iter().zip(&param_types) {
            let slot = self.fresh_slot(&param.name);
            writeln!(&mut self.output, "  %{} = alloca {}", slot, ty.ir_name())?;
            writeln!(
                &mut self.output,
                "  store {} %{}.arg, ptr %{}",
                ty.ir_name(),
                param.name,
                slot
            )?;
            self.locals.insert(
                param.name.clone(),
                Slot {
                    ptr: slot,
                    ty,
                    is_const: false,
                },
            );
        }

        self.lower_body(&function.body)?;

        // Void functions fall off the end; typed functions must return
        // explicitly on every path or verification rejects them.
        if ret == IrType::Void && !self.terminated {
            writeln!(&mut self.output, "  ret void")?;
            self.terminated = true;
        }

        writeln!(&mut self.output, "}}")?;
        let body_text = self.output[start..].to_string();
        writeln!(&mut self.output)?;

        verify_function(&function.name, &body_text)
    }

    /// Open a new block at the current position and reset the terminator
    /// flag: subsequent instructions land in this block.
    pub(super) fn start_block(&mut self, label: &str) -> Result<(), CompileError> {
        writeln!(&mut self.output, "{}:", label)?;
        self.terminated = false;
        Ok(())
    }

    /// Branch to `label` unless the insertion block already has a
    /// terminator. Never emits a second terminator into the same block.
    pub(super) fn branch(&mut self, label: &str) -> Result<(), CompileError> {
        if self.terminated {
            return Ok(());
        }
        writeln!(&mut self.output, "  br label %{}", label)?;
        self.terminated = true;
        Ok(())
    }

    /// Conditional branch on an i1 register. Terminates the current block.
    pub(super) fn cond_branch(
        &mut self,
        flag: &str,
        then_label: &str,
        else_label: &str,
    ) -> Result<(), CompileError> {
        writeln!(
            &mut self.output,
            "  br i1 %{}, label %{}, label %{}",
            flag, then_label, else_label
        )?;
        self.terminated = true;
        Ok(())
    }
}
