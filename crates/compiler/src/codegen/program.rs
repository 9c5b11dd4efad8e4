//! Module assembly: the entry point for lowering a whole program.

use std::fmt::Write as _;

use crate::ast::Program;
use crate::error::CompileError;

use super::CodeGen;

impl CodeGen {
    /// Lower every function in declaration order and assemble the final IR
    /// module: header, string globals, on-demand C library declarations,
    /// then the function bodies.
    pub fn codegen_program(&mut self, program: &Program) -> Result<String, CompileError> {
        for function in &program.functions {
            self.emit_function(function)?;
        }

        let mut ir = String::new();
        writeln!(&mut ir, "; ModuleID = 'mica'")?;
        writeln!(
            &mut ir,
            "target triple = \"{}\"",
            self.abi.target().to_triple_string()
        )?;
        writeln!(&mut ir)?;

        if !self.globals.is_empty() {
            ir.push_str(&self.globals);
            writeln!(&mut ir)?;
        }

        // On-demand C library declarations, unless the program already
        // declared or defined the symbol itself
        let declare_puts = self.need_puts && !self.functions.contains_key("puts");
        let declare_printf = self.need_printf && !self.functions.contains_key("printf");
        if declare_puts {
            writeln!(&mut ir, "declare i32 @puts(ptr)")?;
        }
        if declare_printf {
            writeln!(&mut ir, "declare i32 @printf(ptr, ...)")?;
        }
        if declare_puts || declare_printf {
            writeln!(&mut ir)?;
        }

        ir.push_str(&self.output);
        Ok(ir)
    }
}
