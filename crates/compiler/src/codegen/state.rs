//! CodeGen state and core types.
//!
//! The [`CodeGen`] struct owns the module being assembled: accumulated
//! function text, global constants, on-demand C library declarations, and
//! the per-function state (symbol environment, loop-context stack,
//! terminator flag for the current insertion block).

use std::collections::{HashMap, HashSet};

use crate::abi::CAbi;
use crate::target::Target;

use super::types::IrType;

/// An IR value: its operand spelling (a register like `%t4`, a literal like
/// `42`, or a constant aggregate) and its type.
#[derive(Debug, Clone)]
pub(super) struct Value {
    pub repr: String,
    pub ty: IrType,
}

impl Value {
    pub fn new(repr: impl Into<String>, ty: IrType) -> Self {
        Value {
            repr: repr.into(),
            ty,
        }
    }

    /// The placeholder yielded by statements used in expression position.
    pub fn dummy() -> Self {
        Value::new("0", IrType::I8)
    }

    /// Operand spelling with its type, as written in instruction operands.
    pub fn typed(&self) -> String {
        format!("{} {}", self.ty.ir_name(), self.repr)
    }
}

/// A local variable's storage slot.
#[derive(Debug, Clone)]
pub(super) struct Slot {
    /// Register holding the slot address, e.g. `%count.addr`.
    pub ptr: String,
    /// The allocated type; loads and stores use it.
    pub ty: IrType,
    /// Whether the binding was declared `const`.
    pub is_const: bool,
}

/// Branch targets for the innermost loop. `continue` jumps to the condition
/// block (while) or increment block (for); `break` jumps past the loop.
#[derive(Debug, Clone)]
pub(super) struct LoopFrame {
    pub continue_target: String,
    pub break_target: String,
}

/// A function's signature as seen by call sites.
#[derive(Debug, Clone)]
pub(super) struct FnSig {
    pub params: Vec<IrType>,
    /// [`IrType::Void`] for functions without a return type.
    pub ret: IrType,
}

pub struct CodeGen {
    pub(super) abi: CAbi,
    /// Function definitions and declarations-in-progress.
    pub(super) output: String,
    /// String-literal global constants.
    pub(super) globals: String,
    pub(super) temp_counter: usize,
    pub(super) string_counter: usize,
    pub(super) block_counter: usize,
    /// string content -> global name, for deduplication.
    pub(super) string_constants: HashMap<String, String>,
    /// Signatures of every function emitted so far; call sites resolve
    /// against this map, so a callee must precede its callers.
    pub(super) functions: HashMap<String, FnSig>,
    /// The symbol environment: function-flat, cleared at function entry.
    pub(super) locals: HashMap<String, Slot>,
    /// Slot registers already used in the current function; keeps shadowing
    /// allocas distinct.
    pub(super) slot_names: HashSet<String>,
    /// Explicit loop-context stack; empty outside loops.
    pub(super) loop_stack: Vec<LoopFrame>,
    /// Whether the current insertion block already ends in a terminator.
    pub(super) terminated: bool,
    /// Return type of the function currently being lowered.
    pub(super) current_ret: IrType,
    pub(super) need_puts: bool,
    pub(super) need_printf: bool,
}

impl CodeGen {
    pub fn new(target: Target) -> Self {
        CodeGen {
            abi: CAbi::new(target),
            output: String::new(),
            globals: String::new(),
            temp_counter: 0,
            string_counter: 0,
            block_counter: 0,
            string_constants: HashMap::new(),
            functions: HashMap::new(),
            locals: HashMap::new(),
            slot_names: HashSet::new(),
            loop_stack: Vec::new(),
            terminated: false,
            current_ret: IrType::Void,
            need_puts: false,
            need_printf: false,
        }
    }

    /// A fresh SSA register name. The `.` keeps generated names disjoint
    /// from source identifiers, which cannot contain one.
    pub(super) fn fresh_temp(&mut self) -> String {
        let name = format!("t.{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    /// A fresh block label with a descriptive prefix.
    pub(super) fn fresh_block(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.block_counter);
        self.block_counter += 1;
        name
    }

    /// A storage-slot register for a variable. Shadowing declarations of
    /// the same name get numbered suffixes.
    pub(super) fn fresh_slot(&mut self, name: &str) -> String {
        let base = format!("{}.addr", name);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.slot_names.contains(&candidate) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        self.slot_names.insert(candidate.clone());
        candidate
    }
}
