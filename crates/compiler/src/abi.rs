//! C ABI lowering: linkage and calling conventions for functions.
//!
//! The language's linkage modifiers (`extern`, `export`) and the special
//! name `main` map onto IR linkage and platform calling conventions here.
//! Mutual exclusivity of `extern`/`export` is enforced upstream by the
//! parser; this helper trusts its inputs.

use crate::ast::Function;
use crate::target::{Abi, Os, Target};

/// Calling conventions in scope. Everything uses the platform C convention
/// except Windows with the MSVC ABI, which uses the Windows x64 convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConv {
    C,
    Win64,
}

impl CallConv {
    /// Spelling in IR `define`/`call` lines, with a trailing space when a
    /// keyword is needed. The C convention is the IR default and prints
    /// nothing.
    pub fn ir_prefix(self) -> &'static str {
        match self {
            CallConv::C => "",
            CallConv::Win64 => "win64cc ",
        }
    }
}

/// Symbol visibility across translation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Internal,
    External,
}

impl Linkage {
    /// Spelling in IR `define` lines. External linkage is the IR default
    /// and prints nothing.
    pub fn ir_prefix(self) -> &'static str {
        match self {
            Linkage::Internal => "internal ",
            Linkage::External => "",
        }
    }
}

/// Target-driven ABI decisions for generated functions.
#[derive(Debug, Clone, Copy)]
pub struct CAbi {
    target: Target,
}

impl CAbi {
    pub fn new(target: Target) -> Self {
        CAbi { target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The calling convention for every function this compiler emits.
    pub fn calling_convention(&self) -> CallConv {
        if self.target.os == Os::Windows && self.target.abi == Abi::Msvc {
            CallConv::Win64
        } else {
            CallConv::C
        }
    }

    /// Linkage for a function definition. `extern` and `export` functions
    /// are externally visible, as is `main` regardless of flags; every
    /// other user function is internal to the module.
    pub fn linkage_for(&self, function: &Function) -> Linkage {
        if function.is_extern || function.is_export || function.name == "main" {
            Linkage::External
        } else {
            Linkage::Internal
        }
    }

    /// Map a source-level name to the platform external symbol. Identity on
    /// every target in scope; kept as the single point to evolve if a
    /// platform with decorated symbols is ever added.
    pub fn extern_name<'a>(&self, source_name: &'a str) -> &'a str {
        source_name
    }
}
