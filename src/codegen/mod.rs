//! The seam between the IR and a code generator.
//!
//! A [`CodegenTarget`] describes the machine it generates code for, so modules
//! can be stamped with the target they are built against, and turns a
//! validated [`Module`] into something executable.

use std::fmt;

use crate::ir::Module;
use errors::CodegenError;

pub mod errors;
#[cfg(feature = "llvm")]
pub mod llvm;

/// What a module needs to know about the machine it is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescription {
    pub triple: String,
    pub data_layout: String,
}

impl fmt::Display for TargetDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.triple, self.data_layout)
    }
}

pub trait CodegenTarget {
    type Executable;

    /// The target triple and data layout modules for this target must carry.
    fn describe(&self) -> Result<TargetDescription, CodegenError>;

    fn compile(&self, module: &Module) -> Result<Self::Executable, CodegenError>;
}

/// Fails unless `module` was built against the target `description` describes.
pub fn check_target(module: &Module, description: &TargetDescription) -> Result<(), CodegenError> {
    if module.target() == description {
        Ok(())
    } else {
        Err(CodegenError::TargetMismatch {
            module: module.target().triple.clone(),
            target: description.triple.clone(),
        })
    }
}
