use thiserror::Error;

use crate::ir::IllTypedError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodegenError {
    #[error("llvm compile error: {0}")]
    LLVMCompileError(String),
    #[error("module targets {module}, the code generator targets {target}")]
    TargetMismatch { module: String, target: String },
    #[error("symbol {0} not found in compiled code")]
    SymbolNotFound(String),
    #[error(transparent)]
    IllTyped(#[from] IllTypedError),
}
