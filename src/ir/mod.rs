//! A typed representation of LLVM-style SSA functions.
//!
//! There are two views of the same IR. The typed view ([`Instruction`],
//! [`Terminator`], [`Operand`], [`Name`]) checks typing rules at compile time
//! through witness types such as [`I32`] and [`F64`]. The erased view
//! ([`InstructionKind`], [`TerminatorKind`], [`Value`]) carries types as
//! runtime tags, is checked by `type_check`, and is what code generators read.
//!
//! ```
//! use typed_llvm_ir::ir::{Body, FunctionBuilder, I32, Instruction, Lam, Operand, Terminator};
//!
//! type Double = Lam<I32, Body<I32>>;
//!
//! let (mut builder, (x, ())) = FunctionBuilder::<Double>::new("double");
//! let doubled = builder.bind(Instruction::mul(x.operand(), Operand::constant(2)))?;
//! builder.terminate(Terminator::ret_val(doubled.operand()))?;
//! let function = builder.finish()?;
//!
//! assert_eq!(function.blocks().len(), 1);
//! # Ok::<(), typed_llvm_ir::ir::IllTypedError>(())
//! ```

mod builder;
pub(crate) mod cfg;
mod errors;
mod function;
mod instruction;
mod module;
mod named;
mod operand;
mod terminator;
mod types;
mod witness;

pub use builder::{FunctionBuilder, NameSupply};
pub use errors::IllTypedError;
pub use function::{
    Arguments, BasicBlock, Body, Function, FunctionDef, FunctionType, Lam, Signature,
};
pub use instruction::{
    BinOp, CastOp, CmpPredicate, FunctionAttribute, Instruction, InstructionKind,
};
pub use module::Module;
pub use named::Named;
pub use operand::{ConstValue, Label, LocalName, Name, Operand, Scope, Value, ValueKind};
pub use terminator::{Terminator, TerminatorKind};
pub use types::{FloatTy, IntTy, ScalarType, Type, UintTy};
pub use witness::{
    BitCast, BitWidth, Bool, Exceeds, Extend, F32, F64, FloatExtend, FloatTruncate, I8, I16, I32,
    I64, IsFloating, IsIntegral, IsNum, IsScalar, Returns, SameWidth, Truncate, U8, U16, U32, U64,
    W1, W8, W16, W32, W64, Word,
};
