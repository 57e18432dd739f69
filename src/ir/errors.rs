use itertools::Itertools;
use thiserror::Error;

use super::{
    function::FunctionType,
    operand::{ConstValue, Label, LocalName},
    types::{ScalarType, Type},
};

/// An attempt to construct an ill-typed piece of IR.
///
/// These always point at a defect in the code driving the builder, so there
/// is no recovery path: the construction that produced one must not proceed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IllTypedError {
    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },
    #[error("{op} is not defined for operands of type {ty}")]
    UnsupportedOperand { op: &'static str, ty: ScalarType },
    #[error("{op} cannot convert {from} to {to}")]
    InvalidCast {
        op: &'static str,
        from: ScalarType,
        to: ScalarType,
    },
    #[error("constant {value} does not fit in {ty}")]
    ConstantOutOfRange { ty: ScalarType, value: ConstValue },
    #[error("call to {callee} has {found} arguments, needs {needs}")]
    CallArityMismatch {
        callee: Label,
        found: usize,
        needs: usize,
    },
    #[error("argument {index} of call to {callee} has type {found}, needs {needs}")]
    CallArgumentMismatch {
        callee: Label,
        index: usize,
        found: ScalarType,
        needs: ScalarType,
    },
    #[error("phi node has no incoming values")]
    EmptyPhi,
    #[error("phi node in block {block} follows a non-phi instruction")]
    PhiNotAtBlockEntry { block: Label },
    #[error("phi node in the entry block of {function}, which has no predecessors")]
    PhiInEntryBlock { function: Label },
    #[error(
        "phi node in {block} has incoming blocks [{}], its predecessors are [{}]",
        .found.iter().join(", "),
        .expected.iter().join(", ")
    )]
    PhiPredecessorMismatch {
        block: Label,
        expected: Vec<Label>,
        found: Vec<Label>,
    },
    #[error("switch case {value} appears more than once")]
    DuplicateSwitchCase { value: ConstValue },
    #[error("cannot bind a name to an instruction producing no value")]
    BindUnit,
    #[error("cannot discard the {ty} result of an instruction")]
    DiscardValue { ty: ScalarType },
    #[error("name {0} is already bound")]
    DuplicateName(LocalName),
    #[error("{0:?} is not a valid symbolic name, it must not be empty or start with a digit")]
    InvalidSymbol(String),
    #[error("use of unbound name {name} in {function}")]
    UnboundName { function: Label, name: LocalName },
    #[error("block {0} is defined more than once")]
    DuplicateLabel(Label),
    #[error("branch to undefined block {target} in {function}")]
    UndefinedLabel { function: Label, target: Label },
    #[error("branch to the entry block of {function} from {from}")]
    BranchToEntry { function: Label, from: Label },
    #[error("{name} is used in {block} of {function}, where its definition does not dominate the use")]
    UseNotDominated {
        function: Label,
        block: Label,
        name: LocalName,
    },
    #[error("block {0} has no terminator")]
    UnterminatedBlock(Label),
    #[error("no open block to append to, start one after a terminator")]
    NoOpenBlock,
    #[error("symbol {0} is defined more than once")]
    DuplicateSymbol(Label),
    #[error("call to unknown function {0}")]
    UnknownFunction(Label),
    #[error("{symbol} is known as {expected}, used as {found}")]
    SignatureMismatch {
        symbol: Label,
        expected: FunctionType,
        found: FunctionType,
    },
}
