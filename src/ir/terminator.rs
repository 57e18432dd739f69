use std::marker::PhantomData;

use itertools::Itertools;

use super::{
    errors::IllTypedError,
    instruction::expect_type,
    operand::{ConstValue, Label, Operand, Value},
    types::{ScalarType, Type},
    witness::{Bool, IsIntegral, IsScalar, Returns},
};

/// The kind of terminator for a basic block, with operand types as runtime tags.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminatorKind {
    /// Return from a function producing no value.
    Ret,
    /// Return a value.
    RetVal(Value),
    /// Unconditional branch to the given target block.
    Br(Label),
    /// Conditional branching, used in ifs, while
    CondBr {
        condition: Value,
        if_true: Label,
        if_false: Label,
    },
    /// Multi-way branch on an integer.
    Switch {
        scrutinee: Value,
        /// Where to jump when no case matches.
        default: Label,
        /// The values to match the scrutinee against, each with its target.
        cases: Vec<(ConstValue, Label)>,
    },
}

impl TerminatorKind {
    /// Checks this terminator against the return type of the enclosing function.
    pub fn type_check(&self, ret: Type) -> Result<(), IllTypedError> {
        match self {
            TerminatorKind::Ret => {
                if ret.is_void() {
                    Ok(())
                } else {
                    Err(IllTypedError::TypeMismatch {
                        expected: ret,
                        found: Type::Void,
                    })
                }
            }
            TerminatorKind::RetVal(value) => {
                value.check()?;
                let found = Type::Scalar(value.ty());
                if found == ret {
                    Ok(())
                } else {
                    Err(IllTypedError::TypeMismatch {
                        expected: ret,
                        found,
                    })
                }
            }
            TerminatorKind::Br(_) => Ok(()),
            TerminatorKind::CondBr { condition, .. } => {
                condition.check()?;
                expect_type(ScalarType::Bool, condition.ty())
            }
            TerminatorKind::Switch {
                scrutinee, cases, ..
            } => {
                scrutinee.check()?;
                let ty = scrutinee.ty();
                if !ty.is_integral() {
                    return Err(IllTypedError::UnsupportedOperand { op: "switch", ty });
                }
                if let Some((value, _)) = cases.iter().find(|(value, _)| !value.fits(ty)) {
                    return Err(IllTypedError::ConstantOutOfRange { ty, value: *value });
                }
                check_unique_cases(cases)
            }
        }
    }

    /// The blocks control may continue in.
    pub fn successors(&self) -> Vec<&Label> {
        match self {
            TerminatorKind::Ret | TerminatorKind::RetVal(_) => Vec::new(),
            TerminatorKind::Br(target) => vec![target],
            TerminatorKind::CondBr {
                if_true, if_false, ..
            } => vec![if_true, if_false],
            TerminatorKind::Switch { default, cases, .. } => std::iter::once(default)
                .chain(cases.iter().map(|(_, label)| label))
                .collect(),
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            TerminatorKind::Ret | TerminatorKind::Br(_) => Vec::new(),
            TerminatorKind::RetVal(value) => vec![value],
            TerminatorKind::CondBr { condition, .. } => vec![condition],
            TerminatorKind::Switch { scrutinee, .. } => vec![scrutinee],
        }
    }
}

fn check_unique_cases(cases: &[(ConstValue, Label)]) -> Result<(), IllTypedError> {
    match cases.iter().map(|(value, _)| value).duplicates().next() {
        Some(value) => Err(IllTypedError::DuplicateSwitchCase { value: *value }),
        None => Ok(()),
    }
}

/// The terminator of a block in a function returning `R`.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminator<R> {
    kind: TerminatorKind,
    ret: PhantomData<fn() -> R>,
}

impl<R: Returns> Terminator<R> {
    fn new(kind: TerminatorKind) -> Self {
        Self {
            kind,
            ret: PhantomData,
        }
    }

    pub fn kind(&self) -> &TerminatorKind {
        &self.kind
    }

    pub fn into_kind(self) -> TerminatorKind {
        self.kind
    }

    pub fn br(target: Label) -> Self {
        Self::new(TerminatorKind::Br(target))
    }

    pub fn cond_br(condition: Operand<Bool>, if_true: Label, if_false: Label) -> Self {
        Self::new(TerminatorKind::CondBr {
            condition: condition.into_value(),
            if_true,
            if_false,
        })
    }

    /// Branches on an integer, rejecting case values that appear twice.
    pub fn switch<S: IsIntegral>(
        scrutinee: Operand<S>,
        default: Label,
        cases: impl IntoIterator<Item = (S::Repr, Label)>,
    ) -> Result<Self, IllTypedError> {
        let cases = cases
            .into_iter()
            .map(|(value, label)| (S::constant(value), label))
            .collect_vec();
        check_unique_cases(&cases)?;

        Ok(Self::new(TerminatorKind::Switch {
            scrutinee: scrutinee.into_value(),
            default,
            cases,
        }))
    }
}

impl Terminator<()> {
    pub fn ret() -> Self {
        Self::new(TerminatorKind::Ret)
    }
}

impl<R: IsScalar> Terminator<R> {
    pub fn ret_val(value: Operand<R>) -> Self {
        Self::new(TerminatorKind::RetVal(value.into_value()))
    }
}
