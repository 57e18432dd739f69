use std::{fmt, marker::PhantomData};

use itertools::Itertools;

use super::{
    errors::IllTypedError,
    function::{Arguments, FunctionType, Signature},
    operand::{Label, Operand, Value},
    types::{ScalarType, Type},
    witness::{
        BitCast, Bool, Extend, FloatExtend, FloatTruncate, IsFloating, IsIntegral, IsNum,
        IsScalar, Returns, Truncate, Word,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Integer division, rounding toward zero.
    Quot,
    /// Integer remainder, with the sign of the dividend.
    Rem,
    /// Floating point division.
    Div,
    ShiftLeft,
    ShiftRightLogical,
    ShiftRightArithmetic,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Quot => "quot",
            BinOp::Rem => "rem",
            BinOp::Div => "div",
            BinOp::ShiftLeft => "shl",
            BinOp::ShiftRightLogical => "lshr",
            BinOp::ShiftRightArithmetic => "ashr",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        }
    }

    pub fn is_shift(&self) -> bool {
        matches!(
            self,
            BinOp::ShiftLeft | BinOp::ShiftRightLogical | BinOp::ShiftRightArithmetic
        )
    }

    /// Returns the result type of this operation on the given operand types.
    pub fn check(&self, lhs: ScalarType, rhs: ScalarType) -> Result<ScalarType, IllTypedError> {
        if self.is_shift() {
            if !lhs.is_integral() {
                return Err(IllTypedError::UnsupportedOperand {
                    op: self.name(),
                    ty: lhs,
                });
            }
            expect_type(Word::SCALAR, rhs)?;
            return Ok(lhs);
        }

        expect_type(lhs, rhs)?;

        let supported = match self {
            BinOp::Add | BinOp::Sub | BinOp::Mul => lhs.is_num(),
            BinOp::Quot | BinOp::Rem | BinOp::And | BinOp::Or | BinOp::Xor => lhs.is_integral(),
            BinOp::Div => lhs.is_float(),
            BinOp::ShiftLeft | BinOp::ShiftRightLogical | BinOp::ShiftRightArithmetic => {
                unreachable!("shifts are checked above")
            }
        };

        if supported {
            Ok(lhs)
        } else {
            Err(IllTypedError::UnsupportedOperand {
                op: self.name(),
                ty: lhs,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CastOp {
    Trunc,
    FloatTrunc,
    /// Sign extension for signed sources, zero extension otherwise.
    Ext,
    FloatExt,
    FloatToInt,
    IntToFloat,
    BitCast,
}

impl CastOp {
    pub fn name(&self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::FloatTrunc => "fptrunc",
            CastOp::Ext => "ext",
            CastOp::FloatExt => "fpext",
            CastOp::FloatToInt => "fptoint",
            CastOp::IntToFloat => "inttofp",
            CastOp::BitCast => "bitcast",
        }
    }

    /// Checks the width and domain relation this cast requires.
    pub fn check(&self, from: ScalarType, to: ScalarType) -> Result<(), IllTypedError> {
        let width = from.width_compare(&to);
        let legal = match self {
            CastOp::Trunc => from.is_integral() && to.is_integral() && width.is_gt(),
            CastOp::FloatTrunc => from.is_float() && to.is_float() && width.is_gt(),
            CastOp::Ext => from.is_integral() && to.is_integral() && width.is_lt(),
            CastOp::FloatExt => from.is_float() && to.is_float() && width.is_lt(),
            CastOp::FloatToInt => from.is_float() && to.is_integral(),
            CastOp::IntToFloat => from.is_integral() && to.is_float(),
            CastOp::BitCast => width.is_eq(),
        };

        if legal {
            Ok(())
        } else {
            Err(IllTypedError::InvalidCast {
                op: self.name(),
                from,
                to,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Side-effect and termination guarantees attached to a call site.
///
/// Purely advisory: the generator may use them to optimize, nothing checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FunctionAttribute {
    NoReturn,
    NoUnwind,
    ReadOnly,
    ReadNone,
}

impl FunctionAttribute {
    /// The LLVM attribute name.
    pub fn name(&self) -> &'static str {
        match self {
            FunctionAttribute::NoReturn => "noreturn",
            FunctionAttribute::NoUnwind => "nounwind",
            FunctionAttribute::ReadOnly => "readonly",
            FunctionAttribute::ReadNone => "readnone",
        }
    }
}

impl fmt::Display for FunctionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A non-terminating instruction with its result type as a runtime tag.
///
/// This is the form handed to code generators. Values built through
/// [`Instruction`] always pass [`InstructionKind::type_check`]; values built
/// by hand must be checked before they are attached to a block.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Binary {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
        to: ScalarType,
    },
    Cmp {
        predicate: CmpPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Picks `if_true` when the condition holds, `if_false` otherwise.
    Select {
        condition: Value,
        if_true: Value,
        if_false: Value,
    },
    Phi {
        ty: ScalarType,
        incoming: Vec<(Value, Label)>,
    },
    Call {
        callee: Label,
        ty: FunctionType,
        args: Vec<Value>,
        attributes: Vec<FunctionAttribute>,
    },
}

impl InstructionKind {
    /// Checks the typing rules of this instruction, returning its result type.
    pub fn type_check(&self) -> Result<Type, IllTypedError> {
        match self {
            InstructionKind::Binary { op, lhs, rhs } => {
                lhs.check()?;
                rhs.check()?;
                op.check(lhs.ty(), rhs.ty()).map(Type::Scalar)
            }
            InstructionKind::Cast { op, value, to } => {
                value.check()?;
                op.check(value.ty(), *to)?;
                Ok(Type::Scalar(*to))
            }
            InstructionKind::Cmp { lhs, rhs, .. } => {
                lhs.check()?;
                rhs.check()?;
                expect_type(lhs.ty(), rhs.ty())?;
                Ok(Type::Scalar(ScalarType::Bool))
            }
            InstructionKind::Select {
                condition,
                if_true,
                if_false,
            } => {
                condition.check()?;
                if_true.check()?;
                if_false.check()?;
                expect_type(ScalarType::Bool, condition.ty())?;
                expect_type(if_true.ty(), if_false.ty())?;
                Ok(Type::Scalar(if_true.ty()))
            }
            InstructionKind::Phi { ty, incoming } => {
                if incoming.is_empty() {
                    return Err(IllTypedError::EmptyPhi);
                }
                for (value, _) in incoming {
                    value.check()?;
                    expect_type(*ty, value.ty())?;
                }
                Ok(Type::Scalar(*ty))
            }
            InstructionKind::Call {
                callee, ty, args, ..
            } => {
                ty.check_arguments(callee, args)?;
                Ok(ty.ret)
            }
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstructionKind::Phi { .. })
    }

    /// All values read by this instruction, in operand order.
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            InstructionKind::Binary { lhs, rhs, .. } | InstructionKind::Cmp { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            InstructionKind::Cast { value, .. } => vec![value],
            InstructionKind::Select {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            InstructionKind::Phi { incoming, .. } => incoming.iter().map(|(v, _)| v).collect(),
            InstructionKind::Call { args, .. } => args.iter().collect(),
        }
    }
}

/// Fails with a mismatch unless `found` is `expected`.
pub(crate) fn expect_type(expected: ScalarType, found: ScalarType) -> Result<(), IllTypedError> {
    if expected == found {
        Ok(())
    } else {
        Err(IllTypedError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        })
    }
}

/// A non-terminating instruction producing a value of type `T`.
///
/// The constructors are the typing rules: each one only exists for the
/// operand and result types the operation is defined on.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<T> {
    kind: InstructionKind,
    ty: PhantomData<fn() -> T>,
}

impl<T: Returns> Instruction<T> {
    fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            ty: PhantomData,
        }
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn into_kind(self) -> InstructionKind {
        self.kind
    }

    pub fn result_type(&self) -> Type {
        T::TYPE
    }

    /// Calls `callee` with one operand per parameter, in declaration order.
    ///
    /// ```
    /// use typed_llvm_ir::ir::{Body, F64, I32, Instruction, Lam, Operand, Signature};
    ///
    /// let callee = Lam::<I32, Lam<F64, Body<F64>>>::declare("scale");
    /// let args = (Operand::constant(2), (Operand::constant(0.5), ()));
    /// let call = Instruction::call(&callee, args, &[]);
    /// assert!(call.kind().type_check().is_ok());
    /// ```
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{Body, F64, I32, Instruction, Lam, Operand, Signature};
    ///
    /// let callee = Lam::<I32, Lam<F64, Body<F64>>>::declare("scale");
    /// let call = Instruction::call(&callee, (Operand::constant(2), ()), &[]);
    /// ```
    ///
    /// Arguments are checked against the parameters in order:
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{Body, F64, I32, Instruction, Lam, Operand, Signature};
    ///
    /// let callee = Lam::<I32, Lam<F64, Body<F64>>>::declare("scale");
    /// let args = (Operand::<F64>::constant(0.5), (Operand::<I32>::constant(2), ()));
    /// let call = Instruction::call(&callee, args, &[]);
    /// ```
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{Body, F64, I32, Instruction, Lam, Operand, Signature};
    ///
    /// let callee = Lam::<I32, Lam<F64, Body<F64>>>::declare("scale");
    /// let args = (
    ///     Operand::constant(2),
    ///     (Operand::constant(0.5), (Operand::<I32>::constant(1), ())),
    /// );
    /// let call = Instruction::call(&callee, args, &[]);
    /// ```
    pub fn call<F>(callee: &F, args: F::Args, attributes: &[FunctionAttribute]) -> Self
    where
        F: Signature<Ret = T>,
    {
        let mut values = Vec::new();
        args.collect_values(&mut values);
        Self::new(InstructionKind::Call {
            callee: callee.label().clone(),
            ty: callee.function_type(),
            args: values,
            attributes: attributes.iter().copied().unique().collect(),
        })
    }
}

impl<T: IsNum> Instruction<T> {
    fn binary(op: BinOp, lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::new(InstructionKind::Binary {
            op,
            lhs: lhs.into_value(),
            rhs: rhs.into_value(),
        })
    }

    pub fn add(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Mul, lhs, rhs)
    }
}

impl<T: IsIntegral> Instruction<T> {
    pub fn quot(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Quot, lhs, rhs)
    }

    pub fn rem(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Rem, lhs, rhs)
    }

    pub fn and(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::And, lhs, rhs)
    }

    pub fn or(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Or, lhs, rhs)
    }

    pub fn xor(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Xor, lhs, rhs)
    }

    fn shift(op: BinOp, value: Operand<T>, amount: Operand<Word>) -> Self {
        Self::new(InstructionKind::Binary {
            op,
            lhs: value.into_value(),
            rhs: amount.into_value(),
        })
    }

    pub fn shift_left(value: Operand<T>, amount: Operand<Word>) -> Self {
        Self::shift(BinOp::ShiftLeft, value, amount)
    }

    pub fn shift_right_logical(value: Operand<T>, amount: Operand<Word>) -> Self {
        Self::shift(BinOp::ShiftRightLogical, value, amount)
    }

    pub fn shift_right_arithmetic(value: Operand<T>, amount: Operand<Word>) -> Self {
        Self::shift(BinOp::ShiftRightArithmetic, value, amount)
    }

    /// Truncates a strictly wider integer.
    ///
    /// ```
    /// use typed_llvm_ir::ir::{I64, Instruction, Operand, U8};
    ///
    /// let narrow = Instruction::<U8>::trunc(Operand::<I64>::constant(300));
    /// assert!(narrow.kind().type_check().is_ok());
    /// ```
    ///
    /// Truncating to an equal or wider type does not compile:
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{I32, I64, Instruction, Operand};
    ///
    /// let _ = Instruction::<I64>::trunc(Operand::<I32>::constant(1));
    /// ```
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{I32, Instruction, Operand};
    ///
    /// let _ = Instruction::<I32>::trunc(Operand::<I32>::constant(1));
    /// ```
    pub fn trunc<S: Truncate<T>>(value: Operand<S>) -> Self {
        Self::cast(CastOp::Trunc, value)
    }

    /// Extends a strictly narrower integer, by sign when the source is signed.
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{I16, I64, Instruction, Operand};
    ///
    /// let _ = Instruction::<I16>::ext(Operand::<I64>::constant(1));
    /// ```
    pub fn ext<S: Extend<T>>(value: Operand<S>) -> Self {
        Self::cast(CastOp::Ext, value)
    }

    pub fn float_to_int<S: IsFloating>(value: Operand<S>) -> Self {
        Self::cast(CastOp::FloatToInt, value)
    }
}

impl<T: IsFloating> Instruction<T> {
    pub fn div(lhs: Operand<T>, rhs: Operand<T>) -> Self {
        Self::binary(BinOp::Div, lhs, rhs)
    }

    pub fn float_trunc<S: FloatTruncate<T>>(value: Operand<S>) -> Self {
        Self::cast(CastOp::FloatTrunc, value)
    }

    pub fn float_ext<S: FloatExtend<T>>(value: Operand<S>) -> Self {
        Self::cast(CastOp::FloatExt, value)
    }

    pub fn int_to_float<S: IsIntegral>(value: Operand<S>) -> Self {
        Self::cast(CastOp::IntToFloat, value)
    }
}

impl<T: IsScalar> Instruction<T> {
    fn cast<S: IsScalar>(op: CastOp, value: Operand<S>) -> Self {
        Self::new(InstructionKind::Cast {
            op,
            value: value.into_value(),
            to: T::SCALAR,
        })
    }

    /// Reinterprets the bits of a value of the same width.
    ///
    /// ```compile_fail
    /// use typed_llvm_ir::ir::{F32, I64, Instruction, Operand};
    ///
    /// let _ = Instruction::<I64>::bit_cast(Operand::<F32>::constant(1.0));
    /// ```
    pub fn bit_cast<S: BitCast<T>>(value: Operand<S>) -> Self {
        Self::cast(CastOp::BitCast, value)
    }

    pub fn select(condition: Operand<Bool>, if_true: Operand<T>, if_false: Operand<T>) -> Self {
        Self::new(InstructionKind::Select {
            condition: condition.into_value(),
            if_true: if_true.into_value(),
            if_false: if_false.into_value(),
        })
    }

    /// Merges the values flowing in from each predecessor block.
    pub fn phi(
        incoming: impl IntoIterator<Item = (Operand<T>, Label)>,
    ) -> Result<Self, IllTypedError> {
        let incoming = incoming
            .into_iter()
            .map(|(value, label)| (value.into_value(), label))
            .collect_vec();

        if incoming.is_empty() {
            return Err(IllTypedError::EmptyPhi);
        }

        Ok(Self::new(InstructionKind::Phi {
            ty: T::SCALAR,
            incoming,
        }))
    }
}

impl Instruction<Bool> {
    pub fn cmp<S: IsScalar>(predicate: CmpPredicate, lhs: Operand<S>, rhs: Operand<S>) -> Self {
        Self::new(InstructionKind::Cmp {
            predicate,
            lhs: lhs.into_value(),
            rhs: rhs.into_value(),
        })
    }
}
