//! Type-level witnesses for the scalar type lattice.
//!
//! Every scalar type has a zero-sized witness type (`I32`, `F64`, ...) that
//! carries its [`ScalarType`], its host representation for constants and its
//! bit width as a type-level marker. Instruction constructors are generic over
//! these witnesses, so a cast between two types only compiles when the width
//! relation between them is the one the cast requires.
//!
//! ```
//! use typed_llvm_ir::ir::{BitCast, Extend, F32, I32, I64, Truncate, U32};
//!
//! fn truncates<S: Truncate<D>, D: typed_llvm_ir::ir::IsIntegral>() {}
//! fn extends<S: Extend<D>, D: typed_llvm_ir::ir::IsIntegral>() {}
//! fn bitcasts<S: BitCast<D>, D: typed_llvm_ir::ir::IsScalar>() {}
//!
//! truncates::<I64, U32>();
//! extends::<U32, I64>();
//! bitcasts::<F32, I32>();
//! bitcasts::<I32, F32>();
//! ```
//!
//! ```compile_fail
//! use typed_llvm_ir::ir::{BitCast, F32, I64};
//!
//! fn bitcasts<S: BitCast<D>, D: typed_llvm_ir::ir::IsScalar>() {}
//! bitcasts::<F32, I64>();
//! ```

use std::fmt::Debug;

use super::{
    operand::ConstValue,
    types::{FloatTy, IntTy, ScalarType, Type, UintTy},
};

/// A type an instruction or function can produce: a scalar witness or `()`.
pub trait Returns: Copy + Debug + 'static {
    const TYPE: Type;
}

impl Returns for () {
    const TYPE: Type = Type::Void;
}

/// A scalar witness.
pub trait IsScalar: Returns {
    /// The host type used to write constants of this type.
    type Repr: Copy + Debug + PartialEq;
    /// The type-level bit width.
    type Width: BitWidth;

    const SCALAR: ScalarType;

    fn constant(value: Self::Repr) -> ConstValue;
}

/// Integral or floating witnesses, the operands of `add`, `sub` and `mul`.
pub trait IsNum: IsScalar {}

pub trait IsIntegral: IsNum {}

pub trait IsFloating: IsNum {}

/// A bit width lifted to the type level.
pub trait BitWidth: 'static {
    const BITS: u32;
}

pub enum W1 {}
pub enum W8 {}
pub enum W16 {}
pub enum W32 {}
pub enum W64 {}

impl BitWidth for W1 {
    const BITS: u32 = 1;
}
impl BitWidth for W8 {
    const BITS: u32 = 8;
}
impl BitWidth for W16 {
    const BITS: u32 = 16;
}
impl BitWidth for W32 {
    const BITS: u32 = 32;
}
impl BitWidth for W64 {
    const BITS: u32 = 64;
}

/// `Self` is strictly wider than `W`.
pub trait Exceeds<W: BitWidth>: BitWidth {}

impl Exceeds<W1> for W8 {}
impl Exceeds<W1> for W16 {}
impl Exceeds<W8> for W16 {}
impl Exceeds<W1> for W32 {}
impl Exceeds<W8> for W32 {}
impl Exceeds<W16> for W32 {}
impl Exceeds<W1> for W64 {}
impl Exceeds<W8> for W64 {}
impl Exceeds<W16> for W64 {}
impl Exceeds<W32> for W64 {}

/// `Self` and `W` are the same width.
pub trait SameWidth<W: BitWidth>: BitWidth {}

impl<W: BitWidth> SameWidth<W> for W {}

/// Integer truncation from `Self` to the strictly narrower `D`.
pub trait Truncate<D: IsIntegral>: IsIntegral {}

impl<S, D> Truncate<D> for S
where
    S: IsIntegral,
    D: IsIntegral,
    S::Width: Exceeds<D::Width>,
{
}

/// Integer extension from `Self` to the strictly wider `D`.
pub trait Extend<D: IsIntegral>: IsIntegral {}

impl<S, D> Extend<D> for S
where
    S: IsIntegral,
    D: IsIntegral,
    D::Width: Exceeds<S::Width>,
{
}

pub trait FloatTruncate<D: IsFloating>: IsFloating {}

impl<S, D> FloatTruncate<D> for S
where
    S: IsFloating,
    D: IsFloating,
    S::Width: Exceeds<D::Width>,
{
}

pub trait FloatExtend<D: IsFloating>: IsFloating {}

impl<S, D> FloatExtend<D> for S
where
    S: IsFloating,
    D: IsFloating,
    D::Width: Exceeds<S::Width>,
{
}

/// Reinterpreting the bits of `Self` as `D`, legal between equal widths.
pub trait BitCast<D: IsScalar>: IsScalar {}

impl<S, D> BitCast<D> for S
where
    S: IsScalar,
    D: IsScalar,
    S::Width: SameWidth<D::Width>,
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bool {}

impl Returns for Bool {
    const TYPE: Type = Type::Scalar(ScalarType::Bool);
}

impl IsScalar for Bool {
    type Repr = bool;
    type Width = W1;

    const SCALAR: ScalarType = ScalarType::Bool;

    fn constant(value: bool) -> ConstValue {
        ConstValue::Bool(value)
    }
}

macro_rules! integral_witness {
    ($name:ident, $repr:ty, $width:ty, $scalar:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {}

        impl Returns for $name {
            const TYPE: Type = Type::Scalar($scalar);
        }

        impl IsScalar for $name {
            type Repr = $repr;
            type Width = $width;

            const SCALAR: ScalarType = $scalar;

            fn constant(value: $repr) -> ConstValue {
                ConstValue::Int(value.into())
            }
        }

        impl IsNum for $name {}
        impl IsIntegral for $name {}
    };
}

macro_rules! floating_witness {
    ($name:ident, $repr:ty, $width:ty, $scalar:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {}

        impl Returns for $name {
            const TYPE: Type = Type::Scalar($scalar);
        }

        impl IsScalar for $name {
            type Repr = $repr;
            type Width = $width;

            const SCALAR: ScalarType = $scalar;

            fn constant(value: $repr) -> ConstValue {
                ConstValue::Float(value.into())
            }
        }

        impl IsNum for $name {}
        impl IsFloating for $name {}
    };
}

integral_witness!(I8, i8, W8, ScalarType::Int(IntTy::I8));
integral_witness!(I16, i16, W16, ScalarType::Int(IntTy::I16));
integral_witness!(I32, i32, W32, ScalarType::Int(IntTy::I32));
integral_witness!(I64, i64, W64, ScalarType::Int(IntTy::I64));
integral_witness!(U8, u8, W8, ScalarType::Uint(UintTy::U8));
integral_witness!(U16, u16, W16, ScalarType::Uint(UintTy::U16));
integral_witness!(U32, u32, W32, ScalarType::Uint(UintTy::U32));
integral_witness!(U64, u64, W64, ScalarType::Uint(UintTy::U64));
floating_witness!(F32, f32, W32, ScalarType::Float(FloatTy::F32));
floating_witness!(F64, f64, W64, ScalarType::Float(FloatTy::F64));

/// The type of shift amounts.
pub type Word = U64;
