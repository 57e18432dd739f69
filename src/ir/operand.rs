use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use educe::Educe;

use super::{
    errors::IllTypedError,
    types::{FloatTy, ScalarType},
    witness::IsScalar,
};

/// Constant data, untyped until paired with a [`ScalarType`].
///
/// Floats compare and hash by bit pattern so constants can be used as keys.
#[derive(Debug, Clone, Copy, Educe)]
#[educe(PartialEq, Hash)]
pub enum ConstValue {
    Bool(bool),
    Int(i128),
    Float(#[educe(PartialEq(method(float_bits_eq)), Hash(method(hash_float_bits)))] f64),
}

impl Eq for ConstValue {}

fn float_bits_eq(a: &f64, b: &f64) -> bool {
    a.to_bits() == b.to_bits()
}

fn hash_float_bits<H: Hasher>(value: &f64, state: &mut H) {
    value.to_bits().hash(state);
}

impl ConstValue {
    /// Whether this constant is representable as a value of `ty`.
    pub fn fits(&self, ty: ScalarType) -> bool {
        match (self, ty) {
            (ConstValue::Bool(_), ScalarType::Bool) => true,
            (ConstValue::Int(value), ScalarType::Int(_)) => {
                let bits = ty.bit_width();
                let min = -(1i128 << (bits - 1));
                let max = (1i128 << (bits - 1)) - 1;
                (min..=max).contains(value)
            }
            (ConstValue::Int(value), ScalarType::Uint(_)) => {
                let max = (1i128 << ty.bit_width()) - 1;
                (0..=max).contains(value)
            }
            (ConstValue::Float(value), ScalarType::Float(FloatTy::F32)) => {
                !value.is_finite() || value.abs() <= f64::from(f32::MAX)
            }
            (ConstValue::Float(_), ScalarType::Float(FloatTy::F64)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(value) => write!(f, "{value}"),
            ConstValue::Int(value) => write!(f, "{value}"),
            ConstValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// A basic block or function label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The untyped identity of a local value, unique within one function body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalName {
    Number(u32),
    Symbol(Arc<str>),
}

impl fmt::Display for LocalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalName::Number(n) => write!(f, "%{n}"),
            LocalName::Symbol(s) => write!(f, "%{s}"),
        }
    }
}

/// The function body a name was issued for. No two name supplies share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope(u64);

impl Scope {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A name bound to the result of an instruction of type `T`.
///
/// Names are only handed out by a [`NameSupply`](super::builder::NameSupply),
/// either for a function parameter or for an instruction that was just bound,
/// and are only valid in the body that supply belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name<T> {
    scope: Scope,
    local: LocalName,
    ty: PhantomData<fn() -> T>,
}

impl<T> Name<T> {
    pub(crate) fn new(scope: Scope, local: LocalName) -> Self {
        Self {
            scope,
            local,
            ty: PhantomData,
        }
    }

    pub fn local(&self) -> &LocalName {
        &self.local
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl<T: IsScalar> Name<T> {
    pub fn operand(&self) -> Operand<T> {
        Operand::Local(self.clone())
    }
}

impl<T> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.local.fmt(f)
    }
}

/// A typed value consumed by an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<T: IsScalar> {
    Constant(T::Repr),
    Local(Name<T>),
}

impl<T: IsScalar> Operand<T> {
    pub fn constant(value: T::Repr) -> Self {
        Operand::Constant(value)
    }

    pub fn ty(&self) -> ScalarType {
        T::SCALAR
    }

    /// Forgets the static type, keeping it as a runtime tag.
    pub fn into_value(self) -> Value {
        match self {
            Operand::Constant(value) => Value {
                ty: T::SCALAR,
                kind: ValueKind::Constant(T::constant(value)),
                scope: None,
            },
            Operand::Local(name) => Value::scoped(T::SCALAR, name.scope, name.local),
        }
    }
}

impl<T: IsScalar> From<Name<T>> for Operand<T> {
    fn from(value: Name<T>) -> Self {
        Operand::Local(value)
    }
}

impl<T: IsScalar> From<&Name<T>> for Operand<T> {
    fn from(value: &Name<T>) -> Self {
        Operand::Local(value.clone())
    }
}

/// An operand whose type is only known at runtime.
///
/// Locals that came from a typed [`Name`] remember the body they belong to.
/// Locals made with [`Value::local`] have no scope and are matched by name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    ty: ScalarType,
    kind: ValueKind,
    scope: Option<Scope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Constant(ConstValue),
    Local(LocalName),
}

impl Value {
    /// A constant of the given type, rejected if the value does not fit it.
    pub fn constant(ty: ScalarType, value: ConstValue) -> Result<Self, IllTypedError> {
        if !value.fits(ty) {
            return Err(IllTypedError::ConstantOutOfRange { ty, value });
        }
        Ok(Self {
            ty,
            kind: ValueKind::Constant(value),
            scope: None,
        })
    }

    pub fn local(ty: ScalarType, name: LocalName) -> Self {
        Self {
            ty,
            kind: ValueKind::Local(name),
            scope: None,
        }
    }

    pub(crate) fn scoped(ty: ScalarType, scope: Scope, name: LocalName) -> Self {
        Self {
            ty,
            kind: ValueKind::Local(name),
            scope: Some(scope),
        }
    }

    /// The body a local belongs to, when it is known.
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn ty(&self) -> ScalarType {
        self.ty
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn as_local(&self) -> Option<&LocalName> {
        match &self.kind {
            ValueKind::Local(name) => Some(name),
            ValueKind::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<ConstValue> {
        match &self.kind {
            ValueKind::Constant(value) => Some(*value),
            ValueKind::Local(_) => None,
        }
    }

    /// Checks a constant still fits its type.
    pub(crate) fn check(&self) -> Result<(), IllTypedError> {
        match &self.kind {
            ValueKind::Constant(value) if !value.fits(self.ty) => {
                Err(IllTypedError::ConstantOutOfRange {
                    ty: self.ty,
                    value: *value,
                })
            }
            _ => Ok(()),
        }
    }
}

impl<T: IsScalar> From<Operand<T>> for Value {
    fn from(value: Operand<T>) -> Self {
        value.into_value()
    }
}
