use std::{cmp::Ordering, fmt};

/// A scalar type: the only kind of value an instruction can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    Bool,
    Int(IntTy),
    Uint(UintTy),
    Float(FloatTy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UintTy {
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloatTy {
    F32,
    F64,
}

impl ScalarType {
    /// Every scalar type, in lattice order.
    pub const ALL: [ScalarType; 11] = [
        ScalarType::Bool,
        ScalarType::Int(IntTy::I8),
        ScalarType::Int(IntTy::I16),
        ScalarType::Int(IntTy::I32),
        ScalarType::Int(IntTy::I64),
        ScalarType::Uint(UintTy::U8),
        ScalarType::Uint(UintTy::U16),
        ScalarType::Uint(UintTy::U32),
        ScalarType::Uint(UintTy::U64),
        ScalarType::Float(FloatTy::F32),
        ScalarType::Float(FloatTy::F64),
    ];

    /// Returns the type bit width.
    pub fn bit_width(&self) -> u32 {
        match self {
            ScalarType::Bool => 1,
            ScalarType::Int(ty) => match ty {
                IntTy::I8 => 8,
                IntTy::I16 => 16,
                IntTy::I32 => 32,
                IntTy::I64 => 64,
            },
            ScalarType::Uint(ty) => match ty {
                UintTy::U8 => 8,
                UintTy::U16 => 16,
                UintTy::U32 => 32,
                UintTy::U64 => 64,
            },
            ScalarType::Float(ty) => match ty {
                FloatTy::F32 => 32,
                FloatTy::F64 => 64,
            },
        }
    }

    /// Orders two types by bit width only, ignoring signedness and domain.
    pub fn width_compare(&self, other: &ScalarType) -> Ordering {
        self.bit_width().cmp(&other.bit_width())
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, ScalarType::Int(_) | ScalarType::Uint(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, ScalarType::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, ScalarType::Bool)
    }

    /// Integral or floating.
    pub fn is_num(&self) -> bool {
        self.is_integral() || self.is_float()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int(ty) => match ty {
                IntTy::I8 => write!(f, "i8"),
                IntTy::I16 => write!(f, "i16"),
                IntTy::I32 => write!(f, "i32"),
                IntTy::I64 => write!(f, "i64"),
            },
            ScalarType::Uint(ty) => match ty {
                UintTy::U8 => write!(f, "u8"),
                UintTy::U16 => write!(f, "u16"),
                UintTy::U32 => write!(f, "u32"),
                UintTy::U64 => write!(f, "u64"),
            },
            ScalarType::Float(ty) => match ty {
                FloatTy::F32 => write!(f, "f32"),
                FloatTy::F64 => write!(f, "f64"),
            },
        }
    }
}

/// The result type of an instruction or function: a scalar, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Void,
    Scalar(ScalarType),
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            Type::Void => None,
            Type::Scalar(ty) => Some(*ty),
        }
    }
}

impl From<ScalarType> for Type {
    fn from(value: ScalarType) -> Self {
        Type::Scalar(value)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "()"),
            Type::Scalar(ty) => write!(f, "{ty}"),
        }
    }
}
