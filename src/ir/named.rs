use super::{
    errors::IllTypedError,
    instruction::{Instruction, InstructionKind},
    operand::{LocalName, Name},
    types::{ScalarType, Type},
    witness::IsScalar,
};

/// An instruction attached to a block, with or without a name for its result.
#[derive(Debug, Clone, PartialEq)]
pub enum Named {
    /// The result is bound to `name` and can be used by later instructions.
    Bind {
        name: LocalName,
        ty: ScalarType,
        instruction: InstructionKind,
    },
    /// The instruction produces no value and is kept for its effects.
    Discard(InstructionKind),
}

impl Named {
    pub fn bind<T: IsScalar>(name: Name<T>, instruction: Instruction<T>) -> Self {
        Named::Bind {
            name: name.local().clone(),
            ty: T::SCALAR,
            instruction: instruction.into_kind(),
        }
    }

    pub fn discard(instruction: Instruction<()>) -> Self {
        Named::Discard(instruction.into_kind())
    }

    /// Binds a name to an instruction whose type is only known at runtime.
    pub fn try_bind(name: LocalName, instruction: InstructionKind) -> Result<Self, IllTypedError> {
        match instruction.type_check()? {
            Type::Void => Err(IllTypedError::BindUnit),
            Type::Scalar(ty) => Ok(Named::Bind {
                name,
                ty,
                instruction,
            }),
        }
    }

    pub fn try_discard(instruction: InstructionKind) -> Result<Self, IllTypedError> {
        match instruction.type_check()? {
            Type::Void => Ok(Named::Discard(instruction)),
            Type::Scalar(ty) => Err(IllTypedError::DiscardValue { ty }),
        }
    }

    pub fn name(&self) -> Option<&LocalName> {
        match self {
            Named::Bind { name, .. } => Some(name),
            Named::Discard(_) => None,
        }
    }

    pub fn instruction(&self) -> &InstructionKind {
        match self {
            Named::Bind { instruction, .. } | Named::Discard(instruction) => instruction,
        }
    }

    pub fn result_type(&self) -> Type {
        match self {
            Named::Bind { ty, .. } => Type::Scalar(*ty),
            Named::Discard(_) => Type::Void,
        }
    }
}
