//! Function signatures, blocks and finished functions.
//!
//! A signature is a chain of typed parameters ending in a body that carries
//! the function's label and return type. `Lam<I32, Lam<F64, Body<F64>>>` is a
//! function taking an `i32` and an `f64` and returning an `f64`.

use std::{fmt, marker::PhantomData};

use itertools::Itertools;

use super::{
    builder::NameSupply,
    errors::IllTypedError,
    named::Named,
    operand::{Label, LocalName, Name, Operand, Value},
    terminator::TerminatorKind,
    types::{ScalarType, Type},
    witness::{IsScalar, Returns},
};

/// The erased type of a function: its parameter types and return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<ScalarType>,
    pub ret: Type,
}

impl FunctionType {
    pub fn new(params: Vec<ScalarType>, ret: Type) -> Self {
        Self { params, ret }
    }

    /// Checks a call to `callee` passes one argument of the right type per parameter.
    pub fn check_arguments(&self, callee: &Label, args: &[Value]) -> Result<(), IllTypedError> {
        if args.len() != self.params.len() {
            return Err(IllTypedError::CallArityMismatch {
                callee: callee.clone(),
                found: args.len(),
                needs: self.params.len(),
            });
        }

        for (index, (arg, param)) in args.iter().zip(&self.params).enumerate() {
            if arg.ty() != *param {
                return Err(IllTypedError::CallArgumentMismatch {
                    callee: callee.clone(),
                    index,
                    found: arg.ty(),
                    needs: *param,
                });
            }
            arg.check()?;
        }

        Ok(())
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.params.iter().join(", "), self.ret)
    }
}

/// The operands of a call, nested the same way as the callee's parameters.
pub trait Arguments {
    fn collect_values(self, values: &mut Vec<Value>);
}

impl Arguments for () {
    fn collect_values(self, _values: &mut Vec<Value>) {}
}

impl<A: IsScalar, Rest: Arguments> Arguments for (Operand<A>, Rest) {
    fn collect_values(self, values: &mut Vec<Value>) {
        values.push(self.0.into_value());
        self.1.collect_values(values);
    }
}

/// A typed function signature.
pub trait Signature: Sized {
    type Ret: Returns;
    /// Operands a call must supply, e.g. `(Operand<I32>, (Operand<F64>, ()))`.
    type Args: Arguments;
    /// Names the body can refer the parameters by, e.g. `(Name<I32>, (Name<F64>, ()))`.
    type Params;

    fn label(&self) -> &Label;

    fn param_types(types: &mut Vec<ScalarType>);

    /// Builds the signature with a fresh name for every parameter.
    fn instantiate(label: Label, names: &mut NameSupply) -> (Self, Self::Params);

    fn function_type(&self) -> FunctionType {
        let mut params = Vec::new();
        Self::param_types(&mut params);
        FunctionType::new(params, Self::Ret::TYPE)
    }

    /// A reference to a function defined elsewhere, usable as a call target.
    fn declare(label: impl Into<Label>) -> Self {
        Self::instantiate(label.into(), &mut NameSupply::new()).0
    }
}

/// The end of a signature chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Body<R> {
    label: Label,
    ret: PhantomData<fn() -> R>,
}

impl<R: Returns> Body<R> {
    pub fn new(label: impl Into<Label>) -> Self {
        Self {
            label: label.into(),
            ret: PhantomData,
        }
    }
}

impl<R: Returns> Signature for Body<R> {
    type Ret = R;
    type Args = ();
    type Params = ();

    fn label(&self) -> &Label {
        &self.label
    }

    fn param_types(_types: &mut Vec<ScalarType>) {}

    fn instantiate(label: Label, _names: &mut NameSupply) -> (Self, Self::Params) {
        (Body::new(label), ())
    }
}

/// A parameter of type `A` prepended to the signature `F`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lam<A: IsScalar, F> {
    param: Operand<A>,
    body: F,
}

impl<A: IsScalar, F: Signature> Lam<A, F> {
    pub fn new(param: impl Into<Operand<A>>, body: F) -> Self {
        Self {
            param: param.into(),
            body,
        }
    }

    pub fn param(&self) -> &Operand<A> {
        &self.param
    }

    pub fn body(&self) -> &F {
        &self.body
    }
}

impl<A: IsScalar, F: Signature> Signature for Lam<A, F> {
    type Ret = F::Ret;
    type Args = (Operand<A>, F::Args);
    type Params = (Name<A>, F::Params);

    fn label(&self) -> &Label {
        self.body.label()
    }

    fn param_types(types: &mut Vec<ScalarType>) {
        types.push(A::SCALAR);
        F::param_types(types);
    }

    fn instantiate(label: Label, names: &mut NameSupply) -> (Self, Self::Params) {
        let name = names.fresh::<A>();
        let (body, rest) = F::instantiate(label, names);
        (Lam::new(name.operand(), body), (name, rest))
    }
}

/// A straight-line sequence of instructions ended by a terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    label: Label,
    instructions: Vec<Named>,
    terminator: TerminatorKind,
}

impl BasicBlock {
    pub(crate) fn new(label: Label, instructions: Vec<Named>, terminator: TerminatorKind) -> Self {
        Self {
            label,
            instructions,
            terminator,
        }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn instructions(&self) -> &[Named] {
        &self.instructions
    }

    pub fn terminator(&self) -> &TerminatorKind {
        &self.terminator
    }
}

/// A finished function whose signature is still known statically.
#[derive(Debug, Clone, PartialEq)]
pub struct Function<F> {
    signature: F,
    params: Vec<LocalName>,
    blocks: Vec<BasicBlock>,
}

impl<F: Signature> Function<F> {
    pub(crate) fn new(signature: F, params: Vec<LocalName>, blocks: Vec<BasicBlock>) -> Self {
        Self {
            signature,
            params,
            blocks,
        }
    }

    pub fn signature(&self) -> &F {
        &self.signature
    }

    pub fn label(&self) -> &Label {
        self.signature.label()
    }

    pub fn function_type(&self) -> FunctionType {
        self.signature.function_type()
    }

    /// The entry block comes first.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Drops the static signature, for storage next to functions of other types.
    pub fn erase(self) -> FunctionDef {
        FunctionDef {
            label: self.signature.label().clone(),
            ty: self.signature.function_type(),
            params: self.params,
            blocks: self.blocks,
        }
    }
}

/// A finished function with its signature as a runtime tag.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    label: Label,
    ty: FunctionType,
    params: Vec<LocalName>,
    blocks: Vec<BasicBlock>,
}

impl FunctionDef {
    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn function_type(&self) -> &FunctionType {
        &self.ty
    }

    pub fn params(&self) -> &[LocalName] {
        &self.params
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }
}
