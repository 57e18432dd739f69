use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::codegen::{CodegenTarget, TargetDescription, errors::CodegenError};

use super::{
    errors::IllTypedError,
    function::{Function, FunctionDef, FunctionType, Signature},
    instruction::InstructionKind,
    operand::Label,
};

/// A compilation unit: functions defined here and functions declared to exist elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    target: TargetDescription,
    definitions: Vec<FunctionDef>,
    declarations: Vec<(Label, FunctionType)>,
    symbols: HashMap<Label, FunctionType>,
}

impl Module {
    pub fn new(name: impl Into<String>, target: TargetDescription) -> Self {
        Self {
            name: name.into(),
            target,
            definitions: Vec::new(),
            declarations: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    /// An empty module stamped with the description of `target`.
    pub fn for_target<T: CodegenTarget>(
        name: impl Into<String>,
        target: &T,
    ) -> Result<Self, CodegenError> {
        Ok(Self::new(name, target.describe()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &TargetDescription {
        &self.target
    }

    pub fn definitions(&self) -> &[FunctionDef] {
        &self.definitions
    }

    /// Functions referenced but not defined in this module.
    pub fn declarations(&self) -> &[(Label, FunctionType)] {
        &self.declarations
    }

    /// The type of a function defined or declared in this module.
    pub fn lookup(&self, symbol: &Label) -> Option<&FunctionType> {
        self.symbols.get(symbol)
    }

    /// Declares an external function. Declaring the same symbol twice with
    /// one type is allowed, with two different types it is not.
    pub fn declare<F: Signature>(&mut self, signature: &F) -> Result<(), IllTypedError> {
        let symbol = signature.label().clone();
        let ty = signature.function_type();

        match self.symbols.get(&symbol) {
            Some(known) if *known == ty => Ok(()),
            Some(known) => Err(IllTypedError::SignatureMismatch {
                symbol,
                expected: known.clone(),
                found: ty,
            }),
            None => {
                self.symbols.insert(symbol.clone(), ty.clone());
                self.declarations.push((symbol, ty));
                Ok(())
            }
        }
    }

    pub fn define<F: Signature>(&mut self, function: Function<F>) -> Result<(), IllTypedError> {
        self.define_erased(function.erase())
    }

    /// Adds a definition, replacing an earlier declaration of the same type.
    pub fn define_erased(&mut self, function: FunctionDef) -> Result<(), IllTypedError> {
        let symbol = function.label().clone();
        let ty = function.function_type();

        if self.definitions.iter().any(|def| def.label() == &symbol) {
            return Err(IllTypedError::DuplicateSymbol(symbol));
        }
        if let Some(known) = self.symbols.get(&symbol) {
            if known != ty {
                return Err(IllTypedError::SignatureMismatch {
                    symbol,
                    expected: known.clone(),
                    found: ty.clone(),
                });
            }
            self.declarations.retain(|(declared, _)| declared != &symbol);
        }

        debug!(module = %self.name, function = %symbol, "defining function");
        self.symbols.insert(symbol, ty.clone());
        self.definitions.push(function);
        Ok(())
    }

    /// Checks every call targets a function known to this module, at the type it is known by.
    #[instrument(level = "debug", skip_all, fields(name = %self.name))]
    pub fn validate(&self) -> Result<(), IllTypedError> {
        let calls = self
            .definitions
            .iter()
            .flat_map(|def| def.blocks())
            .flat_map(|block| block.instructions())
            .filter_map(|named| match named.instruction() {
                InstructionKind::Call { callee, ty, .. } => Some((callee, ty)),
                _ => None,
            });

        for (callee, ty) in calls {
            let known = self
                .symbols
                .get(callee)
                .ok_or_else(|| IllTypedError::UnknownFunction(callee.clone()))?;
            if known != ty {
                return Err(IllTypedError::SignatureMismatch {
                    symbol: callee.clone(),
                    expected: known.clone(),
                    found: ty.clone(),
                });
            }
        }

        Ok(())
    }
}
