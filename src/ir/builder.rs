use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use tracing::{debug, instrument};

use super::{
    cfg::ControlFlowGraph,
    errors::IllTypedError,
    function::{BasicBlock, Function, Signature},
    instruction::{Instruction, InstructionKind},
    named::Named,
    operand::{Label, LocalName, Name, Scope, Value},
    terminator::{Terminator, TerminatorKind},
    types::{ScalarType, Type},
    witness::{IsScalar, Returns},
};

/// Hands out the names and labels of one function body.
#[derive(Debug)]
pub struct NameSupply {
    scope: Scope,
    next_local: u32,
    next_label: u32,
    symbols: HashSet<Arc<str>>,
}

impl Default for NameSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl NameSupply {
    pub fn new() -> Self {
        Self {
            scope: Scope::fresh(),
            next_local: 0,
            next_label: 0,
            symbols: HashSet::new(),
        }
    }

    /// The body every name from this supply belongs to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    fn fresh_local(&mut self) -> LocalName {
        let number = self.next_local;
        self.next_local += 1;
        LocalName::Number(number)
    }

    /// A numbered name, never handed out before.
    pub fn fresh<T>(&mut self) -> Name<T> {
        Name::new(self.scope, self.fresh_local())
    }

    /// A name spelled `symbol`, as long as nothing else in the body uses it.
    ///
    /// Symbols starting with a digit would print like numbered names, so they are refused.
    pub fn symbol<T>(&mut self, symbol: &str) -> Result<Name<T>, IllTypedError> {
        if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(IllTypedError::InvalidSymbol(symbol.to_string()));
        }
        let symbol: Arc<str> = Arc::from(symbol);
        if !self.symbols.insert(symbol.clone()) {
            return Err(IllTypedError::DuplicateName(LocalName::Symbol(symbol)));
        }
        Ok(Name::new(self.scope, LocalName::Symbol(symbol)))
    }

    /// A block label starting with `hint`, distinct from every other label it returns.
    pub fn label(&mut self, hint: &str) -> Label {
        let number = self.next_label;
        self.next_label += 1;
        Label::new(format!("{hint}.{number}"))
    }
}

#[derive(Debug)]
struct OpenBlock {
    label: Label,
    instructions: Vec<Named>,
}

/// Assembles the body of a function with signature `F`, one block at a time.
///
/// The entry block is open as soon as the builder exists. Instructions are
/// appended to the open block until it is terminated; after that a new block
/// must be started before anything else is appended.
#[derive(Debug)]
pub struct FunctionBuilder<F: Signature> {
    signature: F,
    names: NameSupply,
    params: Vec<LocalName>,
    blocks: Vec<BasicBlock>,
    labels: HashSet<Label>,
    current: Option<OpenBlock>,
}

impl<F: Signature> FunctionBuilder<F> {
    pub const ENTRY: &'static str = "entry";

    /// Starts a function named `label`, returning the names of its parameters.
    pub fn new(label: impl Into<Label>) -> (Self, F::Params) {
        let mut names = NameSupply::new();
        let (signature, params) = F::instantiate(label.into(), &mut names);

        // Parameters are the first names the supply hands out.
        let arity = signature.function_type().params.len() as u32;
        let param_names = (0..arity).map(LocalName::Number).collect();

        let entry = Label::new(Self::ENTRY);
        debug!(function = %signature.label(), arity, "starting function");

        let builder = Self {
            signature,
            names,
            params: param_names,
            blocks: Vec::new(),
            labels: HashSet::from([entry.clone()]),
            current: Some(OpenBlock {
                label: entry,
                instructions: Vec::new(),
            }),
        };
        (builder, params)
    }

    pub fn signature(&self) -> &F {
        &self.signature
    }

    /// The label of the block instructions are currently appended to.
    pub fn current_block(&self) -> Option<&Label> {
        self.current.as_ref().map(|block| &block.label)
    }

    pub fn new_label(&mut self, hint: &str) -> Label {
        self.names.label(hint)
    }

    /// Appends `instruction` to the open block and names its result.
    pub fn bind<T: IsScalar>(
        &mut self,
        instruction: Instruction<T>,
    ) -> Result<Name<T>, IllTypedError> {
        let name = self.names.fresh::<T>();
        self.push(Named::bind(name.clone(), instruction))?;
        Ok(name)
    }

    /// Like [`FunctionBuilder::bind`], with a readable name in the output.
    pub fn bind_as<T: IsScalar>(
        &mut self,
        symbol: &str,
        instruction: Instruction<T>,
    ) -> Result<Name<T>, IllTypedError> {
        let name = self.names.symbol::<T>(symbol)?;
        self.push(Named::bind(name.clone(), instruction))?;
        Ok(name)
    }

    pub fn discard(&mut self, instruction: Instruction<()>) -> Result<(), IllTypedError> {
        self.push(Named::discard(instruction))
    }

    /// Type checks an instruction built without static types, then binds it.
    pub fn try_bind(&mut self, instruction: InstructionKind) -> Result<Value, IllTypedError> {
        let named = Named::try_bind(self.names.fresh_local(), instruction)?;
        let value = match (&named, named.result_type()) {
            (Named::Bind { name, .. }, Type::Scalar(ty)) => {
                Value::scoped(ty, self.names.scope(), name.clone())
            }
            _ => return Err(IllTypedError::BindUnit),
        };
        self.push(named)?;
        Ok(value)
    }

    pub fn try_discard(&mut self, instruction: InstructionKind) -> Result<(), IllTypedError> {
        self.push(Named::try_discard(instruction)?)
    }

    fn push(&mut self, named: Named) -> Result<(), IllTypedError> {
        let block = self.current.as_mut().ok_or(IllTypedError::NoOpenBlock)?;

        if named.instruction().is_phi()
            && block
                .instructions
                .iter()
                .any(|previous| !previous.instruction().is_phi())
        {
            return Err(IllTypedError::PhiNotAtBlockEntry {
                block: block.label.clone(),
            });
        }
        if named.instruction().is_phi() && block.label.as_str() == Self::ENTRY {
            return Err(IllTypedError::PhiInEntryBlock {
                function: self.signature.label().clone(),
            });
        }

        block.instructions.push(named);
        Ok(())
    }

    /// Closes the open block.
    pub fn terminate(&mut self, terminator: Terminator<F::Ret>) -> Result<(), IllTypedError> {
        self.close(terminator.into_kind())
    }

    pub fn try_terminate(&mut self, terminator: TerminatorKind) -> Result<(), IllTypedError> {
        terminator.type_check(F::Ret::TYPE)?;
        self.close(terminator)
    }

    fn close(&mut self, terminator: TerminatorKind) -> Result<(), IllTypedError> {
        let block = self.current.take().ok_or(IllTypedError::NoOpenBlock)?;
        debug!(
            block = %block.label,
            instructions = block.instructions.len(),
            "closing block"
        );
        self.blocks
            .push(BasicBlock::new(block.label, block.instructions, terminator));
        Ok(())
    }

    /// Opens a new block, which must not have been started before.
    pub fn start_block(&mut self, label: Label) -> Result<(), IllTypedError> {
        if let Some(open) = &self.current {
            return Err(IllTypedError::UnterminatedBlock(open.label.clone()));
        }
        if !self.labels.insert(label.clone()) {
            return Err(IllTypedError::DuplicateLabel(label));
        }

        self.current = Some(OpenBlock {
            label,
            instructions: Vec::new(),
        });
        Ok(())
    }

    /// Checks the body is well formed: every label branched to exists, every
    /// name used is bound in this body and defined on every path to its use,
    /// and every phi has one entry for each predecessor of its block.
    #[instrument(level = "debug", skip_all, fields(name = %self.signature.label()))]
    pub fn finish(self) -> Result<Function<F>, IllTypedError> {
        if let Some(open) = &self.current {
            return Err(IllTypedError::UnterminatedBlock(open.label.clone()));
        }

        self.check_scopes()?;
        self.check_control_flow()?;

        debug!(blocks = self.blocks.len(), "finished function");
        Ok(Function::new(self.signature, self.params, self.blocks))
    }

    fn check_scopes(&self) -> Result<(), IllTypedError> {
        let function = self.signature.label();
        let param_types = self.signature.function_type().params;

        let mut bound: HashMap<&LocalName, ScalarType> =
            self.params.iter().zip(param_types).collect();
        for block in &self.blocks {
            for named in block.instructions() {
                if let Named::Bind { name, ty, .. } = named {
                    bound.insert(name, *ty);
                }
            }
        }

        let scope = self.names.scope();
        let check_value = |value: &Value| -> Result<(), IllTypedError> {
            let Some(name) = value.as_local() else {
                return Ok(());
            };
            if value.scope().is_some_and(|other| other != scope) {
                return Err(IllTypedError::UnboundName {
                    function: function.clone(),
                    name: name.clone(),
                });
            }
            match bound.get(name) {
                Some(ty) if *ty == value.ty() => Ok(()),
                Some(ty) => Err(IllTypedError::TypeMismatch {
                    expected: (*ty).into(),
                    found: value.ty().into(),
                }),
                None => Err(IllTypedError::UnboundName {
                    function: function.clone(),
                    name: name.clone(),
                }),
            }
        };
        let check_label = |target: &Label| -> Result<(), IllTypedError> {
            if self.labels.contains(target) {
                Ok(())
            } else {
                Err(IllTypedError::UndefinedLabel {
                    function: function.clone(),
                    target: target.clone(),
                })
            }
        };

        for block in &self.blocks {
            for named in block.instructions() {
                let instruction = named.instruction();
                instruction.operands().into_iter().try_for_each(check_value)?;
                if let InstructionKind::Phi { incoming, .. } = instruction {
                    incoming
                        .iter()
                        .try_for_each(|(_, label)| check_label(label))?;
                }
            }
            let terminator = block.terminator();
            terminator.operands().into_iter().try_for_each(check_value)?;
            terminator.successors().into_iter().try_for_each(check_label)?;
        }

        Ok(())
    }

    /// Runs after [`Self::check_scopes`], so every label is known to exist.
    fn check_control_flow(&self) -> Result<(), IllTypedError> {
        let function = self.signature.label();
        let cfg = ControlFlowGraph::new(&self.blocks);

        for block in &self.blocks {
            if block
                .terminator()
                .successors()
                .into_iter()
                .any(|target| target.as_str() == Self::ENTRY)
            {
                return Err(IllTypedError::BranchToEntry {
                    function: function.clone(),
                    from: block.label().clone(),
                });
            }
        }

        // Parameters are defined before the entry block and never appear here.
        let mut defined: HashMap<&LocalName, (usize, usize)> = HashMap::new();
        for (index, block) in self.blocks.iter().enumerate() {
            for (position, named) in block.instructions().iter().enumerate() {
                if let Named::Bind { name, .. } = named {
                    defined.insert(name, (index, position));
                }
            }
        }

        let check_use = |value: &Value, block: usize, position: usize| -> Result<(), IllTypedError> {
            let Some(name) = value.as_local() else {
                return Ok(());
            };
            let available = match defined.get(name) {
                None => true,
                Some(&(def_block, def_position)) if def_block == block => def_position < position,
                Some(&(def_block, _)) => cfg.dominates(def_block, block),
            };
            if available {
                Ok(())
            } else {
                Err(IllTypedError::UseNotDominated {
                    function: function.clone(),
                    block: cfg.block(block).label().clone(),
                    name: name.clone(),
                })
            }
        };

        for (index, block) in self.blocks.iter().enumerate() {
            let reachable = cfg.is_reachable(index);
            let predecessors: Vec<&Label> = cfg
                .predecessors(index)
                .iter()
                .map(|&pred| cfg.block(pred).label())
                .sorted()
                .dedup()
                .collect();

            for (position, named) in block.instructions().iter().enumerate() {
                let instruction = named.instruction();
                let InstructionKind::Phi { incoming, .. } = instruction else {
                    if reachable {
                        for value in instruction.operands() {
                            check_use(value, index, position)?;
                        }
                    }
                    continue;
                };

                let found: Vec<&Label> =
                    incoming.iter().map(|(_, label)| label).sorted().collect();
                if found != predecessors {
                    return Err(IllTypedError::PhiPredecessorMismatch {
                        block: block.label().clone(),
                        expected: predecessors.into_iter().cloned().collect(),
                        found: found.into_iter().cloned().collect(),
                    });
                }

                // An incoming value is read at the end of the block it arrives from.
                for (value, label) in incoming {
                    if let Some(pred) = cfg.index(label) {
                        if reachable && cfg.is_reachable(pred) {
                            check_use(value, pred, usize::MAX)?;
                        }
                    }
                }
            }

            if reachable {
                let end = block.instructions().len();
                for value in block.terminator().operands() {
                    check_use(value, index, end)?;
                }
            }
        }

        Ok(())
    }
}
