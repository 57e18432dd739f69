use std::cell::{Cell, RefCell};

use typed_llvm_ir::{
    codegen::{CodegenTarget, TargetDescription, check_target, errors::CodegenError},
    ir::{
        Body, CmpPredicate, Function, FunctionBuilder, I32, IllTypedError, Instruction, Lam,
        Module, Operand, Terminator,
    },
};

/// `fn(i32, i32, i32) -> i32`
#[allow(unused)]
pub type Ternary = Lam<I32, Lam<I32, Lam<I32, Body<I32>>>>;

/// A code generator that records what it was asked to do instead of generating code.
#[allow(unused)]
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub describes: Cell<usize>,
    pub compiled: RefCell<Vec<String>>,
}

impl RecordingTarget {
    #[allow(unused)]
    pub fn description() -> TargetDescription {
        TargetDescription {
            triple: "x86_64-unknown-linux-gnu".to_string(),
            data_layout: "e-m:e-i64:64-n8:16:32:64-S128".to_string(),
        }
    }
}

impl CodegenTarget for RecordingTarget {
    type Executable = Vec<String>;

    fn describe(&self) -> Result<TargetDescription, CodegenError> {
        self.describes.set(self.describes.get() + 1);
        Ok(Self::description())
    }

    fn compile(&self, module: &Module) -> Result<Vec<String>, CodegenError> {
        check_target(module, &Self::description())?;
        module.validate()?;

        let symbols: Vec<String> = module
            .definitions()
            .iter()
            .map(|def| def.label().to_string())
            .collect();
        self.compiled.borrow_mut().extend(symbols.iter().cloned());
        Ok(symbols)
    }
}

/// `(a + b + c) / 3`
#[allow(unused)]
pub fn average_function() -> Result<Function<Ternary>, IllTypedError> {
    let (mut builder, (a, (b, (c, ())))) = FunctionBuilder::<Ternary>::new("average");

    let sum = builder.bind(Instruction::add(a.operand(), b.operand()))?;
    let sum = builder.bind(Instruction::add(sum.operand(), c.operand()))?;
    let avg = builder.bind(Instruction::quot(sum.operand(), Operand::constant(3)))?;
    builder.terminate(Terminator::ret_val(avg.operand()))?;

    builder.finish()
}

/// `x` limited to `lo..=hi`, through a phi in the join block.
#[allow(unused)]
pub fn clamp_function() -> Result<Function<Ternary>, IllTypedError> {
    let (mut builder, (x, (lo, (hi, ())))) = FunctionBuilder::<Ternary>::new("clamp");
    let low = builder.new_label("low");
    let check = builder.new_label("check");
    let join = builder.new_label("join");

    let below = builder.bind(Instruction::cmp(CmpPredicate::Lt, x.operand(), lo.operand()))?;
    builder.terminate(Terminator::cond_br(
        below.operand(),
        low.clone(),
        check.clone(),
    ))?;

    builder.start_block(low.clone())?;
    builder.terminate(Terminator::br(join.clone()))?;

    builder.start_block(check.clone())?;
    let above = builder.bind(Instruction::cmp(CmpPredicate::Gt, x.operand(), hi.operand()))?;
    let clamped = builder.bind(Instruction::select(
        above.operand(),
        hi.operand(),
        x.operand(),
    ))?;
    builder.terminate(Terminator::br(join.clone()))?;

    builder.start_block(join)?;
    let result = builder.bind(Instruction::phi([
        (lo.operand(), low),
        (clamped.operand(), check),
    ])?)?;
    builder.terminate(Terminator::ret_val(result.operand()))?;

    builder.finish()
}
