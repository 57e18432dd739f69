use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;
use typed_llvm_ir::{
    config::{CompileOptions, Config},
    ir::{
        Body, CmpPredicate, Function, FunctionAttribute, FunctionBuilder, I32, IllTypedError,
        Instruction, Lam, Module, Operand, Terminator,
    },
};

/// `fn(i32, i32, i32) -> i32`
type Ternary = Lam<I32, Lam<I32, Lam<I32, Body<I32>>>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Code generation settings, see `typed-ir.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the profile marked `release = true`, or the built-in `release` at -O3.
    #[arg(short, long, default_value_t = false)]
    release: bool,

    /// The three numbers to run the functions on.
    #[arg(num_args = 3, default_values_t = [1, 2, 3], allow_negative_numbers = true)]
    values: Vec<i32>,
}

/// `(a + b + c) / 3`
fn average() -> Result<Function<Ternary>, IllTypedError> {
    let (mut builder, (a, (b, (c, ())))) = FunctionBuilder::<Ternary>::new("average");

    let sum = builder.bind_as("sum", Instruction::add(a.operand(), b.operand()))?;
    let sum = builder.bind(Instruction::add(sum.operand(), c.operand()))?;
    let avg = builder.bind_as("avg", Instruction::quot(sum.operand(), Operand::constant(3)))?;
    builder.terminate(Terminator::ret_val(avg.operand()))?;

    builder.finish()
}

/// `x` limited to `lo..=hi`.
fn clamp() -> Result<Function<Ternary>, IllTypedError> {
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

/// Scores the clamped average of its arguments: 10, 20 or 30.
fn grade(average: &Ternary, clamp: &Ternary) -> Result<Function<Ternary>, IllTypedError> {
    let (mut builder, (a, (b, (c, ())))) = FunctionBuilder::<Ternary>::new("grade");

    let avg = builder.bind(Instruction::call(
        average,
        (a.operand(), (b.operand(), (c.operand(), ()))),
        &[FunctionAttribute::NoUnwind, FunctionAttribute::ReadNone],
    ))?;
    let level = builder.bind(Instruction::call(
        clamp,
        (avg.operand(), (Operand::constant(0), (Operand::constant(2), ()))),
        &[FunctionAttribute::NoUnwind],
    ))?;

    let zero = builder.new_label("zero");
    let one = builder.new_label("one");
    let two = builder.new_label("two");
    builder.terminate(Terminator::switch(
        level.operand(),
        two.clone(),
        [(0, zero.clone()), (1, one.clone())],
    )?)?;

    for (label, score) in [(zero, 10), (one, 20), (two, 30)] {
        builder.start_block(label)?;
        builder.terminate(Terminator::ret_val(Operand::constant(score)))?;
    }

    builder.finish()
}

fn define_functions(module: &mut Module) -> Result<(), IllTypedError> {
    let average = average()?;
    let clamp = clamp()?;
    let grade = grade(average.signature(), clamp.signature())?;

    module.define(average)?;
    module.define(clamp)?;
    module.define(grade)?;
    module.validate()
}

fn print_summary(module: &Module) {
    println!("{} {}", "module".bold(), module.name());
    println!("{} {}", "target:".bold(), module.target().triple);
    for def in module.definitions() {
        let instructions: usize = def
            .blocks()
            .iter()
            .map(|block| block.instructions().len())
            .sum();
        println!(
            "  {} {}: {} blocks, {} instructions",
            def.label().green(),
            def.function_type(),
            def.blocks().len(),
            instructions
        );
    }
}

#[cfg(feature = "llvm")]
fn run(options: CompileOptions, [a, b, c]: [i32; 3]) -> anyhow::Result<()> {
    use typed_llvm_ir::codegen::{CodegenTarget, llvm::LlvmTarget};

    let target = LlvmTarget::new(options);
    let mut module = Module::for_target("demo", &target)?;
    define_functions(&mut module)?;
    print_summary(&module);

    let jit = target.compile(&module)?;
    for name in ["average", "clamp", "grade"] {
        // SAFETY: every function in the module is `fn(i32, i32, i32) -> i32`.
        let function: extern "C" fn(i32, i32, i32) -> i32 = unsafe { jit.function(name)? };
        println!(
            "{}({a}, {b}, {c}) = {}",
            name.bold(),
            function(a, b, c).green()
        );
    }

    Ok(())
}

#[cfg(not(feature = "llvm"))]
fn run(options: CompileOptions, _values: [i32; 3]) -> anyhow::Result<()> {
    use typed_llvm_ir::codegen::TargetDescription;

    let target = TargetDescription {
        triple: options
            .target_triple
            .unwrap_or_else(|| "unknown-unknown-unknown".to_string()),
        data_layout: String::new(),
    };
    let mut module = Module::new("demo", target);
    define_functions(&mut module)?;
    print_summary(&module);

    println!(
        "{}",
        "built without the `llvm` feature, nothing to run".yellow()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    let options = config.compile_options(config.default_profile(args.release))?;
    tracing::debug!("compiling with options: {:#?}", options);

    let &[a, b, c] = args.values.as_slice() else {
        anyhow::bail!("expected three numbers, got {}", args.values.len());
    };

    run(options, [a, b, c])
}
