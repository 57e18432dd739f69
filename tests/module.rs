use crate::common::{RecordingTarget, Ternary, average_function, clamp_function};
use typed_llvm_ir::{
    codegen::{CodegenTarget, TargetDescription, errors::CodegenError},
    ir::{
        Body, Function, FunctionBuilder, FunctionType, I32, I64, IllTypedError, Instruction,
        IntTy, Label, Lam, Module, Operand, ScalarType, Signature, Terminator, Type,
    },
};

mod common;

fn module(target: &RecordingTarget) -> Module {
    Module::for_target("test", target).expect("failed to describe target")
}

/// `fn caller(x: i32) -> i32 { callee(x, x, x) }`
fn caller(callee: &Ternary) -> Function<Lam<I32, Body<I32>>> {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("caller");
    let result = builder
        .bind(Instruction::call(
            callee,
            (x.operand(), (x.operand(), (x.operand(), ()))),
            &[],
        ))
        .expect("failed to bind call");
    builder
        .terminate(Terminator::ret_val(result.operand()))
        .expect("failed to terminate");
    builder.finish().expect("failed to finish")
}

#[test]
fn compile_module() {
    let target = RecordingTarget::default();
    let mut module = module(&target);
    assert_eq!(target.describes.get(), 1);
    assert_eq!(module.target(), &RecordingTarget::description());

    module
        .define(average_function().expect("failed to build average"))
        .expect("failed to define average");
    module
        .define(clamp_function().expect("failed to build clamp"))
        .expect("failed to define clamp");

    let symbols = target.compile(&module).expect("failed to compile");
    assert_eq!(symbols, vec!["average".to_string(), "clamp".to_string()]);
    assert_eq!(target.compiled.borrow().len(), 2);
}

#[test]
fn symbols_are_defined_once() {
    let mut module = module(&RecordingTarget::default());
    module
        .define(average_function().expect("failed to build average"))
        .expect("failed to define average");

    let err = module
        .define(average_function().expect("failed to build average"))
        .expect_err("expected error");
    assert_eq!(err, IllTypedError::DuplicateSymbol(Label::new("average")));
}

#[test]
fn calls_to_unknown_functions_are_rejected() {
    let mut module = module(&RecordingTarget::default());
    module
        .define(caller(&Ternary::declare("missing")))
        .expect("failed to define caller");

    assert_eq!(
        module.validate(),
        Err(IllTypedError::UnknownFunction(Label::new("missing")))
    );

    let target = RecordingTarget::default();
    let err = target.compile(&module).expect_err("expected error");
    assert!(
        matches!(err, CodegenError::IllTyped(IllTypedError::UnknownFunction(_))),
        "{:#?}",
        err
    );
    assert!(target.compiled.borrow().is_empty());
}

#[test]
fn definitions_replace_declarations() {
    let external = Ternary::declare("average");
    let mut module = module(&RecordingTarget::default());

    module.declare(&external).expect("failed to declare");
    module.declare(&external).expect("failed to redeclare");
    module
        .define(caller(&external))
        .expect("failed to define caller");
    assert_eq!(module.declarations().len(), 1);
    assert_eq!(module.validate(), Ok(()));

    module
        .define(average_function().expect("failed to build average"))
        .expect("failed to define average");
    assert!(module.declarations().is_empty());
    assert_eq!(
        module.lookup(&Label::new("average")),
        Some(&FunctionType::new(
            vec![ScalarType::Int(IntTy::I32); 3],
            Type::Scalar(ScalarType::Int(IntTy::I32))
        ))
    );
}

#[test]
fn symbols_keep_their_type() {
    let mut module = module(&RecordingTarget::default());
    module
        .declare(&Lam::<I64, Body<()>>::declare("log"))
        .expect("failed to declare");

    let err = module
        .declare(&Lam::<I32, Body<()>>::declare("log"))
        .expect_err("expected error");
    assert!(
        matches!(&err, IllTypedError::SignatureMismatch { symbol, .. } if symbol.as_str() == "log"),
        "{:#?}",
        err
    );

    let (mut builder, (_, ())) = FunctionBuilder::<Lam<I32, Body<()>>>::new("log");
    builder
        .terminate(Terminator::ret())
        .expect("failed to terminate");
    let log = builder.finish().expect("failed to finish");
    assert!(matches!(
        module.define(log),
        Err(IllTypedError::SignatureMismatch { .. })
    ));
}

#[test]
fn calls_must_use_the_known_type() {
    let mut module = module(&RecordingTarget::default());
    module
        .define(average_function().expect("failed to build average"))
        .expect("failed to define average");

    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("main");
    builder
        .discard(Instruction::call(
            &Lam::<I32, Body<()>>::declare("average"),
            (Operand::constant(1), ()),
            &[],
        ))
        .expect("failed to discard");
    builder
        .terminate(Terminator::ret())
        .expect("failed to terminate");
    module
        .define(builder.finish().expect("failed to finish"))
        .expect("failed to define main");

    assert!(matches!(
        module.validate(),
        Err(IllTypedError::SignatureMismatch { .. })
    ));
}

#[test]
fn modules_compile_for_their_own_target() {
    let module = Module::new(
        "elsewhere",
        TargetDescription {
            triple: "riscv64-unknown-linux-gnu".to_string(),
            data_layout: "e-m:e-p:64:64-i64:64-i128:128-n32:64-S128".to_string(),
        },
    );

    let err = RecordingTarget::default()
        .compile(&module)
        .expect_err("expected error");
    assert_eq!(
        err,
        CodegenError::TargetMismatch {
            module: "riscv64-unknown-linux-gnu".to_string(),
            target: "x86_64-unknown-linux-gnu".to_string(),
        }
    );
}
