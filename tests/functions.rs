use crate::common::{Ternary, average_function, clamp_function};
use typed_llvm_ir::ir::{
    BinOp, Body, CmpPredicate, F64, FloatTy, FunctionBuilder, FunctionType, I32, I64, IllTypedError,
    Instruction, InstructionKind, IntTy, Label, Lam, LocalName, Named, Operand, ScalarType,
    Signature, Terminator, TerminatorKind, Type, U64, UintTy, Value,
};

mod common;

const I32_TY: ScalarType = ScalarType::Int(IntTy::I32);

#[test]
fn average_of_three() {
    let function = average_function().expect("failed to build average");

    assert_eq!(function.label().as_str(), "average");
    assert_eq!(
        function.function_type(),
        FunctionType::new(vec![I32_TY; 3], Type::Scalar(I32_TY))
    );

    let [entry] = function.blocks() else {
        panic!("expected a single block: {:#?}", function.blocks());
    };
    assert_eq!(entry.label().as_str(), "entry");
    assert_eq!(entry.instructions().len(), 3);
    assert!(matches!(
        entry.instructions()[2].instruction(),
        InstructionKind::Binary {
            op: BinOp::Quot,
            ..
        }
    ));
    assert!(matches!(entry.terminator(), TerminatorKind::RetVal(_)));

    let def = function.erase();
    assert_eq!(
        def.params(),
        &[
            LocalName::Number(0),
            LocalName::Number(1),
            LocalName::Number(2)
        ]
    );
}

#[test]
fn clamp_merges_with_a_phi() {
    let function = clamp_function().expect("failed to build clamp");
    let blocks = function.blocks();
    assert_eq!(blocks.len(), 4);

    let join = blocks.last().expect("no blocks");
    let phi = join.instructions().first().expect("empty join block");
    assert!(phi.instruction().is_phi(), "{:#?}", phi);
    assert_eq!(join.terminator().successors(), Vec::<&Label>::new());
}

#[test]
fn parameters_can_be_named_symbolically() {
    type Scale = Lam<I32, Lam<F64, Body<F64>>>;
    let (mut builder, (n, (x, ()))) = FunctionBuilder::<Scale>::new("scale");

    let factor = builder
        .bind_as("factor", Instruction::int_to_float(n.operand()))
        .expect("failed to bind");
    assert_eq!(factor.local(), &LocalName::Symbol("factor".into()));

    let err = builder
        .bind_as("factor", Instruction::mul(x.operand(), factor.operand()))
        .expect_err("expected error");
    assert!(matches!(err, IllTypedError::DuplicateName(_)), "{:#?}", err);
}

#[test]
fn calls_are_typed_by_the_callee() {
    let average = average_function().expect("failed to build average");
    let (mut builder, (a, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("twice");

    let result = builder
        .bind(Instruction::call(
            average.signature(),
            (a.operand(), (a.operand(), (Operand::constant(0), ()))),
            &[],
        ))
        .expect("failed to bind call");
    builder
        .terminate(Terminator::ret_val(result.operand()))
        .expect("failed to terminate");

    let function = builder.finish().expect("failed to finish");
    let call = function.blocks()[0].instructions()[0].instruction();
    assert!(
        matches!(call, InstructionKind::Call { callee, args, .. } if callee.as_str() == "average" && args.len() == 3),
        "{:#?}",
        call
    );
}

#[test]
fn void_calls_are_discarded() {
    let log = Lam::<I64, Body<()>>::declare("log");
    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("main");

    builder
        .discard(Instruction::call(&log, (Operand::constant(42), ()), &[]))
        .expect("failed to discard");
    builder
        .terminate(Terminator::ret())
        .expect("failed to terminate");

    let function = builder.finish().expect("failed to finish");
    assert!(matches!(
        function.blocks()[0].instructions(),
        [Named::Discard(InstructionKind::Call { .. })]
    ));
}

#[test]
fn void_results_cannot_be_bound() {
    let log = Lam::<I64, Body<()>>::declare("log");
    let call = Instruction::call(&log, (Operand::constant(1), ()), &[]).into_kind();

    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("main");
    assert_eq!(builder.try_bind(call.clone()), Err(IllTypedError::BindUnit));
    assert!(builder.try_discard(call).is_ok());
}

#[test]
fn values_cannot_be_discarded() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<U64, Body<()>>>::new("f");
    let add = Instruction::add(x.operand(), Operand::constant(1)).into_kind();

    assert_eq!(
        builder.try_discard(add),
        Err(IllTypedError::DiscardValue {
            ty: ScalarType::Uint(UintTy::U64)
        })
    );
}

#[test]
fn untyped_instructions_are_checked_before_binding() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("f");
    let x = Value::from(x.operand());

    let ill_typed = InstructionKind::Binary {
        op: BinOp::Div,
        lhs: x.clone(),
        rhs: x.clone(),
    };
    assert!(matches!(
        builder.try_bind(ill_typed),
        Err(IllTypedError::UnsupportedOperand { op: "div", .. })
    ));

    let sum = builder
        .try_bind(InstructionKind::Binary {
            op: BinOp::Add,
            lhs: x.clone(),
            rhs: x,
        })
        .expect("failed to bind");
    assert_eq!(sum.ty(), I32_TY);

    builder
        .try_terminate(TerminatorKind::RetVal(sum))
        .expect("failed to terminate");
    assert!(builder.finish().is_ok());
}

#[test]
fn return_type_is_checked_for_untyped_terminators() {
    let (mut builder, ()) = FunctionBuilder::<Body<I32>>::new("f");
    assert!(matches!(
        builder.try_terminate(TerminatorKind::Ret),
        Err(IllTypedError::TypeMismatch { .. })
    ));
}

#[test]
fn phi_must_lead_its_block() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("f");
    builder
        .bind(Instruction::add(x.operand(), Operand::constant(1)))
        .expect("failed to bind");

    let entry = Label::new("entry");
    let err = builder
        .bind(Instruction::phi([(x.operand(), entry.clone())]).expect("failed to build phi"))
        .expect_err("expected error");
    assert_eq!(err, IllTypedError::PhiNotAtBlockEntry { block: entry });
}

#[test]
fn blocks_are_started_once() {
    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("f");
    let next = builder.new_label("next");

    assert_eq!(
        builder.start_block(next.clone()),
        Err(IllTypedError::UnterminatedBlock(Label::new("entry")))
    );

    builder
        .terminate(Terminator::br(next.clone()))
        .expect("failed to terminate");
    builder.start_block(next.clone()).expect("failed to start");
    builder
        .terminate(Terminator::ret())
        .expect("failed to terminate");

    assert_eq!(
        builder.start_block(next.clone()),
        Err(IllTypedError::DuplicateLabel(next))
    );
}

#[test]
fn finish_rejects_open_blocks() {
    let (builder, ()) = FunctionBuilder::<Body<()>>::new("f");
    assert_eq!(
        builder.finish().map(|_| ()),
        Err(IllTypedError::UnterminatedBlock(Label::new("entry")))
    );
}

#[test]
fn finish_rejects_undefined_labels() {
    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("f");
    let nowhere = builder.new_label("nowhere");
    builder
        .terminate(Terminator::br(nowhere.clone()))
        .expect("failed to terminate");

    assert_eq!(
        builder.finish().map(|_| ()),
        Err(IllTypedError::UndefinedLabel {
            function: Label::new("f"),
            target: nowhere,
        })
    );
}

#[test]
fn names_do_not_leak_between_functions() {
    let (mut first, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("first");
    let doubled = first
        .bind(Instruction::mul(x.operand(), Operand::constant(2)))
        .expect("failed to bind");
    first
        .terminate(Terminator::ret_val(doubled.operand()))
        .expect("failed to terminate");
    first.finish().expect("failed to finish");

    let (mut second, ()) = FunctionBuilder::<Body<I32>>::new("second");
    second
        .terminate(Terminator::ret_val(doubled.operand()))
        .expect("failed to terminate");

    assert_eq!(
        second.finish().map(|_| ()),
        Err(IllTypedError::UnboundName {
            function: Label::new("second"),
            name: doubled.local().clone(),
        })
    );
}

#[test]
fn names_from_another_body_are_rejected_when_numbers_line_up() {
    let (mut first, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("first");
    let leaked = first
        .bind(Instruction::mul(x.operand(), Operand::constant(2)))
        .expect("failed to bind");
    first
        .terminate(Terminator::ret_val(leaked.operand()))
        .expect("failed to terminate");
    first.finish().expect("failed to finish");

    // `second` binds its own `%1`, so only the scope tells the two apart.
    let (mut second, (y, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("second");
    let own = second
        .bind(Instruction::add(y.operand(), Operand::constant(100)))
        .expect("failed to bind");
    assert_eq!(own.local(), leaked.local());
    second
        .terminate(Terminator::ret_val(leaked.operand()))
        .expect("failed to terminate");

    assert_eq!(
        second.finish().map(|_| ()),
        Err(IllTypedError::UnboundName {
            function: Label::new("second"),
            name: leaked.local().clone(),
        })
    );
}

/// Labels of a diamond: `entry` branches to `then` or `else`, both jump to `join`.
struct Diamond {
    then: Label,
    otherwise: Label,
    join: Label,
}

fn start_diamond(builder: &mut FunctionBuilder<Lam<I32, Body<I32>>>, x: &Operand<I32>) -> Diamond {
    let diamond = Diamond {
        then: builder.new_label("then"),
        otherwise: builder.new_label("else"),
        join: builder.new_label("join"),
    };
    let positive = builder
        .bind(Instruction::cmp(
            CmpPredicate::Gt,
            x.clone(),
            Operand::constant(0),
        ))
        .expect("failed to bind");
    builder
        .terminate(Terminator::cond_br(
            positive.operand(),
            diamond.then.clone(),
            diamond.otherwise.clone(),
        ))
        .expect("failed to terminate");
    diamond
}

#[test]
fn uses_must_be_dominated_by_their_definition() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("diamond");
    let Diamond {
        then,
        otherwise,
        join,
    } = start_diamond(&mut builder, &x.operand());

    builder.start_block(then.clone()).expect("failed to start");
    let t = builder
        .bind(Instruction::add(x.operand(), Operand::constant(1)))
        .expect("failed to bind");
    builder
        .terminate(Terminator::br(join.clone()))
        .expect("failed to terminate");

    builder.start_block(otherwise.clone()).expect("failed to start");
    let e = builder
        .bind(Instruction::mul(t.operand(), Operand::constant(2)))
        .expect("failed to bind");
    builder
        .terminate(Terminator::br(join.clone()))
        .expect("failed to terminate");

    builder.start_block(join).expect("failed to start");
    let result = builder
        .bind(
            Instruction::phi([(t.operand(), then), (e.operand(), otherwise.clone())])
                .expect("failed to build phi"),
        )
        .expect("failed to bind");
    builder
        .terminate(Terminator::ret_val(result.operand()))
        .expect("failed to terminate");

    assert_eq!(
        builder.finish().map(|_| ()),
        Err(IllTypedError::UseNotDominated {
            function: Label::new("diamond"),
            block: otherwise,
            name: t.local().clone(),
        })
    );
}

#[test]
fn phi_lists_each_predecessor_once() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("diamond");
    let Diamond {
        then,
        otherwise,
        join,
    } = start_diamond(&mut builder, &x.operand());

    builder.start_block(then.clone()).expect("failed to start");
    let t = builder
        .bind(Instruction::add(x.operand(), Operand::constant(1)))
        .expect("failed to bind");
    builder
        .terminate(Terminator::br(join.clone()))
        .expect("failed to terminate");

    builder.start_block(otherwise.clone()).expect("failed to start");
    builder
        .terminate(Terminator::br(join.clone()))
        .expect("failed to terminate");

    // Lists `join` itself and leaves out `else`.
    builder.start_block(join.clone()).expect("failed to start");
    let result = builder
        .bind(
            Instruction::phi([(t.operand(), then.clone()), (x.operand(), join.clone())])
                .expect("failed to build phi"),
        )
        .expect("failed to bind");
    builder
        .terminate(Terminator::ret_val(result.operand()))
        .expect("failed to terminate");

    let err = builder.finish().map(|_| ()).expect_err("expected error");
    assert_eq!(
        err,
        IllTypedError::PhiPredecessorMismatch {
            block: join.clone(),
            expected: vec![otherwise, then.clone()],
            found: vec![join, then],
        }
    );
}

#[test]
fn phi_counts_a_repeated_edge_once() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("f");
    let next = builder.new_label("next");
    let entry = Label::new("entry");

    let positive = builder
        .bind(Instruction::cmp(
            CmpPredicate::Gt,
            x.operand(),
            Operand::constant(0),
        ))
        .expect("failed to bind");
    builder
        .terminate(Terminator::cond_br(
            positive.operand(),
            next.clone(),
            next.clone(),
        ))
        .expect("failed to terminate");

    builder.start_block(next).expect("failed to start");
    let result = builder
        .bind(
            Instruction::phi([(x.operand(), entry.clone()), (x.operand(), entry)])
                .expect("failed to build phi"),
        )
        .expect("failed to bind");
    builder
        .terminate(Terminator::ret_val(result.operand()))
        .expect("failed to terminate");

    let err = builder.finish().map(|_| ()).expect_err("expected error");
    assert!(
        matches!(&err, IllTypedError::PhiPredecessorMismatch { expected, found, .. } if expected.len() == 1 && found.len() == 2),
        "{:#?}",
        err
    );
}

#[test]
fn phi_is_not_allowed_in_the_entry_block() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("f");
    let err = builder
        .bind(Instruction::phi([(x.operand(), Label::new("entry"))]).expect("failed to build phi"))
        .expect_err("expected error");
    assert_eq!(
        err,
        IllTypedError::PhiInEntryBlock {
            function: Label::new("f")
        }
    );
}

#[test]
fn entry_block_has_no_predecessors() {
    let (mut builder, ()) = FunctionBuilder::<Body<()>>::new("spin");
    let next = builder.new_label("next");
    builder
        .terminate(Terminator::br(next.clone()))
        .expect("failed to terminate");
    builder.start_block(next.clone()).expect("failed to start");
    builder
        .terminate(Terminator::br(Label::new("entry")))
        .expect("failed to terminate");

    assert_eq!(
        builder.finish().map(|_| ()),
        Err(IllTypedError::BranchToEntry {
            function: Label::new("spin"),
            from: next,
        })
    );
}

#[test]
fn uses_must_follow_definitions_in_a_block() {
    let (mut builder, (x, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("f");
    let x = Value::from(x.operand());
    let later = LocalName::Number(2);

    let early = builder
        .try_bind(InstructionKind::Binary {
            op: BinOp::Add,
            lhs: Value::local(I32_TY, later.clone()),
            rhs: x.clone(),
        })
        .expect("failed to bind");
    builder
        .try_bind(InstructionKind::Binary {
            op: BinOp::Add,
            lhs: x.clone(),
            rhs: x,
        })
        .expect("failed to bind");
    builder
        .try_terminate(TerminatorKind::RetVal(early))
        .expect("failed to terminate");

    assert_eq!(
        builder.finish().map(|_| ()),
        Err(IllTypedError::UseNotDominated {
            function: Label::new("f"),
            block: Label::new("entry"),
            name: later,
        })
    );
}

/// `fn sum_below(n: i32) -> i32 { (0..n).sum() }`, the back edge feeds the header phis.
#[test]
fn loop_phis_may_use_values_defined_later() {
    let (mut builder, (n, ())) = FunctionBuilder::<Lam<I32, Body<I32>>>::new("sum_below");
    let header = builder.new_label("header");
    let body = builder.new_label("body");
    let exit = builder.new_label("exit");
    let zero = Value::from(Operand::<I32>::constant(0));

    builder
        .terminate(Terminator::br(header.clone()))
        .expect("failed to terminate");

    // %1 = i, %2 = acc, %3 = done, %4 = next_i, %5 = next_acc
    builder.start_block(header.clone()).expect("failed to start");
    let i = builder
        .try_bind(InstructionKind::Phi {
            ty: I32_TY,
            incoming: vec![
                (zero.clone(), Label::new("entry")),
                (Value::local(I32_TY, LocalName::Number(4)), body.clone()),
            ],
        })
        .expect("failed to bind");
    let acc = builder
        .try_bind(InstructionKind::Phi {
            ty: I32_TY,
            incoming: vec![
                (zero, Label::new("entry")),
                (Value::local(I32_TY, LocalName::Number(5)), body.clone()),
            ],
        })
        .expect("failed to bind");
    let done = builder
        .try_bind(InstructionKind::Cmp {
            predicate: CmpPredicate::Ge,
            lhs: i.clone(),
            rhs: Value::from(n.operand()),
        })
        .expect("failed to bind");
    builder
        .try_terminate(TerminatorKind::CondBr {
            condition: done,
            if_true: exit.clone(),
            if_false: body.clone(),
        })
        .expect("failed to terminate");

    builder.start_block(body).expect("failed to start");
    builder
        .try_bind(InstructionKind::Binary {
            op: BinOp::Add,
            lhs: i.clone(),
            rhs: Value::from(Operand::<I32>::constant(1)),
        })
        .expect("failed to bind");
    builder
        .try_bind(InstructionKind::Binary {
            op: BinOp::Add,
            lhs: acc.clone(),
            rhs: i,
        })
        .expect("failed to bind");
    builder
        .try_terminate(TerminatorKind::Br(header))
        .expect("failed to terminate");

    builder.start_block(exit).expect("failed to start");
    builder
        .try_terminate(TerminatorKind::RetVal(acc))
        .expect("failed to terminate");

    let function = builder.finish().expect("failed to finish");
    assert_eq!(function.blocks().len(), 4);
}

#[test]
fn signature_chain_matches_function_type() {
    let callee = Ternary::declare("f");
    assert_eq!(callee.function_type().params.len(), 3);
    assert_eq!(
        Lam::<F64, Body<()>>::declare("g").function_type(),
        FunctionType::new(vec![ScalarType::Float(FloatTy::F64)], Type::Void)
    );
}
