use std::{collections::HashMap, ffi::c_char};

use llvm_sys::{
    LLVMAttributeFunctionIndex, LLVMIntPredicate, LLVMRealPredicate,
    core::{
        LLVMAddCallSiteAttribute, LLVMAddCase, LLVMAddFunction, LLVMAddIncoming,
        LLVMAppendBasicBlockInContext, LLVMBuildAShr, LLVMBuildAdd, LLVMBuildAnd,
        LLVMBuildBitCast, LLVMBuildBr, LLVMBuildCall2, LLVMBuildCondBr, LLVMBuildFAdd,
        LLVMBuildFCmp, LLVMBuildFDiv, LLVMBuildFMul, LLVMBuildFPExt, LLVMBuildFPToSI,
        LLVMBuildFPToUI, LLVMBuildFPTrunc, LLVMBuildFSub, LLVMBuildICmp, LLVMBuildLShr,
        LLVMBuildMul, LLVMBuildOr, LLVMBuildPhi, LLVMBuildRet, LLVMBuildRetVoid, LLVMBuildSDiv,
        LLVMBuildSExt, LLVMBuildSIToFP, LLVMBuildSRem, LLVMBuildSelect, LLVMBuildShl,
        LLVMBuildSub, LLVMBuildSwitch, LLVMBuildTrunc, LLVMBuildUDiv, LLVMBuildUIToFP,
        LLVMBuildURem, LLVMBuildXor, LLVMBuildZExt, LLVMConstInt, LLVMConstReal,
        LLVMCreateBuilderInContext, LLVMCreateEnumAttribute, LLVMDisposeBuilder,
        LLVMDisposeModule, LLVMDoubleTypeInContext, LLVMFloatTypeInContext, LLVMFunctionType,
        LLVMGetEnumAttributeKindForName, LLVMGetParam, LLVMInt1TypeInContext,
        LLVMInt8TypeInContext, LLVMInt16TypeInContext, LLVMInt32TypeInContext,
        LLVMInt64TypeInContext, LLVMModuleCreateWithNameInContext, LLVMPositionBuilderAtEnd,
        LLVMSetDataLayout, LLVMSetTarget, LLVMVoidTypeInContext,
    },
    prelude::{
        LLVMAttributeRef, LLVMBasicBlockRef, LLVMBuilderRef, LLVMContextRef, LLVMModuleRef,
        LLVMTypeRef, LLVMValueRef,
    },
};
use tracing::{debug, instrument};

use super::c_string;
use crate::{
    codegen::errors::CodegenError,
    ir::{
        BinOp, CastOp, CmpPredicate, ConstValue, FloatTy, FunctionAttribute,
        FunctionDef, FunctionType, InstructionKind, IntTy, Label, LocalName, Module, ScalarType,
        TerminatorKind, Type, UintTy, Value, ValueKind, cfg::ControlFlowGraph,
    },
};

/// `memory(read)`: reads, but no writes, of argument, inaccessible and other memory.
const MEMORY_READ: u64 = 0b01_01_01;
/// `memory(none)`.
const MEMORY_NONE: u64 = 0;

type BuildBinary = unsafe extern "C" fn(
    LLVMBuilderRef,
    LLVMValueRef,
    LLVMValueRef,
    *const c_char,
) -> LLVMValueRef;

type BuildCast = unsafe extern "C" fn(
    LLVMBuilderRef,
    LLVMValueRef,
    LLVMTypeRef,
    *const c_char,
) -> LLVMValueRef;

/// Codegen context for a module
struct ModuleCodegenCtx<'a> {
    context: LLVMContextRef,
    llvm_module: LLVMModuleRef,
    module: &'a Module,
    /// Every function defined or declared, with its LLVM function type.
    functions: HashMap<Label, (LLVMValueRef, LLVMTypeRef)>,
}

impl ModuleCodegenCtx<'_> {
    fn scalar_type(&self, ty: ScalarType) -> LLVMTypeRef {
        unsafe {
            match ty {
                ScalarType::Bool => LLVMInt1TypeInContext(self.context),
                ScalarType::Int(IntTy::I8) | ScalarType::Uint(UintTy::U8) => {
                    LLVMInt8TypeInContext(self.context)
                }
                ScalarType::Int(IntTy::I16) | ScalarType::Uint(UintTy::U16) => {
                    LLVMInt16TypeInContext(self.context)
                }
                ScalarType::Int(IntTy::I32) | ScalarType::Uint(UintTy::U32) => {
                    LLVMInt32TypeInContext(self.context)
                }
                ScalarType::Int(IntTy::I64) | ScalarType::Uint(UintTy::U64) => {
                    LLVMInt64TypeInContext(self.context)
                }
                ScalarType::Float(FloatTy::F32) => LLVMFloatTypeInContext(self.context),
                ScalarType::Float(FloatTy::F64) => LLVMDoubleTypeInContext(self.context),
            }
        }
    }

    fn return_type(&self, ty: Type) -> LLVMTypeRef {
        match ty {
            Type::Void => unsafe { LLVMVoidTypeInContext(self.context) },
            Type::Scalar(ty) => self.scalar_type(ty),
        }
    }

    fn function_type(&self, ty: &FunctionType) -> LLVMTypeRef {
        let mut params: Vec<_> = ty.params.iter().map(|p| self.scalar_type(*p)).collect();
        unsafe {
            LLVMFunctionType(
                self.return_type(ty.ret),
                params.as_mut_ptr(),
                params.len() as u32,
                0,
            )
        }
    }

    fn constant(&self, ty: ScalarType, value: ConstValue) -> LLVMValueRef {
        let llvm_ty = self.scalar_type(ty);
        unsafe {
            match value {
                ConstValue::Bool(value) => LLVMConstInt(llvm_ty, value as u64, 0),
                // Wraps to the two's complement bit pattern, LLVM keeps the low bits.
                ConstValue::Int(value) => LLVMConstInt(llvm_ty, value as u64, 0),
                ConstValue::Float(value) => LLVMConstReal(llvm_ty, value),
            }
        }
    }

    fn attribute(&self, attribute: FunctionAttribute) -> LLVMAttributeRef {
        let (name, value) = match attribute {
            FunctionAttribute::NoReturn | FunctionAttribute::NoUnwind => (attribute.name(), 0),
            FunctionAttribute::ReadOnly => ("memory", MEMORY_READ),
            FunctionAttribute::ReadNone => ("memory", MEMORY_NONE),
        };
        unsafe {
            let kind = LLVMGetEnumAttributeKindForName(name.as_ptr().cast(), name.len());
            LLVMCreateEnumAttribute(self.context, kind, value)
        }
    }

    fn declare(&mut self, symbol: &Label, ty: &FunctionType) -> Result<(), CodegenError> {
        let name = c_string(symbol.as_str())?;
        let fn_ty = self.function_type(ty);
        let function = unsafe { LLVMAddFunction(self.llvm_module, name.as_ptr(), fn_ty) };
        self.functions.insert(symbol.clone(), (function, fn_ty));
        Ok(())
    }
}

/// Lowers a validated module into a fresh LLVM module owned by `context`.
pub(crate) fn compile_module(
    context: LLVMContextRef,
    module: &Module,
) -> Result<LLVMModuleRef, CodegenError> {
    let name = c_string(module.name())?;
    let triple = c_string(&module.target().triple)?;
    let data_layout = c_string(&module.target().data_layout)?;

    let llvm_module = unsafe {
        let llvm_module = LLVMModuleCreateWithNameInContext(name.as_ptr(), context);
        LLVMSetTarget(llvm_module, triple.as_ptr());
        LLVMSetDataLayout(llvm_module, data_layout.as_ptr());
        llvm_module
    };

    let mut ctx = ModuleCodegenCtx {
        context,
        llvm_module,
        module,
        functions: HashMap::new(),
    };

    let result = compile_functions(&mut ctx);
    if result.is_err() {
        unsafe { LLVMDisposeModule(llvm_module) };
    }
    result.map(|()| llvm_module)
}

fn compile_functions(ctx: &mut ModuleCodegenCtx) -> Result<(), CodegenError> {
    let module = ctx.module;
    debug!("compiling module {}", module.name());

    for (symbol, ty) in module.declarations() {
        ctx.declare(symbol, ty)?;
    }
    for def in module.definitions() {
        ctx.declare(def.label(), def.function_type())?;
    }
    for def in module.definitions() {
        compile_function(ctx, def)?;
    }

    Ok(())
}

/// Context used when compiling code within a function body.
struct FunctionCodegenCtx<'c, 'a> {
    module: &'c ModuleCodegenCtx<'a>,
    builder: LLVMBuilderRef,
    locals: HashMap<LocalName, LLVMValueRef>,
    blocks: HashMap<Label, LLVMBasicBlockRef>,
    /// Index of the block being compiled.
    current_block: usize,
    /// Phi nodes get their incoming values once every block is compiled.
    pending_phis: Vec<PendingPhi<'a>>,
}

struct PendingPhi<'a> {
    phi: LLVMValueRef,
    ty: ScalarType,
    block: usize,
    incoming: &'a [(Value, Label)],
}

impl Drop for FunctionCodegenCtx<'_, '_> {
    fn drop(&mut self) {
        unsafe { LLVMDisposeBuilder(self.builder) };
    }
}

impl<'a> FunctionCodegenCtx<'_, 'a> {
    fn value(&self, value: &Value) -> Result<LLVMValueRef, CodegenError> {
        match value.kind() {
            ValueKind::Constant(constant) => Ok(self.module.constant(value.ty(), *constant)),
            ValueKind::Local(name) => self.locals.get(name).copied().ok_or_else(|| {
                CodegenError::LLVMCompileError(format!("use of {name} before its definition"))
            }),
        }
    }

    fn block(&self, label: &Label) -> Result<LLVMBasicBlockRef, CodegenError> {
        self.blocks
            .get(label)
            .copied()
            .ok_or_else(|| CodegenError::LLVMCompileError(format!("unknown block {label}")))
    }
}

/// Compiles the given function IR.
#[instrument(level = "debug", skip_all, fields(name = %def.label()))]
fn compile_function<'a>(
    ctx: &ModuleCodegenCtx<'a>,
    def: &'a FunctionDef,
) -> Result<(), CodegenError> {
    debug!("compiling function");
    let (function, _) = ctx.functions[def.label()];

    let mut fn_ctx = FunctionCodegenCtx {
        module: ctx,
        builder: unsafe { LLVMCreateBuilderInContext(ctx.context) },
        locals: HashMap::new(),
        blocks: HashMap::new(),
        current_block: 0,
        pending_phis: Vec::new(),
    };

    for (index, param) in def.params().iter().enumerate() {
        let value = unsafe { LLVMGetParam(function, index as u32) };
        fn_ctx.locals.insert(param.clone(), value);
    }

    for block in def.blocks() {
        let name = c_string(block.label().as_str())?;
        let llvm_block =
            unsafe { LLVMAppendBasicBlockInContext(ctx.context, function, name.as_ptr()) };
        fn_ctx.blocks.insert(block.label().clone(), llvm_block);
    }

    // Dominators first, so every local is compiled before its uses. Unreachable
    // blocks still have to be emitted.
    let cfg = ControlFlowGraph::new(def.blocks());
    let order = cfg.reverse_postorder().iter().copied().chain(
        (0..def.blocks().len()).filter(|&index| !cfg.is_reachable(index)),
    );

    for index in order {
        let block = cfg.block(index);
        fn_ctx.current_block = index;
        unsafe { LLVMPositionBuilderAtEnd(fn_ctx.builder, fn_ctx.block(block.label())?) };

        for named in block.instructions() {
            let value = compile_instruction(&mut fn_ctx, named.instruction())?;
            if let Some(name) = named.name() {
                fn_ctx.locals.insert(name.clone(), value);
            }
        }

        compile_terminator(&fn_ctx, block.terminator())?;
    }

    for PendingPhi {
        phi,
        ty,
        block,
        incoming,
    } in std::mem::take(&mut fn_ctx.pending_phis)
    {
        let mut values = Vec::with_capacity(incoming.len());
        let mut blocks = Vec::with_capacity(incoming.len());
        for (value, label) in incoming {
            // LLVM wants an entry per edge, and a terminator may branch to the same block twice.
            let edges = cfg
                .predecessors(block)
                .iter()
                .filter(|&&pred| Some(pred) == cfg.index(label))
                .count();
            let llvm_value = fn_ctx.value(value)?;
            let llvm_block = fn_ctx.block(label)?;
            for _ in 0..edges {
                values.push(llvm_value);
                blocks.push(llvm_block);
            }
        }
        debug!("resolved {ty} phi with {} incoming values", values.len());
        unsafe {
            LLVMAddIncoming(
                phi,
                values.as_mut_ptr(),
                blocks.as_mut_ptr(),
                values.len() as u32,
            )
        };
    }

    Ok(())
}

fn compile_instruction<'a>(
    ctx: &mut FunctionCodegenCtx<'_, 'a>,
    instruction: &'a InstructionKind,
) -> Result<LLVMValueRef, CodegenError> {
    let name = c"".as_ptr();

    Ok(match instruction {
        InstructionKind::Binary { op, lhs, rhs } => compile_binop(ctx, *op, lhs, rhs)?,
        InstructionKind::Cast { op, value, to } => {
            let from = value.ty();
            let build: BuildCast = match op {
                CastOp::Trunc => LLVMBuildTrunc,
                CastOp::FloatTrunc => LLVMBuildFPTrunc,
                CastOp::Ext if from.is_signed() => LLVMBuildSExt,
                CastOp::Ext => LLVMBuildZExt,
                CastOp::FloatExt => LLVMBuildFPExt,
                CastOp::FloatToInt if to.is_signed() => LLVMBuildFPToSI,
                CastOp::FloatToInt => LLVMBuildFPToUI,
                CastOp::IntToFloat if from.is_signed() => LLVMBuildSIToFP,
                CastOp::IntToFloat => LLVMBuildUIToFP,
                CastOp::BitCast => LLVMBuildBitCast,
            };
            let value = ctx.value(value)?;
            unsafe { build(ctx.builder, value, ctx.module.scalar_type(*to), name) }
        }
        InstructionKind::Cmp {
            predicate,
            lhs,
            rhs,
        } => {
            let ty = lhs.ty();
            let (lhs, rhs) = (ctx.value(lhs)?, ctx.value(rhs)?);
            if ty.is_float() {
                let predicate = real_predicate(*predicate);
                unsafe { LLVMBuildFCmp(ctx.builder, predicate, lhs, rhs, name) }
            } else {
                let predicate = int_predicate(*predicate, ty.is_signed());
                unsafe { LLVMBuildICmp(ctx.builder, predicate, lhs, rhs, name) }
            }
        }
        InstructionKind::Select {
            condition,
            if_true,
            if_false,
        } => {
            let condition = ctx.value(condition)?;
            let if_true = ctx.value(if_true)?;
            let if_false = ctx.value(if_false)?;
            unsafe { LLVMBuildSelect(ctx.builder, condition, if_true, if_false, name) }
        }
        InstructionKind::Phi { ty, incoming } => {
            let phi = unsafe { LLVMBuildPhi(ctx.builder, ctx.module.scalar_type(*ty), name) };
            ctx.pending_phis.push(PendingPhi {
                phi,
                ty: *ty,
                block: ctx.current_block,
                incoming: incoming.as_slice(),
            });
            phi
        }
        InstructionKind::Call {
            callee,
            args,
            attributes,
            ..
        } => {
            let (function, fn_ty) = ctx.module.functions.get(callee).copied().ok_or_else(|| {
                CodegenError::LLVMCompileError(format!("call to undeclared function {callee}"))
            })?;
            let mut args = args
                .iter()
                .map(|arg| ctx.value(arg))
                .collect::<Result<Vec<_>, _>>()?;

            let call = unsafe {
                LLVMBuildCall2(
                    ctx.builder,
                    fn_ty,
                    function,
                    args.as_mut_ptr(),
                    args.len() as u32,
                    name,
                )
            };
            for attribute in attributes {
                let attribute = ctx.module.attribute(*attribute);
                unsafe { LLVMAddCallSiteAttribute(call, LLVMAttributeFunctionIndex, attribute) };
            }
            call
        }
    })
}

/// Compiles a binary operation.
fn compile_binop(
    ctx: &FunctionCodegenCtx,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
) -> Result<LLVMValueRef, CodegenError> {
    let ty = lhs.ty();
    let is_float = ty.is_float();
    let is_signed = ty.is_signed();

    let build: BuildBinary = match op {
        BinOp::Add if is_float => LLVMBuildFAdd,
        BinOp::Add => LLVMBuildAdd,
        BinOp::Sub if is_float => LLVMBuildFSub,
        BinOp::Sub => LLVMBuildSub,
        BinOp::Mul if is_float => LLVMBuildFMul,
        BinOp::Mul => LLVMBuildMul,
        BinOp::Quot if is_signed => LLVMBuildSDiv,
        BinOp::Quot => LLVMBuildUDiv,
        BinOp::Rem if is_signed => LLVMBuildSRem,
        BinOp::Rem => LLVMBuildURem,
        BinOp::Div => LLVMBuildFDiv,
        BinOp::ShiftLeft => LLVMBuildShl,
        BinOp::ShiftRightLogical => LLVMBuildLShr,
        BinOp::ShiftRightArithmetic => LLVMBuildAShr,
        BinOp::And => LLVMBuildAnd,
        BinOp::Or => LLVMBuildOr,
        BinOp::Xor => LLVMBuildXor,
    };

    let lhs_value = ctx.value(lhs)?;
    let mut rhs_value = ctx.value(rhs)?;

    // Shift amounts are words, LLVM wants them at the width of the shifted value.
    if op.is_shift() && ty.bit_width() < rhs.ty().bit_width() {
        rhs_value = unsafe {
            LLVMBuildTrunc(
                ctx.builder,
                rhs_value,
                ctx.module.scalar_type(ty),
                c"".as_ptr(),
            )
        };
    }

    Ok(unsafe { build(ctx.builder, lhs_value, rhs_value, c"".as_ptr()) })
}

fn compile_terminator(
    ctx: &FunctionCodegenCtx,
    terminator: &TerminatorKind,
) -> Result<(), CodegenError> {
    let builder = ctx.builder;
    match terminator {
        TerminatorKind::Ret => unsafe {
            LLVMBuildRetVoid(builder);
        },
        TerminatorKind::RetVal(value) => {
            let value = ctx.value(value)?;
            unsafe { LLVMBuildRet(builder, value) };
        }
        TerminatorKind::Br(target) => {
            let target = ctx.block(target)?;
            unsafe { LLVMBuildBr(builder, target) };
        }
        TerminatorKind::CondBr {
            condition,
            if_true,
            if_false,
        } => {
            let condition = ctx.value(condition)?;
            let (if_true, if_false) = (ctx.block(if_true)?, ctx.block(if_false)?);
            unsafe { LLVMBuildCondBr(builder, condition, if_true, if_false) };
        }
        TerminatorKind::Switch {
            scrutinee,
            default,
            cases,
        } => {
            let ty = scrutinee.ty();
            let value = ctx.value(scrutinee)?;
            let default = ctx.block(default)?;
            let switch = unsafe { LLVMBuildSwitch(builder, value, default, cases.len() as u32) };
            for (case, target) in cases {
                let case = ctx.module.constant(ty, *case);
                let target = ctx.block(target)?;
                unsafe { LLVMAddCase(switch, case, target) };
            }
        }
    }
    Ok(())
}

fn int_predicate(predicate: CmpPredicate, is_signed: bool) -> LLVMIntPredicate {
    match (predicate, is_signed) {
        (CmpPredicate::Eq, _) => LLVMIntPredicate::LLVMIntEQ,
        (CmpPredicate::Ne, _) => LLVMIntPredicate::LLVMIntNE,
        (CmpPredicate::Lt, true) => LLVMIntPredicate::LLVMIntSLT,
        (CmpPredicate::Lt, false) => LLVMIntPredicate::LLVMIntULT,
        (CmpPredicate::Le, true) => LLVMIntPredicate::LLVMIntSLE,
        (CmpPredicate::Le, false) => LLVMIntPredicate::LLVMIntULE,
        (CmpPredicate::Gt, true) => LLVMIntPredicate::LLVMIntSGT,
        (CmpPredicate::Gt, false) => LLVMIntPredicate::LLVMIntUGT,
        (CmpPredicate::Ge, true) => LLVMIntPredicate::LLVMIntSGE,
        (CmpPredicate::Ge, false) => LLVMIntPredicate::LLVMIntUGE,
    }
}

/// Ordered comparisons, except `Ne` which also holds when either side is NaN.
fn real_predicate(predicate: CmpPredicate) -> LLVMRealPredicate {
    match predicate {
        CmpPredicate::Eq => LLVMRealPredicate::LLVMRealOEQ,
        CmpPredicate::Ne => LLVMRealPredicate::LLVMRealUNE,
        CmpPredicate::Lt => LLVMRealPredicate::LLVMRealOLT,
        CmpPredicate::Le => LLVMRealPredicate::LLVMRealOLE,
        CmpPredicate::Gt => LLVMRealPredicate::LLVMRealOGT,
        CmpPredicate::Ge => LLVMRealPredicate::LLVMRealOGE,
    }
}
