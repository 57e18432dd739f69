//! Code generation through the LLVM C API, JIT compiled with MCJIT.

use std::{
    collections::HashMap,
    ffi::{CStr, CString, c_char},
    mem::{MaybeUninit, size_of},
    ptr::null_mut,
    sync::OnceLock,
};

use llvm_sys::{
    analysis::{LLVMVerifierFailureAction, LLVMVerifyModule},
    core::{
        LLVMContextCreate, LLVMContextDispose, LLVMDisposeMessage, LLVMDisposeModule,
        LLVMPrintModuleToString,
    },
    error::{LLVMDisposeErrorMessage, LLVMGetErrorMessage},
    execution_engine::{
        LLVMCreateMCJITCompilerForModule, LLVMDisposeExecutionEngine, LLVMExecutionEngineRef,
        LLVMGetFunctionAddress, LLVMInitializeMCJITCompilerOptions, LLVMLinkInMCJIT,
        LLVMMCJITCompilerOptions,
    },
    prelude::{LLVMContextRef, LLVMModuleRef},
    target::{
        LLVM_InitializeAllAsmPrinters, LLVM_InitializeAllTargetInfos, LLVM_InitializeAllTargetMCs,
        LLVM_InitializeAllTargets, LLVMCopyStringRepOfTargetData, LLVMDisposeTargetData,
    },
    target_machine::{
        LLVMCodeGenOptLevel, LLVMCodeModel, LLVMCreateTargetDataLayout, LLVMCreateTargetMachine,
        LLVMDisposeTargetMachine, LLVMGetDefaultTargetTriple, LLVMGetHostCPUFeatures,
        LLVMGetHostCPUName, LLVMGetTargetFromTriple, LLVMRelocMode, LLVMTargetRef,
    },
    transforms::pass_builder::{
        LLVMCreatePassBuilderOptions, LLVMDisposePassBuilderOptions, LLVMRunPasses,
    },
};
use tracing::{debug, instrument};

use super::{CodegenTarget, TargetDescription, check_target, errors::CodegenError};
use crate::{
    config::{CompileOptions, OptLevel},
    ir::Module,
};

mod compiler;

fn initialize() {
    static INITIALIZED: OnceLock<()> = OnceLock::new();
    INITIALIZED.get_or_init(|| unsafe {
        LLVM_InitializeAllTargets();
        LLVM_InitializeAllTargetInfos();
        LLVM_InitializeAllTargetMCs();
        LLVM_InitializeAllAsmPrinters();
        LLVMLinkInMCJIT();
        debug!("initialized llvm targets");
    });
}

pub(crate) fn c_string(value: &str) -> Result<CString, CodegenError> {
    CString::new(value).map_err(|_| {
        CodegenError::LLVMCompileError(format!("{value:?} contains a nul byte"))
    })
}

/// Copies out and frees a string allocated by LLVM.
///
/// # Safety
///
/// `message` must be a non-null string LLVM expects to be freed with `LLVMDisposeMessage`.
unsafe fn take_message(message: *mut c_char) -> String {
    unsafe {
        let value = CStr::from_ptr(message).to_string_lossy().into_owned();
        LLVMDisposeMessage(message);
        value
    }
}

fn codegen_opt_level(optlevel: OptLevel) -> LLVMCodeGenOptLevel {
    match optlevel {
        OptLevel::None => LLVMCodeGenOptLevel::LLVMCodeGenLevelNone,
        OptLevel::Less => LLVMCodeGenOptLevel::LLVMCodeGenLevelLess,
        OptLevel::Default => LLVMCodeGenOptLevel::LLVMCodeGenLevelDefault,
        OptLevel::Aggressive => LLVMCodeGenOptLevel::LLVMCodeGenLevelAggressive,
    }
}

fn opt_number(optlevel: OptLevel) -> u32 {
    match optlevel {
        OptLevel::None => 0,
        OptLevel::Less => 1,
        OptLevel::Default => 2,
        OptLevel::Aggressive => 3,
    }
}

/// Generates code for the host, or for the triple set in the options.
#[derive(Debug)]
pub struct LlvmTarget {
    options: CompileOptions,
    description: OnceLock<Result<TargetDescription, CodegenError>>,
}

impl LlvmTarget {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            description: OnceLock::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }
}

impl Default for LlvmTarget {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

fn describe_target(options: &CompileOptions) -> Result<TargetDescription, CodegenError> {
    initialize();

    unsafe {
        let (triple, cpu, features) = match &options.target_triple {
            Some(triple) => (triple.clone(), "generic".to_string(), String::new()),
            None => (
                take_message(LLVMGetDefaultTargetTriple()),
                take_message(LLVMGetHostCPUName()),
                take_message(LLVMGetHostCPUFeatures()),
            ),
        };
        debug!("target triple: {triple}, cpu: {cpu}");

        let c_triple = c_string(&triple)?;
        let c_cpu = c_string(&cpu)?;
        let c_features = c_string(&features)?;

        let mut error = null_mut();
        let mut target: MaybeUninit<LLVMTargetRef> = MaybeUninit::uninit();
        if LLVMGetTargetFromTriple(c_triple.as_ptr(), target.as_mut_ptr(), &mut error) != 0 {
            let err = take_message(error);
            tracing::error!("error getting target triple: {}", err);
            return Err(CodegenError::LLVMCompileError(err));
        } else if !error.is_null() {
            LLVMDisposeMessage(error);
        }
        let target = target.assume_init();

        let machine = LLVMCreateTargetMachine(
            target,
            c_triple.as_ptr(),
            c_cpu.as_ptr(),
            c_features.as_ptr(),
            codegen_opt_level(options.optlevel),
            LLVMRelocMode::LLVMRelocDefault,
            LLVMCodeModel::LLVMCodeModelJITDefault,
        );

        let data_layout = LLVMCreateTargetDataLayout(machine);
        let data_layout_rep = take_message(LLVMCopyStringRepOfTargetData(data_layout));
        LLVMDisposeTargetData(data_layout);
        LLVMDisposeTargetMachine(machine);

        Ok(TargetDescription {
            triple,
            data_layout: data_layout_rep,
        })
    }
}

impl CodegenTarget for LlvmTarget {
    type Executable = JitModule;

    /// Queries LLVM once, later calls return the same description.
    fn describe(&self) -> Result<TargetDescription, CodegenError> {
        self.description
            .get_or_init(|| describe_target(&self.options))
            .clone()
    }

    #[instrument(level = "debug", skip_all, fields(name = module.name()))]
    fn compile(&self, module: &Module) -> Result<JitModule, CodegenError> {
        check_target(module, &self.describe()?)?;
        module.validate()?;

        let context = unsafe { LLVMContextCreate() };
        let llvm_module = match compiler::compile_module(context, module) {
            Ok(llvm_module) => llvm_module,
            Err(err) => {
                unsafe { LLVMContextDispose(context) };
                return Err(err);
            }
        };

        if let Err(err) = unsafe { self.optimize(llvm_module) } {
            unsafe {
                LLVMDisposeModule(llvm_module);
                LLVMContextDispose(context);
            }
            return Err(err);
        }

        // The engine owns the module from here on, even when creating it fails.
        let engine = match unsafe { self.create_engine(llvm_module) } {
            Ok(engine) => engine,
            Err(err) => {
                unsafe { LLVMContextDispose(context) };
                return Err(err);
            }
        };

        let mut jit = JitModule {
            engine,
            context,
            addresses: HashMap::new(),
        };

        for def in module.definitions() {
            let name = c_string(def.label().as_str())?;
            let address = unsafe { LLVMGetFunctionAddress(jit.engine, name.as_ptr()) };
            if address == 0 {
                return Err(CodegenError::SymbolNotFound(def.label().to_string()));
            }
            jit.addresses
                .insert(def.label().to_string(), address as usize);
        }

        debug!("compiled {} functions", jit.addresses.len());
        Ok(jit)
    }
}

impl LlvmTarget {
    /// Verifies the module and runs the optimization pipeline on it.
    unsafe fn optimize(&self, llvm_module: LLVMModuleRef) -> Result<(), CodegenError> {
        unsafe {
            let mut message = null_mut();
            if LLVMVerifyModule(
                llvm_module,
                LLVMVerifierFailureAction::LLVMReturnStatusAction,
                &mut message,
            ) != 0
            {
                let err = take_message(message);
                tracing::error!("module failed verification: {}", err);
                return Err(CodegenError::LLVMCompileError(err));
            } else if !message.is_null() {
                LLVMDisposeMessage(message);
            }

            debug!("{}", take_message(LLVMPrintModuleToString(llvm_module)));

            let opts = LLVMCreatePassBuilderOptions();
            let passes = c_string(&format!("default<O{}>", opt_number(self.options.optlevel)))?;
            let error = LLVMRunPasses(llvm_module, passes.as_ptr(), null_mut(), opts);
            LLVMDisposePassBuilderOptions(opts);

            if !error.is_null() {
                let msg = LLVMGetErrorMessage(error);
                let err = CStr::from_ptr(msg).to_string_lossy().into_owned();
                LLVMDisposeErrorMessage(msg);
                return Err(CodegenError::LLVMCompileError(err));
            }

            Ok(())
        }
    }

    unsafe fn create_engine(
        &self,
        llvm_module: LLVMModuleRef,
    ) -> Result<LLVMExecutionEngineRef, CodegenError> {
        unsafe {
            let mut options: MaybeUninit<LLVMMCJITCompilerOptions> = MaybeUninit::uninit();
            LLVMInitializeMCJITCompilerOptions(
                options.as_mut_ptr(),
                size_of::<LLVMMCJITCompilerOptions>(),
            );
            let mut options = options.assume_init();
            options.OptLevel = opt_number(self.options.optlevel);

            let mut engine = null_mut();
            let mut error = null_mut();
            if LLVMCreateMCJITCompilerForModule(
                &mut engine,
                llvm_module,
                &mut options,
                size_of::<LLVMMCJITCompilerOptions>(),
                &mut error,
            ) != 0
            {
                let err = take_message(error);
                tracing::error!("error creating execution engine: {}", err);
                return Err(CodegenError::LLVMCompileError(err));
            }

            Ok(engine)
        }
    }
}

/// Machine code for a module, loaded into this process.
///
/// Function addresses stay valid for as long as the value lives.
#[derive(Debug)]
pub struct JitModule {
    engine: LLVMExecutionEngineRef,
    context: LLVMContextRef,
    addresses: HashMap<String, usize>,
}

impl JitModule {
    pub fn address(&self, symbol: &str) -> Result<usize, CodegenError> {
        self.addresses
            .get(symbol)
            .copied()
            .ok_or_else(|| CodegenError::SymbolNotFound(symbol.to_string()))
    }

    /// The compiled function `symbol` as a function pointer.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C" fn` type matching the function's parameter
    /// and return types, and must not be called after `self` is dropped.
    pub unsafe fn function<F: Copy>(&self, symbol: &str) -> Result<F, CodegenError> {
        assert_eq!(size_of::<F>(), size_of::<usize>());
        let address = self.address(symbol)?;
        Ok(unsafe { std::mem::transmute_copy::<usize, F>(&address) })
    }
}

impl Drop for JitModule {
    fn drop(&mut self) {
        unsafe {
            LLVMDisposeExecutionEngine(self.engine);
            LLVMContextDispose(self.context);
        }
    }
}
