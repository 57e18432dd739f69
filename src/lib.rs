pub mod codegen;
pub mod config;
pub mod ir;
