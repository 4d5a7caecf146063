//! Core compiler for the Sprig language.
//!
//! Sprig is a tiny imperative language: `let` declarations, assignment,
//! `if`/`else`, `while`, and integer arithmetic and comparisons. A
//! program compiles to a single WebAssembly function. The pipeline is:
//!
//!   source .sprig
//!     -> lexer        (tokens)
//!     -> parser       (drives the scope/block builder directly)
//!     -> expr         (shunting-yard reduction of each expression)
//!     -> node graph   (statement chains that emit their own bytes)
//!     -> module       (section assembly, LEB128 throughout)
//!
//! Front ends such as the CLI should call [`compile`] or
//! [`compile_wasm`] instead of driving the stages themselves.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing, parsing, scopes and expressions
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod scope;
pub mod expr;

// ---------------------------------------------------------------------
// Node graph and host interface
// ---------------------------------------------------------------------

pub mod node;
pub mod builtins;

// ---------------------------------------------------------------------
// Back-end: code generation, module assembly and orchestration
// ---------------------------------------------------------------------

pub mod leb128;
pub mod codegen_wasm;
pub mod module;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, CompileOptions, PrintMode, compile, compile_wasm};
pub use error::CoreError;
