// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tsbc
//!
//! A compiler backend that lowers a typed TypeScript-like AST to bytecode
//! for a JVM-shaped stack machine.
//!
//! ## Overview
//!
//! - [`ast`]: the input tree and builders for constructing it
//! - [`types`]: primitive, boxed and reference types
//! - [`compiler`]: coercion planning, the emitter with branch widening,
//!   lvalue resolution and the expression and statement compilers
//! - [`vm`]: a reference interpreter that executes compiled modules
//!
//! ## Quick Start
//!
//! ```rust
//! use tsbc::ast::build::*;
//! use tsbc::{compile_module, CompilerOptions, Runtime, Value};
//!
//! let module = module(vec![class("Counter").method(
//!     method("count", vec![
//!         let_("i", Some("int"), num("0")),
//!         do_while(block(vec![expr(post_inc(ident("i")))]), lt(ident("i"), num("10"))),
//!         ret(ident("i")),
//!     ])
//!     .returns("int")
//!     .static_(),
//! )]);
//!
//! let compiled = compile_module(&module, &CompilerOptions::default())?;
//! let mut runtime = Runtime::new(&compiled)?;
//! assert_eq!(runtime.invoke_static("Counter", "count", &[])?, Value::Int(10));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod error;
pub mod options;
pub mod runtime;
pub mod types;
pub mod vm;

pub use compiler::bytecode::{CompiledClass, CompiledMethod, CompiledModule};
pub use compiler::compile_module;
pub use error::{CompileError, Result};
pub use options::CompilerOptions;
pub use runtime::Value;
pub use vm::{Runtime, RuntimeError, RuntimeOptions};
