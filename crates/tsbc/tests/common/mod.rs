// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared helpers for integration tests.

#![allow(dead_code)]

use tsbc::ast::build::*;
use tsbc::ast::{MethodDeclaration, Module, Statement};
use tsbc::{compile_module, CompileError, CompiledModule, CompilerOptions, Runtime, Value};

/// Installs a tracing subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn compile(module: &Module) -> CompiledModule {
    compile_with(module, &CompilerOptions::default())
}

pub fn compile_with(module: &Module, options: &CompilerOptions) -> CompiledModule {
    init_tracing();
    match compile_module(module, options) {
        Ok(compiled) => compiled,
        Err(e) => panic!("compilation failed: {e}"),
    }
}

pub fn compile_err(module: &Module) -> CompileError {
    init_tracing();
    match compile_module(module, &CompilerOptions::default()) {
        Ok(_) => panic!("expected a compile error"),
        Err(e) => e,
    }
}

/// Runs `Main.main()` of a compiled module.
pub fn run(compiled: &CompiledModule) -> Value {
    let mut runtime = Runtime::new(compiled).expect("module loads");
    runtime.invoke_static("Main", "main", &[]).expect("main runs")
}

/// A module with a single static `Main.main` of return type `ret`.
pub fn main_module(ret: &str, body: Vec<Statement>) -> Module {
    module(vec![class("Main").method(main(ret, body))])
}

pub fn main(ret: &str, body: Vec<Statement>) -> MethodDeclaration {
    method("main", body).returns(ret).static_()
}

/// Compiles and runs a `Main.main` body.
pub fn eval(ret: &str, body: Vec<Statement>) -> Value {
    run(&compile(&main_module(ret, body)))
}
