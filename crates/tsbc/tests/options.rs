// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiler and runtime configuration.

mod common;

use common::*;
use tsbc::ast::build::*;
use tsbc::{compile_module, CompileError, CompilerOptions, Runtime, RuntimeError, RuntimeOptions, Value};

#[test]
fn test_compiler_options_from_json() {
    let options: CompilerOptions = serde_json::from_str(r#"{ "short_branch_limit": 64 }"#).unwrap();
    assert_eq!(options.short_branch_limit, 64);
    assert_eq!(options.max_locals, CompilerOptions::default().max_locals);

    let json = serde_json::to_string(&options).unwrap();
    let back: CompilerOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);
}

#[test]
fn test_runtime_options_from_json() {
    let options: RuntimeOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, RuntimeOptions::default());
    let options: RuntimeOptions = serde_json::from_str(r#"{ "max_call_depth": 8 }"#).unwrap();
    assert_eq!(options.max_call_depth, 8);
}

#[test]
fn test_local_slot_limit() {
    let body = (0..5).map(|i| let_(&format!("v{i}"), Some("int"), num("0"))).collect();
    let module = main_module("void", body);
    let options = CompilerOptions {
        max_locals: 3,
        ..CompilerOptions::default()
    };
    let err = compile_module(&module, &options).unwrap_err();
    assert!(matches!(err, CompileError::LimitExceeded { what: "local slot", limit: 3 }));
}

#[test]
fn test_slot_indices_run_out_before_a_raised_limit() {
    let count = usize::from(u16::MAX) + 2;
    let body = (0..count).map(|i| let_(&format!("v{i}"), Some("int"), num("0"))).collect();
    let options = CompilerOptions {
        max_locals: usize::MAX,
        ..CompilerOptions::default()
    }
    .with_parallel(false);
    let err = compile_module(&main_module("void", body), &options).unwrap_err();
    assert!(matches!(err, CompileError::LimitExceeded { what: "local slot", limit: 65_536 }));
}

#[test]
fn test_constant_pool_limit() {
    let body = (0..4)
        .map(|i| let_(&format!("s{i}"), Some("string"), string(&format!("text {i}"))))
        .collect();
    let module = main_module("void", body);
    let options = CompilerOptions {
        max_constants: 2,
        ..CompilerOptions::default()
    };
    let err = compile_module(&module, &options).unwrap_err();
    assert!(matches!(err, CompileError::LimitExceeded { what: "constant pool", .. }));
}

#[test]
fn test_code_size_limit() {
    let body = (0..50).map(|_| expr(num("1"))).collect();
    let options = CompilerOptions {
        max_code_size: 16,
        ..CompilerOptions::default()
    };
    let err = compile_module(&main_module("void", body), &options).unwrap_err();
    assert!(matches!(err, CompileError::LimitExceeded { what: "code size", limit: 16 }));
}

#[test]
fn test_call_depth_limit() {
    // static down(n: int): int { return n == 0 ? 0 : Main.down(n - 1) + 1; }
    let down = method(
        "down",
        vec![ret(cond(
            eq(ident("n"), num("0")),
            num("0"),
            add(call(member(ident("Main"), "down"), vec![sub(ident("n"), num("1"))]), num("1")),
        ))],
    )
    .param("n", "int")
    .returns("int")
    .static_();
    let module = module(vec![class("Main").method(down)]);
    let compiled = compile(&module);

    let mut runtime = Runtime::with_options(&compiled, RuntimeOptions { max_call_depth: 16 }).unwrap();
    assert_eq!(runtime.invoke_static("Main", "down", &[Value::Int(10)]).unwrap(), Value::Int(10));
    let err = runtime.invoke_static("Main", "down", &[Value::Int(100)]).unwrap_err();
    assert_eq!(err, RuntimeError::StackOverflow(16));
}

#[test]
fn test_sequential_compilation() {
    let module = main_module("int", vec![ret(num("7"))]);
    let options = CompilerOptions::default().with_parallel(false);
    assert_eq!(run(&compile_with(&module, &options)), Value::Int(7));
}
