// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Branches whose displacement outgrows the short form.

mod common;

use common::*;
use tsbc::ast::build::*;
use tsbc::ast::{Module, Statement};
use tsbc::compiler::bytecode::Op;
use tsbc::{CompiledModule, CompilerOptions, Value};

/// `x = x + 1;` repeated `count` times.
fn filler(count: usize) -> Vec<Statement> {
    (0..count)
        .map(|_| expr(assign(ident("x"), add(ident("x"), num("1")))))
        .collect()
}

fn main_ops(compiled: &CompiledModule) -> Vec<Op> {
    let method = compiled.class("Main").unwrap().method("main").unwrap();
    method.instructions().unwrap().into_iter().map(|(_, op)| op).collect()
}

fn has_wide_goto(ops: &[Op]) -> bool {
    ops.iter().any(|op| matches!(op, Op::GotoW(_)))
}

/// `let x = 0; let i = 0; while (i < 3) { <body>; i++; } return x;`
fn looping(body: Vec<Statement>) -> Module {
    let mut body = body;
    body.push(expr(post_inc(ident("i"))));
    main_module(
        "int",
        vec![
            let_("x", Some("int"), num("0")),
            let_("i", Some("int"), num("0")),
            while_(lt(ident("i"), num("3")), block(body)),
            ret(ident("x")),
        ],
    )
}

#[test]
fn test_large_loop_body_widens_branches() {
    let compiled = compile(&looping(filler(4000)));
    let method = compiled.class("Main").unwrap().method("main").unwrap();
    assert!(method.code.len() > i16::MAX as usize);
    assert!(has_wide_goto(&main_ops(&compiled)));
    assert_eq!(run(&compiled), Value::Int(12_000));
}

#[test]
fn test_lowered_limit_forces_wide_form() {
    let module = looping(filler(4));
    let narrow = compile(&module);
    let wide = compile_with(&module, &CompilerOptions::default().with_short_branch_limit(8));

    assert!(!has_wide_goto(&main_ops(&narrow)));
    assert!(has_wide_goto(&main_ops(&wide)));
    assert!(wide.classes[0].methods[0].code.len() > narrow.classes[0].methods[0].code.len());
    assert_eq!(run(&narrow), Value::Int(12));
    assert_eq!(run(&wide), Value::Int(12));
}

#[test]
fn test_widened_conditional_keeps_both_arms() {
    let then_branch = block(filler(3000));
    let else_branch = block(vec![expr(assign(ident("x"), num("-1")))]);
    let build = |flag: bool| {
        main_module(
            "int",
            vec![
                let_("x", Some("int"), num("0")),
                let_("flag", Some("boolean"), boolean(flag)),
                if_else(ident("flag"), then_branch.clone(), else_branch.clone()),
                ret(ident("x")),
            ],
        )
    };
    assert_eq!(run(&compile(&build(true))), Value::Int(3000));
    assert_eq!(run(&compile(&build(false))), Value::Int(-1));
}

#[test]
fn test_break_across_large_body() {
    let mut body = vec![if_(eq(ident("i"), num("1")), break_(None))];
    body.extend(filler(3000));
    let compiled = compile(&looping(body));
    assert_eq!(run(&compiled), Value::Int(3000));
}

#[test]
fn test_short_branches_stay_short_under_default_limit() {
    let compiled = compile(&looping(filler(100)));
    let ops = main_ops(&compiled);
    assert!(!has_wide_goto(&ops));
    assert!(ops.iter().any(|op| matches!(op, Op::If(..))));
}
