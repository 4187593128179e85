// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `++`/`--` on every kind of assignable place.

mod common;

use common::*;
use tsbc::ast::build::*;
use tsbc::ast::NodeKind;
use tsbc::{CompileError, Runtime, Value};

#[test]
fn test_prefix_and_postfix_results() {
    // let x = 5; let a = x++; let b = ++x; return a * 100 + b * 10 + x;
    let result = eval(
        "int",
        vec![
            let_("x", Some("int"), num("5")),
            let_("a", Some("int"), post_inc(ident("x"))),
            let_("b", Some("int"), pre_inc(ident("x"))),
            ret(add(add(mul(ident("a"), num("100")), mul(ident("b"), num("10"))), ident("x"))),
        ],
    );
    assert_eq!(result, Value::Int(5 * 100 + 7 * 10 + 7));
}

#[test]
fn test_byte_increment_wraps() {
    let result = eval(
        "byte",
        vec![let_("b", Some("byte"), num("127")), expr(post_inc(ident("b"))), ret(ident("b"))],
    );
    assert_eq!(result, Value::Byte(-128));
}

#[test]
fn test_short_decrement_wraps() {
    let result = eval(
        "short",
        vec![let_("s", Some("short"), num("-32768")), expr(pre_dec(ident("s"))), ret(ident("s"))],
    );
    assert_eq!(result, Value::Short(32767));
}

#[test]
fn test_long_float_double_updates() {
    let result = eval(
        "double",
        vec![
            let_("l", Some("long"), num("9223372036854775807")),
            expr(post_inc(ident("l"))),
            let_("f", Some("float"), num("1.5")),
            expr(pre_inc(ident("f"))),
            let_("d", Some("double"), num("0.25")),
            expr(post_dec(ident("d"))),
            if_(lt(ident("l"), num("0")), ret(add(ident("f"), ident("d")))),
            ret(num("0")),
        ],
    );
    assert_eq!(result, Value::Double(2.5 - 0.75));
}

#[test]
fn test_bigint_increment() {
    let result = eval(
        "bigint",
        vec![
            let_("n", Some("bigint"), bigint("9223372036854775807n")),
            expr(pre_inc(ident("n"))),
            ret(ident("n")),
        ],
    );
    let expected: num_bigint::BigInt = "9223372036854775808".parse().unwrap();
    assert_eq!(result, Value::BigInt(expected));
}

#[test]
fn test_list_element_postfix_evaluates_index_once() {
    // const arr = [10, 20, 30, 40]; let i = 1; const r = arr[i + 1]++;
    let body = vec![
        const_("arr", None, array(vec![num("10"), num("20"), num("30"), num("40")])),
        let_("i", Some("int"), num("1")),
        const_("r", None, post_inc(index(ident("arr"), add(ident("i"), num("1"))))),
        expr(assign(member(ident("Main"), "last"), ident("arr"))),
        ret(ident("r")),
    ];
    let module = module(vec![class("Main")
        .field(field("last", Some("List"), None).static_())
        .method(main("int", body))]);
    let compiled = compile(&module);
    let mut runtime = Runtime::new(&compiled).unwrap();
    assert_eq!(runtime.invoke_static("Main", "main", &[]).unwrap(), Value::Int(30));
    assert_eq!(
        runtime.get_static("Main", "last"),
        Some(Value::list(vec![Value::Int(10), Value::Int(20), Value::Int(31), Value::Int(40)]))
    );
}

#[test]
fn test_native_array_element_update() {
    let result = eval(
        "int",
        vec![
            let_("a", Some("int[]"), array(vec![num("1"), num("2"), num("3")])),
            let_("old", Some("int"), post_dec(index(ident("a"), num("2")))),
            expr(pre_inc(index(ident("a"), num("0")))),
            ret(add(add(ident("old"), mul(index(ident("a"), num("0")), num("10"))), mul(index(ident("a"), num("2")), num("100")))),
        ],
    );
    assert_eq!(result, Value::Int(3 + 2 * 10 + 2 * 100));
}

#[test]
fn test_map_entry_update() {
    let result = eval(
        "int",
        vec![
            const_("m", None, object(vec![("hits", num("41"))])),
            expr(post_inc(member(ident("m"), "hits"))),
            ret(member(ident("m"), "hits")),
        ],
    );
    assert_eq!(result, Value::Int(42));
}

#[test]
fn test_instance_and_static_field_updates() {
    let bump = method(
        "bump",
        vec![
            expr(post_inc(member(ident("Counter"), "total"))),
            ret(pre_inc(member(this(), "value"))),
        ],
    )
    .returns("int");
    let module = module(vec![class("Counter")
        .field(field("value", Some("int"), Some(num("10"))))
        .field(field("total", Some("long"), None).static_())
        .method(bump)]);
    let compiled = compile(&module);
    let mut runtime = Runtime::new(&compiled).unwrap();
    let counter = runtime.instantiate("Counter").unwrap();
    assert_eq!(runtime.invoke(&counter, "bump", &[]).unwrap(), Value::Int(11));
    assert_eq!(runtime.invoke(&counter, "bump", &[]).unwrap(), Value::Int(12));
    assert_eq!(runtime.get_static("Counter", "total"), Some(Value::Long(2)));
}

#[test]
fn test_update_of_non_lvalue_is_rejected() {
    let err = compile_err(&main_module(
        "int",
        vec![let_("x", Some("int"), num("0")), ret(pre_inc(paren(post_inc(ident("x")))))],
    ));
    assert!(matches!(err, CompileError::InvalidLvalue { node: NodeKind::Update, .. }));

    let err = compile_err(&main_module("int", vec![ret(post_inc(num("5")))]));
    assert!(matches!(err, CompileError::InvalidLvalue { .. }));
}

#[test]
fn test_update_of_string_is_a_type_error() {
    let err = compile_err(&main_module(
        "void",
        vec![let_("s", Some("string"), string("a")), expr(post_inc(ident("s")))],
    ));
    assert!(matches!(err, CompileError::TypeError { .. }));
}
