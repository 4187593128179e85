// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The compiler: AST in, verified-shape bytecode out.

pub mod bytecode;
pub mod codegen;
pub mod coercion;
pub mod emitter;
pub mod literals;

use tracing::{info, instrument};

use crate::ast::Module;
use crate::error::Result;
use crate::options::CompilerOptions;
use bytecode::{CompiledClass, CompiledModule};
use codegen::ClassTable;

/// Compiles every class of a module.
///
/// Classes share nothing mutable once the class table is built, so with
/// the `parallel` feature and [`CompilerOptions::parallel`] set they are
/// compiled on the rayon thread pool. The first error in source order wins
/// either way.
#[instrument(skip_all, fields(classes = module.classes.len()))]
pub fn compile_module(module: &Module, options: &CompilerOptions) -> Result<CompiledModule> {
    let table = ClassTable::build(module)?;
    let classes = compile_classes(module, &table, options)?;
    info!(classes = classes.len(), "module compiled");
    Ok(CompiledModule { classes })
}

#[cfg(feature = "parallel")]
fn compile_classes(module: &Module, table: &ClassTable, options: &CompilerOptions) -> Result<Vec<CompiledClass>> {
    use rayon::prelude::*;

    if options.parallel {
        // Collecting into a Result keeps source order and reports the
        // first failing class.
        let results: Vec<Result<CompiledClass>> = module
            .classes
            .par_iter()
            .map(|class| codegen::compile_class(class, table, options))
            .collect();
        return results.into_iter().collect();
    }
    compile_sequential(module, table, options)
}

#[cfg(not(feature = "parallel"))]
fn compile_classes(module: &Module, table: &ClassTable, options: &CompilerOptions) -> Result<Vec<CompiledClass>> {
    compile_sequential(module, table, options)
}

fn compile_sequential(module: &Module, table: &ClassTable, options: &CompilerOptions) -> Result<Vec<CompiledClass>> {
    module
        .classes
        .iter()
        .map(|class| codegen::compile_class(class, table, options))
        .collect()
}
