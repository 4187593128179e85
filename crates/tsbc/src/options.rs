// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// Options controlling a compilation.
///
/// Can be loaded from any serde format; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Compile classes on the rayon thread pool
    pub parallel: bool,
    /// Largest positive displacement a short branch may encode.
    ///
    /// Clamped to `i16::MAX`. Lowering it forces wide branches on small
    /// methods, which is how the promotion path is tested.
    pub short_branch_limit: i32,
    /// Maximum number of constant pool entries per method
    pub max_constants: usize,
    /// Maximum number of local slots per method
    pub max_locals: usize,
    /// Maximum encoded method size in bytes
    pub max_code_size: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            short_branch_limit: i16::MAX as i32,
            max_constants: u16::MAX as usize,
            max_locals: u16::MAX as usize,
            max_code_size: 0x00FF_FFFF,
        }
    }
}

impl CompilerOptions {
    /// Sets whether classes compile in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the short branch displacement limit.
    pub fn with_short_branch_limit(mut self, limit: i32) -> Self {
        self.short_branch_limit = limit;
        self
    }

    /// The effective short branch limit after clamping.
    pub fn effective_short_branch_limit(&self) -> i32 {
        self.short_branch_limit.clamp(0, i16::MAX as i32)
    }
}
