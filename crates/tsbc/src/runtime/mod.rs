// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime data model for executing compiled classes.

pub mod object;
pub mod value;

pub use object::{ArrayData, Instance, MapData};
pub use value::Value;
