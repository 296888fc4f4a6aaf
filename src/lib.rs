/* Copyright 2018 Mozilla Foundation
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! A library for decoding WebAssembly binary modules into an owned tree.
//!
//! Unlike event-driven parsers this crate materializes the entire module up
//! front: every section is decoded into plain owned Rust values and function
//! bodies become nested [`Instruction`] trees, which makes the result
//! convenient to hand to a compiler or emitter that wants random access to
//! the whole structure.
//!
//! Decoding is strictly structural. The decoder enforces the shape of the
//! binary format — header, section ordering, declared segment lengths, the
//! instruction grammar — but performs no type checking or validation of the
//! program the module encodes.
//!
//! To get started, hand a byte buffer to [`decode_module`]:
//!
//! ```
//! let wasm = [
//!     0x00, 0x61, 0x73, 0x6d, // "\0asm"
//!     0x01, 0x00, 0x00, 0x00, // version 1
//! ];
//! let module = wasmdec::decode_module(&wasm).unwrap();
//! assert!(module.types.is_empty());
//! assert!(module.start.is_none());
//! ```

#![deny(missing_docs)]

macro_rules! format_err {
    ($offset:expr, $($arg:tt)*) => {
        crate::DecodeError::fmt(format_args!($($arg)*), $offset)
    }
}

macro_rules! bail {
    ($($arg:tt)*) => {return Err(format_err!($($arg)*))}
}

pub use crate::cursor::{Cursor, DecodeError, Result};
pub use crate::decoder::{decode_module, ModuleDecoder};
pub use crate::instr::*;
pub use crate::types::*;

mod bitint;
mod cursor;
mod decoder;
mod instr;
mod limits;
mod types;
