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

//! Types relating to the decoded form of a WebAssembly module.

use crate::instr::Instruction;
use core::fmt;

/// Represents the types of values in a WebAssembly module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    /// The value type is i32.
    I32,
    /// The value type is i64.
    I64,
    /// The value type is f32.
    F32,
    /// The value type is f64.
    F64,
}

impl ValType {
    /// Interprets `byte` as a value type, returning `None` for bytes outside
    /// the encoding.
    pub fn from_byte(byte: u8) -> Option<ValType> {
        match byte {
            0x7f => Some(ValType::I32),
            0x7e => Some(ValType::I64),
            0x7d => Some(ValType::F32),
            0x7c => Some(ValType::F64),
            _ => None,
        }
    }
}

/// The type of element a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    /// A reference to a function.
    FuncRef,
}

/// Resizable limits of a table or memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Initial size, in table elements or memory pages.
    pub initial: u32,
    /// Optional maximum size.
    pub maximum: Option<u32>,
}

/// The type of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    /// The table's element type.
    pub element: ElemType,
    /// The table's size limits.
    pub limits: Limits,
}

/// The type of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    /// The global's value type.
    pub content_type: ValType,
    /// Whether the global is mutable.
    pub mutable: bool,
}

/// Represents a type of a function in a WebAssembly module.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    /// The combined parameters and result types.
    params_results: Box<[ValType]>,
    /// The number of parameter types.
    len_params: usize,
}

impl fmt::Debug for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncType")
            .field("params", &self.params())
            .field("results", &self.results())
            .finish()
    }
}

impl FuncType {
    /// Creates a new [`FuncType`] from the given `params` and `results`.
    pub fn new<P, R>(params: P, results: R) -> Self
    where
        P: IntoIterator<Item = ValType>,
        R: IntoIterator<Item = ValType>,
    {
        let mut buffer = params.into_iter().collect::<Vec<_>>();
        let len_params = buffer.len();
        buffer.extend(results);
        Self {
            params_results: buffer.into(),
            len_params,
        }
    }

    /// Returns a shared slice to the parameter types of the [`FuncType`].
    #[inline]
    pub fn params(&self) -> &[ValType] {
        &self.params_results[..self.len_params]
    }

    /// Returns a shared slice to the result types of the [`FuncType`].
    #[inline]
    pub fn results(&self) -> &[ValType] {
        &self.params_results[self.len_params..]
    }
}

/// The kind of definition an import provides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeRef {
    /// The import is a function, indexing into the type section.
    Func(u32),
    /// The import is a table.
    Table(TableType),
    /// The import is a memory.
    Memory(Limits),
    /// The import is a global.
    Global(GlobalType),
}

/// Represents an import in a WebAssembly module.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// The module being imported from.
    pub module: String,
    /// The name of the imported item.
    pub name: String,
    /// The type of the imported item.
    pub ty: TypeRef,
}

/// External types as they occur in the export section of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    /// The external kind is a function.
    Func,
    /// The external kind is a table.
    Table,
    /// The external kind is a memory.
    Memory,
    /// The external kind is a global.
    Global,
}

/// Represents an export in a WebAssembly module.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    /// The name of the exported item.
    pub name: String,
    /// The kind of the export.
    pub kind: ExternalKind,
    /// The index of the exported item within its kind's index space.
    pub index: u32,
}

/// Represents a global in a WebAssembly module.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// The global's type.
    pub ty: GlobalType,
    /// The constant expression producing the global's initial value.
    pub init_expr: Vec<Instruction>,
}

/// Represents an element segment of a WebAssembly module.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// The index of the table the segment initializes.
    pub table_index: u32,
    /// The constant expression producing the segment's table offset.
    pub offset_expr: Vec<Instruction>,
    /// The function indices placed into the table.
    pub items: Vec<u32>,
}

/// Represents a data segment of a WebAssembly module.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// The index of the memory the segment initializes.
    pub memory_index: u32,
    /// The constant expression producing the segment's memory offset.
    pub offset_expr: Vec<Instruction>,
    /// The raw bytes of the segment.
    pub data: Vec<u8>,
}

/// The decoded body of a function from the code section.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// The function's local variables, with count-times-type runs expanded
    /// to one entry per local.
    pub locals: Vec<ValType>,
    /// The function's instruction sequence, without the closing `end`.
    pub body: Vec<Instruction>,
}

/// An uninterpreted custom section.
///
/// The payload bytes are carried verbatim; nothing in a custom section's
/// content is ever an error.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
    /// The section's name. Invalid UTF-8 in the name is replaced rather
    /// than rejected.
    pub name: String,
    /// The section's payload, excluding the name.
    pub data: Vec<u8>,
}

/// Identifiers of the sections of a module, in their required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionId {
    /// An uninterpreted named section.
    Custom = 0,
    /// Function type declarations.
    Type = 1,
    /// Imported items.
    Import = 2,
    /// Type indices of the module's own functions.
    Function = 3,
    /// Table declarations.
    Table = 4,
    /// Memory declarations.
    Memory = 5,
    /// Global declarations with initializers.
    Global = 6,
    /// Exported items.
    Export = 7,
    /// The optional start function.
    Start = 8,
    /// Table element segments.
    Element = 9,
    /// Function bodies.
    Code = 10,
    /// Memory data segments.
    Data = 11,
}

impl SectionId {
    /// Interprets `byte` as a section identifier, returning `None` for bytes
    /// outside the defined range.
    pub fn from_byte(byte: u8) -> Option<SectionId> {
        Some(match byte {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            _ => return None,
        })
    }
}

/// The declared result signature of a block, loop, or if.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// The block neither consumes nor produces any values.
    Empty,
    /// The block produces a singular value of the given type.
    Type(ValType),
    /// The block is described by a function type found at the given index in
    /// the type section.
    FuncType(u32),
}

/// A fully decoded WebAssembly module.
///
/// Every section the input omitted is an empty collection, except the start
/// function, which stays `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    /// Contents of the type section.
    pub types: Vec<FuncType>,
    /// Contents of the import section.
    pub imports: Vec<Import>,
    /// Contents of the function section: one type index per function defined
    /// in this module, in code-section order.
    pub functions: Vec<u32>,
    /// Contents of the table section.
    pub tables: Vec<TableType>,
    /// Contents of the memory section.
    pub memories: Vec<Limits>,
    /// Contents of the global section.
    pub globals: Vec<Global>,
    /// Contents of the export section.
    pub exports: Vec<Export>,
    /// The function index of the start function, if the module has one.
    pub start: Option<u32>,
    /// Contents of the element section.
    pub elements: Vec<Element>,
    /// Contents of the code section, index-aligned with [`Module::functions`].
    pub code: Vec<FunctionBody>,
    /// Contents of the data section.
    pub data: Vec<Data>,
    /// Every custom section of the module, in stream order.
    pub custom_sections: Vec<CustomSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_type_splits_params_and_results() {
        let ty = FuncType::new([ValType::I32, ValType::I64], [ValType::F64]);
        assert_eq!(ty.params(), &[ValType::I32, ValType::I64]);
        assert_eq!(ty.results(), &[ValType::F64]);

        let empty = FuncType::new([], []);
        assert!(empty.params().is_empty());
        assert!(empty.results().is_empty());
    }

    #[test]
    fn func_type_equality_respects_the_split() {
        // Same flattened contents, different split point.
        let a = FuncType::new([ValType::I32], [ValType::I32]);
        let b = FuncType::new([ValType::I32, ValType::I32], []);
        assert_ne!(a, b);
        assert_eq!(a, FuncType::new([ValType::I32], [ValType::I32]));
    }

    #[test]
    fn section_ids_round_trip_and_order() {
        for byte in 0..=11u8 {
            let id = SectionId::from_byte(byte).unwrap();
            assert_eq!(id as u8, byte);
        }
        assert!(SectionId::from_byte(12).is_none());
        assert!(SectionId::Type < SectionId::Code);
    }
}
