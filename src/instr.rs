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

//! The decoded instruction tree and the opcode table behind it.

use crate::types::{BlockType, ValType};

/// Invokes `$mac` with every single-byte opcode and its encoding.
///
/// Sentinels (`else` and `end`) are included since the decoder reads them
/// through the same table, even though they never appear in a decoded tree.
/// The `0xfc` prefix byte is not an opcode and is handled separately.
macro_rules! for_each_opcode {
    ($mac:ident) => {
        $mac! {
            Unreachable = 0x00,
            Nop = 0x01,
            Block = 0x02,
            Loop = 0x03,
            If = 0x04,
            Else = 0x05,
            End = 0x0b,
            Br = 0x0c,
            BrIf = 0x0d,
            BrTable = 0x0e,
            Return = 0x0f,
            Call = 0x10,
            CallIndirect = 0x11,
            Drop = 0x1a,
            Select = 0x1b,
            LocalGet = 0x20,
            LocalSet = 0x21,
            LocalTee = 0x22,
            GlobalGet = 0x23,
            GlobalSet = 0x24,
            I32Load = 0x28,
            I64Load = 0x29,
            F32Load = 0x2a,
            F64Load = 0x2b,
            I32Load8S = 0x2c,
            I32Load8U = 0x2d,
            I32Load16S = 0x2e,
            I32Load16U = 0x2f,
            I64Load8S = 0x30,
            I64Load8U = 0x31,
            I64Load16S = 0x32,
            I64Load16U = 0x33,
            I64Load32S = 0x34,
            I64Load32U = 0x35,
            I32Store = 0x36,
            I64Store = 0x37,
            F32Store = 0x38,
            F64Store = 0x39,
            I32Store8 = 0x3a,
            I32Store16 = 0x3b,
            I64Store8 = 0x3c,
            I64Store16 = 0x3d,
            I64Store32 = 0x3e,
            MemorySize = 0x3f,
            MemoryGrow = 0x40,
            I32Const = 0x41,
            I64Const = 0x42,
            F32Const = 0x43,
            F64Const = 0x44,
            I32Eqz = 0x45,
            I32Eq = 0x46,
            I32Ne = 0x47,
            I32LtS = 0x48,
            I32LtU = 0x49,
            I32GtS = 0x4a,
            I32GtU = 0x4b,
            I32LeS = 0x4c,
            I32LeU = 0x4d,
            I32GeS = 0x4e,
            I32GeU = 0x4f,
            I64Eqz = 0x50,
            I64Eq = 0x51,
            I64Ne = 0x52,
            I64LtS = 0x53,
            I64LtU = 0x54,
            I64GtS = 0x55,
            I64GtU = 0x56,
            I64LeS = 0x57,
            I64LeU = 0x58,
            I64GeS = 0x59,
            I64GeU = 0x5a,
            F32Eq = 0x5b,
            F32Ne = 0x5c,
            F32Lt = 0x5d,
            F32Gt = 0x5e,
            F32Le = 0x5f,
            F32Ge = 0x60,
            F64Eq = 0x61,
            F64Ne = 0x62,
            F64Lt = 0x63,
            F64Gt = 0x64,
            F64Le = 0x65,
            F64Ge = 0x66,
            I32Clz = 0x67,
            I32Ctz = 0x68,
            I32Popcnt = 0x69,
            I32Add = 0x6a,
            I32Sub = 0x6b,
            I32Mul = 0x6c,
            I32DivS = 0x6d,
            I32DivU = 0x6e,
            I32RemS = 0x6f,
            I32RemU = 0x70,
            I32And = 0x71,
            I32Or = 0x72,
            I32Xor = 0x73,
            I32Shl = 0x74,
            I32ShrS = 0x75,
            I32ShrU = 0x76,
            I32Rotl = 0x77,
            I32Rotr = 0x78,
            I64Clz = 0x79,
            I64Ctz = 0x7a,
            I64Popcnt = 0x7b,
            I64Add = 0x7c,
            I64Sub = 0x7d,
            I64Mul = 0x7e,
            I64DivS = 0x7f,
            I64DivU = 0x80,
            I64RemS = 0x81,
            I64RemU = 0x82,
            I64And = 0x83,
            I64Or = 0x84,
            I64Xor = 0x85,
            I64Shl = 0x86,
            I64ShrS = 0x87,
            I64ShrU = 0x88,
            I64Rotl = 0x89,
            I64Rotr = 0x8a,
            F32Abs = 0x8b,
            F32Neg = 0x8c,
            F32Ceil = 0x8d,
            F32Floor = 0x8e,
            F32Trunc = 0x8f,
            F32Nearest = 0x90,
            F32Sqrt = 0x91,
            F32Add = 0x92,
            F32Sub = 0x93,
            F32Mul = 0x94,
            F32Div = 0x95,
            F32Min = 0x96,
            F32Max = 0x97,
            F32Copysign = 0x98,
            F64Abs = 0x99,
            F64Neg = 0x9a,
            F64Ceil = 0x9b,
            F64Floor = 0x9c,
            F64Trunc = 0x9d,
            F64Nearest = 0x9e,
            F64Sqrt = 0x9f,
            F64Add = 0xa0,
            F64Sub = 0xa1,
            F64Mul = 0xa2,
            F64Div = 0xa3,
            F64Min = 0xa4,
            F64Max = 0xa5,
            F64Copysign = 0xa6,
            I32WrapI64 = 0xa7,
            I32TruncF32S = 0xa8,
            I32TruncF32U = 0xa9,
            I32TruncF64S = 0xaa,
            I32TruncF64U = 0xab,
            I64ExtendI32S = 0xac,
            I64ExtendI32U = 0xad,
            I64TruncF32S = 0xae,
            I64TruncF32U = 0xaf,
            I64TruncF64S = 0xb0,
            I64TruncF64U = 0xb1,
            F32ConvertI32S = 0xb2,
            F32ConvertI32U = 0xb3,
            F32ConvertI64S = 0xb4,
            F32ConvertI64U = 0xb5,
            F32DemoteF64 = 0xb6,
            F64ConvertI32S = 0xb7,
            F64ConvertI32U = 0xb8,
            F64ConvertI64S = 0xb9,
            F64ConvertI64U = 0xba,
            F64PromoteF32 = 0xbb,
            I32ReinterpretF32 = 0xbc,
            I64ReinterpretF64 = 0xbd,
            F32ReinterpretI32 = 0xbe,
            F64ReinterpretI64 = 0xbf,
            I32Extend8S = 0xc0,
            I32Extend16S = 0xc1,
            I64Extend8S = 0xc2,
            I64Extend16S = 0xc3,
            I64Extend32S = 0xc4,
        }
    };
}

macro_rules! define_opcode {
    ($($name:ident = $byte:literal,)*) => {
        /// A single-byte instruction opcode.
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $byte,)*
        }

        impl Opcode {
            /// Interprets `byte` as an opcode, returning `None` for bytes
            /// with no assigned instruction.
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                Some(match byte {
                    $($byte => Opcode::$name,)*
                    _ => return None,
                })
            }
        }
    };
}

for_each_opcode!(define_opcode);

impl Opcode {
    /// Whether this opcode takes no immediates.
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            Opcode::Unreachable | Opcode::Nop | Opcode::Return | Opcode::Drop | Opcode::Select
        ) || (Opcode::I32Eqz..=Opcode::I64Extend32S).contains(&self)
    }

    /// Whether this opcode opens a nested block (`block`, `loop`, or `if`).
    pub fn is_block_opener(self) -> bool {
        (Opcode::Block..=Opcode::If).contains(&self)
    }

    /// Whether this opcode takes one index immediate (a label, function,
    /// local, or global index).
    pub fn is_single_index(self) -> bool {
        matches!(self, Opcode::Br | Opcode::BrIf | Opcode::Call)
            || (Opcode::LocalGet..=Opcode::GlobalSet).contains(&self)
    }

    /// Whether this opcode is a memory load or store taking an alignment
    /// and offset immediate.
    pub fn is_mem_access(self) -> bool {
        (Opcode::I32Load..=Opcode::I64Store32).contains(&self)
    }

    /// Whether this opcode queries or grows a memory.
    pub fn is_mem_ctrl(self) -> bool {
        matches!(self, Opcode::MemorySize | Opcode::MemoryGrow)
    }
}

/// The secondary opcode of a `0xfc`-prefixed saturating truncation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaturatingOp {
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
}

impl SaturatingOp {
    /// Interprets a decoded selector as a saturating truncation, returning
    /// `None` for selectors outside the assigned range.
    pub fn from_u32(selector: u32) -> Option<SaturatingOp> {
        Some(match selector {
            0 => SaturatingOp::I32TruncSatF32S,
            1 => SaturatingOp::I32TruncSatF32U,
            2 => SaturatingOp::I32TruncSatF64S,
            3 => SaturatingOp::I32TruncSatF64U,
            4 => SaturatingOp::I64TruncSatF32S,
            5 => SaturatingOp::I64TruncSatF32U,
            6 => SaturatingOp::I64TruncSatF64S,
            7 => SaturatingOp::I64TruncSatF64U,
            _ => return None,
        })
    }
}

/// The immediate of a constant instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// An `i32.const` value.
    I32(i32),
    /// An `i64.const` value.
    I64(i64),
    /// An `f32.const` value.
    F32(f32),
    /// An `f64.const` value.
    F64(f64),
}

impl ConstValue {
    /// The value type the constant pushes.
    pub fn ty(&self) -> ValType {
        match self {
            ConstValue::I32(_) => ValType::I32,
            ConstValue::I64(_) => ValType::I64,
            ConstValue::F32(_) => ValType::F32,
            ConstValue::F64(_) => ValType::F64,
        }
    }

    /// The opcode that encodes the constant.
    pub fn opcode(&self) -> Opcode {
        match self {
            ConstValue::I32(_) => Opcode::I32Const,
            ConstValue::I64(_) => Opcode::I64Const,
            ConstValue::F32(_) => Opcode::F32Const,
            ConstValue::F64(_) => Opcode::F64Const,
        }
    }
}

/// A decoded instruction, grouped by immediate shape rather than one
/// variant per opcode.
///
/// Each shape covers the opcodes whose encodings share the same immediates;
/// the shape's smart constructor asserts the opcode actually belongs to it,
/// so a tree built through the constructors never pairs, say, a `loop`
/// opcode with a branch index.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// An instruction without immediates.
    Basic(Opcode),
    /// A `block`, `loop`, or else-less `if` with its nested body.
    Block {
        /// The opening opcode.
        op: Opcode,
        /// The block's declared result signature.
        ty: BlockType,
        /// The nested instruction sequence, without the closing `end`.
        body: Vec<Instruction>,
    },
    /// An `if` with both arms present.
    IfElse {
        /// The block's declared result signature.
        ty: BlockType,
        /// The arm taken when the condition is non-zero.
        consequent: Vec<Instruction>,
        /// The arm taken when the condition is zero.
        alternate: Vec<Instruction>,
    },
    /// An instruction with one index immediate.
    SingleIndex {
        /// The opcode.
        op: Opcode,
        /// The label, function, local, or global index.
        index: u32,
    },
    /// A `br_table` with its jump targets.
    BrTable {
        /// Label indices selected by the operand.
        targets: Vec<u32>,
        /// The label taken when the operand is out of range.
        default: u32,
    },
    /// A `call_indirect` through a table.
    CallIndirect {
        /// Index of the callee's signature in the type section.
        type_index: u32,
        /// The table holding the callees. This encoding predates multiple
        /// tables, so the index is always zero.
        table_index: u32,
    },
    /// A memory load or store.
    MemArg {
        /// The opcode.
        op: Opcode,
        /// Alignment hint, as a power of two.
        align: u32,
        /// Static offset added to the operand address.
        offset: u32,
    },
    /// A `memory.size` or `memory.grow`.
    MemoryOp {
        /// The opcode.
        op: Opcode,
        /// The memory operated on. This encoding predates multiple
        /// memories, so the index is always zero.
        mem: u32,
    },
    /// A constant.
    Const(ConstValue),
    /// A saturating float-to-integer truncation.
    Saturating(SaturatingOp),
}

impl Instruction {
    /// Creates an immediate-less instruction.
    pub fn basic(op: Opcode) -> Instruction {
        debug_assert!(op.is_basic(), "{op:?} takes immediates");
        Instruction::Basic(op)
    }

    /// Creates a `block`, `loop`, or else-less `if`.
    pub fn block(op: Opcode, ty: BlockType, body: Vec<Instruction>) -> Instruction {
        debug_assert!(op.is_block_opener(), "{op:?} does not open a block");
        Instruction::Block { op, ty, body }
    }

    /// Creates an instruction with one index immediate.
    pub fn single_index(op: Opcode, index: u32) -> Instruction {
        debug_assert!(op.is_single_index(), "{op:?} does not take an index");
        Instruction::SingleIndex { op, index }
    }

    /// Creates a memory load or store.
    pub fn mem_access(op: Opcode, align: u32, offset: u32) -> Instruction {
        debug_assert!(op.is_mem_access(), "{op:?} is not a memory access");
        Instruction::MemArg { op, align, offset }
    }

    /// Creates a `memory.size` or `memory.grow`.
    pub fn memory_op(op: Opcode, mem: u32) -> Instruction {
        debug_assert!(op.is_mem_ctrl(), "{op:?} does not manage a memory");
        Instruction::MemoryOp { op, mem }
    }
}
