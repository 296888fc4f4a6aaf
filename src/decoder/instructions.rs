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

//! Recursive-descent decoding of the instruction grammar.

use super::ModuleDecoder;
use crate::cursor::Result;
use crate::instr::{ConstValue, Instruction, Opcode, SaturatingOp};
use crate::types::BlockType;

/// The byte prefixing the saturating truncation instructions.
const SATURATING_PREFIX: u8 = 0xfc;

/// One step of instruction decoding.
///
/// The sentinel opcodes terminate an instruction sequence rather than
/// standing for an instruction, so a single step has three outcomes.
pub(super) enum ParsedInstruction {
    /// An instruction to append to the current sequence.
    Instr(Instruction),
    /// The `end` sentinel closing the current sequence.
    BlockEnd,
    /// The `else` sentinel, legal only inside an `if`'s first arm.
    Else,
}

impl<'a> ModuleDecoder<'a> {
    /// Decodes one instruction or sentinel.
    fn instruction(&mut self) -> Result<ParsedInstruction> {
        let offset = self.cursor.position();
        let byte = self.cursor.next_byte()?;
        if byte == SATURATING_PREFIX {
            return Ok(ParsedInstruction::Instr(self.saturating()?));
        }
        let Some(op) = Opcode::from_byte(byte) else {
            bail!(offset, "unknown opcode: 0x{byte:02x}");
        };
        let inst = match op {
            Opcode::End => return Ok(ParsedInstruction::BlockEnd),
            Opcode::Else => return Ok(ParsedInstruction::Else),
            Opcode::If => {
                let ty = self.block_type()?;
                self.if_body(ty)?
            }
            op if op.is_block_opener() => {
                let ty = self.block_type()?;
                let body = self.expression()?;
                Instruction::block(op, ty, body)
            }
            op if op.is_basic() => Instruction::basic(op),
            op if op.is_single_index() => {
                Instruction::single_index(op, self.cursor.read_var_u32()?)
            }
            Opcode::BrTable => Instruction::BrTable {
                targets: self.vec(|d| d.cursor.read_var_u32())?,
                default: self.cursor.read_var_u32()?,
            },
            // This encoding reserves a table index byte only in later format
            // revisions; here the table is always table zero and no byte is
            // consumed.
            Opcode::CallIndirect => Instruction::CallIndirect {
                type_index: self.cursor.read_var_u32()?,
                table_index: 0,
            },
            op if op.is_mem_access() => {
                let align = self.cursor.read_var_u32()?;
                let mem_offset = self.cursor.read_var_u32()?;
                Instruction::mem_access(op, align, mem_offset)
            }
            // Same fixed-zero handling as `call_indirect`, for memory zero.
            op if op.is_mem_ctrl() => Instruction::memory_op(op, 0),
            Opcode::I32Const => Instruction::Const(ConstValue::I32(self.cursor.read_var_i32()?)),
            Opcode::I64Const => Instruction::Const(ConstValue::I64(self.cursor.read_var_i64()?)),
            Opcode::F32Const => Instruction::Const(ConstValue::F32(self.cursor.read_f32()?)),
            Opcode::F64Const => Instruction::Const(ConstValue::F64(self.cursor.read_f64()?)),
            op => bail!(offset, "unknown opcode: 0x{:02x}", op as u8),
        };
        Ok(ParsedInstruction::Instr(inst))
    }

    /// Decodes instructions up to and including the closing `end` sentinel,
    /// which is consumed but not included in the sequence.
    pub(super) fn expression(&mut self) -> Result<Vec<Instruction>> {
        let mut instructions = Vec::new();
        loop {
            match self.instruction()? {
                ParsedInstruction::Instr(inst) => instructions.push(inst),
                ParsedInstruction::BlockEnd => return Ok(instructions),
                ParsedInstruction::Else => {
                    bail!(self.cursor.position(), "unexpected else opcode")
                }
            }
        }
    }

    /// Decodes the body of an `if` whose block type has been read.
    ///
    /// An `end` before any `else` yields a one-armed block tagged `if`; an
    /// `else` switches to the second arm, which runs to the matching `end`.
    fn if_body(&mut self, ty: BlockType) -> Result<Instruction> {
        let mut consequent = Vec::new();
        loop {
            match self.instruction()? {
                ParsedInstruction::Instr(inst) => consequent.push(inst),
                ParsedInstruction::BlockEnd => {
                    return Ok(Instruction::block(Opcode::If, ty, consequent));
                }
                ParsedInstruction::Else => {
                    return Ok(Instruction::IfElse {
                        ty,
                        consequent,
                        alternate: self.expression()?,
                    });
                }
            }
        }
    }

    /// Decodes the ULEB32 selector following the saturating prefix byte.
    fn saturating(&mut self) -> Result<Instruction> {
        let offset = self.cursor.position();
        let selector = self.cursor.read_var_u32()?;
        match SaturatingOp::from_u32(selector) {
            Some(op) => Ok(Instruction::Saturating(op)),
            None => bail!(offset, "unknown saturating truncation selector: {selector}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expression(bytes: &[u8]) -> Result<Vec<Instruction>> {
        ModuleDecoder::new(bytes).expression()
    }

    #[test]
    fn empty_block() {
        // block (empty type) end, then the outer end.
        let expr = expression(&[0x02, 0x40, 0x0b, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::block(Opcode::Block, BlockType::Empty, vec![])]
        );
    }

    #[test]
    fn loop_with_body() {
        // loop (result i32): i32.const 1, end; outer end.
        let expr = expression(&[0x03, 0x7f, 0x41, 0x01, 0x0b, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::block(
                Opcode::Loop,
                BlockType::Type(crate::types::ValType::I32),
                vec![Instruction::Const(ConstValue::I32(1))],
            )]
        );
    }

    #[test]
    fn if_without_else_is_a_tagged_block() {
        // if (empty): nop, end; outer end.
        let expr = expression(&[0x04, 0x40, 0x01, 0x0b, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::block(
                Opcode::If,
                BlockType::Empty,
                vec![Instruction::basic(Opcode::Nop)],
            )]
        );
    }

    #[test]
    fn if_with_else_has_two_arms() {
        // if (empty): nop, else: unreachable, end; outer end.
        let expr = expression(&[0x04, 0x40, 0x01, 0x05, 0x00, 0x0b, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::IfElse {
                ty: BlockType::Empty,
                consequent: vec![Instruction::basic(Opcode::Nop)],
                alternate: vec![Instruction::basic(Opcode::Unreachable)],
            }]
        );
    }

    #[test]
    fn bare_else_is_rejected() {
        let err = expression(&[0x05]).unwrap_err();
        assert!(err.message().contains("unexpected else"), "{err}");
    }

    #[test]
    fn br_table_targets() {
        // br_table [1, 2] default 0; end.
        let expr = expression(&[0x0e, 0x02, 0x01, 0x02, 0x00, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::BrTable {
                targets: vec![1, 2],
                default: 0,
            }]
        );
    }

    #[test]
    fn call_indirect_reads_no_table_byte() {
        // call_indirect type 3, then immediately the end sentinel.
        let expr = expression(&[0x11, 0x03, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [Instruction::CallIndirect {
                type_index: 3,
                table_index: 0,
            }]
        );
    }

    #[test]
    fn memory_ops_read_no_index_byte() {
        let expr = expression(&[0x3f, 0x40, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [
                Instruction::memory_op(Opcode::MemorySize, 0),
                Instruction::memory_op(Opcode::MemoryGrow, 0),
            ]
        );
    }

    #[test]
    fn memory_access_immediates() {
        // i64.load32_u align=2 offset=16; end.
        let expr = expression(&[0x35, 0x02, 0x10, 0x0b]).unwrap();
        assert_eq!(expr, [Instruction::mem_access(Opcode::I64Load32U, 2, 16)]);
    }

    #[test]
    fn constants() {
        let mut bytes = vec![0x41, 0x7f]; // i32.const -1
        bytes.extend([0x42, 0x80, 0x01]); // i64.const 128
        bytes.extend([0x43]);
        bytes.extend(12.375f32.to_le_bytes());
        bytes.extend([0x44]);
        bytes.extend(12.375f64.to_le_bytes());
        bytes.push(0x0b);
        let expr = expression(&bytes).unwrap();
        assert_eq!(
            expr,
            [
                Instruction::Const(ConstValue::I32(-1)),
                Instruction::Const(ConstValue::I64(128)),
                Instruction::Const(ConstValue::F32(12.375)),
                Instruction::Const(ConstValue::F64(12.375)),
            ]
        );
    }

    #[test]
    fn saturating_instructions() {
        let expr = expression(&[0xfc, 0x00, 0xfc, 0x07, 0x0b]).unwrap();
        assert_eq!(
            expr,
            [
                Instruction::Saturating(SaturatingOp::I32TruncSatF32S),
                Instruction::Saturating(SaturatingOp::I64TruncSatF64U),
            ]
        );

        let err = expression(&[0xfc, 0x08]).unwrap_err();
        assert!(err.message().contains("saturating"), "{err}");
    }

    #[test]
    fn unknown_opcode_byte() {
        let err = expression(&[0x06]).unwrap_err();
        assert!(err.message().contains("unknown opcode: 0x06"), "{err}");
    }

    #[test]
    fn deeply_nested_blocks() {
        // Ten nested empty blocks.
        let mut bytes = Vec::new();
        for _ in 0..10 {
            bytes.extend([0x02, 0x40]);
        }
        bytes.extend(std::iter::repeat(0x0b).take(11));
        let expr = expression(&bytes).unwrap();
        let mut current = &expr;
        for _ in 0..10 {
            assert_eq!(current.len(), 1);
            let Instruction::Block { op, ty, body } = &current[0] else {
                panic!("expected a block");
            };
            assert_eq!(*op, Opcode::Block);
            assert_eq!(*ty, BlockType::Empty);
            current = body;
        }
        assert!(current.is_empty());
    }
}
