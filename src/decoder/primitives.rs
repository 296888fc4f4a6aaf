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

//! Grammar productions below the instruction level: vectors, names, and the
//! leaf descriptors of the import, export, type, and code sections.

use super::ModuleDecoder;
use crate::cursor::Result;
use crate::limits::{MAX_FUNCTION_LOCALS, MAX_VECTOR_LENGTH};
use crate::types::{
    BlockType, Data, Element, ElemType, Export, ExternalKind, FuncType, FunctionBody, Global,
    GlobalType, Import, Limits, TableType, TypeRef, ValType,
};

impl<'a> ModuleDecoder<'a> {
    /// Decodes a length-prefixed vector, one element per call to `element`.
    pub(super) fn vec<T>(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let offset = self.cursor.position();
        let len = self.cursor.read_var_u32()? as usize;
        if len > MAX_VECTOR_LENGTH {
            bail!(offset, "vector length is out of bounds: {len}");
        }
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(element(self)?);
        }
        Ok(items)
    }

    /// Like [`ModuleDecoder::vec`], but requires the declared length to
    /// equal `expected`, for vectors the format pins to another vector's
    /// length.
    pub(super) fn vec_exact<T>(
        &mut self,
        expected: usize,
        mut element: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let offset = self.cursor.position();
        let len = self.cursor.read_var_u32()? as usize;
        if len != expected {
            bail!(
                offset,
                "vector length {len} does not equal the required length {expected}"
            );
        }
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(element(self)?);
        }
        Ok(items)
    }

    /// Decodes a length-prefixed run of raw bytes.
    pub(super) fn byte_vec(&mut self) -> Result<Vec<u8>> {
        let offset = self.cursor.position();
        let len = self.cursor.read_var_u32()? as usize;
        if len > MAX_VECTOR_LENGTH {
            bail!(offset, "byte vector length is out of bounds: {len}");
        }
        Ok(self.cursor.next_bytes(len)?.to_vec())
    }

    /// Decodes a length-prefixed UTF-8 string.
    pub(super) fn name(&mut self) -> Result<String> {
        let offset = self.cursor.position();
        let bytes = self.byte_vec()?;
        match String::from_utf8(bytes) {
            Ok(name) => Ok(name),
            Err(_) => Err(format_err!(offset, "malformed UTF-8 encoding in name")),
        }
    }

    pub(super) fn value_type(&mut self) -> Result<ValType> {
        let offset = self.cursor.position();
        let byte = self.cursor.next_byte()?;
        ValType::from_byte(byte)
            .ok_or_else(|| format_err!(offset, "unknown value type: 0x{byte:02x}"))
    }

    pub(super) fn limits(&mut self) -> Result<Limits> {
        let offset = self.cursor.position();
        match self.cursor.next_byte()? {
            0x00 => Ok(Limits {
                initial: self.cursor.read_var_u32()?,
                maximum: None,
            }),
            0x01 => Ok(Limits {
                initial: self.cursor.read_var_u32()?,
                maximum: Some(self.cursor.read_var_u32()?),
            }),
            flag => Err(format_err!(offset, "unknown limits flag: 0x{flag:02x}")),
        }
    }

    pub(super) fn table_type(&mut self) -> Result<TableType> {
        let offset = self.cursor.position();
        let element = match self.cursor.next_byte()? {
            0x70 => ElemType::FuncRef,
            byte => bail!(offset, "unknown table element type: 0x{byte:02x}"),
        };
        Ok(TableType {
            element,
            limits: self.limits()?,
        })
    }

    pub(super) fn global_type(&mut self) -> Result<GlobalType> {
        let content_type = self.value_type()?;
        let offset = self.cursor.position();
        let mutable = match self.cursor.next_byte()? {
            0x00 => false,
            0x01 => true,
            byte => bail!(offset, "unknown global mutability: 0x{byte:02x}"),
        };
        Ok(GlobalType {
            content_type,
            mutable,
        })
    }

    pub(super) fn global(&mut self) -> Result<Global> {
        Ok(Global {
            ty: self.global_type()?,
            init_expr: self.expression()?,
        })
    }

    pub(super) fn import(&mut self) -> Result<Import> {
        let module = self.name()?;
        let name = self.name()?;
        let offset = self.cursor.position();
        let ty = match self.cursor.next_byte()? {
            0x00 => TypeRef::Func(self.cursor.read_var_u32()?),
            0x01 => TypeRef::Table(self.table_type()?),
            0x02 => TypeRef::Memory(self.limits()?),
            0x03 => TypeRef::Global(self.global_type()?),
            byte => bail!(offset, "unknown import descriptor: 0x{byte:02x}"),
        };
        Ok(Import { module, name, ty })
    }

    pub(super) fn export(&mut self) -> Result<Export> {
        let name = self.name()?;
        let offset = self.cursor.position();
        let kind = match self.cursor.next_byte()? {
            0x00 => ExternalKind::Func,
            0x01 => ExternalKind::Table,
            0x02 => ExternalKind::Memory,
            0x03 => ExternalKind::Global,
            byte => bail!(offset, "unknown export kind: 0x{byte:02x}"),
        };
        Ok(Export {
            name,
            kind,
            index: self.cursor.read_var_u32()?,
        })
    }

    pub(super) fn func_type(&mut self) -> Result<FuncType> {
        let offset = self.cursor.position();
        let form = self.cursor.next_byte()?;
        if form != 0x60 {
            bail!(offset, "expected function type form 0x60, found 0x{form:02x}");
        }
        let params = self.vec(Self::value_type)?;
        let results = self.vec(Self::value_type)?;
        Ok(FuncType::new(params, results))
    }

    /// Decodes a block's declared signature from a signed 33-bit varint.
    ///
    /// Negative values no lower than `-0x7f` are a single byte in disguise:
    /// the pattern `0x40` in the low seven bits means the empty signature,
    /// any value type byte means that one type. Non-negative values index
    /// the type section.
    pub(super) fn block_type(&mut self) -> Result<BlockType> {
        let offset = self.cursor.position();
        let ty = self.cursor.read_var_s33()?;
        if ty >= 0 {
            // A non-negative s33 always fits in 32 bits.
            debug_assert!(ty <= u32::MAX as i64);
            return Ok(BlockType::FuncType(ty as u32));
        }
        if ty >= -0x7f {
            let byte = (ty & 0x7f) as u8;
            if byte == 0x40 {
                return Ok(BlockType::Empty);
            }
            if let Some(value_type) = ValType::from_byte(byte) {
                return Ok(BlockType::Type(value_type));
            }
        }
        bail!(offset, "invalid block type: {ty}")
    }

    /// Decodes the locals vector of a function body, expanding each
    /// count-times-type run into one entry per local.
    pub(super) fn locals(&mut self) -> Result<Vec<ValType>> {
        let offset = self.cursor.position();
        let runs = self.vec(|d| {
            let count = d.cursor.read_var_u32()?;
            let ty = d.value_type()?;
            Ok((count, ty))
        })?;
        let mut total = 0usize;
        for (count, _) in &runs {
            total = match total.checked_add(*count as usize) {
                Some(total) if total <= MAX_FUNCTION_LOCALS => total,
                _ => bail!(offset, "too many locals: the count is out of bounds"),
            };
        }
        let mut locals = Vec::with_capacity(total);
        for (count, ty) in runs {
            locals.extend(std::iter::repeat(ty).take(count as usize));
        }
        Ok(locals)
    }

    /// Decodes one code section entry: a length-prefixed region holding the
    /// locals vector and the function's expression.
    pub(super) fn function_body(&mut self) -> Result<FunctionBody> {
        self.segment("function body", |d| {
            let locals = d.locals()?;
            let body = d.expression()?;
            Ok(FunctionBody { locals, body })
        })
    }

    pub(super) fn element(&mut self) -> Result<Element> {
        Ok(Element {
            table_index: self.cursor.read_var_u32()?,
            offset_expr: self.expression()?,
            items: self.vec(|d| d.cursor.read_var_u32())?,
        })
    }

    pub(super) fn data_segment(&mut self) -> Result<Data> {
        Ok(Data {
            memory_index: self.cursor.read_var_u32()?,
            offset_expr: self.expression()?,
            data: self.byte_vec()?,
        })
    }
}
