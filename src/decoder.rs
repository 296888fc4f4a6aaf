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

//! The top-level driver that walks a module's sections.

use crate::cursor::{Cursor, Result};
use crate::limits::MAX_SEGMENT_LENGTH;
use crate::types::{CustomSection, Module, SectionId};

mod instructions;
mod primitives;

/// The four-byte magic cookie opening every module.
const MAGIC: &[u8; 4] = b"\0asm";

/// The only binary format version this crate decodes.
const SUPPORTED_VERSION: u32 = 1;

/// Decodes `data` as a complete WebAssembly binary module.
///
/// This is a convenience wrapper over [`ModuleDecoder`].
pub fn decode_module(data: &[u8]) -> Result<Module> {
    ModuleDecoder::new(data).decode()
}

/// A single-use decoder for one WebAssembly binary module.
pub struct ModuleDecoder<'a> {
    cursor: Cursor<'a>,
}

impl<'a> ModuleDecoder<'a> {
    /// Creates a decoder over the entirety of `data`.
    pub fn new(data: &'a [u8]) -> ModuleDecoder<'a> {
        ModuleDecoder {
            cursor: Cursor::new(data),
        }
    }

    /// Decodes the module, consuming the decoder.
    ///
    /// Any error is terminal; no partial module is returned.
    pub fn decode(mut self) -> Result<Module> {
        self.header()?;

        let mut custom = CustomSectionCollector::default();
        let mut types = None;
        let mut imports = None;
        let mut functions: Option<Vec<u32>> = None;
        let mut tables = None;
        let mut memories = None;
        let mut globals = None;
        let mut exports = None;
        let mut start = None;
        let mut elements = None;
        let mut code = None;
        let mut data = None;

        let mut prev_section: Option<SectionId> = None;
        loop {
            let offset = self.cursor.position();
            let Some(byte) = self.cursor.try_next_byte() else {
                break;
            };
            let Some(id) = SectionId::from_byte(byte) else {
                bail!(offset, "unknown section id: {byte}");
            };
            if id != SectionId::Custom {
                if let Some(prev) = prev_section {
                    if id <= prev {
                        bail!(
                            offset,
                            "sections out of order: {id:?} section cannot follow {prev:?} section"
                        );
                    }
                }
                prev_section = Some(id);
                custom.next_section(id);
            }
            log::debug!("{id:?} section at offset {offset:#x}");

            match id {
                SectionId::Custom => {
                    let section = self.segment("section", |d| d.custom_section())?;
                    custom.add(section);
                }
                SectionId::Type => {
                    types = Some(self.segment("section", |d| d.vec(Self::func_type))?);
                }
                SectionId::Import => {
                    imports = Some(self.segment("section", |d| d.vec(Self::import))?);
                }
                SectionId::Function => {
                    functions =
                        Some(self.segment("section", |d| d.vec(|d| d.cursor.read_var_u32()))?);
                }
                SectionId::Table => {
                    tables = Some(self.segment("section", |d| d.vec(Self::table_type))?);
                }
                SectionId::Memory => {
                    memories = Some(self.segment("section", |d| d.vec(Self::limits))?);
                }
                SectionId::Global => {
                    globals = Some(self.segment("section", |d| d.vec(Self::global))?);
                }
                SectionId::Export => {
                    exports = Some(self.segment("section", |d| d.vec(Self::export))?);
                }
                SectionId::Start => {
                    start = Some(self.segment("section", |d| d.cursor.read_var_u32())?);
                }
                SectionId::Element => {
                    elements = Some(self.segment("section", |d| d.vec(Self::element))?);
                }
                SectionId::Code => {
                    let Some(functions) = &functions else {
                        bail!(offset, "code section without a function section");
                    };
                    let expected = functions.len();
                    code = Some(self.segment("section", |d| {
                        d.vec_exact(expected, Self::function_body)
                    })?);
                }
                SectionId::Data => {
                    data = Some(self.segment("section", |d| d.vec(Self::data_segment))?);
                }
            }
        }

        Ok(Module {
            types: types.unwrap_or_default(),
            imports: imports.unwrap_or_default(),
            functions: functions.unwrap_or_default(),
            tables: tables.unwrap_or_default(),
            memories: memories.unwrap_or_default(),
            globals: globals.unwrap_or_default(),
            exports: exports.unwrap_or_default(),
            start,
            elements: elements.unwrap_or_default(),
            code: code.unwrap_or_default(),
            data: data.unwrap_or_default(),
            custom_sections: custom.finish(),
        })
    }

    fn header(&mut self) -> Result<()> {
        if self.cursor.bytes_remaining() < MAGIC.len() + 4 {
            bail!(0, "module too small: a module is at least 8 bytes");
        }
        let magic = self.cursor.next_bytes(MAGIC.len())?;
        if magic != MAGIC {
            bail!(0, "magic header not detected: bad magic number");
        }
        let offset = self.cursor.position();
        let version = self.cursor.read_u32_le()?;
        if version != SUPPORTED_VERSION {
            bail!(offset, "unsupported binary version: {version}");
        }
        Ok(())
    }

    /// Runs `body` against the next length-prefixed region of the input.
    ///
    /// Reads the region's declared byte length, restricts the cursor to it,
    /// and verifies on the way out that `body` consumed the region exactly.
    /// The bound is popped on every exit path, error paths included, so an
    /// enclosing region's accounting stays intact when a nested one fails.
    fn segment<T>(
        &mut self,
        desc: &str,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let offset = self.cursor.position();
        let size = self.cursor.read_var_u32()? as usize;
        if size > MAX_SEGMENT_LENGTH {
            bail!(offset, "{desc} size is out of bounds: {size}");
        }
        if !self.cursor.push_bound(size) {
            bail!(offset, "{desc} size exceeds the remaining input: {size}");
        }
        let result = body(self);
        let leftover = self.cursor.pop_bound();
        let value = result?;
        if leftover != 0 {
            return Err(crate::DecodeError::segment_mismatch(self.cursor.position()));
        }
        Ok(value)
    }

    fn custom_section(&mut self) -> Result<CustomSection> {
        // Nothing in a custom section's content may fail the decode, so the
        // name tolerates invalid UTF-8 and the payload is taken verbatim.
        // Only truncation against the section's own declared length errors.
        let name_bytes = self.byte_vec()?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();
        let data = self.cursor.next_bytes(self.cursor.bytes_remaining())?.to_vec();
        Ok(CustomSection { name, data })
    }
}

/// Accumulates custom sections while the section loop runs.
///
/// Sections are grouped into windows keyed by the ordered section that ended
/// them, though only the flattened stream-order collection is handed out.
#[derive(Default)]
struct CustomSectionCollector {
    windows: Vec<(Option<SectionId>, Vec<CustomSection>)>,
    current: Vec<CustomSection>,
}

impl CustomSectionCollector {
    /// Closes the current window upon reaching the ordered section `id`.
    fn next_section(&mut self, id: SectionId) {
        debug_assert!(self
            .windows
            .last()
            .map_or(true, |(end, _)| *end < Some(id)));
        let window = std::mem::take(&mut self.current);
        self.windows.push((Some(id), window));
    }

    fn add(&mut self, section: CustomSection) {
        self.current.push(section);
    }

    /// Closes the trailing window and flattens everything in stream order.
    fn finish(mut self) -> Vec<CustomSection> {
        let last = std::mem::take(&mut self.current);
        self.windows.push((None, last));
        self.windows
            .into_iter()
            .flat_map(|(_, sections)| sections)
            .collect()
    }
}
