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

//! Implementation limits of this crate.
//!
//! The binary format encodes counts and sizes as 32-bit integers; these caps
//! keep a single declared count from forcing an absurd allocation before any
//! of the claimed elements have been seen.

/// Maximum byte length of a length-prefixed segment (section or function
/// body) this implementation will enter.
pub(crate) const MAX_SEGMENT_LENGTH: usize = i32::MAX as usize;

/// Maximum element count of a decoded vector.
pub(crate) const MAX_VECTOR_LENGTH: usize = i32::MAX as usize;

/// Maximum number of locals of a single function body after expanding the
/// count-times-type runs of the locals vector.
pub(crate) const MAX_FUNCTION_LOCALS: usize = i32::MAX as usize;
