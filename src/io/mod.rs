// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer.
//!
//! Channels move bytes between the codec and files, pipes or in-memory
//! streams; compression is applied transparently underneath.

pub mod channel;
pub mod compression;

pub use channel::{
    check_appendable, Capabilities, InputChannel, OutputChannel, Target, MIN_BUFFER_SIZE,
    PIPE_DESIGNATOR,
};
pub use compression::{detect_from_extension, detect_from_magic, Compression};
