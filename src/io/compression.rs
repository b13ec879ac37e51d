// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! File-level compression.
//!
//! Compression is a decorator around the channel byte stream: the codec
//! above never sees it. Reading auto-detects the format, checking the file
//! extension first and falling back to magic bytes. Writing uses the
//! caller's choice, or the output file extension when none is given.
//!
//! | codec | extensions        | magic                 |
//! |-------|-------------------|-----------------------|
//! | gzip  | `.gz`             | `1f 8b`               |
//! | xz    | `.xz`, `.lzma`    | `fd 37 7a 58 5a 00`   |

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::read::XzDecoder;
use xz2::stream::Stream;
use xz2::write::XzEncoder;

use crate::core::{Result, SddsError};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

/// Default compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compression applied to a whole file or pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain bytes
    #[default]
    None,
    /// gzip with level 0..=9
    Gzip { level: u32 },
    /// xz with preset 0..=9
    Xz { level: u32 },
}

impl Compression {
    /// gzip at the default level.
    pub fn gzip() -> Self {
        Compression::Gzip {
            level: DEFAULT_LEVEL,
        }
    }

    /// xz at the default preset.
    pub fn xz() -> Self {
        Compression::Xz {
            level: DEFAULT_LEVEL,
        }
    }

    /// Human-readable codec name.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip { .. } => "gzip",
            Compression::Xz { .. } => "xz",
        }
    }

    /// File extensions associated with this codec.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Compression::None => &[],
            Compression::Gzip { .. } => &[".gz"],
            Compression::Xz { .. } => &[".xz", ".lzma"],
        }
    }

    /// Magic byte signature.
    pub fn magic_bytes(&self) -> Option<&'static [u8]> {
        match self {
            Compression::None => None,
            Compression::Gzip { .. } => Some(GZIP_MAGIC),
            Compression::Xz { .. } => Some(XZ_MAGIC),
        }
    }

    /// Check if any compression is applied.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }

    /// Same codec with a different level.
    pub fn with_level(self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(SddsError::invalid_attribute(
                self.name(),
                "compression level",
                format!("{level} is outside 0..=9"),
            ));
        }
        Ok(match self {
            Compression::None => Compression::None,
            Compression::Gzip { .. } => Compression::Gzip { level },
            Compression::Xz { .. } => Compression::Xz { level },
        })
    }

    /// Wrap a reader with decompression.
    pub(crate) fn wrap_reader<R>(self, name: &str, reader: R) -> Result<Box<dyn Read + Send>>
    where
        R: Read + Send + 'static,
    {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Gzip { .. } => Box::new(MultiGzDecoder::new(reader)),
            Compression::Xz { .. } => {
                let stream = Stream::new_auto_decoder(u64::MAX, xz2::stream::CONCATENATED)
                    .map_err(|e| SddsError::corrupt_stream(name, e.to_string()))?;
                Box::new(XzDecoder::new_stream(reader, stream))
            }
        })
    }

    /// Wrap a writer with compression.
    pub(crate) fn wrap_writer<W>(self, writer: W) -> Encoder<W>
    where
        W: Write,
    {
        match self {
            Compression::None => Encoder::Plain(writer),
            Compression::Gzip { level } => {
                Encoder::Gzip(GzEncoder::new(writer, flate2::Compression::new(level)))
            }
            Compression::Xz { level } => Encoder::Xz(XzEncoder::new(writer, level)),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::gzip()),
            "xz" | "lzma" => Ok(Compression::xz()),
            other => Err(SddsError::invalid_attribute(
                other,
                "compression",
                "expected 'none', 'gzip' or 'xz'",
            )),
        }
    }
}

/// A writer that may be compressing.
pub(crate) enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Xz(XzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Write any compression trailer and return the inner writer.
    pub(crate) fn finish(self) -> std::io::Result<W> {
        match self {
            Encoder::Plain(w) => Ok(w),
            Encoder::Gzip(e) => e.finish(),
            Encoder::Xz(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Xz(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Xz(e) => e.flush(),
        }
    }
}

/// Detect compression from a file name, case-insensitively.
pub fn detect_from_extension(path: impl AsRef<Path>) -> Compression {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    [Compression::gzip(), Compression::xz()]
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
        .unwrap_or_default()
}

/// Detect compression from the first bytes of a stream.
pub fn detect_from_magic(head: &[u8]) -> Compression {
    [Compression::gzip(), Compression::xz()]
        .into_iter()
        .find(|codec| {
            codec
                .magic_bytes()
                .is_some_and(|magic| head.starts_with(magic))
        })
        .unwrap_or_default()
}
