// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte channels.
//!
//! [`InputChannel`] and [`OutputChannel`] put regular files, stdin/stdout
//! pipes, in-memory streams and gzip/xz compressed streams behind one
//! buffered, blocking interface. Input channels track the uncompressed
//! byte position so readers can record page offsets.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::compression::{detect_from_extension, detect_from_magic, Compression, Encoder};
use crate::core::{Result, SddsError};

/// Pipe designator accepted wherever a path is.
pub const PIPE_DESIGNATOR: &str = "-";

/// Smallest buffer a channel will use. A zero-capacity reader reports
/// end of input on its first fill and magic detection needs a few bytes.
pub const MIN_BUFFER_SIZE: usize = 512;

/// Where a dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A regular file
    Path(PathBuf),
    /// stdin when reading, stdout when writing
    Pipe,
}

impl Target {
    /// Parse a command-line style target; `-` is the pipe.
    pub fn parse(text: &str) -> Self {
        if text == PIPE_DESIGNATOR {
            Target::Pipe
        } else {
            Target::Path(PathBuf::from(text))
        }
    }

    /// Check if this is the pipe.
    pub fn is_pipe(&self) -> bool {
        matches!(self, Target::Pipe)
    }

    /// Path of a file target.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Target::Path(p) => Some(p),
            Target::Pipe => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(p) => write!(f, "{}", p.display()),
            Target::Pipe => f.write_str("<pipe>"),
        }
    }
}

impl From<&str> for Target {
    fn from(text: &str) -> Self {
        Target::parse(text)
    }
}

impl From<String> for Target {
    fn from(text: String) -> Self {
        Target::parse(&text)
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        if path.as_os_str() == PIPE_DESIGNATOR {
            Target::Pipe
        } else {
            Target::Path(path.to_path_buf())
        }
    }
}

impl From<PathBuf> for Target {
    fn from(path: PathBuf) -> Self {
        Target::from(path.as_path())
    }
}

impl From<&PathBuf> for Target {
    fn from(path: &PathBuf) -> Self {
        Target::from(path.as_path())
    }
}

/// What a channel can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Random access by byte offset
    pub seekable: bool,
    /// New pages can be added after existing ones
    pub appendable: bool,
    /// A compression decorator is active
    pub compressed: bool,
    /// stdin/stdout or another non-file stream
    pub pipe: bool,
}

enum Source {
    File(BufReader<File>),
    Stream(BufReader<Box<dyn Read + Send>>),
}

/// Buffered, position-aware input.
pub struct InputChannel {
    name: String,
    source: Source,
    position: u64,
    compression: Compression,
    pipe: bool,
}

impl InputChannel {
    /// Open a file or stdin, detecting compression.
    pub fn open(target: &Target, buffer_size: usize) -> Result<Self> {
        match target {
            Target::Pipe => {
                debug!("opening stdin for reading");
                Self::from_boxed("<stdin>".to_string(), Box::new(io::stdin()), buffer_size)
            }
            Target::Path(path) => Self::open_file(path, buffer_size),
        }
    }

    /// Wrap any reader; it is treated like a pipe.
    pub fn from_reader<R>(name: impl Into<String>, reader: R, buffer_size: usize) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::from_boxed(name.into(), Box::new(reader), buffer_size)
    }

    fn open_file(path: &Path, buffer_size: usize) -> Result<Self> {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
        if file.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            return Err(SddsError::channel_open(&name, "is a directory"));
        }
        let mut reader = BufReader::with_capacity(buffer_size, file);

        let mut compression = detect_from_extension(path);
        if !compression.is_compressed() {
            let head = reader
                .fill_buf()
                .map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
            compression = detect_from_magic(head);
        }
        debug!(file = %name, compression = compression.name(), "opened input channel");

        let source = if compression.is_compressed() {
            let decoder = compression.wrap_reader(&name, reader)?;
            Source::Stream(BufReader::with_capacity(buffer_size, decoder))
        } else {
            Source::File(reader)
        };
        Ok(Self {
            name,
            source,
            position: 0,
            compression,
            pipe: false,
        })
    }

    fn from_boxed(name: String, reader: Box<dyn Read + Send>, buffer_size: usize) -> Result<Self> {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        let mut reader = BufReader::with_capacity(buffer_size, reader);
        let head = reader
            .fill_buf()
            .map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
        let compression = detect_from_magic(head);
        let reader = if compression.is_compressed() {
            let decoder = compression.wrap_reader(&name, reader)?;
            BufReader::with_capacity(buffer_size, decoder)
        } else {
            reader
        };
        Ok(Self {
            name,
            source: Source::Stream(reader),
            position: 0,
            compression,
            pipe: true,
        })
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Active compression.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// What this channel supports.
    pub fn capabilities(&self) -> Capabilities {
        let file = matches!(self.source, Source::File(_));
        Capabilities {
            seekable: file,
            appendable: file,
            compressed: self.compression.is_compressed(),
            pipe: self.pipe,
        }
    }

    /// Check if no bytes remain.
    pub fn at_eof(&mut self) -> Result<bool> {
        let name = self.name.clone();
        let empty = self
            .fill_buf()
            .map_err(|e| SddsError::io(format!("reading {}", name), &e))?
            .is_empty();
        Ok(empty)
    }

    /// Reposition to an absolute byte offset on a seekable channel.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        match &mut self.source {
            Source::File(reader) => {
                reader
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| SddsError::io(format!("seeking {}", self.name), &e))?;
                self.position = offset;
                Ok(())
            }
            Source::Stream(_) => Err(SddsError::invalid_state(
                "seek",
                format!("reading the non-seekable stream {}", self.name),
            )),
        }
    }

    /// Reclassify I/O failures from a compressed stream as corruption.
    pub fn classify(&self, err: SddsError) -> SddsError {
        match err {
            SddsError::Io { message, .. } if self.compression.is_compressed() => {
                SddsError::corrupt_stream(&self.name, message)
            }
            other => other,
        }
    }
}

impl fmt::Debug for InputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputChannel")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("compression", &self.compression)
            .field("pipe", &self.pipe)
            .finish()
    }
}

impl Read for InputChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.source {
            Source::File(r) => r.read(buf)?,
            Source::Stream(r) => r.read(buf)?,
        };
        self.position += n as u64;
        Ok(n)
    }
}

impl BufRead for InputChannel {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.source {
            Source::File(r) => r.fill_buf(),
            Source::Stream(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        self.position += amt as u64;
        match &mut self.source {
            Source::File(r) => r.consume(amt),
            Source::Stream(r) => r.consume(amt),
        }
    }
}

enum Sink {
    File(BufWriter<File>),
    Stream(Encoder<BufWriter<Box<dyn Write + Send>>>),
    Closed,
}

/// Buffered output, optionally compressing.
pub struct OutputChannel {
    name: String,
    sink: Sink,
    /// Uncompressed bytes from the start of the file
    position: u64,
    compression: Compression,
    pipe: bool,
}

impl OutputChannel {
    /// Create (truncate) a file or open stdout.
    pub fn create(target: &Target, compression: Compression, buffer_size: usize) -> Result<Self> {
        match target {
            Target::Pipe => {
                debug!(compression = compression.name(), "opening stdout for writing");
                let mut channel = Self::from_writer("<stdout>", io::stdout(), compression, buffer_size);
                channel.pipe = true;
                Ok(channel)
            }
            Target::Path(path) => {
                let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
                let name = path.display().to_string();
                let file =
                    File::create(path).map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
                debug!(file = %name, compression = compression.name(), "opened output channel");
                let sink = if compression.is_compressed() {
                    let inner: Box<dyn Write + Send> = Box::new(file);
                    Sink::Stream(
                        compression.wrap_writer(BufWriter::with_capacity(buffer_size, inner)),
                    )
                } else {
                    Sink::File(BufWriter::with_capacity(buffer_size, file))
                };
                Ok(Self {
                    name,
                    sink,
                    position: 0,
                    compression,
                    pipe: false,
                })
            }
        }
    }

    /// Open an existing uncompressed file for appending after byte `keep`;
    /// anything beyond it is discarded.
    pub fn append(path: &Path, keep: u64, buffer_size: usize) -> Result<Self> {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        let name = path.display().to_string();
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
        file.set_len(keep)
            .map_err(|e| SddsError::io(format!("truncating {name}"), &e))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| SddsError::io(format!("seeking {name}"), &e))?;
        debug!(file = %name, offset = keep, "opened output channel for append");
        Ok(Self {
            name,
            sink: Sink::File(BufWriter::with_capacity(buffer_size, file)),
            position: keep,
            compression: Compression::None,
            pipe: false,
        })
    }

    /// Wrap any writer; it is treated like a pipe.
    pub fn from_writer<W>(
        name: impl Into<String>,
        writer: W,
        compression: Compression,
        buffer_size: usize,
    ) -> Self
    where
        W: Write + Send + 'static,
    {
        let buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        let inner: Box<dyn Write + Send> = Box::new(writer);
        Self {
            name: name.into(),
            sink: Sink::Stream(compression.wrap_writer(BufWriter::with_capacity(buffer_size, inner))),
            position: 0,
            compression,
            pipe: true,
        }
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What this channel supports.
    pub fn capabilities(&self) -> Capabilities {
        let file = matches!(self.sink, Sink::File(_));
        Capabilities {
            seekable: file,
            appendable: file,
            compressed: self.compression.is_compressed(),
            pipe: self.pipe,
        }
    }

    /// Bytes written so far, counted before compression. Appending
    /// channels start at the length they kept.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Overwrite bytes at `offset` of an uncompressed file, then continue
    /// writing at the end.
    pub fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let name = &self.name;
        let Sink::File(writer) = &mut self.sink else {
            return Err(SddsError::invalid_state(
                format!("rewrite bytes of {name}"),
                "the channel is not a seekable file",
            ));
        };
        if offset + bytes.len() as u64 > self.position {
            return Err(SddsError::invalid_attribute(
                name,
                "offset",
                format!("{offset} is past the written data"),
            ));
        }
        let context = || format!("updating {name}");
        writer.flush().map_err(|e| SddsError::io(context(), &e))?;
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| SddsError::io(context(), &e))?;
        file.write_all(bytes)
            .map_err(|e| SddsError::io(context(), &e))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| SddsError::io(context(), &e))?;
        Ok(())
    }

    /// Flush everything, write compression trailers and release the handle.
    pub fn finish(&mut self) -> Result<()> {
        let context = || format!("closing {}", self.name);
        match std::mem::replace(&mut self.sink, Sink::Closed) {
            Sink::File(mut w) => w.flush().map_err(|e| SddsError::io(context(), &e)),
            Sink::Stream(encoder) => {
                let mut inner = encoder.finish().map_err(|e| SddsError::io(context(), &e))?;
                inner.flush().map_err(|e| SddsError::io(context(), &e))
            }
            Sink::Closed => Ok(()),
        }
    }
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChannel")
            .field("name", &self.name)
            .field("compression", &self.compression)
            .field("pipe", &self.pipe)
            .finish()
    }
}

impl Write for OutputChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.sink {
            Sink::File(w) => w.write(buf)?,
            Sink::Stream(w) => w.write(buf)?,
            Sink::Closed => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"))
            }
        };
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File(w) => w.flush(),
            Sink::Stream(w) => w.flush(),
            Sink::Closed => Ok(()),
        }
    }
}

/// Reject append targets that cannot be appended to.
pub fn check_appendable(target: &Target) -> Result<&Path> {
    let path = match target {
        Target::Pipe => {
            return Err(SddsError::append_not_supported(
                target.to_string(),
                "pipes cannot be appended to",
            ))
        }
        Target::Path(path) => path.as_path(),
    };
    let name = path.display().to_string();
    let mut compression = detect_from_extension(path);
    if !compression.is_compressed() {
        let mut head = [0u8; 6];
        let mut file = File::open(path).map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
        let n = read_up_to(&mut file, &mut head)
            .map_err(|e| SddsError::channel_open(&name, e.to_string()))?;
        compression = detect_from_magic(&head[..n]);
    }
    if compression.is_compressed() {
        return Err(SddsError::append_not_supported(
            name,
            format!("{} compressed files cannot be appended to", compression.name()),
        ));
    }
    Ok(path)
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
