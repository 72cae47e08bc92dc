//! Random-access byte sources
//!
//! Parsers never hold a reader position of their own; every field is
//! fetched with a positioned read so a corrupt length can only produce an
//! error, never a read outside the source.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::chunk::FourCc;
use super::error::{ParseResult, RiffError};

/// Positioned, reentrant access to a finite byte sequence
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; 0 at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length of the source in bytes
    fn size(&self) -> u64;

    /// File name used for extension checks and logging
    fn name(&self) -> &str;

    /// Open an independent handle onto the same bytes
    fn open_duplicate(&self) -> io::Result<Arc<dyn ByteSource>>;
}

/// File-backed source
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    file: Mutex<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            path,
            name,
            size,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open_duplicate(&self) -> io::Result<Arc<dyn ByteSource>> {
        Ok(Arc::new(FileSource::open(&self.path)?))
    }
}

/// In-memory source; duplicates share the same buffer
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open_duplicate(&self) -> io::Result<Arc<dyn ByteSource>> {
        Ok(Arc::new(self.clone()))
    }
}

/// Byte order of multi-byte integer fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }
}

/// Bounds-checked field reader over a source in a fixed byte order
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    source: &'a dyn ByteSource,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub fn new(source: &'a dyn ByteSource, order: ByteOrder) -> Self {
        Self { source, order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn source(&self) -> &'a dyn ByteSource {
        self.source
    }

    pub fn size(&self) -> u64 {
        self.source.size()
    }

    /// Fill `buf` from `offset` or fail `Truncated`
    pub fn read_exact(&self, offset: u64, buf: &mut [u8]) -> ParseResult<()> {
        let actual = self.source.size();
        let expected = offset.saturating_add(buf.len() as u64);
        if expected > actual {
            return Err(RiffError::Truncated { expected, actual });
        }
        let n = self.source.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(RiffError::Truncated {
                expected,
                actual: offset + n as u64,
            });
        }
        Ok(())
    }

    pub fn bytes(&self, offset: u64, len: usize) -> ParseResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn u8(&self, offset: u64) -> ParseResult<u8> {
        let mut b = [0u8; 1];
        self.read_exact(offset, &mut b)?;
        Ok(b[0])
    }

    pub fn u16(&self, offset: u64) -> ParseResult<u16> {
        let mut b = [0u8; 2];
        self.read_exact(offset, &mut b)?;
        Ok(self.order.u16(b))
    }

    pub fn u32(&self, offset: u64) -> ParseResult<u32> {
        let mut b = [0u8; 4];
        self.read_exact(offset, &mut b)?;
        Ok(self.order.u32(b))
    }

    /// Little-endian u32 regardless of the reader's order
    pub fn u32_le(&self, offset: u64) -> ParseResult<u32> {
        let mut b = [0u8; 4];
        self.read_exact(offset, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    /// Four ASCII bytes, never byte-swapped
    pub fn tag(&self, offset: u64) -> ParseResult<FourCc> {
        let mut b = [0u8; 4];
        self.read_exact(offset, &mut b)?;
        Ok(FourCc(b))
    }
}

/// Lower-cased extension of a file name, empty when there is none
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
