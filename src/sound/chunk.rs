//! Chunk record walking
//!
//! A RIFF body is a flat run of `tag + length + payload` records. The
//! walker yields them in order and stops with `CorruptChunk` on the first
//! record that would extend past the container.

use std::fmt;

use super::error::{ParseResult, RiffError};
use super::source::ByteReader;

/// Four-character chunk identifier, compared as raw ASCII bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc(\"{}\")", self)
    }
}

/// Chunk tags the RIFF parser acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    /// `fmt `
    Format,
    /// `data`
    Data,
    /// `LIST`, holding sub-chunks
    List,
    /// `smpl`, sampler loop points
    Sample,
    /// `fact`, auxiliary sample count
    Fact,
    /// `pflt`, Level-5 predictor filters
    Filter,
    /// `ctrl`, Level-5 loop control
    Control,
    /// `JUNK`, padding
    Junk,
    Unknown(FourCc),
}

impl From<FourCc> for ChunkTag {
    fn from(tag: FourCc) -> Self {
        match &tag.0 {
            b"fmt " => ChunkTag::Format,
            b"data" => ChunkTag::Data,
            b"LIST" => ChunkTag::List,
            b"smpl" => ChunkTag::Sample,
            b"fact" => ChunkTag::Fact,
            b"pflt" => ChunkTag::Filter,
            b"ctrl" => ChunkTag::Control,
            b"JUNK" => ChunkTag::Junk,
            _ => ChunkTag::Unknown(tag),
        }
    }
}

/// One record as found in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord {
    pub tag: FourCc,
    /// Offset of the 8-byte record header
    pub offset: u64,
    /// Payload length as declared (excludes the header)
    pub length: u32,
    /// Offset of the first payload byte
    pub payload: u64,
}

impl ChunkRecord {
    pub fn kind(&self) -> ChunkTag {
        ChunkTag::from(self.tag)
    }

    pub fn payload_end(&self) -> u64 {
        self.payload + self.length as u64
    }
}

/// Iterator over the records between `start` and `limit`.
///
/// `limit` must already be `min(source size, declared end)`. Records are
/// not padded to even lengths.
pub struct ChunkWalker<'a> {
    reader: ByteReader<'a>,
    offset: u64,
    limit: u64,
    failed: bool,
}

impl<'a> ChunkWalker<'a> {
    pub fn new(reader: ByteReader<'a>, start: u64, limit: u64) -> Self {
        Self {
            reader,
            offset: start,
            limit: limit.min(reader.size()),
            failed: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn corrupt(&mut self, tag: FourCc) -> Option<ParseResult<ChunkRecord>> {
        self.failed = true;
        Some(Err(RiffError::CorruptChunk {
            tag,
            offset: self.offset,
        }))
    }
}

impl<'a> Iterator for ChunkWalker<'a> {
    type Item = ParseResult<ChunkRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.limit {
            return None;
        }

        let tag = self.reader.tag(self.offset).unwrap_or(FourCc(*b"????"));
        if self.offset + 8 > self.limit {
            return self.corrupt(tag);
        }

        let length = match self.reader.u32(self.offset + 4) {
            Ok(len) => len,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };

        let payload = self.offset + 8;
        if payload + length as u64 > self.limit {
            return self.corrupt(tag);
        }

        let record = ChunkRecord {
            tag,
            offset: self.offset,
            length,
            payload,
        };
        self.offset = record.payload_end();
        Some(Ok(record))
    }
}
