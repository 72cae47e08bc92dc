//! Format record classification
//!
//! Turns the fields of a `fmt ` payload into a [`FormatDescriptor`]. The
//! codec table is fixed; vendor ids are only honoured when the matching
//! extension family is active.

use std::fmt;

use super::container::Family;
use super::error::{ParseResult, RiffError};
use super::source::{ByteOrder, ByteReader};

/// Smallest payload holding codec, channels, rate, byte rate, align and bps
pub const FORMAT_MIN_SIZE: u64 = 0x10;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_MS_ADPCM: u16 = 0x0002;
const WAVE_FORMAT_IMA_ADPCM: u16 = 0x0011;
const WAVE_FORMAT_IMA_ADPCM_ALT: u16 = 0x0069;
const WAVE_FORMAT_VOXWARE_SC3: u16 = 0x007A;
const WAVE_FORMAT_L5_555: u16 = 0x0555;
const WAVE_FORMAT_UBI_DSP: u16 = 0x5050;
#[cfg(feature = "external-decoder")]
const WAVE_FORMAT_ATRAC3: u16 = 0x0270;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Bytes per Level-5 0x555 frame
pub const L5_FRAME_SIZE: u32 = 0x12;
/// Bytes per DSP frame
pub const DSP_FRAME_SIZE: u32 = 8;

// WAVEFORMATEXTENSIBLE sub-format GUID of ATRAC3plus, split as stored
const AT3PLUS_GUID_DATA1: u32 = 0xE923AABF;
const AT3PLUS_GUID_DATA2: u16 = 0xCB58;
const AT3PLUS_GUID_DATA3: u16 = 0x4471;
const AT3PLUS_GUID_DATA4_HI: u32 = 0xFAFF19A1;
const AT3PLUS_GUID_DATA4_LO: u32 = 0x62CEE401;
const EXTENSIBLE_MIN_SIZE: u64 = 0x2C;

/// Sample encoding of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingType {
    /// 16-bit signed little-endian PCM
    Pcm16Le,
    /// 16-bit signed big-endian PCM
    Pcm16Be,
    /// 8-bit unsigned PCM
    Pcm8Unsigned,
    /// Microsoft ADPCM
    MsAdpcm,
    /// Microsoft IMA ADPCM
    MsIma,
    /// Level-5 0x555 ADPCM with per-file predictor filters
    Level5Adpcm,
    /// Nintendo DSP ADPCM
    NgcDsp,
    /// Handed to an external decoder as-is
    External,
    /// ATRAC3plus behind WAVEFORMATEXTENSIBLE
    Atrac3Plus,
}

impl CodingType {
    /// Codecs that carry their own per-channel framing
    pub fn is_block_oriented(self) -> bool {
        matches!(
            self,
            CodingType::MsAdpcm | CodingType::MsIma | CodingType::External | CodingType::Atrac3Plus
        )
    }

    /// Codecs whose bitstream is opened by an external decoder
    pub fn is_delegated(self) -> bool {
        matches!(self, CodingType::External | CodingType::Atrac3Plus)
    }
}

impl fmt::Display for CodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodingType::Pcm16Le => "16-bit little-endian PCM",
            CodingType::Pcm16Be => "16-bit big-endian PCM",
            CodingType::Pcm8Unsigned => "8-bit unsigned PCM",
            CodingType::MsAdpcm => "Microsoft ADPCM",
            CodingType::MsIma => "Microsoft IMA ADPCM",
            CodingType::Level5Adpcm => "Level-5 0x555 ADPCM",
            CodingType::NgcDsp => "Nintendo DSP ADPCM",
            CodingType::External => "external decoder",
            CodingType::Atrac3Plus => "ATRAC3plus",
        };
        f.write_str(name)
    }
}

/// Classified `fmt ` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub codec_id: u16,
    pub coding: CodingType,
    /// Frame / block alignment size in bytes
    pub block_size: u32,
    /// Bytes between channels when interleaved
    pub interleave: u32,
}

/// Parse and classify the format payload at `payload`.
///
/// `length` is the declared payload length; fields are never read beyond
/// the source.
pub fn read_format(
    reader: &ByteReader<'_>,
    payload: u64,
    length: u64,
    family: Option<Family>,
) -> ParseResult<FormatDescriptor> {
    if length < FORMAT_MIN_SIZE {
        return Err(RiffError::CorruptChunk {
            tag: super::chunk::FourCc(*b"fmt "),
            offset: payload.saturating_sub(8),
        });
    }

    let codec_id = reader.u16(payload)?;
    let channel_count = reader.u16(payload + 0x02)?;
    let sample_rate = reader.u32(payload + 0x04)?;
    let block_size = reader.u16(payload + 0x0C)? as u32;
    let bits_per_sample = reader.u16(payload + 0x0E)?;

    let unsupported = RiffError::UnsupportedCodec {
        codec: codec_id,
        bits: bits_per_sample,
    };

    if channel_count == 0 {
        return Err(unsupported);
    }

    let mut desc = FormatDescriptor {
        sample_rate,
        channel_count,
        bits_per_sample,
        codec_id,
        coding: CodingType::Pcm16Le,
        block_size,
        interleave: 0,
    };

    let (coding, interleave) = match (codec_id, bits_per_sample) {
        (WAVE_FORMAT_PCM, 16) => match reader.order() {
            ByteOrder::Little => (CodingType::Pcm16Le, 2),
            ByteOrder::Big => (CodingType::Pcm16Be, 2),
        },
        (WAVE_FORMAT_PCM, 8) => (CodingType::Pcm8Unsigned, 1),
        (WAVE_FORMAT_MS_ADPCM, 4) => (CodingType::MsAdpcm, 0),
        (WAVE_FORMAT_IMA_ADPCM | WAVE_FORMAT_IMA_ADPCM_ALT, 4) => (CodingType::MsIma, 0),
        // 0x7A is registered to Voxware, but .med files store plain MS IMA
        (WAVE_FORMAT_VOXWARE_SC3, 4) if family == Some(Family::Med) => (CodingType::MsIma, 0),
        (WAVE_FORMAT_L5_555, _) if family == Some(Family::Mwv) => {
            (CodingType::Level5Adpcm, L5_FRAME_SIZE)
        }
        (WAVE_FORMAT_UBI_DSP, _) if family == Some(Family::Sns) => {
            (CodingType::NgcDsp, DSP_FRAME_SIZE)
        }
        #[cfg(feature = "external-decoder")]
        (WAVE_FORMAT_ATRAC3, _) => (CodingType::External, 0),
        (WAVE_FORMAT_EXTENSIBLE, _) => match extensible_block_size(reader, payload, length)? {
            Some(block) => {
                desc.block_size = block;
                (CodingType::Atrac3Plus, 0)
            }
            None => return Err(unsupported),
        },
        _ => return Err(unsupported),
    };

    if matches!(coding, CodingType::MsAdpcm | CodingType::MsIma) && desc.block_size == 0 {
        return Err(unsupported);
    }

    desc.coding = coding;
    desc.interleave = interleave;
    Ok(desc)
}

/// Block size of an ATRAC3plus WAVEFORMATEXTENSIBLE record, or `None`
/// when the sub-format GUID does not match.
fn extensible_block_size(
    reader: &ByteReader<'_>,
    payload: u64,
    length: u64,
) -> ParseResult<Option<u32>> {
    if length < EXTENSIBLE_MIN_SIZE {
        return Ok(None);
    }

    let matches = reader.u32(payload + 0x18)? == AT3PLUS_GUID_DATA1
        && reader.u16(payload + 0x1C)? == AT3PLUS_GUID_DATA2
        && reader.u16(payload + 0x1E)? == AT3PLUS_GUID_DATA3
        && reader.u32_le(payload + 0x20)? == AT3PLUS_GUID_DATA4_HI
        && reader.u32_le(payload + 0x24)? == AT3PLUS_GUID_DATA4_LO;
    if !matches {
        return Ok(None);
    }

    let field = reader.u16(payload + 0x2A)?.swap_bytes();
    Ok(Some((field as u32 & 0x3FF) * 8 + 8))
}
