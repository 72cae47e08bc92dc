//! Total sample count per codec

use super::container::Family;
use super::error::{ParseResult, RiffError};
use super::external::ExternalDecoder;
use super::format::{CodingType, FormatDescriptor, L5_FRAME_SIZE};

/// Samples produced by one ATRAC3plus frame
const AT3PLUS_SAMPLES_PER_FRAME: u64 = 2048;
/// Samples produced by one Level-5 0x555 frame
const L5_SAMPLES_PER_FRAME: u64 = 32;

/// Sample count and leading skip taken from a `fact` record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuxiliaryCount {
    pub sample_count: Option<u32>,
    pub skip: Option<u32>,
}

pub fn pcm_bytes_to_samples(bytes: u64, channels: u16, bits_per_sample: u16) -> u64 {
    if channels == 0 || bits_per_sample == 0 {
        return 0;
    }
    bytes * 8 / bits_per_sample as u64 / channels as u64
}

/// Standard MS ADPCM block layout: a 7-byte header per channel, of which
/// the two seed samples count towards the output.
pub fn msadpcm_bytes_to_samples(bytes: u64, block_size: u32, channels: u16) -> u64 {
    if block_size == 0 || channels == 0 {
        return 0;
    }
    let block = block_size as u64;
    let ch = channels as u64;
    let per_block = |len: u64| len.saturating_sub(6 * ch) * 2 / ch;

    let full = bytes / block * per_block(block);
    match bytes % block {
        0 => full,
        rem => full + per_block(rem),
    }
}

/// MS IMA blocks: a 4-byte header per channel, then nibbles
pub fn ms_ima_bytes_to_samples(bytes: u64, block_size: u32, channels: u16) -> u64 {
    if block_size == 0 || channels == 0 {
        return 0;
    }
    let block = block_size as u64;
    let ch = channels as u64;
    let per_block = |len: u64| len.saturating_sub(4 * ch) * 2 / ch;

    let full = bytes / block * per_block(block);
    match bytes % block {
        0 => full,
        rem => full + per_block(rem),
    }
}

/// Derive the total sample count of `data_size` payload bytes.
///
/// Delegated codecs need their external decoder; the decoder's own count
/// is used for [`CodingType::External`] and the `fact` skip is installed
/// into it when it reports none. Under the Ubisoft family the `fact`
/// count is mandatory and authoritative.
pub fn derive_sample_count(
    format: &FormatDescriptor,
    data_size: u64,
    aux: &AuxiliaryCount,
    family: Option<Family>,
    external: Option<&mut (dyn ExternalDecoder + '_)>,
) -> ParseResult<u64> {
    let channels = format.channel_count;

    let estimate = match format.coding {
        CodingType::Pcm16Le | CodingType::Pcm16Be => pcm_bytes_to_samples(data_size, channels, 16),
        CodingType::Pcm8Unsigned => pcm_bytes_to_samples(data_size, channels, 8),
        CodingType::Level5Adpcm => {
            data_size / L5_FRAME_SIZE as u64 / channels as u64 * L5_SAMPLES_PER_FRAME
        }
        CodingType::MsAdpcm => msadpcm_bytes_to_samples(data_size, format.block_size, channels),
        CodingType::MsIma => ms_ima_bytes_to_samples(data_size, format.block_size, channels),
        // byte size is unreliable because of padding; only `fact` counts
        CodingType::NgcDsp => 0,
        CodingType::External => {
            let decoder = external.ok_or(RiffError::UnsupportedCodec {
                codec: format.codec_id,
                bits: format.bits_per_sample,
            })?;
            if let Some(skip) = aux.skip {
                if decoder.skip_samples() <= 0 {
                    decoder.set_skip_samples(skip as i64);
                }
            }
            decoder.total_samples().max(0) as u64
        }
        CodingType::Atrac3Plus => {
            let estimate = data_size / format.block_size.max(1) as u64 * AT3PLUS_SAMPLES_PER_FRAME;
            match aux.sample_count {
                Some(count) if count > 0 => {
                    let with_skip = count as u64 + aux.skip.unwrap_or(0) as u64;
                    if with_skip < estimate {
                        with_skip
                    } else {
                        estimate
                    }
                }
                _ => estimate,
            }
        }
    };

    if format.coding == CodingType::NgcDsp || family == Some(Family::Sns) {
        return aux
            .sample_count
            .map(u64::from)
            .ok_or(RiffError::MissingSampleCount);
    }

    Ok(estimate)
}
