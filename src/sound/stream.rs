//! Stream descriptor assembly
//!
//! Combines the classified format, the sample count and the selected loop
//! into the descriptor handed to the decode stage. Everything acquired here
//! (the duplicated source handle, the external decoder context) is owned by
//! locals until the descriptor is returned, so any early `?` releases it.

use std::fmt;
use std::sync::Arc;

use super::chunk::ChunkRecord;
use super::container::Family;
use super::error::{ParseResult, RiffError};
use super::external::{ExternalDecoder, ExternalRequest};
use super::format::{CodingType, FormatDescriptor};
use super::loops::{LoopCandidates, LoopSource, LoopWindow};
use super::parser::ParseOptions;
use super::samples::{derive_sample_count, AuxiliaryCount};
use super::source::{ByteOrder, ByteReader, ByteSource};

/// Ubisoft .sns files carry no coefficients; they all share this codebook
#[rustfmt::skip]
const SNS_DSP_COEFS: [u16; 16] = [
    0x04ab, 0xfced, 0x0789, 0xfedf, 0x09a2, 0xfae5, 0x0c90, 0xfac1,
    0x084d, 0xfaa4, 0x0982, 0xfdf7, 0x0af6, 0xfafa, 0x0be6, 0xfbf5,
];

const L5_FILTER_ORDER: u32 = 3;
const L5_MAX_FILTERS: u32 = 0x20;

/// How channel data is laid out in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Channels alternate every `interleave_block_size` bytes
    Interleaved,
    /// Each cursor relies on the codec's own per-channel framing
    Independent,
}

/// Header flavour that produced the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    RiffWave,
    RiffWaveLabl,
    RiffWaveSmpl,
    RiffWaveMwv,
    RiffWaveSns,
    RifxWave,
    RifxWaveSmpl,
    Xnb,
}

/// Per-channel decoder coefficients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coefficients {
    None,
    /// 8 predictor pairs for DSP ADPCM
    Dsp([i16; 16]),
    /// `filter_count * 3` Level-5 predictor taps
    Filter(Vec<i32>),
}

/// Read position of one channel
#[derive(Clone)]
pub struct ChannelCursor {
    /// Handle shared by every channel of the descriptor
    pub source: Arc<dyn ByteSource>,
    pub start_offset: u64,
    pub offset: u64,
    pub coefficients: Coefficients,
}

impl fmt::Debug for ChannelCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCursor")
            .field("source", &self.source.name())
            .field("start_offset", &self.start_offset)
            .field("offset", &self.offset)
            .field("coefficients", &self.coefficients)
            .finish()
    }
}

/// Normalized result of a successful parse
pub struct StreamDescriptor {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub total_samples: u64,
    pub coding: CodingType,
    pub codec_id: u16,
    pub layout: Layout,
    pub interleave_block_size: u32,
    pub loop_window: Option<LoopWindow>,
    pub meta: MetaKind,
    pub data_offset: u64,
    pub data_size: u64,
    pub channels: Vec<ChannelCursor>,
    external: Option<Box<dyn ExternalDecoder>>,
}

impl StreamDescriptor {
    pub fn is_looped(&self) -> bool {
        self.loop_window.is_some()
    }

    /// External decoder context for delegated codecs
    pub fn external(&self) -> Option<&dyn ExternalDecoder> {
        self.external.as_deref()
    }

    pub fn external_mut(&mut self) -> Option<&mut (dyn ExternalDecoder + 'static)> {
        self.external.as_deref_mut()
    }

    /// Duration in seconds
    pub fn length(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f64 / self.sample_rate as f64
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("total_samples", &self.total_samples)
            .field("coding", &self.coding)
            .field("codec_id", &self.codec_id)
            .field("layout", &self.layout)
            .field("interleave_block_size", &self.interleave_block_size)
            .field("loop_window", &self.loop_window)
            .field("meta", &self.meta)
            .field("data_offset", &self.data_offset)
            .field("data_size", &self.data_size)
            .field("channels", &self.channels)
            .field("external", &self.external.is_some())
            .finish()
    }
}

/// Everything the walker collected for one stream
#[derive(Debug, Clone)]
pub struct StreamParts {
    pub format: FormatDescriptor,
    pub data_offset: u64,
    pub data_size: u64,
    pub family: Option<Family>,
    pub aux: AuxiliaryCount,
    pub loops: LoopCandidates,
    /// Level-5 `pflt` record, if seen
    pub filter: Option<ChunkRecord>,
    /// Kind before loop/family refinement
    pub meta: MetaKind,
}

/// Build the descriptor for `parts`, opening the shared handle and any
/// external decoder.
pub fn assemble(
    source: &dyn ByteSource,
    parts: StreamParts,
    options: &ParseOptions,
) -> ParseResult<StreamDescriptor> {
    let format = parts.format;
    let handle = source.open_duplicate()?;

    let mut external = if format.coding.is_delegated() {
        let factory = options.external.as_ref().ok_or(RiffError::UnsupportedCodec {
            codec: format.codec_id,
            bits: format.bits_per_sample,
        })?;
        let request = ExternalRequest {
            source: Arc::clone(&handle),
            format,
            data_offset: parts.data_offset,
            data_size: parts.data_size,
        };
        Some(factory.open(&request)?)
    } else {
        None
    };

    let total_samples = derive_sample_count(
        &format,
        parts.data_size,
        &parts.aux,
        parts.family,
        external.as_deref_mut(),
    )?;

    let mut loop_window = parts.loops.reconcile(format.sample_rate, total_samples)?;

    // Sony smpl positions include the encoder delay the decoder already skips
    if let (CodingType::External, Some(Family::At3), Some(decoder), Some(window)) = (
        format.coding,
        parts.family,
        external.as_deref(),
        loop_window.as_mut(),
    ) {
        let skip = decoder.skip_samples();
        if skip > 0 && window.source == LoopSource::SampleLoop {
            window.start_sample = window.start_sample.saturating_sub(skip as u64);
            window.end_sample = window.end_sample.saturating_sub(skip as u64);
        }
    }

    let coefficients = match format.coding {
        CodingType::NgcDsp => Coefficients::Dsp(SNS_DSP_COEFS.map(|c| c as i16)),
        CodingType::Level5Adpcm => {
            let reader = ByteReader::new(source, ByteOrder::Little);
            Coefficients::Filter(read_filters(&reader, parts.filter.as_ref())?)
        }
        _ => Coefficients::None,
    };

    let layout = if format.channel_count > 1 && !keeps_independent_cursors(format.coding) {
        Layout::Interleaved
    } else {
        Layout::Independent
    };

    let interleave_block_size = if format.coding.is_block_oriented() {
        format.block_size
    } else {
        format.interleave
    };

    let meta = match (parts.family, parts.meta, loop_window.map(|w| w.source)) {
        (Some(Family::Mwv), _, _) => MetaKind::RiffWaveMwv,
        (Some(Family::Sns), _, _) => MetaKind::RiffWaveSns,
        (_, MetaKind::RiffWave, Some(LoopSource::LabelPair)) => MetaKind::RiffWaveLabl,
        (_, MetaKind::RiffWave, Some(LoopSource::SampleLoop)) => MetaKind::RiffWaveSmpl,
        (_, MetaKind::RifxWave, Some(LoopSource::SampleLoop)) => MetaKind::RifxWaveSmpl,
        (_, meta, _) => meta,
    };

    let channels = (0..format.channel_count as u64)
        .map(|i| {
            let offset = parts.data_offset + i * format.interleave as u64;
            ChannelCursor {
                source: Arc::clone(&handle),
                start_offset: offset,
                offset,
                coefficients: coefficients.clone(),
            }
        })
        .collect();

    log::info!(
        "{}: {}, {} ch, {} Hz, {} samples{}",
        source.name(),
        format.coding,
        format.channel_count,
        format.sample_rate,
        total_samples,
        if loop_window.is_some() { ", looped" } else { "" }
    );

    Ok(StreamDescriptor {
        channel_count: format.channel_count,
        sample_rate: format.sample_rate,
        total_samples,
        coding: format.coding,
        codec_id: format.codec_id,
        layout,
        interleave_block_size,
        loop_window,
        meta,
        data_offset: parts.data_offset,
        data_size: parts.data_size,
        channels,
        external,
    })
}

/// Codings that never use fixed-stride interleave, even with several channels
fn keeps_independent_cursors(coding: CodingType) -> bool {
    matches!(
        coding,
        CodingType::Pcm8Unsigned
            | CodingType::MsIma
            | CodingType::MsAdpcm
            | CodingType::External
            | CodingType::Atrac3Plus
    )
}

/// Load the Level-5 predictor taps from a `pflt` record
fn read_filters(reader: &ByteReader<'_>, record: Option<&ChunkRecord>) -> ParseResult<Vec<i32>> {
    let record = record.ok_or_else(|| RiffError::InvalidFilterData("no pflt record".to_string()))?;
    let length = record.length as u64;
    if length < 8 {
        return Err(RiffError::InvalidFilterData(format!(
            "pflt record of {} bytes",
            length
        )));
    }

    let order = reader.u32(record.payload)?;
    if order != L5_FILTER_ORDER {
        return Err(RiffError::InvalidFilterData(format!(
            "filter order {} (expected {})",
            order, L5_FILTER_ORDER
        )));
    }

    let count = reader.u32(record.payload + 4)?;
    if count > L5_MAX_FILTERS {
        return Err(RiffError::InvalidFilterData(format!(
            "{} filters (at most {})",
            count, L5_MAX_FILTERS
        )));
    }

    let taps = (count * L5_FILTER_ORDER) as u64;
    if length < 8 + taps * 4 {
        return Err(RiffError::InvalidFilterData(format!(
            "pflt record of {} bytes cannot hold {} filters",
            length, count
        )));
    }

    (0..taps)
        .map(|i| Ok(reader.u32(record.payload + 8 + i * 4)? as i32))
        .collect()
}
