//! RIFF and RIFX WAVE parsers
//!
//! Both flavours share one chunk walk; they differ in byte order, in the
//! extensions they accept and in which codings survive classification.

use super::chunk::{ChunkRecord, ChunkTag, ChunkWalker, FourCc};
use super::container::{
    family_for_extension, is_generic_extension, read_riff_header, ContainerKind, Family,
    RIFF_HEADER_SIZE,
};
use super::error::{ParseResult, RiffError};
use super::format::{read_format, CodingType, FormatDescriptor};
use super::loops::{read_control, read_label_list, read_sample_loop, LoopCandidates};
use super::parser::{ContainerParser, ParseOptions};
use super::samples::AuxiliaryCount;
use super::source::{ByteReader, ByteSource};
use super::stream::{assemble, MetaKind, StreamDescriptor, StreamParts};

const FMT_ID: FourCc = FourCc(*b"fmt ");
const DATA_ID: FourCc = FourCc(*b"data");

// fact record sizes per family
const SNS_FACT_SIZE: u32 = 0x10;
const AT3_FACT_SIZE: u32 = 0x08;
const AT3_FACT_SIZE_EXT: u32 = 0x0C;

/// Little-endian `RIFF/WAVE`
#[derive(Debug, Default, Clone, Copy)]
pub struct RiffParser;

/// Big-endian `RIFX/WAVE`
#[derive(Debug, Default, Clone, Copy)]
pub struct RifxParser;

impl RiffParser {
    pub fn new() -> Self {
        Self
    }
}

impl RifxParser {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerParser for RiffParser {
    fn name(&self) -> &'static str {
        "RIFF"
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<StreamDescriptor> {
        parse_wave(ContainerKind::Riff, source, options)
    }
}

impl ContainerParser for RifxParser {
    fn name(&self) -> &'static str {
        "RIFX"
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<StreamDescriptor> {
        parse_wave(ContainerKind::Rifx, source, options)
    }
}

/// State accumulated over one chunk walk
struct ParseContext<'a> {
    reader: ByteReader<'a>,
    kind: ContainerKind,
    family: Option<Family>,
    format: Option<FormatDescriptor>,
    data: Option<ChunkRecord>,
    aux: AuxiliaryCount,
    loops: LoopCandidates,
    filter: Option<ChunkRecord>,
    saw_junk: bool,
}

impl<'a> ParseContext<'a> {
    fn new(reader: ByteReader<'a>, kind: ContainerKind, family: Option<Family>) -> Self {
        Self {
            reader,
            kind,
            family,
            format: None,
            data: None,
            aux: AuxiliaryCount::default(),
            loops: LoopCandidates::default(),
            filter: None,
            saw_junk: false,
        }
    }

    fn visit(&mut self, record: &ChunkRecord) -> ParseResult<()> {
        log::debug!(
            "{} chunk '{}' at 0x{:x}, {} bytes",
            self.kind,
            record.tag,
            record.offset,
            record.length
        );

        match record.kind() {
            ChunkTag::Format => {
                if self.format.is_some() {
                    return Err(RiffError::DuplicateChunk(FMT_ID));
                }
                self.format = Some(read_format(
                    &self.reader,
                    record.payload,
                    record.length as u64,
                    self.family,
                )?);
            }
            ChunkTag::Data => {
                if self.data.is_some() {
                    return Err(RiffError::DuplicateChunk(DATA_ID));
                }
                self.data = Some(*record);
            }
            // RIFX label lists are left alone
            ChunkTag::List if self.kind == ContainerKind::Riff => {
                if self.loops.labels.is_none() {
                    self.loops.labels = read_label_list(&self.reader, record)?;
                }
            }
            ChunkTag::Sample => {
                if let Some(sample) = read_sample_loop(&self.reader, record)? {
                    self.loops.sample = Some(sample);
                }
            }
            ChunkTag::Fact => self.read_fact(record)?,
            ChunkTag::Filter if self.family == Some(Family::Mwv) => {
                self.filter = Some(*record);
            }
            ChunkTag::Control if self.family == Some(Family::Mwv) => {
                self.loops.control = read_control(&self.reader, record)?;
            }
            ChunkTag::Junk => self.saw_junk = true,
            _ => {}
        }
        Ok(())
    }

    fn read_fact(&mut self, record: &ChunkRecord) -> ParseResult<()> {
        if self.kind != ContainerKind::Riff {
            return Ok(());
        }
        let payload = record.payload;
        match (self.family, record.length) {
            (Some(Family::Sns), SNS_FACT_SIZE) => {
                self.aux.sample_count = Some(self.reader.u32(payload)?);
            }
            (Some(Family::At3), AT3_FACT_SIZE) => {
                self.aux.sample_count = Some(self.reader.u32(payload)?);
                self.aux.skip = Some(self.reader.u32(payload + 4)?);
            }
            (Some(Family::At3), AT3_FACT_SIZE_EXT) => {
                self.aux.sample_count = Some(self.reader.u32(payload)?);
                self.aux.skip = Some(self.reader.u32(payload + 8)?);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Codings each container flavour can hand to the decode stage
pub(crate) fn coding_allowed(kind: ContainerKind, coding: CodingType) -> bool {
    match kind {
        ContainerKind::Riff => true,
        ContainerKind::Rifx => matches!(coding, CodingType::Pcm16Be | CodingType::Pcm8Unsigned),
        ContainerKind::Xnb => matches!(
            coding,
            CodingType::Pcm16Le | CodingType::Pcm8Unsigned | CodingType::MsAdpcm | CodingType::MsIma
        ),
    }
}

fn parse_wave(
    kind: ContainerKind,
    source: &dyn ByteSource,
    options: &ParseOptions,
) -> ParseResult<StreamDescriptor> {
    let header = read_riff_header(source, kind)?;
    let ext = options.extension_for(source);
    let family = family_for_extension(kind, &ext)?;

    let reader = ByteReader::new(source, header.order);
    let limit = source.size().min(header.declared_end());
    let mut ctx = ParseContext::new(reader, kind, family);

    for record in ChunkWalker::new(reader, RIFF_HEADER_SIZE, limit) {
        ctx.visit(&record?)?;
    }

    let format = ctx
        .format
        .ok_or_else(|| RiffError::UnrecognizedContainer("no 'fmt ' chunk".to_string()))?;
    let data = ctx
        .data
        .ok_or_else(|| RiffError::UnrecognizedContainer("no 'data' chunk".to_string()))?;

    // Wwise banks reuse the MS ADPCM ids with a JUNK record; leave them
    // to a dedicated parser
    if ctx.saw_junk && matches!(format.coding, CodingType::MsAdpcm | CodingType::MsIma) {
        let ceded = match kind {
            ContainerKind::Riff => is_generic_extension(&ext),
            _ => true,
        };
        if ceded {
            return Err(RiffError::UnrecognizedContainer(format!(
                "{} with JUNK in .{} looks like Wwise",
                format.coding, ext
            )));
        }
    }

    if !coding_allowed(kind, format.coding) {
        return Err(RiffError::UnsupportedCodec {
            codec: format.codec_id,
            bits: format.bits_per_sample,
        });
    }

    let meta = match kind {
        ContainerKind::Rifx => MetaKind::RifxWave,
        _ => MetaKind::RiffWave,
    };

    assemble(
        source,
        StreamParts {
            format,
            data_offset: data.payload,
            data_size: data.length as u64,
            family,
            aux: ctx.aux,
            loops: ctx.loops,
            filter: ctx.filter,
            meta,
        },
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::loops::LoopSource;
    use crate::sound::source::MemorySource;
    use crate::sound::stream::Layout;

    /// Minimal RIFF/RIFX writer
    struct Wave {
        big: bool,
        chunks: Vec<u8>,
    }

    impl Wave {
        fn riff() -> Self {
            Self {
                big: false,
                chunks: Vec::new(),
            }
        }

        fn rifx() -> Self {
            Self {
                big: true,
                chunks: Vec::new(),
            }
        }

        fn u16(&self, v: u16) -> [u8; 2] {
            if self.big {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        }

        fn u32(&self, v: u32) -> [u8; 4] {
            if self.big {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        }

        fn chunk(mut self, tag: &[u8; 4], payload: &[u8]) -> Self {
            let len = self.u32(payload.len() as u32);
            self.chunks.extend_from_slice(tag);
            self.chunks.extend_from_slice(&len);
            self.chunks.extend_from_slice(payload);
            self
        }

        fn fmt(self, codec: u16, channels: u16, rate: u32, block: u16, bits: u16) -> Self {
            let mut p = Vec::new();
            p.extend_from_slice(&self.u16(codec));
            p.extend_from_slice(&self.u16(channels));
            p.extend_from_slice(&self.u32(rate));
            p.extend_from_slice(&self.u32(rate * block as u32));
            p.extend_from_slice(&self.u16(block));
            p.extend_from_slice(&self.u16(bits));
            self.chunk(b"fmt ", &p)
        }

        fn build(&self) -> Vec<u8> {
            let mut v = if self.big {
                b"RIFX".to_vec()
            } else {
                b"RIFF".to_vec()
            };
            v.extend_from_slice(&self.u32(self.chunks.len() as u32 + 4));
            v.extend_from_slice(b"WAVE");
            v.extend_from_slice(&self.chunks);
            v
        }
    }

    fn parse_riff(name: &str, data: Vec<u8>) -> ParseResult<StreamDescriptor> {
        RiffParser::new().parse(&MemorySource::new(name, data), &ParseOptions::default())
    }

    fn parse_rifx(name: &str, data: Vec<u8>) -> ParseResult<StreamDescriptor> {
        RifxParser::new().parse(&MemorySource::new(name, data), &ParseOptions::default())
    }

    #[test]
    fn test_parser_names() {
        assert_eq!(RiffParser::new().name(), "RIFF");
        assert_eq!(RifxParser::new().name(), "RIFX");
    }

    #[test]
    fn test_simple_pcm() {
        let data = Wave::riff()
            .fmt(1, 1, 44100, 2, 16)
            .chunk(b"data", &[0; 8])
            .build();
        let desc = parse_riff("a.wav", data).unwrap();
        assert_eq!(desc.coding, CodingType::Pcm16Le);
        assert_eq!(desc.total_samples, 4);
        assert_eq!(desc.data_offset, 0x2C);
        assert_eq!(desc.data_size, 8);
        assert_eq!(desc.meta, MetaKind::RiffWave);
        assert!(!desc.is_looped());
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let data = Wave::riff()
            .chunk(b"cue ", &[1, 2, 3])
            .fmt(1, 2, 22050, 4, 16)
            .chunk(b"bext", &[])
            .chunk(b"data", &[0; 16])
            .build();
        let desc = parse_riff("a.wav", data).unwrap();
        assert_eq!(desc.total_samples, 4);
        assert_eq!(desc.data_offset, 12 + 11 + 24 + 8 + 8);
        assert_eq!(desc.layout, Layout::Interleaved);
    }

    #[test]
    fn test_missing_chunks() {
        let data = Wave::riff().fmt(1, 1, 44100, 2, 16).build();
        assert!(matches!(
            parse_riff("a.wav", data),
            Err(RiffError::UnrecognizedContainer(_))
        ));

        let data = Wave::riff().chunk(b"data", &[0; 4]).build();
        assert!(matches!(
            parse_riff("a.wav", data),
            Err(RiffError::UnrecognizedContainer(_))
        ));
    }

    #[test]
    fn test_duplicates() {
        let data = Wave::riff()
            .fmt(1, 1, 44100, 2, 16)
            .fmt(1, 1, 44100, 2, 16)
            .chunk(b"data", &[0; 8])
            .build();
        assert_eq!(
            parse_riff("a.wav", data).unwrap_err(),
            RiffError::DuplicateChunk(FourCc(*b"fmt "))
        );

        let data = Wave::riff()
            .fmt(1, 1, 44100, 2, 16)
            .chunk(b"data", &[0; 8])
            .chunk(b"data", &[0; 8])
            .build();
        assert_eq!(
            parse_riff("a.wav", data).unwrap_err(),
            RiffError::DuplicateChunk(FourCc(*b"data"))
        );
    }

    #[test]
    fn test_junk_cedes_wwise_like_files() {
        let wave = Wave::riff()
            .chunk(b"JUNK", &[0; 4])
            .fmt(2, 1, 44100, 36, 4)
            .chunk(b"data", &[0; 72]);
        assert!(matches!(
            parse_riff("a.wav", wave.build()),
            Err(RiffError::UnrecognizedContainer(_))
        ));
        assert!(matches!(
            parse_riff("a.lwav", wave.build()),
            Err(RiffError::UnrecognizedContainer(_))
        ));
        let desc = parse_riff("a.med", wave.build()).unwrap();
        assert_eq!(desc.coding, CodingType::MsAdpcm);
    }

    #[test]
    fn test_junk_with_pcm_is_fine() {
        let data = Wave::riff()
            .chunk(b"JUNK", &[0; 4])
            .fmt(1, 1, 44100, 2, 16)
            .chunk(b"data", &[0; 8])
            .build();
        assert!(parse_riff("a.wav", data).is_ok());
    }

    #[test]
    fn test_sample_loop_sets_meta() {
        let mut smpl = vec![0u8; 0x34];
        smpl[0x1C] = 1;
        smpl[0x2C..0x30].copy_from_slice(&10u32.to_le_bytes());
        smpl[0x30..0x34].copy_from_slice(&3u32.to_le_bytes());
        let data = Wave::riff()
            .fmt(1, 1, 8000, 2, 16)
            .chunk(b"smpl", &smpl)
            .chunk(b"data", &[0; 40])
            .build();
        let desc = parse_riff("a.wav", data).unwrap();
        let w = desc.loop_window.unwrap();
        assert_eq!((w.start_sample, w.end_sample, w.source), (3, 10, LoopSource::SampleLoop));
        assert_eq!(desc.meta, MetaKind::RiffWaveSmpl);
    }

    #[test]
    fn test_sns_fact() {
        let mut fact = vec![0u8; 0x10];
        fact[..4].copy_from_slice(&5000u32.to_le_bytes());
        let data = Wave::riff()
            .fmt(0x5050, 2, 32000, 0, 4)
            .chunk(b"fact", &fact)
            .chunk(b"data", &[0; 64])
            .build();
        let desc = parse_riff("a.sns", data).unwrap();
        assert_eq!(desc.coding, CodingType::NgcDsp);
        assert_eq!(desc.total_samples, 5000);
        assert_eq!(desc.meta, MetaKind::RiffWaveSns);

        let data = Wave::riff()
            .fmt(0x5050, 2, 32000, 0, 4)
            .chunk(b"data", &[0; 64])
            .build();
        assert_eq!(
            parse_riff("a.sns", data).unwrap_err(),
            RiffError::MissingSampleCount
        );
    }

    #[test]
    fn test_vendor_codec_needs_family() {
        let data = Wave::riff()
            .fmt(0x5050, 2, 32000, 0, 4)
            .chunk(b"data", &[0; 64])
            .build();
        assert!(matches!(
            parse_riff("a.wav", data),
            Err(RiffError::UnsupportedCodec { codec: 0x5050, .. })
        ));
    }

    #[test]
    fn test_mwv_filters_and_control() {
        let mut pflt = Vec::new();
        pflt.extend_from_slice(&3u32.to_le_bytes());
        pflt.extend_from_slice(&1u32.to_le_bytes());
        for tap in [10i32, -20, 30] {
            pflt.extend_from_slice(&tap.to_le_bytes());
        }
        let mut ctrl = Vec::new();
        ctrl.extend_from_slice(&1u32.to_le_bytes());
        ctrl.extend_from_slice(&16u32.to_le_bytes());

        let data = Wave::riff()
            .fmt(0x555, 1, 22050, 0x12, 4)
            .chunk(b"pflt", &pflt)
            .chunk(b"ctrl", &ctrl)
            .chunk(b"data", &[0; 0x12 * 3])
            .build();
        let desc = parse_riff("a.mwv", data).unwrap();
        assert_eq!(desc.coding, CodingType::Level5Adpcm);
        assert_eq!(desc.meta, MetaKind::RiffWaveMwv);
        assert_eq!(desc.total_samples, 96);
        let w = desc.loop_window.unwrap();
        assert_eq!((w.start_sample, w.end_sample, w.source), (16, 96, LoopSource::Control));
    }

    #[test]
    fn test_control_ignored_outside_mwv() {
        let mut ctrl = Vec::new();
        ctrl.extend_from_slice(&1u32.to_le_bytes());
        ctrl.extend_from_slice(&16u32.to_le_bytes());
        let data = Wave::riff()
            .fmt(1, 1, 22050, 2, 16)
            .chunk(b"ctrl", &ctrl)
            .chunk(b"data", &[0; 8])
            .build();
        assert!(parse_riff("a.wav", data).unwrap().loop_window.is_none());
    }

    #[test]
    fn test_rifx_pcm() {
        let data = Wave::rifx()
            .fmt(1, 2, 48000, 4, 16)
            .chunk(b"data", &[0; 32])
            .build();
        let desc = parse_rifx("a.wav", data).unwrap();
        assert_eq!(desc.coding, CodingType::Pcm16Be);
        assert_eq!(desc.total_samples, 8);
        assert_eq!(desc.meta, MetaKind::RifxWave);
    }

    #[test]
    fn test_rifx_ignores_label_list() {
        let w = Wave::rifx();
        let mut list = b"adtl".to_vec();
        for (purpose, text) in [(1u32, "Marker 00:00:00.000"), (2u32, "Marker 00:00:00.001")] {
            let mut body = w.u32(purpose).to_vec();
            body.extend_from_slice(text.as_bytes());
            body.push(0);
            list.extend_from_slice(b"labl");
            list.extend_from_slice(&w.u32(body.len() as u32));
            list.extend(body);
        }
        let data = w
            .fmt(1, 1, 48000, 2, 16)
            .chunk(b"LIST", &list)
            .chunk(b"data", &[0; 200])
            .build();
        let desc = parse_rifx("a.wav", data).unwrap();
        assert!(desc.loop_window.is_none());
        assert_eq!(desc.meta, MetaKind::RifxWave);
    }

    #[test]
    fn test_rifx_rejects_adpcm() {
        let data = Wave::rifx()
            .fmt(0x11, 1, 48000, 36, 4)
            .chunk(b"data", &[0; 36])
            .build();
        assert!(matches!(
            parse_rifx("a.wav", data),
            Err(RiffError::UnsupportedCodec { codec: 0x11, .. })
        ));
    }

    #[test]
    fn test_rifx_rejects_riff_magic() {
        let data = Wave::riff()
            .fmt(1, 1, 48000, 2, 16)
            .chunk(b"data", &[0; 4])
            .build();
        assert!(matches!(
            parse_rifx("a.wav", data),
            Err(RiffError::UnrecognizedContainer(_))
        ));
    }

    #[test]
    fn test_unknown_extension_rejected_after_header() {
        let data = Wave::riff()
            .fmt(1, 1, 48000, 2, 16)
            .chunk(b"data", &[0; 4])
            .build();
        assert!(matches!(
            parse_riff("a.ogg", data.clone()),
            Err(RiffError::UnrecognizedContainer(_))
        ));

        let opts = ParseOptions::new().with_extension("wav");
        assert!(RiffParser::new()
            .parse(&MemorySource::new("a.ogg", data), &opts)
            .is_ok());
    }

    #[test]
    fn test_coding_allowed() {
        assert!(coding_allowed(ContainerKind::Riff, CodingType::NgcDsp));
        assert!(!coding_allowed(ContainerKind::Rifx, CodingType::Pcm16Le));
        assert!(coding_allowed(ContainerKind::Xnb, CodingType::MsAdpcm));
        assert!(!coding_allowed(ContainerKind::Xnb, CodingType::Level5Adpcm));
    }
}
