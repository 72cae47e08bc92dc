//! XNA Game Studio 4.0 sound effect parser
//!
//! An `.xnb` sound effect is a type-reader preamble followed by a bare
//! `fmt ` payload and the audio bytes. There is no chunk walk and no loop
//! metadata.

use super::chunk::FourCc;
use super::container::ContainerKind;
use super::error::{ParseResult, RiffError};
use super::format::read_format;
use super::loops::LoopCandidates;
use super::parser::{ContainerParser, ParseOptions};
use super::riff::coding_allowed;
use super::samples::AuxiliaryCount;
use super::source::{ByteOrder, ByteReader, ByteSource};
use super::stream::{assemble, MetaKind, StreamDescriptor, StreamParts};

const XNB_MAGIC: &[u8; 3] = b"XNB";
const XNB_VERSION: u8 = 5;
const XNB_FLAG_COMPRESSED: u8 = 0x80;
const SOUND_EFFECT_READER: &[u8] = b"Microsoft.Xna.Framework.Content.SoundEffectReader";

// fixed preamble offsets
const OFFSET_VERSION: u64 = 0x04;
const OFFSET_FLAGS: u64 = 0x05;
const OFFSET_SIZE: u64 = 0x06;
const OFFSET_READER_COUNT: u64 = 0x0A;
const OFFSET_READER_NAME_LEN: u64 = 0x0B;
const OFFSET_READER_NAME: u64 = 0x0C;

/// Bytes needed to reach the reader name
const XNB_PREAMBLE_SIZE: u64 = 0x0C;

/// XNA `.xnb` SoundEffect wrapper
#[derive(Debug, Default, Clone, Copy)]
pub struct XnbParser;

impl XnbParser {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerParser for XnbParser {
    fn name(&self) -> &'static str {
        "XNB"
    }

    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<StreamDescriptor> {
        let reader = ByteReader::new(source, ByteOrder::Little);
        let actual = source.size();

        if actual < XNB_PREAMBLE_SIZE || reader.bytes(0, 3)? != XNB_MAGIC {
            return Err(RiffError::UnrecognizedContainer("no XNB magic".to_string()));
        }
        let version = reader.u8(OFFSET_VERSION)?;
        if version != XNB_VERSION {
            return Err(RiffError::UnrecognizedContainer(format!(
                "XNB version {} (only XNA 4.0 is handled)",
                version
            )));
        }
        if reader.u8(OFFSET_FLAGS)? & XNB_FLAG_COMPRESSED != 0 {
            return Err(RiffError::UnrecognizedContainer(
                "compressed XNB content".to_string(),
            ));
        }

        let readers = reader.u8(OFFSET_READER_COUNT)?;
        if readers != 1 {
            return Err(RiffError::UnrecognizedContainer(format!(
                "{} type readers, expected one",
                readers
            )));
        }
        let name_len = reader.u8(OFFSET_READER_NAME_LEN)? as u64;
        let name = reader.bytes(OFFSET_READER_NAME, name_len as usize)?;
        if name != SOUND_EFFECT_READER {
            return Err(RiffError::UnrecognizedContainer(format!(
                "type reader '{}' is not a sound effect",
                String::from_utf8_lossy(&name)
            )));
        }

        let declared_size = reader.u32(OFFSET_SIZE)? as u64;
        if actual < declared_size {
            return Err(RiffError::Truncated {
                expected: declared_size,
                actual,
            });
        }

        let ext = options.extension_for(source);
        if ext != "xnb" {
            return Err(RiffError::UnrecognizedContainer(format!(
                "extension '{}' is not handled by the {} parser",
                ext,
                ContainerKind::Xnb
            )));
        }

        // reader version (i32) and shared resource count precede the object
        let object = OFFSET_READER_NAME + name_len;
        let type_id = reader.u8(object + 5)?;
        if type_id != 1 {
            return Err(RiffError::UnrecognizedContainer(format!(
                "XNB object type id {}",
                type_id
            )));
        }

        let fmt_size = reader.u32(object + 6)? as u64;
        let fmt_offset = object + 10;
        log::debug!("XNB format record at 0x{:x}, {} bytes", fmt_offset, fmt_size);
        let format = read_format(&reader, fmt_offset, fmt_size, None)?;

        let size_offset = fmt_offset + fmt_size;
        let data_size = reader.u32(size_offset)? as u64;
        let data_offset = size_offset + 4;
        if data_offset + data_size > actual {
            return Err(RiffError::CorruptChunk {
                tag: FourCc(*b"data"),
                offset: size_offset,
            });
        }

        if !coding_allowed(ContainerKind::Xnb, format.coding) {
            return Err(RiffError::UnsupportedCodec {
                codec: format.codec_id,
                bits: format.bits_per_sample,
            });
        }

        assemble(
            source,
            StreamParts {
                format,
                data_offset,
                data_size,
                family: None,
                aux: AuxiliaryCount::default(),
                loops: LoopCandidates::default(),
                filter: None,
                meta: MetaKind::Xnb,
            },
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::format::CodingType;
    use crate::sound::source::MemorySource;
    use crate::sound::stream::Layout;

    fn xnb(version: u8, flags: u8, reader: &[u8], fmt: &[u8], data: &[u8], size_delta: i64) -> Vec<u8> {
        let mut v = b"XNBw".to_vec();
        v.push(version);
        v.push(flags);
        v.extend_from_slice(&[0; 4]);
        v.push(1);
        v.push(reader.len() as u8);
        v.extend_from_slice(reader);
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push(0);
        v.push(1);
        v.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        v.extend_from_slice(fmt);
        v.extend_from_slice(&(data.len() as u32).to_le_bytes());
        v.extend_from_slice(data);
        let size = (v.len() as i64 + size_delta) as u32;
        v[6..10].copy_from_slice(&size.to_le_bytes());
        v
    }

    fn fmt(codec: u16, channels: u16, rate: u32, block: u16, bits: u16) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&codec.to_le_bytes());
        p.extend_from_slice(&channels.to_le_bytes());
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&(rate * block as u32).to_le_bytes());
        p.extend_from_slice(&block.to_le_bytes());
        p.extend_from_slice(&bits.to_le_bytes());
        p.extend_from_slice(&[0, 0]);
        p
    }

    fn parse(data: Vec<u8>) -> ParseResult<StreamDescriptor> {
        XnbParser::new().parse(&MemorySource::new("sfx.xnb", data), &ParseOptions::default())
    }

    #[test]
    fn test_xnb_pcm() {
        let data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(1, 2, 44100, 4, 16), &[0; 40], 0);
        let desc = parse(data).unwrap();
        assert_eq!(desc.coding, CodingType::Pcm16Le);
        assert_eq!(desc.channel_count, 2);
        assert_eq!(desc.total_samples, 10);
        assert_eq!(desc.meta, MetaKind::Xnb);
        assert_eq!(desc.layout, Layout::Interleaved);
        assert_eq!(desc.data_size, 40);
        assert!(desc.loop_window.is_none());
    }

    #[test]
    fn test_xnb_msadpcm_is_independent() {
        let data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(2, 2, 22050, 512, 4), &[0; 1024], 0);
        let desc = parse(data).unwrap();
        assert_eq!(desc.coding, CodingType::MsAdpcm);
        assert_eq!(desc.layout, Layout::Independent);
        assert_eq!(desc.total_samples, 1000);
    }

    #[test]
    fn test_xnb_rejections() {
        let f = fmt(1, 1, 44100, 2, 16);
        for data in [
            xnb(4, 0, SOUND_EFFECT_READER, &f, &[0; 4], 0),
            xnb(5, 0x80, SOUND_EFFECT_READER, &f, &[0; 4], 0),
            xnb(5, 0, b"Microsoft.Xna.Framework.Content.SongReader", &f, &[0; 4], 0),
        ] {
            assert!(matches!(parse(data), Err(RiffError::UnrecognizedContainer(_))));
        }

        let mut data = xnb(5, 0, SOUND_EFFECT_READER, &f, &[0; 4], 0);
        data[0] = b'R';
        assert!(matches!(parse(data), Err(RiffError::UnrecognizedContainer(_))));
    }

    #[test]
    fn test_xnb_truncated() {
        let data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(1, 1, 44100, 2, 16), &[0; 4], 16);
        let actual = data.len() as u64;
        assert_eq!(
            parse(data).unwrap_err(),
            RiffError::Truncated {
                expected: actual + 16,
                actual
            }
        );
    }

    #[test]
    fn test_xnb_data_past_end() {
        let mut data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(1, 1, 44100, 2, 16), &[0; 4], 0);
        data.truncate(data.len() - 2);
        let len = data.len() as u32;
        data[6..10].copy_from_slice(&len.to_le_bytes());
        assert!(matches!(
            parse(data),
            Err(RiffError::CorruptChunk { tag: FourCc(t), .. }) if &t == b"data"
        ));
    }

    #[test]
    fn test_xnb_codec_restriction() {
        let data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(0x555, 1, 44100, 0x12, 4), &[0; 4], 0);
        assert!(matches!(
            parse(data),
            Err(RiffError::UnsupportedCodec { codec: 0x555, .. })
        ));
    }

    #[test]
    fn test_xnb_extension_checked_last() {
        let data = xnb(5, 0, SOUND_EFFECT_READER, &fmt(1, 1, 44100, 2, 16), &[0; 4], 0);
        let src = MemorySource::new("sfx.wav", data);
        assert!(matches!(
            XnbParser::new().parse(&src, &ParseOptions::default()),
            Err(RiffError::UnrecognizedContainer(_))
        ));
        let opts = ParseOptions::new().with_extension("xnb");
        assert!(XnbParser::new().parse(&src, &opts).is_ok());
    }
}
