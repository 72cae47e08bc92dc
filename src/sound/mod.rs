//! Wave container metadata parsing
//!
//! Validates RIFF, RIFX and XNB wave containers from game archives and
//! produces a [`StreamDescriptor`] for the decode stage: coding, layout,
//! sample count, loop window and per-channel read cursors.
//!
//! # Architecture
//!
//! - `ContainerParser` trait, implemented by `RiffParser`, `RifxParser`
//!   and `XnbParser`
//! - `chunk` walks tag/length records; `format` classifies the codec
//! - `loops` and `samples` derive the loop window and sample count
//! - `stream` assembles the descriptor and owns the shared source handle
//! - `external` is the seam for decoders the parser delegates to

pub mod chunk;
pub mod container;
pub mod error;
pub mod external;
pub mod format;
pub mod loops;
pub mod parser;
pub mod riff;
pub mod samples;
pub mod source;
pub mod stream;
pub mod xnb;

use std::path::Path;

pub use chunk::FourCc;
pub use container::{ContainerKind, Family};
pub use error::{ParseResult, RiffError};
pub use external::{ExternalDecoder, ExternalDecoderFactory, ExternalRequest};
pub use format::{CodingType, FormatDescriptor};
pub use loops::{LoopSource, LoopWindow};
pub use parser::{ContainerParser, ParseOptions};
pub use riff::{RiffParser, RifxParser};
pub use source::{ByteSource, FileSource, MemorySource};
pub use stream::{ChannelCursor, Coefficients, Layout, MetaKind, StreamDescriptor};
pub use xnb::XnbParser;

/// Every parser, in the order they are tried
pub fn parsers() -> Vec<Box<dyn ContainerParser>> {
    vec![
        Box::new(RiffParser::new()),
        Box::new(RifxParser::new()),
        Box::new(XnbParser::new()),
    ]
}

/// Try each parser on `source` until one accepts it.
///
/// `UnrecognizedContainer` passes the source on to the next parser; any
/// other error is final.
pub fn parse_source(source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<StreamDescriptor> {
    for parser in parsers() {
        match parser.parse(source, options) {
            Err(RiffError::UnrecognizedContainer(reason)) => {
                log::debug!("{}: not {} ({})", source.name(), parser.name(), reason);
            }
            result => return result,
        }
    }
    Err(RiffError::UnrecognizedContainer(format!(
        "{} is not a RIFF, RIFX or XNB wave",
        source.name()
    )))
}

/// Open `path` and parse it with [`parse_source`]
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> ParseResult<StreamDescriptor> {
    let source = FileSource::open(path)?;
    parse_source(&source, options)
}
