//! Interface to delegated decoders
//!
//! Codecs such as ATRAC3 are not parsed here. The parser only opens a
//! decoder context through a caller-supplied factory and asks it for the
//! sample count. The context is owned by the resulting descriptor and is
//! closed when dropped.

use std::sync::Arc;

use super::error::ParseResult;
use super::format::FormatDescriptor;
use super::source::ByteSource;

/// An opened external decoder context
pub trait ExternalDecoder: Send {
    /// Total samples the decoder will produce, as it reports them
    fn total_samples(&self) -> i64;

    /// Leading samples the decoder discards before output
    fn skip_samples(&self) -> i64;

    /// Override the leading skip
    fn set_skip_samples(&mut self, skip: i64);
}

/// What the factory is asked to open
pub struct ExternalRequest {
    /// Shared handle owned by the descriptor being built
    pub source: Arc<dyn ByteSource>,
    pub format: FormatDescriptor,
    pub data_offset: u64,
    pub data_size: u64,
}

/// Opens [`ExternalDecoder`] contexts; errors map to `RiffError::External`
pub trait ExternalDecoderFactory: Send + Sync {
    fn open(&self, request: &ExternalRequest) -> ParseResult<Box<dyn ExternalDecoder>>;
}
