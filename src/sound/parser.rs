//! Container parser trait definition
//!
//! Every container flavour implements `ContainerParser`. A caller holding
//! many parsers tries them in turn until one accepts the source.

use std::fmt;
use std::sync::Arc;

use super::error::ParseResult;
use super::external::ExternalDecoderFactory;
use super::source::{extension_of, ByteSource};
use super::stream::StreamDescriptor;

/// Per-call parser settings
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Extension hint overriding the one derived from the source name
    pub extension: Option<String>,
    /// Opens decoders for delegated codecs; without it they are unsupported
    pub external: Option<Arc<dyn ExternalDecoderFactory>>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    pub fn with_external(mut self, factory: Arc<dyn ExternalDecoderFactory>) -> Self {
        self.external = Some(factory);
        self
    }

    /// Lower-cased extension to use for `source`
    pub fn extension_for(&self, source: &dyn ByteSource) -> String {
        match &self.extension {
            Some(ext) => ext.trim_start_matches('.').to_ascii_lowercase(),
            None => extension_of(source.name()),
        }
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("extension", &self.extension)
            .field("external", &self.external.is_some())
            .finish()
    }
}

/// Container parser
///
/// `parse` is a one-shot, read-only pass. On success the descriptor owns
/// a duplicated handle of `source`; on failure nothing is retained.
pub trait ContainerParser: Send + Sync {
    /// Returns the parser name (e.g., "RIFF", "XNB")
    fn name(&self) -> &'static str;

    /// Validate `source` and build its stream descriptor
    fn parse(&self, source: &dyn ByteSource, options: &ParseOptions) -> ParseResult<StreamDescriptor>;
}
