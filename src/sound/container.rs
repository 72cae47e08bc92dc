//! Container header validation
//!
//! Checks the magic, the form tag, the declared size against the real
//! source length, and maps the file extension onto a vendor family.

use std::fmt;

use super::chunk::FourCc;
use super::error::{ParseResult, RiffError};
use super::source::{ByteOrder, ByteReader, ByteSource};

const RIFF_MAGIC: FourCc = FourCc(*b"RIFF");
const RIFX_MAGIC: FourCc = FourCc(*b"RIFX");
const WAVE_FORM: FourCc = FourCc(*b"WAVE");

/// Size of the `magic + size + form` preamble
pub const RIFF_HEADER_SIZE: u64 = 0x0C;

/// Which container flavour is being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Little-endian `RIFF/WAVE`
    Riff,
    /// Big-endian `RIFX/WAVE`
    Rifx,
    /// XNA content wrapper holding a single format record
    Xnb,
}

impl ContainerKind {
    pub fn byte_order(self) -> ByteOrder {
        match self {
            ContainerKind::Riff | ContainerKind::Xnb => ByteOrder::Little,
            ContainerKind::Rifx => ByteOrder::Big,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Riff => write!(f, "RIFF"),
            ContainerKind::Rifx => write!(f, "RIFX"),
            ContainerKind::Xnb => write!(f, "XNB"),
        }
    }
}

/// Vendor variant implied by the file extension. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Level-5 `.mwv`: 0x555 ADPCM, `pflt` filters, `ctrl` loops
    Mwv,
    /// Ubisoft `.sns`: 0x5050 DSP with a `fact` sample count
    Sns,
    /// Sony `.at3`/`.rws`: ATRAC3 with a `fact` leading skip
    At3,
    /// `.med`: 0x7A is plain MS IMA
    Med,
}

/// Validated container preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub kind: ContainerKind,
    pub order: ByteOrder,
    /// Size field as stored (excludes the first 8 bytes for RIFF/RIFX)
    pub declared_size: u64,
    pub form: FourCc,
}

impl ContainerHeader {
    /// Offset one past the last byte the header claims
    pub fn declared_end(&self) -> u64 {
        match self.kind {
            ContainerKind::Riff | ContainerKind::Rifx => self.declared_size + 8,
            ContainerKind::Xnb => self.declared_size,
        }
    }
}

/// Check magic, form and declared size of a RIFF or RIFX file
pub fn read_riff_header(source: &dyn ByteSource, kind: ContainerKind) -> ParseResult<ContainerHeader> {
    let (magic, order) = match kind {
        ContainerKind::Riff => (RIFF_MAGIC, ByteOrder::Little),
        ContainerKind::Rifx => (RIFX_MAGIC, ByteOrder::Big),
        ContainerKind::Xnb => {
            return Err(RiffError::UnrecognizedContainer(
                "XNB has no RIFF preamble".to_string(),
            ))
        }
    };

    let actual = source.size();
    if actual < RIFF_HEADER_SIZE {
        return Err(RiffError::UnrecognizedContainer(format!(
            "{} bytes is too short for a {} header",
            actual, kind
        )));
    }

    let reader = ByteReader::new(source, order);
    let found = reader.tag(0)?;
    if found != magic {
        return Err(RiffError::UnrecognizedContainer(format!(
            "expected '{}' magic, found '{}'",
            magic, found
        )));
    }

    let form = reader.tag(8)?;
    if form != WAVE_FORM {
        return Err(RiffError::UnrecognizedContainer(format!(
            "expected 'WAVE' form, found '{}'",
            form
        )));
    }

    let declared_size = reader.u32(4)? as u64;
    if declared_size + 8 > actual {
        return Err(RiffError::Truncated {
            expected: declared_size + 8,
            actual,
        });
    }

    Ok(ContainerHeader {
        kind,
        order,
        declared_size,
        form,
    })
}

/// Map a lower-cased extension onto the family it activates.
///
/// Fails `UnrecognizedContainer` for extensions this container never
/// accepts.
pub fn family_for_extension(kind: ContainerKind, ext: &str) -> ParseResult<Option<Family>> {
    let family = match (kind, ext) {
        (ContainerKind::Riff, "wav" | "lwav" | "da" | "cd") => None,
        #[cfg(not(feature = "external-decoder"))]
        (ContainerKind::Riff, "sgb") => None,
        (ContainerKind::Riff, "med") => Some(Family::Med),
        (ContainerKind::Riff, "mwv") => Some(Family::Mwv),
        (ContainerKind::Riff, "sns") => Some(Family::Sns),
        #[cfg(feature = "external-decoder")]
        (ContainerKind::Riff, "at3" | "rws") => Some(Family::At3),
        (ContainerKind::Rifx, "wav" | "lwav") => None,
        (ContainerKind::Xnb, "xnb") => None,
        _ => {
            return Err(RiffError::UnrecognizedContainer(format!(
                "extension '{}' is not handled by the {} parser",
                ext, kind
            )))
        }
    };
    Ok(family)
}

/// Extensions shared with the Wwise tooling that also reuses the MS ADPCM ids
pub fn is_generic_extension(ext: &str) -> bool {
    matches!(ext, "wav" | "lwav")
}
