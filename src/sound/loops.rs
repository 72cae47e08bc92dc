//! Loop point extraction
//!
//! Three independent records can carry a loop: `labl` markers inside a
//! `LIST/adtl`, a `smpl` sampler record, and the Level-5 `ctrl` record.
//! Each sub-extractor yields a candidate; [`LoopCandidates::reconcile`]
//! picks one.

use std::sync::OnceLock;

use regex::bytes::Regex;

use super::chunk::{ChunkRecord, FourCc};
use super::error::{ParseResult, RiffError};
use super::source::ByteReader;

const ADTL_LIST: FourCc = FourCc(*b"adtl");
const LABL_ID: FourCc = FourCc(*b"labl");

const LABEL_LOOP_START: u32 = 1;
const LABEL_LOOP_END: u32 = 2;

// smpl layout, relative to the payload
const SMPL_LOOP_COUNT: u64 = 0x1C;
const SMPL_LOOP_TYPE: u64 = 0x28;
const SMPL_LOOP_START: u64 = 0x2C;
const SMPL_LOOP_END: u64 = 0x30;
const SMPL_ONE_LOOP_SIZE: u64 = 0x34;
const SMPL_LOOP_FORWARD: u32 = 0;

/// Which record a loop window came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSource {
    LabelPair,
    SampleLoop,
    Control,
}

/// Loop region in samples, `start_sample <= end_sample`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopWindow {
    pub start_sample: u64,
    pub end_sample: u64,
    pub source: LoopSource,
}

impl LoopWindow {
    fn normalized(mut self) -> Self {
        if self.start_sample > self.end_sample {
            std::mem::swap(&mut self.start_sample, &mut self.end_sample);
        }
        self
    }
}

/// Start/end markers in milliseconds, both present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPair {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Forward loop from a `smpl` record, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLoop {
    pub start: u32,
    pub end: u32,
}

/// Level-5 loop-to-end control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLoop {
    pub start: u32,
}

/// Candidates gathered while walking, one slot per source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopCandidates {
    pub labels: Option<LabelPair>,
    pub sample: Option<SampleLoop>,
    pub control: Option<ControlLoop>,
}

impl LoopCandidates {
    /// Select one window: labels, then `smpl`, then `ctrl`.
    ///
    /// Label times are converted with `floor(ms * sample_rate / 1000)`;
    /// a control loop ends at `total_samples`.
    pub fn reconcile(&self, sample_rate: u32, total_samples: u64) -> ParseResult<Option<LoopWindow>> {
        let window = if let Some(labels) = self.labels {
            LoopWindow {
                start_sample: ms_to_samples(labels.start_ms, sample_rate)?,
                end_sample: ms_to_samples(labels.end_ms, sample_rate)?,
                source: LoopSource::LabelPair,
            }
        } else if let Some(smpl) = self.sample {
            LoopWindow {
                start_sample: smpl.start as u64,
                end_sample: smpl.end as u64,
                source: LoopSource::SampleLoop,
            }
        } else if let Some(ctrl) = self.control {
            LoopWindow {
                start_sample: ctrl.start as u64,
                end_sample: total_samples,
                source: LoopSource::Control,
            }
        } else {
            return Ok(None);
        };

        let window = window.normalized();
        log::debug!(
            "loop {:?}: {}..{}",
            window.source,
            window.start_sample,
            window.end_sample
        );
        Ok(Some(window))
    }
}

fn ms_to_samples(ms: u64, sample_rate: u32) -> ParseResult<u64> {
    ms.checked_mul(sample_rate as u64)
        .map(|v| v / 1000)
        .ok_or_else(|| RiffError::InvalidLoopData(format!("marker at {} ms overflows", ms)))
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^Marker ([0-9]+):([0-9]+):([0-9]+)\.([0-9]+)").expect("marker pattern is valid")
    })
}

/// Parse label text of the form `Marker HH:MM:SS.mmm` into milliseconds.
///
/// Returns `None` for any other text.
pub fn parse_marker(text: &[u8]) -> Option<u64> {
    let caps = marker_regex().captures(text)?;
    let field = |i: usize| -> Option<u64> {
        std::str::from_utf8(caps.get(i)?.as_bytes())
            .ok()?
            .parse()
            .ok()
    };
    let (hh, mm, ss, ms) = (field(1)?, field(2)?, field(3)?, field(4)?);

    hh.checked_mul(60)?
        .checked_add(mm)?
        .checked_mul(60)?
        .checked_add(ss)?
        .checked_mul(1000)?
        .checked_add(ms)
}

/// Scan a `LIST` record for an `adtl` label pair.
///
/// A sub-chunk overrunning the list ends the scan and discards any
/// markers found so far. Returns `None` unless both a start and an end
/// marker were found.
pub fn read_label_list(reader: &ByteReader<'_>, list: &ChunkRecord) -> ParseResult<Option<LabelPair>> {
    if list.length < 4 || reader.tag(list.payload)? != ADTL_LIST {
        return Ok(None);
    }

    let end = list.payload_end();
    let mut offset = list.payload + 4;
    let mut start_ms = None;
    let mut end_ms = None;

    while offset < end {
        if offset + 8 > end {
            log::warn!("adtl list at 0x{:x} ends mid-record, labels ignored", list.offset);
            return Ok(None);
        }
        let tag = reader.tag(offset)?;
        let size = reader.u32(offset + 4)? as u64;
        if offset + 8 + size > end {
            log::warn!("'{}' at 0x{:x} overruns its adtl list, labels ignored", tag, offset);
            return Ok(None);
        }

        if tag == LABL_ID && size >= 4 {
            let purpose = reader.u32(offset + 8)?;
            let slot = match purpose {
                LABEL_LOOP_START => Some(&mut start_ms),
                LABEL_LOOP_END => Some(&mut end_ms),
                _ => None,
            };
            if let Some(slot) = slot.filter(|s| s.is_none()) {
                let text = reader.bytes(offset + 12, (size - 4) as usize)?;
                match parse_marker(&text) {
                    Some(ms) => *slot = Some(ms),
                    None => log::warn!(
                        "label '{}' is not a marker, ignored",
                        String::from_utf8_lossy(&text).trim_end_matches('\0')
                    ),
                }
            }
        }

        offset += 8 + size;
    }

    Ok(match (start_ms, end_ms) {
        (Some(start_ms), Some(end_ms)) => Some(LabelPair { start_ms, end_ms }),
        _ => None,
    })
}

/// Read the single forward loop of a `smpl` record, if it declares exactly one
pub fn read_sample_loop(reader: &ByteReader<'_>, record: &ChunkRecord) -> ParseResult<Option<SampleLoop>> {
    let length = record.length as u64;
    if length < SMPL_LOOP_COUNT + 4 {
        return Ok(None);
    }
    if reader.u32(record.payload + SMPL_LOOP_COUNT)? != 1 {
        return Ok(None);
    }
    if length < SMPL_ONE_LOOP_SIZE {
        return Err(RiffError::InvalidLoopData(format!(
            "smpl record of {} bytes cannot hold its loop",
            length
        )));
    }
    if reader.u32(record.payload + SMPL_LOOP_TYPE)? != SMPL_LOOP_FORWARD {
        return Ok(None);
    }

    Ok(Some(SampleLoop {
        start: reader.u32(record.payload + SMPL_LOOP_START)?,
        end: reader.u32(record.payload + SMPL_LOOP_END)?,
    }))
}

/// Read a Level-5 `ctrl` record; a zero flag means no loop
pub fn read_control(reader: &ByteReader<'_>, record: &ChunkRecord) -> ParseResult<Option<ControlLoop>> {
    if record.length < 4 || reader.u32(record.payload)? == 0 {
        return Ok(None);
    }
    if record.length < 8 {
        return Err(RiffError::InvalidLoopData(format!(
            "ctrl record of {} bytes has no loop start",
            record.length
        )));
    }
    Ok(Some(ControlLoop {
        start: reader.u32(record.payload + 4)?,
    }))
}
