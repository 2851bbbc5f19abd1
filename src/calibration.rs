//! Calibration Slot Records
//!
//! Layout of one slot:
//!
//! ```text
//! +0   header (32 bytes)
//!        magic "VNAC" | version u16 | points u16 | start_hz u32 | stop_hz u32
//!        flags u32 | crc32 u32 | reserved (8 x 0xFF)
//! +32  points x 20 bytes
//!        frequency_hz u32 | s11.re | s11.im | s21.re | s21.im   (f32)
//! ```
//!
//! All fields little-endian. The header is written last, so a save that
//! fails part way leaves a slot without a valid magic.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::config::flash::{CAL_POINT_BYTES, CAL_RECORD_BYTES};
use crate::config::SWEEP_POINTS_MAX;
use crate::flash::{FlashDevice, FlashError, FlashStore};
use crate::types::{Complex, ResultPoint};

/// CRC-32 (ISO HDLC, as used by Ethernet and ZIP)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Header magic
pub const MAGIC: [u8; 4] = *b"VNAC";

/// Record format version
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = CAL_RECORD_BYTES as usize;
const POINT_LEN: usize = CAL_POINT_BYTES as usize;

/// Slot holds a gain reference capture
pub const FLAG_GAIN_REFERENCE: u32 = 1 << 0;

/// Calibration record header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationHeader {
    /// Number of stored points
    pub points: u16,
    /// First frequency in Hz
    pub start_hz: u32,
    /// Last frequency in Hz
    pub stop_hz: u32,
    /// `FLAG_*` bits
    pub flags: u32,
    /// CRC-32 of the serialized point array
    pub crc32: u32,
}

impl CalibrationHeader {
    /// Serialize to the on-flash form
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0xFF; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&VERSION.to_le_bytes());
        out[6..8].copy_from_slice(&self.points.to_le_bytes());
        out[8..12].copy_from_slice(&self.start_hz.to_le_bytes());
        out[12..16].copy_from_slice(&self.stop_hz.to_le_bytes());
        out[16..20].copy_from_slice(&self.flags.to_le_bytes());
        out[20..24].copy_from_slice(&self.crc32.to_le_bytes());
        out
    }

    /// Parse the on-flash form, `None` on bad magic or version
    #[must_use]
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        if bytes[0..4] != MAGIC || le_u16(&bytes[4..6]) != VERSION {
            return None;
        }
        Some(Self {
            points: le_u16(&bytes[6..8]),
            start_hz: le_u32(&bytes[8..12]),
            stop_hz: le_u32(&bytes[12..16]),
            flags: le_u32(&bytes[16..20]),
            crc32: le_u32(&bytes[20..24]),
        })
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for CalibrationHeader {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Cal({} pts, {}..{} Hz, flags {=u32:#x}, crc {=u32:#x})",
            self.points,
            self.start_hz,
            self.stop_hz,
            self.flags,
            self.crc32
        );
    }
}

/// Result of [`verify_slot`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// No valid header
    Empty,
    /// Header and point array intact
    Valid(CalibrationHeader),
    /// Header present but the point array does not match its CRC
    Corrupt(CalibrationHeader),
}

/// Serialize one calibration point
#[must_use]
pub fn encode_point(point: &ResultPoint) -> [u8; POINT_LEN] {
    let mut out = [0u8; POINT_LEN];
    out[0..4].copy_from_slice(&point.frequency_hz.to_le_bytes());
    out[4..8].copy_from_slice(&point.s11.re.to_le_bytes());
    out[8..12].copy_from_slice(&point.s11.im.to_le_bytes());
    out[12..16].copy_from_slice(&point.s21.re.to_le_bytes());
    out[16..20].copy_from_slice(&point.s21.im.to_le_bytes());
    out
}

/// Parse one calibration point
#[must_use]
pub fn decode_point(bytes: &[u8; POINT_LEN]) -> ResultPoint {
    let f = |r: core::ops::Range<usize>| f32::from_bits(le_u32(&bytes[r]));
    ResultPoint::new(
        le_u32(&bytes[0..4]),
        Complex::new(f(4..8), f(8..12)),
        Complex::new(f(12..16), f(16..20)),
    )
}

/// CRC-32 over the serialized form of `points`
#[must_use]
pub fn points_crc(points: &[ResultPoint]) -> u32 {
    let mut digest = CRC32.digest();
    for point in points {
        digest.update(&encode_point(point));
    }
    digest.finalize()
}

/// Erase `slot` and store `points` with a fresh header
///
/// # Errors
///
/// [`FlashError::InvalidSlot`], [`FlashError::OutOfRange`] for more than
/// `SWEEP_POINTS_MAX` points, or the first erase/program failure.
pub fn save_slot<F: FlashDevice>(
    store: &mut FlashStore<F>,
    slot: usize,
    flags: u32,
    points: &[ResultPoint],
) -> Result<CalibrationHeader, FlashError> {
    let base = FlashStore::<F>::savearea_addr(slot)?;
    if points.len() > SWEEP_POINTS_MAX {
        return Err(FlashError::OutOfRange);
    }
    #[allow(clippy::cast_possible_truncation)]
    let header = CalibrationHeader {
        points: points.len() as u16,
        start_hz: points.first().map_or(0, |p| p.frequency_hz),
        stop_hz: points.last().map_or(0, |p| p.frequency_hz),
        flags,
        crc32: points_crc(points),
    };

    let mut session = store.unlock()?;
    session.erase_savearea(slot)?;
    let mut address = base + CAL_RECORD_BYTES;
    for point in points {
        session.program_block(address, &encode_point(point))?;
        address += CAL_POINT_BYTES;
    }
    session.program_block(base, &header.to_bytes())?;
    drop(session);

    info!("calibration slot {} saved, {} points", slot, header.points);
    Ok(header)
}

/// Read the header of `slot`
///
/// Returns `Ok(None)` if the slot holds no valid record.
///
/// # Errors
///
/// [`FlashError::InvalidSlot`] or a read failure.
pub fn load_header<F: FlashDevice>(
    store: &mut FlashStore<F>,
    slot: usize,
) -> Result<Option<CalibrationHeader>, FlashError> {
    let base = FlashStore::<F>::savearea_addr(slot)?;
    let mut raw = [0u8; HEADER_LEN];
    store.read_block(base, &mut raw)?;
    Ok(CalibrationHeader::from_bytes(&raw))
}

/// Read point `index` of `slot`
///
/// # Errors
///
/// [`FlashError::InvalidSlot`], [`FlashError::OutOfRange`] beyond the slot
/// capacity, or a read failure.
pub fn load_point<F: FlashDevice>(
    store: &mut FlashStore<F>,
    slot: usize,
    index: usize,
) -> Result<ResultPoint, FlashError> {
    let base = FlashStore::<F>::savearea_addr(slot)?;
    if index >= SWEEP_POINTS_MAX {
        return Err(FlashError::OutOfRange);
    }
    #[allow(clippy::cast_possible_truncation)]
    let address = base + CAL_RECORD_BYTES + index as u32 * CAL_POINT_BYTES;
    let mut raw = [0u8; POINT_LEN];
    store.read_block(address, &mut raw)?;
    Ok(decode_point(&raw))
}

/// Check the header and CRC of `slot`
///
/// # Errors
///
/// [`FlashError::InvalidSlot`] or a read failure.
pub fn verify_slot<F: FlashDevice>(
    store: &mut FlashStore<F>,
    slot: usize,
) -> Result<SlotState, FlashError> {
    let Some(header) = load_header(store, slot)? else {
        return Ok(SlotState::Empty);
    };
    if usize::from(header.points) > SWEEP_POINTS_MAX {
        return Ok(SlotState::Corrupt(header));
    }
    let mut digest = CRC32.digest();
    for index in 0..usize::from(header.points) {
        let point = load_point(store, slot, index)?;
        digest.update(&encode_point(&point));
    }
    if digest.finalize() == header.crc32 {
        Ok(SlotState::Valid(header))
    } else {
        warn!("calibration slot {} CRC mismatch", slot);
        Ok(SlotState::Corrupt(header))
    }
}

fn le_u16(bytes: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(bytes);
    u16::from_le_bytes(raw)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}
