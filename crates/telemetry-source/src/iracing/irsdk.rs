//! IRSDK memory-map layout and safe parsing over a [`MemoryView`].
//!
//! The map starts with a 112-byte header describing up to four rotating
//! telemetry rows, an array of 144-byte variable headers and a YAML session
//! string. Everything is read by copying out of the view, then parsed from
//! owned bytes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::record::{FieldError, SessionInfo, TelemetryRecord};

pub const HEADER_LEN: usize = 112;
pub const VAR_HEADER_LEN: usize = 144;
pub const VAR_NAME_LEN: usize = 32;
pub const MAX_BUFS: usize = 4;
pub const MAX_VARS: i32 = 4096;
pub const STATUS_CONNECTED: i32 = 0x1;

const VAR_BUF_TABLE: usize = 48;
const VAR_BUF_ENTRY_LEN: usize = 16;
const VAR_NAME_OFFSET: usize = 16;
const STABLE_READ_ATTEMPTS: usize = 3;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrsdkError {
    #[error("IRSDK header has no telemetry buffers (num_buf={0})")]
    NoBuffers(i32),

    #[error("IRSDK header reports too many buffers: {0}")]
    TooManyBuffers(i32),

    #[error("IRSDK header reports invalid buffer length: {0}")]
    InvalidBufferLength(i32),

    #[error("IRSDK header reports invalid variable count: {0}")]
    InvalidVarCount(i32),

    #[error("IRSDK {what} offset is negative: {value}")]
    NegativeOffset { what: &'static str, value: i32 },

    #[error("IRSDK read of {len} bytes at {offset} is outside the mapped view")]
    OutOfBounds { offset: usize, len: usize },

    #[error("no stable IRSDK telemetry row after {0} attempts")]
    UnstableRow(usize),
}

/// Read-only access to an IRSDK memory image.
pub trait MemoryView: Send {
    /// Readable size in bytes.
    fn size(&self) -> usize;

    /// Copy `dst.len()` bytes starting at `offset`. Returns false when the
    /// range is outside the view, leaving `dst` unspecified.
    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> bool;

    /// Block until the simulator signals a new row or `timeout` elapses.
    fn wait_for_data(&self, timeout: Duration) {
        std::thread::sleep(timeout);
    }
}

/// Opens the simulator's memory image if it is currently published.
pub trait MemoryOpener: Send {
    fn open(&mut self) -> Option<Box<dyn MemoryView>>;
}

fn i32_at(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    if let Some(src) = bytes.get(offset..offset.saturating_add(4)) {
        raw.copy_from_slice(src);
    }
    i32::from_le_bytes(raw)
}

fn copy_exact(view: &dyn MemoryView, offset: usize, dst: &mut [u8]) -> Result<(), IrsdkError> {
    if view.copy_to(offset, dst) {
        Ok(())
    } else {
        Err(IrsdkError::OutOfBounds {
            offset,
            len: dst.len(),
        })
    }
}

fn non_negative(what: &'static str, value: i32) -> Result<usize, IrsdkError> {
    usize::try_from(value).map_err(|_| IrsdkError::NegativeOffset { what, value })
}

/// Null-terminated ISO-8859-1 string.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    bytes
        .iter()
        .take(end)
        .map(|byte| char::from(*byte))
        .collect()
}

/// One rotating telemetry row descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarBuf {
    pub tick_count: i32,
    pub buf_offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrsdkHeader {
    pub ver: i32,
    pub status: i32,
    pub tick_rate: i32,
    pub session_info_update: i32,
    pub session_info_len: i32,
    pub session_info_offset: i32,
    pub num_vars: i32,
    pub var_header_offset: i32,
    pub num_buf: i32,
    pub buf_len: i32,
    pub var_buf: [VarBuf; MAX_BUFS],
}

impl IrsdkHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let mut var_buf = [VarBuf::default(); MAX_BUFS];
        for (index, entry) in var_buf.iter_mut().enumerate() {
            let base = VAR_BUF_TABLE + index * VAR_BUF_ENTRY_LEN;
            *entry = VarBuf {
                tick_count: i32_at(bytes, base),
                buf_offset: i32_at(bytes, base + 4),
            };
        }
        Self {
            ver: i32_at(bytes, 0),
            status: i32_at(bytes, 4),
            tick_rate: i32_at(bytes, 8),
            session_info_update: i32_at(bytes, 12),
            session_info_len: i32_at(bytes, 16),
            session_info_offset: i32_at(bytes, 20),
            num_vars: i32_at(bytes, 24),
            var_header_offset: i32_at(bytes, 28),
            num_buf: i32_at(bytes, 32),
            buf_len: i32_at(bytes, 36),
            var_buf,
        }
    }

    pub fn read(view: &dyn MemoryView) -> Result<Self, IrsdkError> {
        let mut bytes = [0u8; HEADER_LEN];
        copy_exact(view, 0, &mut bytes)?;
        Ok(Self::parse(&bytes))
    }

    pub fn is_connected(&self) -> bool {
        self.status & STATUS_CONNECTED != 0
    }

    pub fn validate(&self) -> Result<(), IrsdkError> {
        if self.num_buf <= 0 {
            return Err(IrsdkError::NoBuffers(self.num_buf));
        }
        if usize::try_from(self.num_buf).map_or(true, |n| n > MAX_BUFS) {
            return Err(IrsdkError::TooManyBuffers(self.num_buf));
        }
        if self.buf_len <= 0 {
            return Err(IrsdkError::InvalidBufferLength(self.buf_len));
        }
        if self.num_vars <= 0 || self.num_vars > MAX_VARS {
            return Err(IrsdkError::InvalidVarCount(self.num_vars));
        }
        non_negative("variable header", self.var_header_offset)?;
        Ok(())
    }

    /// The row with the highest tick count.
    pub fn latest_buffer(&self) -> Option<VarBuf> {
        let count = usize::try_from(self.num_buf).ok()?;
        self.var_buf
            .iter()
            .take(count.min(MAX_BUFS))
            .copied()
            .max_by_key(|buf| buf.tick_count)
    }

    /// Changes whenever the variable layout may have moved.
    pub fn layout_signature(&self) -> (i32, i32, i32, i32) {
        (self.num_vars, self.var_header_offset, self.num_buf, self.buf_len)
    }

    /// Simulator tick period, 16 ms when the header does not say.
    pub fn tick_interval(&self) -> Duration {
        match u32::try_from(self.tick_rate) {
            Ok(rate) if rate > 0 => Duration::from_secs(1) / rate,
            _ => DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Char,
    Bool,
    Int,
    BitField,
    Float,
    Double,
}

impl VarType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Char,
            1 => Self::Bool,
            2 => Self::Int,
            3 => Self::BitField,
            4 => Self::Float,
            5 => Self::Double,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::Bool => 1,
            Self::Int | Self::BitField | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::BitField => "bitfield",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

/// Where a variable lives inside a telemetry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarBinding {
    pub var_type: VarType,
    pub offset: usize,
    pub count: usize,
}

fn binding_from_header(entry: &[u8], buf_len: usize) -> Option<(String, VarBinding)> {
    let var_type = VarType::from_raw(i32_at(entry, 0))?;
    let offset = usize::try_from(i32_at(entry, 4)).ok()?;
    let count = usize::try_from(i32_at(entry, 8)).ok()?;
    if count == 0 {
        return None;
    }
    let end = var_type
        .size()
        .checked_mul(count)
        .and_then(|len| offset.checked_add(len))?;
    if end > buf_len {
        return None;
    }
    let name = decode_latin1(entry.get(VAR_NAME_OFFSET..VAR_NAME_OFFSET + VAR_NAME_LEN)?);
    Some((
        name,
        VarBinding {
            var_type,
            offset,
            count,
        },
    ))
}

/// Variable name to row binding, rebuilt when the header layout changes.
#[derive(Debug, Clone, Default)]
pub struct VarLayout {
    bindings: HashMap<String, VarBinding>,
}

impl VarLayout {
    pub fn read(view: &dyn MemoryView, header: &IrsdkHeader) -> Result<Self, IrsdkError> {
        header.validate()?;
        let num_vars = non_negative("variable count", header.num_vars)?;
        let start = non_negative("variable header", header.var_header_offset)?;
        let buf_len = non_negative("buffer length", header.buf_len)?;

        let mut table = vec![0u8; num_vars * VAR_HEADER_LEN];
        copy_exact(view, start, &mut table)?;

        let bindings = table
            .chunks_exact(VAR_HEADER_LEN)
            .filter_map(|entry| binding_from_header(entry, buf_len))
            .collect();
        Ok(Self { bindings })
    }

    pub fn get(&self, name: &str) -> Option<VarBinding> {
        self.bindings.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Copy the newest telemetry row into `row`, retrying if the simulator
/// rotated buffers mid-copy. Returns the header observed after the copy and
/// the row's tick count.
pub fn read_stable_row(
    view: &dyn MemoryView,
    row: &mut Vec<u8>,
) -> Result<(IrsdkHeader, i32), IrsdkError> {
    for _ in 0..STABLE_READ_ATTEMPTS {
        let before = IrsdkHeader::read(view)?;
        before.validate()?;
        let latest = before
            .latest_buffer()
            .ok_or(IrsdkError::NoBuffers(before.num_buf))?;
        let offset = non_negative("buffer", latest.buf_offset)?;
        let len = non_negative("buffer length", before.buf_len)?;

        row.resize(len, 0);
        copy_exact(view, offset, row)?;

        let after = IrsdkHeader::read(view)?;
        if after.latest_buffer() == Some(latest) && after.buf_len == before.buf_len {
            return Ok((after, latest.tick_count));
        }
    }
    Err(IrsdkError::UnstableRow(STABLE_READ_ATTEMPTS))
}

/// The session YAML block, decoded as ISO-8859-1. `None` when empty.
pub fn read_session_yaml(view: &dyn MemoryView, header: &IrsdkHeader) -> Option<String> {
    let offset = usize::try_from(header.session_info_offset).ok()?;
    let len = usize::try_from(header.session_info_len).ok()?;
    if len == 0 {
        return None;
    }
    let mut bytes = vec![0u8; len];
    if !view.copy_to(offset, &mut bytes) {
        return None;
    }
    Some(decode_latin1(&bytes))
}

/// One copied telemetry row with the layout needed to read it.
#[derive(Debug, Clone, Default)]
pub struct IrsdkFrame {
    pub(crate) row: Vec<u8>,
    pub(crate) layout: Arc<VarLayout>,
    pub(crate) session: Option<SessionInfo>,
}

impl IrsdkFrame {
    fn bytes<const N: usize>(&self, name: &str, binding: VarBinding) -> Result<[u8; N], FieldError> {
        let mut out = [0u8; N];
        let src = self
            .row
            .get(binding.offset..binding.offset.saturating_add(N))
            .ok_or_else(|| FieldError::OutOfBounds {
                name: name.to_string(),
            })?;
        out.copy_from_slice(src);
        Ok(out)
    }

    fn binding(&self, name: &str) -> Result<VarBinding, FieldError> {
        self.layout.get(name).ok_or_else(|| FieldError::missing(name))
    }

    fn unsupported(name: &str, var_type: VarType) -> FieldError {
        FieldError::Unsupported {
            name: name.to_string(),
            var_type: var_type.name(),
        }
    }
}

impl TelemetryRecord for IrsdkFrame {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        reason = "IRSDK numeric conversions mirror the SDK's own accessors"
    )]
    fn float(&self, name: &str) -> Result<f32, FieldError> {
        let binding = self.binding(name)?;
        Ok(match binding.var_type {
            VarType::Float => f32::from_le_bytes(self.bytes(name, binding)?),
            VarType::Double => f64::from_le_bytes(self.bytes(name, binding)?) as f32,
            VarType::Int | VarType::BitField => {
                i32::from_le_bytes(self.bytes(name, binding)?) as f32
            }
            VarType::Bool => {
                let [b] = self.bytes::<1>(name, binding)?;
                if b == 0 { 0.0 } else { 1.0 }
            }
            VarType::Char => return Err(Self::unsupported(name, binding.var_type)),
        })
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "float variables read as int saturate like the SDK"
    )]
    fn int(&self, name: &str) -> Result<i32, FieldError> {
        let binding = self.binding(name)?;
        Ok(match binding.var_type {
            VarType::Int | VarType::BitField => i32::from_le_bytes(self.bytes(name, binding)?),
            VarType::Bool => {
                let [b] = self.bytes::<1>(name, binding)?;
                i32::from(b != 0)
            }
            VarType::Float => f32::from_le_bytes(self.bytes(name, binding)?) as i32,
            VarType::Double => f64::from_le_bytes(self.bytes(name, binding)?) as i32,
            VarType::Char => return Err(Self::unsupported(name, binding.var_type)),
        })
    }

    fn boolean(&self, name: &str) -> Result<bool, FieldError> {
        let binding = self.binding(name)?;
        Ok(match binding.var_type {
            VarType::Bool => {
                let [b] = self.bytes::<1>(name, binding)?;
                b != 0
            }
            VarType::Int | VarType::BitField => i32::from_le_bytes(self.bytes(name, binding)?) != 0,
            VarType::Float => f32::from_le_bytes(self.bytes(name, binding)?).abs() > f32::EPSILON,
            VarType::Double => f64::from_le_bytes(self.bytes(name, binding)?).abs() > f64::EPSILON,
            VarType::Char => return Err(Self::unsupported(name, binding.var_type)),
        })
    }

    fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }
}
