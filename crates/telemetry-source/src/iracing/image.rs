//! In-memory IRSDK images.
//!
//! [`IrsdkImage`] lays out a header, variable headers, rotating rows and a
//! session string exactly as the simulator does, so the IRSDK reader and
//! [`IRacingFeed`](super::IRacingFeed) can run without iRacing. Used by the
//! test suites and for replaying captured frames.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::irsdk::{
    HEADER_LEN, MAX_BUFS, MemoryOpener, MemoryView, STATUS_CONNECTED, VAR_HEADER_LEN,
    VAR_NAME_LEN, VarType,
};
use crate::record::{FieldValue, RecordMap, SessionInfo};

const ROW_ALIGN: usize = 16;
const DEFAULT_NUM_BUF: usize = 3;
const DEFAULT_TICK_RATE: i32 = 60;

mod header {
    pub const VER: usize = 0;
    pub const STATUS: usize = 4;
    pub const TICK_RATE: usize = 8;
    pub const SESSION_UPDATE: usize = 12;
    pub const SESSION_LEN: usize = 16;
    pub const SESSION_OFFSET: usize = 20;
    pub const NUM_VARS: usize = 24;
    pub const VAR_HEADER_OFFSET: usize = 28;
    pub const NUM_BUF: usize = 32;
    pub const BUF_LEN: usize = 36;
    pub const VAR_BUF: usize = 48;
    pub const VAR_BUF_STRIDE: usize = 16;
}

/// A typed value stored in an image row.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Text(String),
    Bool(bool),
    Int(i32),
    BitField(i32),
    Float(f32),
    Double(f64),
}

impl VarValue {
    fn var_type(&self) -> VarType {
        match self {
            Self::Text(_) => VarType::Char,
            Self::Bool(_) => VarType::Bool,
            Self::Int(_) => VarType::Int,
            Self::BitField(_) => VarType::BitField,
            Self::Float(_) => VarType::Float,
            Self::Double(_) => VarType::Double,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            Self::Bool(value) => vec![u8::from(*value)],
            Self::Int(value) | Self::BitField(value) => value.to_le_bytes().to_vec(),
            Self::Float(value) => value.to_le_bytes().to_vec(),
            Self::Double(value) => value.to_le_bytes().to_vec(),
        }
    }
}

impl From<&FieldValue> for VarValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Float(v) => Self::Float(*v),
            FieldValue::Int(v) => Self::Int(*v),
            FieldValue::Bool(v) => Self::Bool(*v),
            FieldValue::Text(v) => Self::Text(v.clone()),
        }
    }
}

/// Session YAML in the shape the simulator publishes.
pub fn session_yaml(info: &SessionInfo) -> String {
    let mut yaml = String::from("---\nWeekendInfo:\n TrackName: synthetic\nDriverInfo:\n");
    if let Some(red_line) = info.red_line_rpm {
        yaml.push_str(&format!(" DriverCarRedLine: {red_line:.3}\n"));
    }
    if let Some(count) = info.roster_size {
        yaml.push_str(" Drivers:\n");
        for idx in 0..count {
            yaml.push_str(&format!(" - CarIdx: {idx}\n   UserName: Driver {idx}\n"));
        }
    }
    yaml.push_str("...\n");
    yaml
}

#[derive(Debug, Clone)]
struct RawVarHeader {
    var_type: i32,
    offset: i32,
    count: i32,
    name: String,
}

#[derive(Debug, Clone)]
pub struct IrsdkImageBuilder {
    tick_rate: i32,
    connected: bool,
    num_buf: usize,
    vars: Vec<(String, VarValue)>,
    raw: Vec<RawVarHeader>,
    session: Vec<u8>,
}

impl Default for IrsdkImageBuilder {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            connected: true,
            num_buf: DEFAULT_NUM_BUF,
            vars: Vec::new(),
            raw: Vec::new(),
            session: Vec::new(),
        }
    }
}

impl IrsdkImageBuilder {
    pub fn tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    /// Number of rotating rows, clamped to 1..=4.
    pub fn buffers(mut self, num_buf: usize) -> Self {
        self.num_buf = num_buf.clamp(1, MAX_BUFS);
        self
    }

    pub fn var(mut self, name: &str, value: VarValue) -> Self {
        self.vars.push((name.to_string(), value));
        self
    }

    /// A variable header written verbatim, for malformed layouts.
    pub fn raw_var_header(mut self, var_type: i32, offset: i32, count: i32, name: &str) -> Self {
        self.raw.push(RawVarHeader {
            var_type,
            offset,
            count,
            name: name.to_string(),
        });
        self
    }

    pub fn session_bytes(mut self, bytes: &[u8]) -> Self {
        self.session = bytes.to_vec();
        self
    }

    pub fn session_yaml(self, yaml: &str) -> Self {
        self.session_bytes(yaml.as_bytes())
    }

    /// Every field of `record` as a variable, plus its session metadata.
    pub fn record(mut self, record: &RecordMap) -> Self {
        for (name, value) in record.fields() {
            self = self.var(name, VarValue::from(value));
        }
        match record.session_info() {
            Some(info) => self.session_yaml(&session_yaml(info)),
            None => self,
        }
    }

    pub fn build(self) -> IrsdkImage {
        let mut image = IrsdkImage {
            memory: Arc::new(Mutex::new(Vec::new())),
            published: Arc::new(AtomicBool::new(true)),
            opens: Arc::new(AtomicUsize::new(0)),
            slots: HashMap::new(),
            staged: Vec::new(),
            row_offsets: Vec::new(),
            session_offset: 0,
            session_update: 0,
            tick: 0,
            next_buf: 0,
        };
        image.lay_out(self);
        image
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    len: usize,
}

/// A simulator memory image shared with any number of views.
#[derive(Debug)]
pub struct IrsdkImage {
    memory: Arc<Mutex<Vec<u8>>>,
    published: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
    slots: HashMap<String, Slot>,
    staged: Vec<u8>,
    row_offsets: Vec<usize>,
    session_offset: usize,
    session_update: i32,
    tick: i32,
    next_buf: usize,
}

fn put(memory: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(dst) = memory.get_mut(offset..offset.saturating_add(bytes.len())) {
        dst.copy_from_slice(bytes);
    }
}

fn put_i32(memory: &mut [u8], offset: usize, value: i32) {
    put(memory, offset, &value.to_le_bytes());
}

fn as_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn align(value: usize) -> usize {
    value.div_ceil(ROW_ALIGN) * ROW_ALIGN
}

fn var_header_entry(var_type: i32, offset: i32, count: i32, name: &str) -> [u8; VAR_HEADER_LEN] {
    let mut entry = [0u8; VAR_HEADER_LEN];
    put_i32(&mut entry, 0, var_type);
    put_i32(&mut entry, 4, offset);
    put_i32(&mut entry, 8, count);
    let name = name.as_bytes();
    let len = name.len().min(VAR_NAME_LEN - 1);
    put(&mut entry, 16, name.get(..len).unwrap_or_default());
    entry
}

fn raw_type(var_type: VarType) -> i32 {
    match var_type {
        VarType::Char => 0,
        VarType::Bool => 1,
        VarType::Int => 2,
        VarType::BitField => 3,
        VarType::Float => 4,
        VarType::Double => 5,
    }
}

impl IrsdkImage {
    pub fn builder() -> IrsdkImageBuilder {
        IrsdkImageBuilder::default()
    }

    fn lay_out(&mut self, builder: IrsdkImageBuilder) {
        let num_vars = builder.vars.len() + builder.raw.len();
        let rows_start = align(HEADER_LEN + num_vars * VAR_HEADER_LEN);

        let mut entries = Vec::with_capacity(num_vars);
        let mut slots = HashMap::new();
        let mut staged = Vec::new();
        for (name, value) in &builder.vars {
            let bytes = value.encode();
            let var_type = value.var_type();
            let count = bytes.len() / var_type.size();
            let offset = staged.len();
            staged.extend_from_slice(&bytes);
            entries.push(var_header_entry(
                raw_type(var_type),
                as_i32(offset),
                as_i32(count),
                name,
            ));
            slots.insert(
                name.clone(),
                Slot {
                    offset,
                    len: bytes.len(),
                },
            );
        }
        for raw in &builder.raw {
            entries.push(var_header_entry(raw.var_type, raw.offset, raw.count, &raw.name));
        }

        let buf_len = align(staged.len().max(1));
        staged.resize(buf_len, 0);
        let row_offsets: Vec<usize> = (0..builder.num_buf)
            .map(|index| rows_start + index * buf_len)
            .collect();
        let session_offset = rows_start + builder.num_buf * buf_len;

        let mut memory = vec![0u8; session_offset + builder.session.len()];
        put_i32(&mut memory, header::VER, 2);
        put_i32(&mut memory, header::TICK_RATE, builder.tick_rate);
        put_i32(&mut memory, header::NUM_VARS, as_i32(num_vars));
        put_i32(&mut memory, header::VAR_HEADER_OFFSET, as_i32(HEADER_LEN));
        put_i32(&mut memory, header::NUM_BUF, as_i32(builder.num_buf));
        put_i32(&mut memory, header::BUF_LEN, as_i32(buf_len));
        for (index, entry) in entries.iter().enumerate() {
            put(&mut memory, HEADER_LEN + index * VAR_HEADER_LEN, entry);
        }
        for (index, offset) in row_offsets.iter().enumerate() {
            let slot = header::VAR_BUF + index * header::VAR_BUF_STRIDE;
            put_i32(&mut memory, slot + 4, as_i32(*offset));
        }

        *self.memory.lock() = memory;
        self.slots = slots;
        self.staged = staged;
        self.row_offsets = row_offsets;
        self.session_offset = session_offset;
        self.next_buf = 0;

        self.set_connected(builder.connected);
        self.write_session(&builder.session);
        self.commit();
    }

    /// Replace the whole layout in place, as the simulator does when a new
    /// session loads. Existing views see the new layout.
    pub fn rebuild(&mut self, builder: IrsdkImageBuilder) {
        self.lay_out(builder);
    }

    /// A view over the shared memory.
    pub fn view(&self) -> ImageView {
        ImageView {
            memory: Arc::clone(&self.memory),
        }
    }

    /// An opener that hands out views while the image is published.
    pub fn opener(&self) -> ImageOpener {
        ImageOpener {
            memory: Arc::clone(&self.memory),
            published: Arc::clone(&self.published),
            opens: Arc::clone(&self.opens),
        }
    }

    /// Whether openers can map the image.
    pub fn set_published(&self, published: bool) {
        self.published.store(published, Ordering::Release);
    }

    /// Successful opens across all openers.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        let status = if connected { STATUS_CONNECTED } else { 0 };
        put_i32(&mut self.memory.lock(), header::STATUS, status);
    }

    /// Stage a value for the next [`commit`](Self::commit). Returns false for
    /// names the layout does not contain.
    pub fn set(&mut self, name: &str, value: &VarValue) -> bool {
        let Some(slot) = self.slots.get(name).copied() else {
            return false;
        };
        let mut bytes = value.encode();
        bytes.resize(slot.len, 0);
        put(&mut self.staged, slot.offset, &bytes);
        true
    }

    /// Stage every field of `record` and publish its session metadata.
    pub fn apply_record(&mut self, record: &RecordMap) {
        for (name, value) in record.fields() {
            self.set(name, &VarValue::from(value));
        }
        if let Some(info) = record.session_info() {
            self.write_session(session_yaml(info).as_bytes());
        }
    }

    /// Write the staged row into the next rotating buffer with a fresh tick.
    pub fn commit(&mut self) -> i32 {
        self.tick = self.tick.wrapping_add(1);
        let index = self.next_buf;
        self.next_buf = (index + 1) % self.row_offsets.len().max(1);

        let mut memory = self.memory.lock();
        if let Some(offset) = self.row_offsets.get(index).copied() {
            put(&mut memory, offset, &self.staged);
        }
        put_i32(
            &mut memory,
            header::VAR_BUF + index * header::VAR_BUF_STRIDE,
            self.tick,
        );
        self.tick
    }

    pub fn tick(&self) -> i32 {
        self.tick
    }

    pub fn set_session_yaml(&mut self, yaml: &str) {
        self.write_session(yaml.as_bytes());
    }

    fn write_session(&mut self, bytes: &[u8]) {
        self.session_update = self.session_update.wrapping_add(1);
        let mut memory = self.memory.lock();
        memory.truncate(self.session_offset);
        memory.extend_from_slice(bytes);
        put_i32(&mut memory, header::SESSION_LEN, as_i32(bytes.len()));
        put_i32(&mut memory, header::SESSION_OFFSET, as_i32(self.session_offset));
        put_i32(&mut memory, header::SESSION_UPDATE, self.session_update);
    }
}

/// Read access to an [`IrsdkImage`].
#[derive(Debug, Clone)]
pub struct ImageView {
    memory: Arc<Mutex<Vec<u8>>>,
}

impl MemoryView for ImageView {
    fn size(&self) -> usize {
        self.memory.lock().len()
    }

    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> bool {
        let memory = self.memory.lock();
        match memory.get(offset..offset.saturating_add(dst.len())) {
            Some(src) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    fn wait_for_data(&self, timeout: Duration) {
        std::thread::sleep(timeout.min(Duration::from_millis(1)));
    }
}

/// [`MemoryOpener`] over an [`IrsdkImage`].
#[derive(Debug, Clone)]
pub struct ImageOpener {
    memory: Arc<Mutex<Vec<u8>>>,
    published: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
}

impl MemoryOpener for ImageOpener {
    fn open(&mut self) -> Option<Box<dyn MemoryView>> {
        if !self.published.load(Ordering::Acquire) {
            return None;
        }
        self.opens.fetch_add(1, Ordering::AcqRel);
        Some(Box::new(ImageView {
            memory: Arc::clone(&self.memory),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iracing::irsdk::IrsdkHeader;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn commit_rotates_buffers_and_bumps_ticks() -> TestResult {
        let mut image = IrsdkImage::builder()
            .buffers(2)
            .var("RPM", VarValue::Float(1.0))
            .build();
        assert_eq!(image.tick(), 1);

        image.set("RPM", &VarValue::Float(2.0));
        assert_eq!(image.commit(), 2);

        let header = IrsdkHeader::read(&image.view())?;
        let latest = header.latest_buffer().ok_or("no buffers")?;
        assert_eq!(latest.tick_count, 2);
        assert_eq!(latest.buf_offset, header.var_buf[1].buf_offset);
        Ok(())
    }

    #[test]
    fn set_ignores_unknown_names() {
        let mut image = IrsdkImage::builder().var("RPM", VarValue::Float(1.0)).build();
        assert!(image.set("RPM", &VarValue::Float(5.0)));
        assert!(!image.set("Speed", &VarValue::Float(5.0)));
    }

    #[test]
    fn opener_follows_publication() {
        let image = IrsdkImage::builder().var("RPM", VarValue::Float(1.0)).build();
        let mut opener = image.opener();
        assert!(opener.open().is_some());
        image.set_published(false);
        assert!(opener.open().is_none());
        assert_eq!(image.open_count(), 1);
    }

    #[test]
    fn session_yaml_lists_every_driver() {
        let yaml = session_yaml(&SessionInfo {
            red_line_rpm: Some(7250.0),
            roster_size: Some(3),
        });
        assert!(yaml.contains("DriverCarRedLine: 7250.000"));
        assert_eq!(yaml.matches("CarIdx:").count(), 3);
    }
}
