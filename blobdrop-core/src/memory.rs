//! Native linear memory: the flat byte buffer boundary arguments are offsets into.

/// One boundary call's arguments: where the payload lives, how long it is, where the name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_address: usize,
    pub length: usize,
    pub name_address: usize,
}

impl TransferRequest {
    pub fn new(source_address: usize, length: usize, name_address: usize) -> Self {
        Self {
            source_address,
            length,
            name_address,
        }
    }

    /// Build from the raw integers a native caller passes. A negative length reads as empty.
    pub fn from_raw(source_address: usize, length: i64, name_address: usize) -> Self {
        let length = usize::try_from(length).unwrap_or(0);
        Self::new(source_address, length, name_address)
    }
}

/// Read access to native linear memory.
///
/// Both reads return owned buffers: the native runtime may grow or move its memory as soon as
/// control returns to it, so nothing handed to a host may alias it.
///
/// Out-of-range reads are the native side's fault. Safe implementations panic (the Rust
/// equivalent of a runtime trap); they never report it as a value.
pub trait LinearMemory {
    /// Copy exactly `len` bytes starting at `addr`.
    fn copy_out(&self, addr: usize, len: usize) -> Vec<u8>;

    /// Bytes from `addr` up to, not including, the first zero byte.
    /// Whether address 0 is a null pointer or a real offset is up to the implementation.
    fn read_c_str(&self, addr: usize) -> Vec<u8>;
}

impl LinearMemory for [u8] {
    fn copy_out(&self, addr: usize, len: usize) -> Vec<u8> {
        let end = addr
            .checked_add(len)
            .unwrap_or_else(|| panic!("linear memory range overflows: {addr} + {len}"));
        self[addr..end].to_vec()
    }

    fn read_c_str(&self, addr: usize) -> Vec<u8> {
        let tail = &self[addr..];
        match tail.iter().position(|&b| b == 0) {
            Some(nul) => tail[..nul].to_vec(),
            None => panic!("unterminated string at linear memory offset {addr}"),
        }
    }
}

impl LinearMemory for Vec<u8> {
    fn copy_out(&self, addr: usize, len: usize) -> Vec<u8> {
        self.as_slice().copy_out(addr, len)
    }

    fn read_c_str(&self, addr: usize) -> Vec<u8> {
        self.as_slice().read_c_str(addr)
    }
}

/// Decode a filename read out of linear memory. Invalid UTF-8 is replaced, never rejected.
pub fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Builds a linear-memory image the way a native caller lays out a download: payload bytes
/// followed by a NUL-terminated name. Used by in-crate callers and tests.
#[derive(Debug, Default)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes, returning their offset.
    pub fn push_bytes(&mut self, data: &[u8]) -> usize {
        let addr = self.bytes.len();
        self.bytes.extend_from_slice(data);
        addr
    }

    /// Append a NUL-terminated string, returning its offset.
    pub fn push_c_str(&mut self, s: &str) -> usize {
        let addr = self.push_bytes(s.as_bytes());
        self.bytes.push(0);
        addr
    }

    /// Overwrite bytes in place (the native side mutating its heap between calls).
    pub fn write_at(&mut self, addr: usize, data: &[u8]) {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl LinearMemory for MemoryImage {
    fn copy_out(&self, addr: usize, len: usize) -> Vec<u8> {
        self.bytes.copy_out(addr, len)
    }

    fn read_c_str(&self, addr: usize) -> Vec<u8> {
        self.bytes.read_c_str(addr)
    }
}
