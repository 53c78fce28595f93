use crate::error::FrameError;
use std::fmt;

pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 1024;

/// One newline-delimited line, trimmed, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RawFrame {
    fn from(s: &str) -> Self {
        RawFrame(s.to_string())
    }
}

/// Reassembles a byte stream into lines.
///
/// The pending partial line is bounded by `max_buffered_bytes`; when a source
/// keeps sending without a line feed the partial line is discarded and the
/// next call to [`Frames::next`] reports [`FrameError::BufferOverflow`] after
/// any complete frames. The rest of that line is skipped up to its line feed,
/// across as many calls as it takes.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_buffered_bytes: usize,
    overflowed: bool,
    /// Inside an overflowed line, waiting for its line feed.
    discarding: bool,
}

impl FrameAssembler {
    pub fn new(max_buffered_bytes: Option<usize>) -> Self {
        FrameAssembler {
            buffer: Vec::new(),
            max_buffered_bytes: max_buffered_bytes.unwrap_or(DEFAULT_MAX_BUFFERED_BYTES),
            overflowed: false,
            discarding: false,
        }
    }

    /// Appends `bytes` and returns the frames they complete, lazily.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        let bytes: &[u8] = if self.discarding {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    &bytes[end + 1..]
                }
                None => &[],
            }
        } else {
            bytes
        };
        self.buffer.extend_from_slice(bytes);

        let complete = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        if self.buffer.len() - complete > self.max_buffered_bytes {
            self.buffer.truncate(complete);
            self.overflowed = true;
            self.discarding = true;
        }

        Frames { assembler: self }
    }

    /// Bytes waiting for a line feed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drops buffered input, e.g. when the link is reopened.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
        self.discarding = false;
    }

    fn next_frame(&mut self) -> Option<Result<RawFrame, FrameError>> {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(Ok(RawFrame(trimmed.to_string())));
            }
        }
        if self.overflowed {
            self.overflowed = false;
            return Some(Err(FrameError::BufferOverflow {
                limit: self.max_buffered_bytes,
            }));
        }
        None
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Iterator over the frames completed by one [`FrameAssembler::feed`] call.
/// Frames not pulled stay buffered for the next call.
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Frames<'_> {
    type Item = Result<RawFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.assembler.next_frame()
    }
}
