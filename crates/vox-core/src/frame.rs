//! Wire framing for streamed audio chunks.
//!
//! Each chunk travels as a 9-byte little-endian header followed by its PCM
//! payload. The final chunk carries an explicit terminal flag, so the client
//! can tell a completed stream from one cut off by a dropped connection.

use std::io::Read;

use crate::error::{VoxError, VoxResult};
use crate::types::AudioChunk;

/// Frame header length: sequence (u32) + payload length (u32) + flags (u8).
pub const HEADER_LEN: usize = 9;

/// Flag bit marking the terminal frame of a stream.
pub const FLAG_FINAL: u8 = 0b0000_0001;

/// Upper bound on a single frame payload. Anything larger is a corrupt
/// header, not a real chunk.
pub const MAX_PAYLOAD: usize = 1 << 20;

/// Encode a chunk into its wire representation.
pub fn encode_frame(chunk: &AudioChunk) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + chunk.samples.len());
    buf.extend_from_slice(&chunk.sequence.to_le_bytes());
    buf.extend_from_slice(&(chunk.samples.len() as u32).to_le_bytes());
    buf.push(if chunk.is_final { FLAG_FINAL } else { 0 });
    buf.extend_from_slice(&chunk.samples);
    buf
}

/// Incremental frame decoder over a blocking reader.
///
/// Enforces the stream invariants while decoding: sequence numbers must be
/// contiguous from 0, and the stream must end with exactly one final frame.
/// EOF before the final frame surfaces as a stream error, never as success.
pub struct FrameReader<R> {
    inner: R,
    next_seq: u32,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            next_seq: 0,
            finished: false,
        }
    }

    /// Read the next frame. Returns `None` once the final frame has been
    /// consumed.
    pub fn next_frame(&mut self) -> VoxResult<Option<AudioChunk>> {
        if self.finished {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        match read_full(&mut self.inner, &mut header)? {
            0 => {
                return Err(VoxError::stream(format!(
                    "stream ended before final chunk (at sequence {})",
                    self.next_seq
                )));
            }
            n if n < HEADER_LEN => {
                return Err(VoxError::stream("truncated frame header"));
            }
            _ => {}
        }

        let sequence = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let flags = header[8];

        if sequence != self.next_seq {
            return Err(VoxError::stream(format!(
                "out-of-order frame: expected sequence {}, got {}",
                self.next_seq, sequence
            )));
        }
        if len > MAX_PAYLOAD {
            return Err(VoxError::stream(format!(
                "frame payload of {len} bytes exceeds limit"
            )));
        }

        let mut samples = vec![0u8; len];
        let read = read_full(&mut self.inner, &mut samples)?;
        if read < len {
            return Err(VoxError::stream("truncated frame payload"));
        }

        self.next_seq += 1;
        let is_final = flags & FLAG_FINAL != 0;
        if is_final {
            self.finished = true;
        }

        Ok(Some(AudioChunk {
            sequence,
            samples,
            is_final,
        }))
    }

    /// Whether the terminal frame has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> VoxResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(VoxError::Io(e)),
        }
    }
    Ok(filled)
}
