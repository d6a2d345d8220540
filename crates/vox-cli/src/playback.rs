//! Jitter buffer between network arrival and audio device consumption.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use vox_core::SAMPLE_RATE;

/// Samples buffered before playback starts: one engine frame (80 ms),
/// enough for a stable start while keeping perceived latency under 100 ms.
pub const PREBUFFER_SAMPLES: usize = 1920;

/// 10 ms fade-in removes the onset transient.
pub const FADE_IN_SAMPLES: usize = 240;

/// 200 ms silence appended after the stream so the device does not cut off
/// the tail of the utterance.
const TAIL_SAMPLES: usize = 4800;

/// Shared sample queue. The network thread pushes, the audio thread pops.
/// Audio already queued is never dropped; underruns are padded with
/// silence instead.
pub struct PlaybackBuffer {
    samples: Mutex<VecDeque<i16>>,
    len: AtomicUsize,
    /// No more samples will arrive (final frame seen or intake stopped).
    done: AtomicBool,
    /// Intake stopped early (interrupt); queued samples still drain.
    closed: AtomicBool,
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(SAMPLE_RATE as usize)),
            len: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Append PCM bytes (i16 little-endian).
    pub fn push_pcm(&self, bytes: &[u8]) {
        let mut queue = self.samples.lock();
        for pair in bytes.chunks_exact(2) {
            queue.push_back(i16::from_le_bytes([pair[0], pair[1]]));
        }
        self.len.store(queue.len(), Ordering::Release);
    }

    pub fn pop(&self) -> Option<i16> {
        let mut queue = self.samples.lock();
        let sample = queue.pop_front();
        self.len.store(queue.len(), Ordering::Release);
        sample
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the stream complete; the source drains and then ends.
    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Interrupt: stop intake but let queued audio drain.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.done.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for PlaybackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rodio source draining the buffer.
///
/// Emits silence on underrun rather than ending the stream, applies a short
/// fade-in to the first real samples, and pads a silence tail after the
/// final sample before signalling end-of-stream.
pub struct StreamSource {
    buffer: Arc<PlaybackBuffer>,
    emitted: usize,
    tail_remaining: usize,
}

impl StreamSource {
    pub fn new(buffer: Arc<PlaybackBuffer>) -> Self {
        Self {
            buffer,
            emitted: 0,
            tail_remaining: TAIL_SAMPLES,
        }
    }
}

impl Iterator for StreamSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if let Some(sample) = self.buffer.pop() {
            let sample = if self.emitted < FADE_IN_SAMPLES {
                let gain = self.emitted as f32 / FADE_IN_SAMPLES as f32;
                (sample as f32 * gain) as i16
            } else {
                sample
            };
            self.emitted += 1;
            return Some(sample);
        }

        if self.buffer.is_finished() {
            if self.tail_remaining > 0 {
                self.tail_remaining -= 1;
                return Some(0);
            }
            return None;
        }

        // Underrun: a silence gap, never a dropped sample or early end.
        Some(0)
    }
}

impl rodio::Source for StreamSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_push_pop_order() {
        let buffer = PlaybackBuffer::new();
        buffer.push_pcm(&pcm_bytes(&[1, 2, 3]));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop(), Some(1));
        assert_eq!(buffer.pop(), Some(2));
        assert_eq!(buffer.pop(), Some(3));
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_underrun_pads_silence_without_ending() {
        let buffer = Arc::new(PlaybackBuffer::new());
        let mut source = StreamSource::new(Arc::clone(&buffer));

        // Nothing buffered, stream not finished: silence, not None.
        assert_eq!(source.next(), Some(0));
        assert_eq!(source.next(), Some(0));

        // Late-arriving audio still plays.
        buffer.push_pcm(&pcm_bytes(&[i16::MAX; 300]));
        let mut real = 0;
        for _ in 0..300 {
            if source.next() != Some(0) {
                real += 1;
            }
        }
        assert!(real > 0, "buffered samples must not be dropped");
    }

    #[test]
    fn test_drain_then_tail_then_end() {
        let buffer = Arc::new(PlaybackBuffer::new());
        buffer.push_pcm(&pcm_bytes(&[1000; 500]));
        buffer.finish();

        let source = StreamSource::new(Arc::clone(&buffer));
        let emitted: Vec<i16> = source.collect();

        assert_eq!(emitted.len(), 500 + 4800);
        assert!(emitted[500..].iter().all(|&s| s == 0), "tail is silence");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fade_in_scales_onset() {
        let buffer = Arc::new(PlaybackBuffer::new());
        buffer.push_pcm(&pcm_bytes(&[i16::MAX; FADE_IN_SAMPLES * 2]));
        buffer.finish();

        let samples: Vec<i16> = StreamSource::new(buffer).collect();
        assert_eq!(samples[0], 0);
        assert!(samples[FADE_IN_SAMPLES / 2] < i16::MAX / 2 + 1000);
        assert_eq!(samples[FADE_IN_SAMPLES], i16::MAX);
    }

    #[test]
    fn test_close_stops_intake_but_drains_queue() {
        let buffer = Arc::new(PlaybackBuffer::new());
        buffer.push_pcm(&pcm_bytes(&[2000; 100]));
        buffer.close();

        assert!(buffer.is_closed());
        assert!(buffer.is_finished());

        let samples: Vec<i16> = StreamSource::new(Arc::clone(&buffer)).collect();
        // Queued audio drains in full before the tail.
        assert!(samples.len() >= 100);
    }
}
