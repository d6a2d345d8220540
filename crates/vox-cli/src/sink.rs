//! WAV file sink (16-bit mono).

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use vox_core::{AudioChunk, VoxError, VoxResult, SAMPLE_RATE};

pub struct FileSink {
    writer: WavWriter<std::io::BufWriter<std::fs::File>>,
    path: PathBuf,
}

impl FileSink {
    /// Create the output file. Callers only do this after the response
    /// status is known good, so a rejected request leaves no file behind.
    pub fn create(path: &Path) -> VoxResult<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .map_err(|e| VoxError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write_chunk(&mut self, chunk: &AudioChunk) -> VoxResult<()> {
        for pair in chunk.samples.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            self.writer
                .write_sample(sample)
                .map_err(|e| VoxError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(())
    }

    /// Finalize the WAV header and return the written path.
    pub fn finalize(self) -> VoxResult<PathBuf> {
        self.writer
            .finalize()
            .map_err(|e| VoxError::Io(std::io::Error::other(e.to_string())))?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_file_is_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let samples: Vec<u8> = (0..1920i16).flat_map(|s| s.to_le_bytes()).collect();
        let mut sink = FileSink::create(&path).unwrap();
        sink.write_chunk(&AudioChunk::new(0, samples.clone()))
            .unwrap();
        sink.write_chunk(&AudioChunk::new(1, samples)).unwrap();
        sink.finalize().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 3840);
    }

    #[test]
    fn test_final_marker_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_chunk(&AudioChunk::final_marker(0)).unwrap();
        sink.finalize().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
