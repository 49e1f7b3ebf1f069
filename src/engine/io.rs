//! Audio file I/O
//!
//! Decodes WAV files into [`AudioBuffer`]s at their native sample rate and
//! writes captured output blocks back to WAV. Supports 8/16/24/32-bit
//! integer and 32-bit float sources, mono or stereo.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{GranularError, Result};

/// Decode an audio file into an AudioBuffer
///
/// # Arguments
/// * `path` - Path to the WAV file
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `DecodeError` - If the file is not valid WAV, has more than two
///   channels, or contains no samples
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(GranularError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path)
        .map_err(|e| GranularError::decode(format!("Failed to open WAV file: {}", e), e))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let layout = ChannelLayout::from_count(channels).ok_or_else(|| GranularError::DecodeError {
        reason: format!("{}-channel audio (only mono/stereo supported)", channels),
        source: None,
    })?;

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&samples, layout, spec.sample_rate)?;

    if buffer.is_empty() || spec.sample_rate == 0 {
        return Err(GranularError::DecodeError {
            reason: "audio contains no samples".to_string(),
            source: None,
        });
    }

    Ok(buffer)
}

/// Generate a mono sine tone
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `duration_secs` - Duration of the tone in seconds
/// * `sample_rate` - Sample rate in Hz
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_samples, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}

/// Write an AudioBuffer to a 32-bit float WAV file
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let mut capture = WavCapture::create(path, buffer.channels() as u16, buffer.sample_rate)?;
    capture.write_interleaved(&buffer.to_interleaved())?;
    capture.finalize()
}

// ============================================================================
// Capture
// ============================================================================

/// Streaming WAV writer for interleaved blocks pulled from an output tap
pub struct WavCapture {
    writer: WavWriter<BufWriter<File>>,
    frames_written: u64,
    channels: u16,
}

impl WavCapture {
    /// Create a 32-bit float WAV file at `path`
    pub fn create(path: &Path, channels: u16, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec).map_err(wav_io_error)?;
        Ok(Self {
            writer,
            frames_written: 0,
            channels,
        })
    }

    /// Append one interleaved block
    pub fn write_interleaved(&mut self, block: &[f32]) -> Result<()> {
        for &sample in block {
            self.writer.write_sample(sample).map_err(wav_io_error)?;
        }
        self.frames_written += (block.len() / self.channels.max(1) as usize) as u64;
        Ok(())
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush the header and close the file
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().map_err(wav_io_error)
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_io_error(e: hound::Error) -> GranularError {
    match e {
        hound::Error::IoError(io) => GranularError::Io(io),
        other => GranularError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let collected: std::result::Result<Vec<f32>, hound::Error> = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect(),
        // 24-bit is stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect(),
        (SampleFormat::Int, bits) => {
            return Err(GranularError::DecodeError {
                reason: format!("{}-bit integer audio is not supported", bits),
                source: None,
            })
        }
    };

    collected.map_err(|e| GranularError::decode(format!("Failed to read samples: {}", e), e))
}
