//! RIFF/WAVE decoding via `hound`.
//!
//! Only uncompressed PCM (integer 8–32 bit, or 32-bit IEEE float) is
//! accepted. Anything else is rejected with [`DeadAirError::Decode`] rather
//! than guessed at.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use super::AudioBuffer;
use crate::error::{DeadAirError, Result};

/// Decode a complete WAV payload into an [`AudioBuffer`].
///
/// # Errors
/// `DeadAirError::Decode` when the payload is empty, the header is not a
/// RIFF/WAVE PCM header, or the data chunk is shorter than the header claims.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(DeadAirError::Decode("empty audio payload".into()));
    }

    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| DeadAirError::Decode(format!("unrecognized container: {e}")))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(DeadAirError::Decode("header declares zero channels".into()));
    }
    if spec.sample_rate == 0 {
        return Err(DeadAirError::Decode("header declares zero sample rate".into()));
    }

    let samples = match spec.sample_format {
        SampleFormat::Int => read_int_samples(reader, spec.bits_per_sample)?,
        SampleFormat::Float => read_float_samples(reader, spec.bits_per_sample)?,
    };

    debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "decoded wav payload"
    );

    Ok(AudioBuffer::new(
        samples,
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
    ))
}

fn read_int_samples(mut reader: WavReader<Cursor<&[u8]>>, bits: u16) -> Result<Vec<f32>> {
    if !(1..=32).contains(&bits) {
        return Err(DeadAirError::Decode(format!(
            "unsupported integer bit depth: {bits}"
        )));
    }
    // Full scale for a signed sample of `bits` width.
    let full_scale = (1u64 << (bits - 1)) as f64;
    reader
        .samples::<i32>()
        .map(|s| {
            s.map(|v| (v as f64 / full_scale) as f32)
                .map_err(truncated_or_malformed)
        })
        .collect()
}

fn read_float_samples(mut reader: WavReader<Cursor<&[u8]>>, bits: u16) -> Result<Vec<f32>> {
    if bits != 32 {
        return Err(DeadAirError::Decode(format!(
            "unsupported float bit depth: {bits}"
        )));
    }
    reader
        .samples::<f32>()
        .map(|s| s.map(|v| v.clamp(-1.0, 1.0)).map_err(truncated_or_malformed))
        .collect()
}

fn truncated_or_malformed(e: hound::Error) -> DeadAirError {
    match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            DeadAirError::Decode("sample data truncated".into())
        }
        other => DeadAirError::Decode(format!("malformed sample data: {other}")),
    }
}
