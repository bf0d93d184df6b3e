//! PCM audio helpers
//!
//! The pipeline moves raw 16-bit signed little-endian PCM. These helpers
//! cover the arithmetic the transport stages need: normalized RMS energy
//! for voice-activity detection and chunk-size math for framing.

/// Compute the RMS energy of PCM16-LE bytes, normalized to [0, 1].
///
/// An empty or odd-length buffer yields 0.
pub fn pcm16_rms(bytes: &[u8]) -> f32 {
    let samples = bytes.chunks_exact(2);
    let count = samples.len();
    if count == 0 {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]) as f64 / 32768.0;
            sample * sample
        })
        .sum();
    ((sum_squares / count as f64).sqrt()) as f32
}

/// Bytes per chunk for the given geometry and chunk duration.
pub fn chunk_size_bytes(sample_rate: u32, channels: u16, chunk_ms: u32) -> usize {
    let frames = sample_rate as usize * chunk_ms as usize / 1000;
    frames * channels as usize * 2
}

/// Concatenate audio buffers into one.
pub fn concat(buffers: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = buffers.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for buffer in buffers {
        out.extend_from_slice(buffer);
    }
    out
}

/// Encode f32 samples in [-1, 1] as PCM16-LE bytes. Used by tests and
/// synthetic adapters.
pub fn pcm16_from_f32(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            ((clamped * 32767.0) as i16).to_le_bytes()
        })
        .collect()
}
