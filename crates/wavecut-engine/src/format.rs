use serde::{Deserialize, Serialize};

/// Storage format of a clip's samples.
///
/// Samples always travel through the engine as `f32`; integer formats quantize
/// on write so that what is read back matches what a file would hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    Int16,
    Int24,
    Float32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 3,
            SampleFormat::Float32 => 4,
        }
    }

    fn full_scale(self) -> Option<f32> {
        match self {
            SampleFormat::Int16 => Some(32_767.0),
            SampleFormat::Int24 => Some(8_388_607.0),
            SampleFormat::Float32 => None,
        }
    }

    /// Rounds `value` to the nearest representable sample in this format.
    #[inline]
    pub fn quantize(self, value: f32) -> f32 {
        match self.full_scale() {
            Some(scale) => (value.clamp(-1.0, 1.0) * scale).round() / scale,
            None => value,
        }
    }

    pub fn quantize_slice(self, samples: &mut [f32]) {
        if self == SampleFormat::Float32 {
            return;
        }
        for sample in samples.iter_mut() {
            *sample = self.quantize(*sample);
        }
    }

    /// Appends the little-endian encoding of `samples` to `out`.
    pub fn encode(self, samples: &[f32], out: &mut Vec<u8>) {
        out.reserve(samples.len() * self.bytes_per_sample());
        for &sample in samples {
            match self {
                SampleFormat::Float32 => out.extend_from_slice(&sample.to_le_bytes()),
                SampleFormat::Int16 => {
                    let value = (sample.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
                    out.extend_from_slice(&value.to_le_bytes());
                }
                SampleFormat::Int24 => {
                    let value = (sample.clamp(-1.0, 1.0) * 8_388_607.0).round() as i32;
                    out.extend_from_slice(&value.to_le_bytes()[..3]);
                }
            }
        }
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::Float32
    }
}
