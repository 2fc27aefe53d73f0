//! Linear-interpolation sample rate conversion.

pub struct LinearResampler {
    ratio: f64,
    phase: f64,
}

impl LinearResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            ratio: input_rate as f64 / output_rate.max(1) as f64,
            phase: 0.0,
        }
    }

    /// Input samples consumed per output sample.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Fills `output` from `input`, holding the last input sample once the
    /// input is exhausted. Returns the number of samples produced.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        if input.is_empty() {
            output.fill(0.0);
            return output.len();
        }
        let max_index = (input.len() - 1) as f64;
        let mut position = self.phase;
        for sample in output.iter_mut() {
            let index_floor = position.floor();
            let frac = (position - index_floor) as f32;
            let idx = index_floor as usize;
            *sample = if idx + 1 >= input.len() {
                input[input.len() - 1]
            } else {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            };
            position = (position + self.ratio).min(max_index);
        }
        self.phase = position - position.floor();
        output.len()
    }
}

/// Length of `input_len` samples once converted from `input_rate` to
/// `output_rate`.
pub fn output_len(input_len: usize, input_rate: u32, output_rate: u32) -> usize {
    if input_rate == 0 {
        return 0;
    }
    (input_len as f64 * output_rate as f64 / input_rate as f64).round() as usize
}

/// Converts a whole buffer in one pass.
pub fn resample_buffer(input: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    if input_rate == output_rate {
        return input.to_vec();
    }
    let mut output = vec![0.0; output_len(input.len(), input_rate, output_rate)];
    LinearResampler::new(input_rate, output_rate).process(input, &mut output);
    output
}
