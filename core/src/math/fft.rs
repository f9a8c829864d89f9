use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse.
///
/// Applies a Hann window before the forward transform so narrowband
/// carriers do not leak across the whole spectrum.
pub struct FftHelper {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let window = (0..size)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / size as f32).cos())
            .collect();
        Self { fft, window }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Windowed forward transform. Output bins are in natural FFT order;
    /// callers that need frequency order must shift the halves themselves.
    pub fn forward(&self, input: &[Complex32]) -> Vec<Complex32> {
        let mut buffer: Vec<Complex32> = input
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| sample * w)
            .collect();
        buffer.resize(self.size(), Complex32::zero());
        self.fft.process(&mut buffer);
        buffer
    }
}
