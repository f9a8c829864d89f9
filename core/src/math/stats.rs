use ndarray::{Array1, ArrayView1};

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f32>() / values.len() as f32
    }

    /// Population variance.
    pub fn variance(values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(values);
        values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32
    }

    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Pearson correlation over the common prefix of the two sequences.
    /// Returns 0.0 when either side is empty or has no variance.
    pub fn pearson(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        if len < 2 {
            return 0.0;
        }
        let a = ArrayView1::from(&a[..len]);
        let b = ArrayView1::from(&b[..len]);
        let ma = a.mean().unwrap_or(0.0);
        let mb = b.mean().unwrap_or(0.0);
        let da: Array1<f32> = a.mapv(|v| v - ma);
        let db: Array1<f32> = b.mapv(|v| v - mb);
        let denom = (da.dot(&da) * db.dot(&db)).sqrt();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        da.dot(&db) / denom
    }

    /// Ratio of geometric to arithmetic mean power. 1.0 for a flat
    /// spectrum, near 0.0 for a single carrier. Input is linear power.
    pub fn spectral_flatness(power: &[f32]) -> f32 {
        if power.is_empty() {
            return 0.0;
        }
        let floor = 1e-12_f32;
        let log_sum: f32 = power.iter().map(|&p| p.max(floor).ln()).sum();
        let geometric = (log_sum / power.len() as f32).exp();
        let arithmetic = Self::mean(power).max(floor);
        geometric / arithmetic
    }

    pub fn db(linear: f32) -> f32 {
        10.0 * linear.max(1e-12).log10()
    }

    pub fn median(values: &[f32]) -> f32 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }
}
