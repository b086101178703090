use crate::error::StoreError;

/// Samples of one trace: a `samples × channels` matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceData {
    samples: usize,
    channels: usize,
    values: Vec<f64>,
}

impl TraceData {
    /// Build from a row-major buffer of `samples * channels` values.
    pub fn new(samples: usize, channels: usize, values: Vec<f64>) -> Result<Self, StoreError> {
        if samples.checked_mul(channels) != Some(values.len()) {
            return Err(StoreError::InvalidInput(format!(
                "{} values do not fill a {samples}x{channels} trace",
                values.len()
            )));
        }
        Ok(Self {
            samples,
            channels,
            values,
        })
    }

    pub fn zeros(samples: usize, channels: usize) -> Self {
        Self {
            samples,
            channels,
            values: vec![0.0; samples * channels],
        }
    }

    /// Build from one row per sample. All rows must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, StoreError> {
        let channels = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != channels) {
            return Err(StoreError::InvalidInput(format!(
                "row {bad} has {} channels, expected {channels}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            samples: rows.len(),
            channels,
            values: rows.concat(),
        })
    }

    /// `(samples, channels)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.samples, self.channels)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, sample: usize, channel: usize) -> Option<f64> {
        if sample >= self.samples || channel >= self.channels {
            return None;
        }
        self.values.get(sample * self.channels + channel).copied()
    }

    pub fn row(&self, sample: usize) -> Option<&[f64]> {
        let start = sample.checked_mul(self.channels)?;
        if sample >= self.samples {
            return None;
        }
        self.values.get(start..start + self.channels)
    }

    /// Copy out one channel across all samples.
    pub fn channel(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.channels {
            return None;
        }
        Some(
            self.values
                .iter()
                .skip(channel)
                .step_by(self.channels)
                .copied()
                .collect(),
        )
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access for in-place preprocessing; the shape stays fixed.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_access() {
        let data = TraceData::from_rows(&[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]]).unwrap();
        assert_eq!(data.shape(), (3, 2));
        assert_eq!(data.get(1, 1), Some(20.0));
        assert_eq!(data.get(3, 0), None);
        assert_eq!(data.row(2), Some(&[3.0, 30.0][..]));
        assert_eq!(data.channel(0), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(data.channel(2), None);
    }

    #[test]
    fn test_buffer_must_fill_shape() {
        assert!(TraceData::new(2, 2, vec![0.0; 3]).is_err());
        assert!(TraceData::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert_eq!(TraceData::new(0, 4, Vec::new()).unwrap().shape(), (0, 4));
    }
}
