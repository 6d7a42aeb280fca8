use crate::core::correlation::{CorrelationAxes, LookupStrategy};
use crate::core::propagate::PropagationParams;
use crate::core::sweep::SweepParams;
use crate::io::plot::PlotParams;
use crate::types::{GridGeometry, ProbEncoding, WindError, WindResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a filter run needs besides its input files.
///
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub geometry: GridGeometry,
    /// Probability encoding of the input cell file; output uses the same
    pub encoding: ProbEncoding,
    pub axes: CorrelationAxes,
    /// Minimum observations per (distance, speed) bin for a usable probability
    pub min_samples: u64,
    pub lookup: LookupStrategy,
    pub propagation: PropagationParams,
    pub sweep: SweepParams,
    pub plot: PlotParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            geometry: GridGeometry::default(),
            encoding: ProbEncoding::Float32,
            axes: CorrelationAxes::default(),
            min_samples: 20,
            lookup: LookupStrategy::default(),
            propagation: PropagationParams::default(),
            sweep: SweepParams::default(),
            plot: PlotParams::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> WindResult<Self> {
        log::info!("Reading run configuration from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> WindResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> WindResult<()> {
        if self.geometry.ct_width == 0 || self.geometry.at_width == 0 {
            return Err(WindError::Config(format!(
                "Grid geometry {}x{} is empty",
                self.geometry.ct_width, self.geometry.at_width
            )));
        }
        if self.geometry.ct_width > i16::MAX as usize + 1 || self.geometry.at_width > i16::MAX as usize + 1 {
            return Err(WindError::Config(
                "Grid geometry exceeds the 16-bit record coordinates".to_string(),
            ));
        }
        self.axes.validate()?;
        self.propagation.validate()?;
        self.sweep.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::propagate::NeighborMode;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "geometry": { "ct_width": 8, "at_width": 10 },
            "encoding": "Quantized16",
            "propagation": { "gamma": 0.25, "mode": "BestVector" }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.geometry.ct_width, 8);
        assert_eq!(config.encoding, ProbEncoding::Quantized16);
        assert_eq!(config.propagation.gamma, 0.25);
        assert_eq!(config.propagation.mode, NeighborMode::BestVector);
        assert_eq!(config.propagation.window, 7);
        assert_eq!(config.sweep.passes, 1);
        assert_eq!(config.min_samples, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = RunConfig::default();
        let text = config.to_json().unwrap();
        let back: RunConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.axes, config.axes);
        assert_eq!(back.geometry, config.geometry);
    }

    #[test]
    fn test_invalid_gamma_rejected() {
        let mut config = RunConfig::default();
        config.propagation.gamma = -0.1;
        assert!(matches!(config.validate(), Err(WindError::Config(_))));
    }
}
