//! The sequence-model contract the generation step relies on.

use anyhow::Result;

use super::baseline::BaselineSampler;
use super::http::HttpSampler;
use crate::config::{ModelConfig, SamplerKind};
use crate::dataset::Point;

/// A trained (or stand-in) sequence model that extends an observed
/// trajectory.
///
/// All coordinates are normalized to `[0, 1]`.
#[allow(async_fn_in_trait)]
pub trait Sampler: Send + Sync {
    /// Extend `observed` by `steps` predicted positions.
    ///
    /// `reference` is the full window the prefix was cut from; models may use
    /// it for auxiliary context. Returns the complete trajectory: the observed
    /// prefix followed by the `steps` predictions.
    async fn sample(&self, observed: &[Point], reference: &[Point], steps: usize)
        -> Result<Vec<Point>>;

    /// Short label used in logs and run reports.
    fn name(&self) -> &str;
}

/// Enum dispatch over the concrete samplers, so the model can be chosen at
/// runtime without `dyn` (async trait methods are not object safe).
#[derive(Debug, Clone)]
pub enum AnySampler {
    Baseline(BaselineSampler),
    Http(HttpSampler),
}

impl AnySampler {
    /// Construct the sampler selected by `config`.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Ok(match config.sampler {
            SamplerKind::Baseline => {
                Self::Baseline(BaselineSampler::from_config(&config.baseline))
            }
            SamplerKind::Http => {
                Self::Http(HttpSampler::new(&config.base_url, config.timeout_secs)?)
            }
        })
    }
}

impl Sampler for AnySampler {
    async fn sample(
        &self,
        observed: &[Point],
        reference: &[Point],
        steps: usize,
    ) -> Result<Vec<Point>> {
        match self {
            Self::Baseline(s) => s.sample(observed, reference, steps).await,
            Self::Http(s) => s.sample(observed, reference, steps).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Baseline(s) => s.name(),
            Self::Http(s) => s.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_from_config_selects_sampler() {
        let mut config = PipelineConfig::default().model;
        assert!(matches!(
            AnySampler::from_config(&config).unwrap(),
            AnySampler::Baseline(_)
        ));

        config.sampler = SamplerKind::Http;
        config.base_url = "http://localhost:8500/".into();
        let sampler = AnySampler::from_config(&config).unwrap();
        assert_eq!(sampler.name(), "http");
    }

    #[tokio::test]
    async fn test_dispatch_reaches_baseline() {
        let sampler = AnySampler::from_config(&PipelineConfig::default().model).unwrap();
        let observed = vec![Point::new(0.1, 0.1), Point::new(0.2, 0.2)];
        let out = sampler.sample(&observed, &observed, 3).await.unwrap();
        assert_eq!(out.len(), 5);
    }
}
