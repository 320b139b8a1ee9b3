//! Generic weigher chain combining normalized host scores

use std::cmp::Ordering;
use tracing::debug;
use vmsched_core::{HostState, SchedResult};

use crate::filter_context::FilterContext;
use crate::traits::{WeighedHost, WeigherChain};

/// A single scoring function. Higher raw values are better.
pub trait HostWeigher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Scale applied after normalization. Negative values invert the preference.
    fn multiplier(&self) -> f64 {
        1.0
    }

    fn weigh(&self, host: &HostState, ctx: &FilterContext<'_>) -> f64;
}

/// Weigher chain summing `multiplier * normalized(raw)` for every weigher
#[derive(Default)]
pub struct WeightHandler {
    weighers: Vec<Box<dyn HostWeigher>>,
}

impl WeightHandler {
    pub fn new(weighers: Vec<Box<dyn HostWeigher>>) -> Self {
        Self { weighers }
    }

    pub fn with_weigher(mut self, weigher: impl HostWeigher + 'static) -> Self {
        self.weighers.push(Box::new(weigher));
        self
    }
}

/// Scale values into [0.0, 1.0]. A list with no spread maps to all zeros.
fn normalize(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| {
            if !v.is_finite() || !range.is_finite() || range == 0.0 {
                0.0
            } else {
                (v - min) / range
            }
        })
        .collect()
}

impl WeigherChain for WeightHandler {
    fn get_weighed_hosts<'a>(
        &self,
        hosts: Vec<&'a HostState>,
        ctx: &FilterContext<'_>,
    ) -> SchedResult<Vec<WeighedHost<'a>>> {
        let mut weighed: Vec<WeighedHost<'a>> = hosts
            .into_iter()
            .map(|host| WeighedHost { host, weight: 0.0 })
            .collect();

        for weigher in &self.weighers {
            let raw: Vec<f64> = weighed.iter().map(|w| weigher.weigh(w.host, ctx)).collect();
            let multiplier = weigher.multiplier();
            for (entry, norm) in weighed.iter_mut().zip(normalize(&raw)) {
                entry.weight += multiplier * norm;
            }
            debug!(weigher = weigher.name(), multiplier, "Weigher applied");
        }

        // Stable, so equal weights keep the filtered order.
        weighed.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
        Ok(weighed)
    }
}
