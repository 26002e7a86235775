//! One sampling pass over a set of samplers.
//!
//! Each sampler writes into its own sink, which is merged into the pass only
//! when `collect` succeeds. A sampler that fails part way through therefore
//! contributes nothing, and the remaining samplers still run.

use crate::error::Result;
use crate::samplers::Sampler;
use crate::samples::Samples;
use std::sync::Arc;
use tracing::warn;

/// A sink shaped for every metric the given samplers declare.
fn pass_sink(samplers: &[Arc<dyn Sampler>]) -> Samples {
    Samples::new(samplers.iter().flat_map(|sampler| sampler.descriptions()))
}

fn sample_one(sampler: &dyn Sampler) -> Result<Samples> {
    let mut samples = Samples::new(sampler.descriptions());
    sampler.collect(&mut samples)?;
    Ok(samples)
}

/// Run the samplers one after another on the calling thread.
pub fn collect_pass(samplers: &[Arc<dyn Sampler>]) -> Samples {
    let mut samples = pass_sink(samplers);

    for sampler in samplers {
        match sample_one(sampler.as_ref()) {
            Ok(own) => samples.merge(own),
            Err(e) => warn!(sampler = sampler.name(), "Sampling failed: {e}"),
        }
    }

    samples
}

/// Run every sampler on its own blocking worker and merge the results in
/// sampler order.
pub async fn collect_pass_parallel(samplers: &[Arc<dyn Sampler>]) -> Samples {
    let handles: Vec<_> = samplers
        .iter()
        .map(|sampler| {
            let sampler = Arc::clone(sampler);
            let name = sampler.name();
            (name, tokio::task::spawn_blocking(move || sample_one(sampler.as_ref())))
        })
        .collect();

    let mut samples = pass_sink(samplers);
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(own)) => samples.merge(own),
            Ok(Err(e)) => warn!(sampler = name, "Sampling failed: {e}"),
            Err(e) => warn!(sampler = name, "Sampler worker failed: {e}"),
        }
    }

    samples
}
