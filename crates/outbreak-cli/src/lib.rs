//! Library surface behind the `outbreak` binary: manifest loading
//! (`config`) plus the end-to-end run pipeline the CLI drives. Split out
//! of `main.rs` so the run pipeline is callable without going through
//! `clap`, which is what lets the integration tests under `tests/` drive
//! a full simulation from an in-memory manifest.

pub mod config;
pub mod error;

use config::RunManifest;
use error::Result;
use outbreak_sim::counters::CounterStore;
use outbreak_sim::tick::{Rank, RunConfig};
use outbreak_sim::transport::LocalTransport;
use outbreak_sim::variables::VariableStore;
use std::sync::Arc;

/// Loads, partitions, and runs an already-resolved manifest to
/// completion, writing its change-log and summary CSVs.
pub fn run(manifest: &RunManifest) -> Result<()> {
    manifest.validate()?;
    let setup = config::load_run(manifest)?;
    tracing::info!(
        states = setup.disease.states.len(),
        actions = setup.action_defs.len(),
        triggers = setup.triggers.len(),
        processes = manifest.processes,
        "run manifest loaded"
    );

    let counters = Arc::new(CounterStore::new(setup.counter_capacity));
    let partitions = config::partition_network(setup.network, manifest.processes);
    let transports = LocalTransport::new_ring(manifest.processes.max(1));

    let run_cfg = RunConfig {
        start_tick: manifest.start_tick,
        end_tick: manifest.end_tick,
        master_seed: manifest.seed,
        time_resolution: manifest.time_resolution,
        output_path: manifest.output.clone(),
        summary_output_path: manifest.summary_output.clone(),
        has_location: manifest.has_location,
    };

    let mut ranks: Vec<Rank> = partitions
        .into_iter()
        .zip(transports)
        .enumerate()
        .map(|(rank_id, (network, transport))| {
            let variables = VariableStore::new(setup.variable_defs.clone(), counters.clone());
            Rank::new(
                rank_id,
                manifest.threads_per_process,
                network,
                setup.disease.clone(),
                variables,
                setup.action_defs.clone(),
                setup.triggers.clone(),
                setup.sets.clone(),
                transport,
                counters.clone(),
                manifest.seed,
                manifest.start_tick,
            )
        })
        .collect();

    std::thread::scope(|scope| -> Result<()> {
        let handles: Vec<_> = ranks
            .iter_mut()
            .map(|rank| {
                let cfg = &run_cfg;
                scope.spawn(move || rank.run(cfg))
            })
            .collect();
        for handle in handles {
            handle.join().expect("rank worker thread panicked")?;
        }
        Ok(())
    })?;

    Ok(())
}
