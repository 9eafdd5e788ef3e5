//! Shared scaffolding for the scenario/determinism integration tests:
//! writes disease-model/network/intervention JSON documents into a
//! tempdir and assembles the `RunManifest` that names them.

use outbreak_cli::config::RunManifest;
use serde_json::Value as Json;
use std::fs;
use std::path::Path;

pub fn write_doc(dir: &Path, name: &str, doc: &Json) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
    path
}

pub struct ManifestBuilder {
    pub processes: usize,
    pub threads_per_process: usize,
    pub start_tick: u64,
    pub end_tick: u64,
    pub seed: u64,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        ManifestBuilder {
            processes: 1,
            threads_per_process: 1,
            start_tick: 0,
            end_tick: 0,
            seed: 42,
        }
    }
}

impl ManifestBuilder {
    pub fn build(self, dir: &Path, disease: &Json, network: &Json, interventions: &[Json]) -> RunManifest {
        let disease_model = write_doc(dir, "disease.json", disease);
        let network_path = write_doc(dir, "network.json", network);
        let intervention_paths = interventions
            .iter()
            .enumerate()
            .map(|(i, doc)| write_doc(dir, &format!("intervention_{i}.json"), doc))
            .collect();
        RunManifest {
            start_tick: self.start_tick,
            end_tick: self.end_tick,
            seed: self.seed,
            time_resolution: 1.0,
            processes: self.processes,
            threads_per_process: self.threads_per_process,
            output: dir.join("changes.csv"),
            summary_output: dir.join("summary.csv"),
            has_location: false,
            disease_model,
            network: network_path,
            interventions: intervention_paths,
        }
    }
}

pub fn summary_rows(path: &Path) -> Vec<Vec<String>> {
    let contents = fs::read_to_string(path).unwrap();
    contents
        .lines()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

pub fn change_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
