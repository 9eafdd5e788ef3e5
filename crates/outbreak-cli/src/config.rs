//! JSON configuration loading: a [`RunManifest`] names a disease model
//! document, a network document, and zero or more intervention documents;
//! each is deserialized into a `*Doc` type here and converted into the
//! runtime types `outbreak-core`/`outbreak-sim` actually operate on.
//!
//! `NodeProperty`/`EdgeProperty`/`Comparator`/`Operator`/`Scope` don't carry
//! `serde` derives themselves (they're data-model types, not wire types), so
//! the doc-to-runtime conversions below resolve their JSON spellings by
//! hand rather than deriving `Deserialize` straight onto the core enums.

use crate::error::{CliError, Result};
use outbreak_core::action_def::ActionDefinition;
use outbreak_core::condition::{Comparator, Condition};
use outbreak_core::db_field::StaticFieldSelector;
use outbreak_core::disease::distribution::Distribution;
use outbreak_core::disease::model::{DiseaseModel, Progression, Transmission};
use outbreak_core::network::{Edge, Network, Node};
use outbreak_core::operation::{Operation, OperationTarget, Operator};
use outbreak_core::property::{EdgeProperty, NodeProperty};
use outbreak_core::sets::{SetContent, SetDefinition};
use outbreak_core::value::{TraitBits, Value, ValueList};
use outbreak_core::valueinstance::{Observable, ValueInstance};
use outbreak_core::variable::{Scope, VariableDefinition};
use outbreak_sim::tick::Trigger;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Json { path: path.display().to_string(), source })
}

/// Top-level document named by `--config`. References the disease model,
/// network, and intervention documents by path rather than inlining them,
/// so large networks don't have to live in the same file as the run
/// parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RunManifest {
    pub start_tick: u64,
    pub end_tick: u64,
    pub seed: u64,
    #[serde(default = "default_time_resolution")]
    pub time_resolution: f64,
    #[serde(default = "default_one")]
    pub processes: usize,
    #[serde(default = "default_one")]
    pub threads_per_process: usize,
    pub output: PathBuf,
    pub summary_output: PathBuf,
    #[serde(default)]
    pub has_location: bool,
    pub disease_model: PathBuf,
    pub network: PathBuf,
    #[serde(default)]
    pub interventions: Vec<PathBuf>,
}

fn default_time_resolution() -> f64 {
    1.0
}

fn default_one() -> usize {
    1
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Checks the load-time invariants: a well-formed tick range, a
    /// positive time resolution, and that every referenced document
    /// actually exists. Disease-model/network/intervention *content* is
    /// validated separately, when those documents are converted.
    pub fn validate(&self) -> Result<()> {
        if self.start_tick > self.end_tick {
            return Err(CliError::Config(format!(
                "start_tick ({}) must not exceed end_tick ({})",
                self.start_tick, self.end_tick
            )));
        }
        if self.time_resolution <= 0.0 {
            return Err(CliError::Config(format!("time_resolution must be positive, got {}", self.time_resolution)));
        }
        for (label, path) in [("disease_model", &self.disease_model), ("network", &self.network)] {
            if !path.exists() {
                return Err(CliError::Config(format!("{label} path does not exist: {}", path.display())));
            }
        }
        for path in &self.interventions {
            if !path.exists() {
                return Err(CliError::Config(format!("intervention path does not exist: {}", path.display())));
            }
        }
        Ok(())
    }
}

/// Splits a single network document into one [`Network`] per process,
/// assigning contiguous ranges of the original node list to each process.
/// An edge is only representable when both endpoints land in the same
/// partition: `Edge.source`/`target` are local `NodeIndex`es, so a contact
/// edge that would cross a process boundary has no way to name its remote
/// endpoint. Cross-partition edges are dropped and counted in a warning
/// rather than silently kept, matching this engine's "no remote-owned
/// contact edges" scope limit.
pub fn partition_network(network: Network, processes: usize) -> Vec<Network> {
    let processes = processes.max(1);
    if processes == 1 {
        return vec![network];
    }
    let total = network.nodes.len();
    let chunk = ((total + processes - 1) / processes).max(1);
    let mut partitions: Vec<Network> = (0..processes).map(|_| Network::new()).collect();
    let mut owner_of: HashMap<u64, usize> = HashMap::new();
    for (idx, node) in network.nodes.iter().enumerate() {
        let owner = (idx / chunk).min(processes - 1);
        owner_of.insert(node.id, owner);
        partitions[owner].add_node(node.clone());
    }
    let mut dropped_edges = 0usize;
    for edge in &network.edges {
        let (Some(&source_owner), Some(&target_owner)) = (owner_of.get(&edge.source_id), owner_of.get(&edge.target_id)) else {
            dropped_edges += 1;
            continue;
        };
        if source_owner != target_owner {
            dropped_edges += 1;
            continue;
        }
        let part = &mut partitions[target_owner];
        let target = part.node_index(edge.target_id).expect("target added above");
        let source = part.node_index(edge.source_id).expect("source added above");
        part.add_edge(Edge { target, source, ..edge.clone() });
    }
    if dropped_edges > 0 {
        tracing::warn!(dropped_edges, "dropped cross-process contact edges at partition boundaries");
    }
    for part in &mut partitions {
        part.finalize();
    }
    partitions
}

/// Everything a `Rank` needs to run, already resolved into runtime types.
pub struct RunSetup {
    pub network: Network,
    pub disease: Arc<DiseaseModel>,
    pub variable_defs: Vec<VariableDefinition>,
    pub action_defs: Vec<ActionDefinition>,
    pub triggers: Vec<Trigger>,
    pub sets: Vec<SetDefinition>,
    pub counter_capacity: usize,
}

pub fn load_run(manifest: &RunManifest) -> Result<RunSetup> {
    let disease_doc: DiseaseModelDoc = read_json(&manifest.disease_model)?;
    let disease = disease_doc.into_model()?;
    let state_index = disease.states.iter().map(|s| (s.id.clone(), s.index)).collect::<HashMap<_, _>>();

    let network_doc: NetworkDoc = read_json(&manifest.network)?;
    let network = network_doc.into_network(&state_index)?;

    let mut variable_defs = Vec::new();
    let mut sets = Vec::new();
    let mut action_defs = Vec::new();
    let mut triggers = Vec::new();
    let mut action_index_by_id: HashMap<String, usize> = HashMap::new();

    for path in &manifest.interventions {
        let doc: InterventionDoc = read_json(path)?;
        doc.merge_into(&state_index, &mut variable_defs, &mut sets, &mut action_defs, &mut triggers, &mut action_index_by_id)?;
    }
    outbreak_core::action_def::assign_orders(&mut action_defs);

    finalize_global_indices(&mut variable_defs, disease.states.len());
    let global_vars = variable_defs.iter().filter(|d| d.scope == Scope::Global).count();
    let counter_capacity = 1 + 3 * disease.states.len() + global_vars;

    Ok(RunSetup {
        network,
        disease: Arc::new(disease),
        variable_defs,
        action_defs,
        triggers,
        sets,
        counter_capacity,
    })
}

fn node_property_by_name(name: &str) -> Result<NodeProperty> {
    [NodeProperty::Id, NodeProperty::SusceptibilityFactor, NodeProperty::InfectivityFactor, NodeProperty::HealthState, NodeProperty::NodeTrait]
        .into_iter()
        .find(|p| p.name() == name)
        .ok_or_else(|| CliError::Config(format!("unknown node property \"{name}\"")))
}

fn edge_property_by_name(name: &str) -> Result<EdgeProperty> {
    [EdgeProperty::TargetId, EdgeProperty::SourceId, EdgeProperty::EdgeTrait, EdgeProperty::Active, EdgeProperty::Weight, EdgeProperty::Duration]
        .into_iter()
        .find(|p| p.name() == name)
        .ok_or_else(|| CliError::Config(format!("unknown edge property \"{name}\"")))
}

fn resolve_state(states: &HashMap<String, u32>, id: &str) -> Result<u32> {
    states.get(id).copied().ok_or_else(|| CliError::Config(format!("unknown health state \"{id}\"")))
}

// ---------------------------------------------------------------------
// Disease model document
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DiseaseModelDoc {
    states: Vec<StateDoc>,
    initial_state: String,
    #[serde(default = "default_one_f64")]
    global_transmissibility: f64,
    #[serde(default)]
    progressions: Vec<ProgressionDoc>,
    #[serde(default)]
    transmissions: Vec<TransmissionDoc>,
}

fn default_one_f64() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct StateDoc {
    id: String,
    susceptibility: f64,
    infectivity: f64,
}

#[derive(Debug, Deserialize)]
struct ProgressionDoc {
    id: String,
    entry_state: String,
    exit_state: String,
    propensity: f64,
    dwell_time: DistributionDoc,
    #[serde(default)]
    factor_ops: Vec<OperationDoc>,
}

#[derive(Debug, Deserialize)]
struct TransmissionDoc {
    id: String,
    entry_state: String,
    contact_state: String,
    exit_state: String,
    transmissibility: f64,
    #[serde(default)]
    factor_ops: Vec<OperationDoc>,
}

impl DiseaseModelDoc {
    fn into_model(self) -> Result<DiseaseModel> {
        let states_in: Vec<(String, f64, f64)> = self.states.iter().map(|s| (s.id.clone(), s.susceptibility, s.infectivity)).collect();
        let index: HashMap<String, u32> = self.states.iter().enumerate().map(|(i, s)| (s.id.clone(), i as u32)).collect();

        let progressions_in = self
            .progressions
            .into_iter()
            .map(|p| {
                Ok(Progression {
                    id: p.id,
                    entry_state: resolve_state(&index, &p.entry_state)?,
                    exit_state: resolve_state(&index, &p.exit_state)?,
                    propensity: p.propensity,
                    dwell_time: p.dwell_time.into_distribution()?,
                    factor_ops: p.factor_ops.into_iter().map(|o| o.into_operation(&index)).collect::<Result<_>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let transmissions_in = self
            .transmissions
            .into_iter()
            .map(|t| {
                Ok(Transmission {
                    id: t.id,
                    entry_state: resolve_state(&index, &t.entry_state)?,
                    contact_state: resolve_state(&index, &t.contact_state)?,
                    exit_state: resolve_state(&index, &t.exit_state)?,
                    transmissibility: t.transmissibility,
                    factor_ops: t.factor_ops.into_iter().map(|o| o.into_operation(&index)).collect::<Result<_>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let model = DiseaseModel::build(states_in, progressions_in, transmissions_in, &self.initial_state)
            .map_err(CliError::Core)?
            .with_global_transmissibility(self.global_transmissibility);
        Ok(model)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DistributionDoc {
    Fixed { value: u32 },
    Discrete { entries: Vec<(u32, f64)> },
    UniformSet { values: Vec<u32> },
    UniformInterval { min: u32, max: u32 },
    Normal { mean: f64, stddev: f64 },
    Gamma { shape: f64, scale: f64 },
}

impl DistributionDoc {
    fn into_distribution(self) -> Result<Distribution> {
        let dist = match self {
            DistributionDoc::Fixed { value } => Distribution::Fixed(value),
            DistributionDoc::Discrete { entries } => Distribution::Discrete(entries),
            DistributionDoc::UniformSet { values } => Distribution::UniformSet(values),
            DistributionDoc::UniformInterval { min, max } => Distribution::UniformInterval { min, max },
            DistributionDoc::Normal { mean, stddev } => Distribution::Normal { mean, stddev },
            DistributionDoc::Gamma { shape, scale } => Distribution::Gamma { shape, scale },
        };
        dist.validate().map_err(CliError::Core)?;
        Ok(dist)
    }
}

// ---------------------------------------------------------------------
// Network document
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NetworkDoc {
    nodes: Vec<NodeDoc>,
    #[serde(default)]
    edges: Vec<EdgeDoc>,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    id: u64,
    health_state: String,
    #[serde(default = "default_one_f64")]
    susceptibility_factor: f64,
    #[serde(default = "default_one_f64")]
    infectivity_factor: f64,
}

#[derive(Debug, Deserialize)]
struct EdgeDoc {
    target_id: u64,
    source_id: u64,
    #[serde(default = "default_one_f64")]
    duration: f64,
    #[serde(default = "default_one_f64")]
    weight: f64,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

impl NetworkDoc {
    fn into_network(self, states: &HashMap<String, u32>) -> Result<Network> {
        let mut network = Network::new();
        for n in &self.nodes {
            let state = resolve_state(states, &n.health_state)?;
            let mut node = Node::new(n.id, state);
            node.susceptibility_factor = n.susceptibility_factor;
            node.infectivity_factor = n.infectivity_factor;
            network.add_node(node);
        }
        // Every partition's `Edge.source`/`target` carries only a local
        // `NodeIndex`, so an edge can only be represented here when both
        // endpoints are present in this document's node list (see
        // DESIGN.md's "single-partition network document" note).
        for e in &self.edges {
            let target = network.node_index(e.target_id).ok_or_else(|| CliError::Config(format!("edge references unknown target id {}", e.target_id)))?;
            let source = network.node_index(e.source_id).ok_or_else(|| CliError::Config(format!("edge references unknown source id {}", e.source_id)))?;
            network.add_edge(Edge {
                target_id: e.target_id,
                source_id: e.source_id,
                target_activity: TraitBits::ZERO,
                source_activity: TraitBits::ZERO,
                duration: e.duration,
                weight: e.weight,
                active: e.active,
                edge_trait: TraitBits::ZERO,
                target,
                source,
            });
        }
        network.finalize();
        Ok(network)
    }
}

// ---------------------------------------------------------------------
// Intervention documents: variables, sets, triggers, action definitions
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InterventionDoc {
    #[serde(default)]
    variables: Vec<VariableDoc>,
    #[serde(default)]
    sets: Vec<SetDoc>,
    #[serde(default)]
    actions: Vec<ActionDoc>,
    #[serde(default)]
    triggers: Vec<TriggerDoc>,
}

#[derive(Debug, Deserialize)]
struct VariableDoc {
    id: String,
    scope: ScopeDoc,
    initial_value: ValueDoc,
    #[serde(default)]
    reset_period: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ScopeDoc {
    Local,
    Global,
}

#[derive(Debug, Deserialize)]
struct SetDoc {
    name: String,
    scope: ScopeDoc,
    content: SetContentDoc,
}

#[derive(Debug, Deserialize)]
struct ActionDoc {
    id: String,
    #[serde(default = "default_one_f64")]
    priority: f64,
    #[serde(default)]
    delay: u32,
    #[serde(default)]
    condition: Option<ConditionDoc>,
    #[serde(default)]
    operations: Vec<OperationDoc>,
}

#[derive(Debug, Deserialize)]
struct TriggerDoc {
    condition: ConditionDoc,
    action: String,
    #[serde(default)]
    target_set: Option<String>,
}

impl InterventionDoc {
    fn merge_into(
        self,
        states: &HashMap<String, u32>,
        variable_defs: &mut Vec<VariableDefinition>,
        sets: &mut Vec<SetDefinition>,
        action_defs: &mut Vec<ActionDefinition>,
        triggers: &mut Vec<Trigger>,
        action_index_by_id: &mut HashMap<String, usize>,
    ) -> Result<()> {
        for v in self.variables {
            let scope = match v.scope {
                ScopeDoc::Local => Scope::Local,
                ScopeDoc::Global => Scope::Global,
            };
            // Provisional index within this merge's global variables only;
            // `finalize_global_indices` re-bases these once the disease
            // model's per-state slot count is known.
            let global_index = match scope {
                Scope::Global => Some(variable_defs.iter().filter(|d| d.scope == Scope::Global).count()),
                Scope::Local => None,
            };
            variable_defs.push(VariableDefinition { id: v.id, scope, initial_value: v.initial_value.into_value(), reset_period: v.reset_period, global_index });
        }

        for s in self.sets {
            let scope = match s.scope {
                ScopeDoc::Local => Scope::Local,
                ScopeDoc::Global => Scope::Global,
            };
            sets.push(SetDefinition { name: s.name, scope, content: s.content.into_content(states)? });
        }

        for a in self.actions {
            if a.priority < 0.0 {
                return Err(CliError::Config(format!("action \"{}\" has negative priority {}", a.id, a.priority)));
            }
            let index = action_defs.len();
            action_index_by_id.insert(a.id.clone(), index);
            action_defs.push(ActionDefinition {
                index,
                priority: a.priority,
                order: 0,
                delay: a.delay,
                condition: a.condition.map(|c| c.into_condition(states)).transpose()?,
                operations: a.operations.into_iter().map(|o| o.into_operation(states)).collect::<Result<_>>()?,
            });
        }

        for t in self.triggers {
            let action_def = *action_index_by_id
                .get(&t.action)
                .ok_or_else(|| CliError::Config(format!("trigger references unknown action \"{}\"", t.action)))?;
            triggers.push(Trigger { condition: t.condition.into_condition(states)?, action_def, target_set: t.target_set });
        }

        Ok(())
    }
}

/// `global_index` above is a placeholder within the document's own variable
/// list; actual global counter slots are reserved starting at
/// `1 + 3 * disease.states.len()` once the disease model's state count is
/// known, so callers must re-offset global indices after all intervention
/// documents are merged.
fn finalize_global_indices(variable_defs: &mut [VariableDefinition], state_count: usize) {
    let base = 1 + 3 * state_count;
    for def in variable_defs.iter_mut() {
        if let Some(idx) = def.global_index.as_mut() {
            *idx += base;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ValueDoc {
    Bool { value: bool },
    Int { value: i64 },
    Number { value: f64 },
    Id { value: u64 },
    String { value: String },
    HealthState { state: String },
}

impl ValueDoc {
    fn into_value(self) -> Value {
        match self {
            ValueDoc::Bool { value } => Value::Bool(value),
            ValueDoc::Int { value } => Value::Int(value),
            ValueDoc::Number { value } => Value::Number(value),
            ValueDoc::Id { value } => Value::Id(value),
            ValueDoc::String { value } => Value::String(value),
            // Resolved against the disease model's declared state order by
            // `into_value_resolved`; bare `into_value` only covers the
            // variable-initial-value path, which never names a state.
            ValueDoc::HealthState { state } => Value::String(state),
        }
    }

    fn into_value_resolved(self, states: &HashMap<String, u32>) -> Result<Value> {
        match self {
            ValueDoc::HealthState { state } => Ok(Value::Int(resolve_state(states, &state)? as i64)),
            other => Ok(other.into_value()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ObservableDoc {
    CurrentTick,
    TotalPopulation,
    HealthStateAbsoluteCount { state: String },
    HealthStateRelativeCount { state: String },
}

impl ObservableDoc {
    fn into_observable(self, states: &HashMap<String, u32>) -> Result<Observable> {
        Ok(match self {
            ObservableDoc::CurrentTick => Observable::CurrentTick,
            ObservableDoc::TotalPopulation => Observable::TotalPopulation,
            ObservableDoc::HealthStateAbsoluteCount { state } => Observable::HealthStateAbsoluteCount(resolve_state(states, &state)?),
            ObservableDoc::HealthStateRelativeCount { state } => Observable::HealthStateRelativeCount(resolve_state(states, &state)?),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ValueInstanceDoc {
    Literal { value: ValueDoc },
    List { values: Vec<ValueDoc> },
    Observable { observable: ObservableDoc },
    NodeProperty { property: String },
    EdgeProperty { property: String },
    Variable { name: String },
    SizeOf { set: String },
}

impl ValueInstanceDoc {
    fn into_instance(self, states: &HashMap<String, u32>) -> Result<ValueInstance> {
        Ok(match self {
            ValueInstanceDoc::Literal { value } => ValueInstance::Literal(value.into_value_resolved(states)?),
            ValueInstanceDoc::List { values } => {
                ValueInstance::List(ValueList(values.into_iter().map(|v| v.into_value_resolved(states)).collect::<Result<_>>()?))
            }
            ValueInstanceDoc::Observable { observable } => ValueInstance::Observable(observable.into_observable(states)?),
            ValueInstanceDoc::NodeProperty { property } => ValueInstance::NodeProperty(node_property_by_name(&property)?),
            ValueInstanceDoc::EdgeProperty { property } => ValueInstance::EdgeProperty(edge_property_by_name(&property)?),
            ValueInstanceDoc::Variable { name } => ValueInstance::Variable(name),
            ValueInstanceDoc::SizeOf { set } => ValueInstance::SizeOf(set),
        })
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ComparatorDoc {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl From<ComparatorDoc> for Comparator {
    fn from(c: ComparatorDoc) -> Self {
        match c {
            ComparatorDoc::Eq => Comparator::Eq,
            ComparatorDoc::Ne => Comparator::Ne,
            ComparatorDoc::Lt => Comparator::Lt,
            ComparatorDoc::Le => Comparator::Le,
            ComparatorDoc::Gt => Comparator::Gt,
            ComparatorDoc::Ge => Comparator::Ge,
            ComparatorDoc::In => Comparator::In,
            ComparatorDoc::NotIn => Comparator::NotIn,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ConditionDoc {
    Value { value: ValueInstanceDoc },
    Comparison { op: ComparatorDoc, left: ValueInstanceDoc, right: ValueInstanceDoc },
    And { children: Vec<ConditionDoc> },
    Or { children: Vec<ConditionDoc> },
    Not { inner: Box<ConditionDoc> },
}

impl ConditionDoc {
    fn into_condition(self, states: &HashMap<String, u32>) -> Result<Condition> {
        let condition = match self {
            ConditionDoc::Value { value } => Condition::Value(value.into_instance(states)?),
            ConditionDoc::Comparison { op, left, right } => {
                Condition::Comparison { op: op.into(), left: left.into_instance(states)?, right: right.into_instance(states)? }
            }
            ConditionDoc::And { children } => {
                Condition::And(children.into_iter().map(|c| c.into_condition(states)).collect::<Result<_>>()?)
            }
            ConditionDoc::Or { children } => {
                Condition::Or(children.into_iter().map(|c| c.into_condition(states)).collect::<Result<_>>()?)
            }
            ConditionDoc::Not { inner } => Condition::Not(Box::new(inner.into_condition(states)?)),
        };
        condition.validate().map_err(CliError::Core)?;
        Ok(condition)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OperatorDoc {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl From<OperatorDoc> for Operator {
    fn from(o: OperatorDoc) -> Self {
        match o {
            OperatorDoc::Assign => Operator::Assign,
            OperatorDoc::Add => Operator::Add,
            OperatorDoc::Sub => Operator::Sub,
            OperatorDoc::Mul => Operator::Mul,
            OperatorDoc::Div => Operator::Div,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OperationTargetDoc {
    NodeProperty { property: String },
    EdgeProperty { property: String },
    Variable { name: String },
}

#[derive(Debug, Deserialize)]
struct OperationDoc {
    target: OperationTargetDoc,
    operator: OperatorDoc,
    source: ValueInstanceDoc,
}

impl OperationDoc {
    fn into_operation(self, states: &HashMap<String, u32>) -> Result<Operation> {
        let target = match self.target {
            OperationTargetDoc::NodeProperty { property } => OperationTarget::NodeProperty(node_property_by_name(&property)?),
            OperationTargetDoc::EdgeProperty { property } => OperationTarget::EdgeProperty(edge_property_by_name(&property)?),
            OperationTargetDoc::Variable { name } => OperationTarget::Variable(name),
        };
        let operation = Operation { target, operator: self.operator.into(), source: self.source.into_instance(states)? };
        operation.validate().map_err(CliError::Core)?;
        Ok(operation)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SetContentDoc {
    AllNodes,
    AllEdges,
    NodePropertyCmp { property: String, op: ComparatorDoc, value: ValueInstanceDoc },
    NodePropertyInList { property: String, list: ValueInstanceDoc },
    /// A `NodePropertyInList` whose comparison values are given inline in
    /// the manifest rather than as a `ValueInstance`; resolved into a
    /// `StaticFieldSelector` standing in for a real external field source.
    NodePropertyInDbList { property: String, values: Vec<ValueDoc> },
    WithIncomingEdgeIn { edge_set: String },
    EdgePropertyCmp { property: String, op: ComparatorDoc, value: ValueInstanceDoc },
    EdgePropertyInList { property: String, list: ValueInstanceDoc },
    EdgePropertyInDbList { property: String, values: Vec<ValueDoc> },
    WithTargetNodeIn { node_set: String },
    WithSourceNodeIn { node_set: String },
}

impl SetContentDoc {
    fn into_content(self, states: &HashMap<String, u32>) -> Result<SetContent> {
        Ok(match self {
            SetContentDoc::AllNodes => SetContent::AllNodes,
            SetContentDoc::AllEdges => SetContent::AllEdges,
            SetContentDoc::NodePropertyCmp { property, op, value } => {
                SetContent::NodePropertyCmp { prop: node_property_by_name(&property)?, op: op.into(), value: value.into_instance(states)? }
            }
            SetContentDoc::NodePropertyInList { property, list } => {
                SetContent::NodePropertyInList { prop: node_property_by_name(&property)?, list: list.into_instance(states)? }
            }
            SetContentDoc::NodePropertyInDbList { property, values } => SetContent::NodePropertyInDbList {
                prop: node_property_by_name(&property)?,
                selector: Arc::new(StaticFieldSelector(ValueList(
                    values.into_iter().map(|v| v.into_value_resolved(states)).collect::<Result<_>>()?,
                ))),
            },
            SetContentDoc::WithIncomingEdgeIn { edge_set } => SetContent::WithIncomingEdgeIn { edge_set },
            SetContentDoc::EdgePropertyCmp { property, op, value } => {
                SetContent::EdgePropertyCmp { prop: edge_property_by_name(&property)?, op: op.into(), value: value.into_instance(states)? }
            }
            SetContentDoc::EdgePropertyInList { property, list } => {
                SetContent::EdgePropertyInList { prop: edge_property_by_name(&property)?, list: list.into_instance(states)? }
            }
            SetContentDoc::EdgePropertyInDbList { property, values } => SetContent::EdgePropertyInDbList {
                prop: edge_property_by_name(&property)?,
                selector: Arc::new(StaticFieldSelector(ValueList(
                    values.into_iter().map(|v| v.into_value_resolved(states)).collect::<Result<_>>()?,
                ))),
            },
            SetContentDoc::WithTargetNodeIn { node_set } => SetContent::WithTargetNodeIn { node_set },
            SetContentDoc::WithSourceNodeIn { node_set } => SetContent::WithSourceNodeIn { node_set },
        })
    }
}
