//! Tick loop & transmission kernel (C10): per-tick orchestration of one
//! process's partition of the simulation — reset variables, recompute
//! dependent sets, fire triggers, run the transmission kernel over owned
//! nodes, drain the action queue to a fixed point, record state changes,
//! and reduce per-tick health-state counts into the summary output.
//!
//! Adapted from the teacher's `HeadlessRunner` builder/loop shape
//! (`with_tick_rate`/`with_max_ticks`, an owning loop over a director),
//! replacing wall-clock pacing with a synchronous as-fast-as-possible
//! loop and the single scene update with this spec's explicit 9-step
//! phase sequence; the transmission kernel's "collect candidates, then
//! decide" shape is adapted from the teacher's contagion system's
//! collect-then-apply pattern.

use crate::context::ThreadContext;
use crate::counters::CounterStore;
use crate::error::Result;
use crate::output::{append_summary_row, flush_change_log, ChangeLogBuffer, ChangeRow, SummaryRow};
use crate::queue::ActionQueue;
use crate::rng::SimRng;
use crate::transport::LocalTransport;
use crate::variables::VariableStore;
use outbreak_core::action_def::{Action, ActionDefinition, ActionKind, Effect};
use outbreak_core::condition::Condition;
use outbreak_core::depgraph::{ComputableId, DependencyGraph};
use outbreak_core::disease::model::DiseaseModel;
use outbreak_core::network::{EdgeIndex, Network, NodeIndex};
use outbreak_core::operation::{Operation, Operator, WriteTarget};
use outbreak_core::property::{EdgeProperty, NodeProperty};
use outbreak_core::sets::{CollectibleProperty, Collector, SetDefinition, SetResult};
use outbreak_core::value::Value;
use outbreak_core::valueinstance::{Bound, Environment, Observable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

/// A configured trigger: fires its action when `condition` holds. When
/// `target_set` is `Some`, one node-bound action is materialized per
/// locally owned member of that set; otherwise a single unbound
/// (variable-targeting) action is materialized.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub condition: Condition,
    pub action_def: usize,
    pub target_set: Option<String>,
}

/// Run-wide parameters that don't vary per rank.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start_tick: u64,
    pub end_tick: u64,
    pub master_seed: u64,
    pub time_resolution: f64,
    pub output_path: PathBuf,
    pub summary_output_path: PathBuf,
    pub has_location: bool,
}

/// Reserved priority order used for transmission/progression actions, which
/// aren't drawn from the action-definition priority table: they're
/// scheduled by the disease model rather than an intervention, so there's
/// no configured priority to flatten. Chosen to run last within a tick,
/// after every configured intervention with an explicit priority.
const DISEASE_EFFECT_ORDER: u32 = u32::MAX;

/// Stable index into the shared [`CounterStore`] used to reduce the action
/// queue's global pending-action count across ranks each drain round. State
/// current/in/out counters occupy three slots each starting at index 1, so
/// a `Rank`'s counter store needs at least `1 + 3 * disease.states.len()`
/// slots.
const PENDING_COUNT_SLOT: usize = 0;

/// One process's view of the simulation: its partition of the contact
/// network plus everything the tick loop needs to drive it. `threads_per_process`
/// worker "lanes" each own a contiguous range of `network.nodes` and their
/// own action queue, RNG stream, and change-log buffer, each held in a
/// [`ThreadContext`] slot indexed by local thread index (§5's shared-resource
/// policy). `network`/`variables` are wrapped in `RefCell` so a single
/// action's read (via [`EngineEnv`]) and write (via [`EngineWrite`]) can be
/// handed to `Operation::apply` at the same time without the two views
/// holding conflicting `&mut` borrows of the same storage.
pub struct Rank {
    pub rank: usize,
    pub threads_per_process: usize,
    pub network: RefCell<Network>,
    pub disease: Arc<DiseaseModel>,
    pub variables: RefCell<VariableStore>,
    pub action_defs: Vec<ActionDefinition>,
    pub triggers: Vec<Trigger>,
    pub sets: Vec<SetDefinition>,
    pub transport: LocalTransport,
    counters: Arc<CounterStore>,
    queues: ThreadContext<ActionQueue>,
    rngs: ThreadContext<SimRng>,
    change_logs: ThreadContext<ChangeLogBuffer>,
    /// Per-thread, per-state entered/exited deltas for the current tick,
    /// cleared at the start of each tick alongside the change log.
    entered: ThreadContext<Vec<i64>>,
    exited: ThreadContext<Vec<i64>>,
    set_cache: HashMap<String, SetResult>,
    /// Tracks which sets reference other sets (`WithIncomingEdgeIn`,
    /// `WithTargetNodeIn`, `WithSourceNodeIn`), so each tick's recompute
    /// evaluates a referenced set before the set that reads it even when
    /// the dependency isn't just one level deep. `set_graph_order[i]` is
    /// the index into `sets` for `set_graph`'s `i`th computable.
    set_graph: DependencyGraph,
    set_graph_order: Vec<usize>,
    /// One entry per `sets[i]`: a live `Collector` for sets whose
    /// membership test reads a single writable property, so `EngineWrite`
    /// can maintain membership incrementally instead of recompute_sets
    /// rescanning the whole network every tick (§4.6).
    set_collectors: Vec<SetCollectorKind>,
    tick: u64,
    state_ids: Vec<String>,
}

/// Per-set incremental membership tracker, or `None` for sets whose content
/// isn't a single-property test (`SetContent::collectible_property`).
enum SetCollectorKind {
    Node(Collector<NodeIndex>),
    Edge(Collector<EdgeIndex>),
    None,
}

impl SetCollectorKind {
    fn for_set(def: &SetDefinition) -> Self {
        match def.content.collectible_property() {
            Some(CollectibleProperty::Node(_)) => SetCollectorKind::Node(Collector::new()),
            Some(CollectibleProperty::Edge(_)) => SetCollectorKind::Edge(Collector::new()),
            None => SetCollectorKind::None,
        }
    }

    fn is_enabled(&self) -> bool {
        match self {
            SetCollectorKind::Node(c) => c.is_enabled(),
            SetCollectorKind::Edge(c) => c.is_enabled(),
            SetCollectorKind::None => false,
        }
    }

    fn record_node(&mut self, id: NodeIndex, now_matches: bool) {
        if let SetCollectorKind::Node(c) = self {
            c.record(id, now_matches);
        }
    }

    fn record_edge(&mut self, id: EdgeIndex, now_matches: bool) {
        if let SetCollectorKind::Edge(c) = self {
            c.record(id, now_matches);
        }
    }
}

/// Builds a [`DependencyGraph`] computable per set, registering a set only
/// once every other set its content reads (via `SetContent::depends_on`)
/// has already been registered, so prerequisite ids exist by the time a
/// dependent set is added. Returns the graph plus, for each computable id
/// in registration order, the index into `sets` it corresponds to.
fn build_set_graph(sets: &[SetDefinition]) -> (DependencyGraph, Vec<usize>) {
    let mut graph = DependencyGraph::new();
    let mut registered: HashMap<&str, ComputableId> = HashMap::new();
    let mut order: Vec<usize> = Vec::with_capacity(sets.len());
    let mut remaining: Vec<usize> = (0..sets.len()).collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|&i| {
            let dep_name = sets[i].content.depends_on();
            let ready = match dep_name {
                None => true,
                Some(name) => registered.contains_key(name),
            };
            if !ready {
                return true;
            }
            let prereqs: Vec<ComputableId> = dep_name.and_then(|n| registered.get(n)).copied().into_iter().collect();
            let id = graph.register(&sets[i].name, &prereqs, false);
            registered.insert(sets[i].name.as_str(), id);
            order.push(i);
            false
        });
        if remaining.len() == before {
            // A referenced set name doesn't resolve (typo, or a genuine
            // cycle). Register the rest with no prerequisites so they're
            // still recomputed, just without a guaranteed evaluation order
            // relative to each other.
            for &i in &remaining {
                tracing::warn!(set = %sets[i].name, "set selector references an unresolved set name; dropping the dependency edge");
                let id = graph.register(&sets[i].name, &[], false);
                registered.insert(sets[i].name.as_str(), id);
                order.push(i);
            }
            break;
        }
    }
    (graph, order)
}

/// Recomputes one set's membership. If its collector is already enabled
/// (it has seen an initial full scan and is now tracking deltas recorded
/// by `EngineWrite`), this applies just those pending deltas to the
/// previous tick's cached result instead of rescanning the whole network.
/// Otherwise it does a full `SetContent::evaluate` and, if the set is
/// collectible, seeds the collector with that result so later ticks can
/// take the incremental path.
fn recompute_one_set(
    set: &SetDefinition,
    collector: &mut SetCollectorKind,
    network: &RefCell<Network>,
    variables: &RefCell<VariableStore>,
    tick: u64,
    registry: &HashMap<String, SetResult>,
    previous: Option<SetResult>,
) -> SetResult {
    if collector.is_enabled() {
        match (&mut *collector, previous) {
            (SetCollectorKind::Node(c), Some(SetResult::Nodes(v))) => return SetResult::Nodes(c.apply(v)),
            (SetCollectorKind::Edge(c), Some(SetResult::Edges(v))) => return SetResult::Edges(c.apply(v)),
            _ => {} // cache miss (first tick after a mid-run reset); fall through to a full scan
        }
    }
    let env = EngineEnv { network, variables, tick, sets: registry };
    let result = set.content.evaluate(&network.borrow(), registry, &env);
    match (&mut *collector, &result) {
        (SetCollectorKind::Node(c), SetResult::Nodes(v)) => {
            c.apply(v.clone());
        }
        (SetCollectorKind::Edge(c), SetResult::Edges(v)) => {
            c.apply(v.clone());
        }
        _ => {}
    }
    result
}

impl Rank {
    pub fn new(
        rank: usize,
        threads_per_process: usize,
        network: Network,
        disease: Arc<DiseaseModel>,
        variables: VariableStore,
        action_defs: Vec<ActionDefinition>,
        triggers: Vec<Trigger>,
        sets: Vec<SetDefinition>,
        transport: LocalTransport,
        counters: Arc<CounterStore>,
        master_seed: u64,
        start_tick: u64,
    ) -> Self {
        let threads_per_process = threads_per_process.max(1);
        let queues = ThreadContext::new((0..threads_per_process).map(|_| ActionQueue::new()).collect(), 0);
        let rngs = ThreadContext::new(
            (0..threads_per_process)
                .map(|t| SimRng::from_master_seed(master_seed, rank, threads_per_process, t))
                .collect(),
            0,
        );
        let change_logs = ThreadContext::new((0..threads_per_process).map(|_| ChangeLogBuffer::new()).collect(), 0);
        let state_ids: Vec<String> = disease.states.iter().map(|s| s.id.clone()).collect();
        let entered =
            ThreadContext::new((0..threads_per_process).map(|_| vec![0i64; state_ids.len()]).collect(), 0);
        let exited =
            ThreadContext::new((0..threads_per_process).map(|_| vec![0i64; state_ids.len()]).collect(), 0);
        let (set_graph, set_graph_order) = build_set_graph(&sets);
        let set_collectors: Vec<SetCollectorKind> = sets.iter().map(SetCollectorKind::for_set).collect();
        Rank {
            rank,
            threads_per_process,
            network: RefCell::new(network),
            disease,
            variables: RefCell::new(variables),
            action_defs,
            triggers,
            sets,
            transport,
            counters,
            queues,
            rngs,
            change_logs,
            entered,
            exited,
            set_cache: HashMap::new(),
            set_graph,
            set_graph_order,
            set_collectors,
            tick: start_tick,
            state_ids,
        }
    }

    /// Splits `network.nodes`'s index range into `threads_per_process`
    /// contiguous, roughly-equal partitions (§5: "a thread owns a
    /// contiguous range of local nodes").
    fn partitions(&self) -> Vec<Range<NodeIndex>> {
        let n = self.network.borrow().nodes.len();
        let t = self.threads_per_process;
        let base = n / t;
        let extra = n % t;
        let mut ranges = Vec::with_capacity(t);
        let mut start = 0;
        for i in 0..t {
            let len = base + if i < extra { 1 } else { 0 };
            ranges.push(start..start + len);
            start += len;
        }
        ranges
    }

    fn owner_thread(&self, node: NodeIndex) -> usize {
        self.partitions().iter().position(|r| r.contains(&node)).unwrap_or(0)
    }

    /// Runs every tick from `cfg.start_tick` to `cfg.end_tick` inclusive,
    /// then flushes output. Writes the summary header once up front (only
    /// on rank 0, matching "the summary file is written only on process 0").
    pub fn run(&mut self, cfg: &RunConfig) -> Result<()> {
        if self.rank == 0 {
            let var_ids = self.variables.borrow().ids();
            crate::output::write_summary_header(&cfg.summary_output_path, &self.state_ids, &var_ids)?;
        }
        self.transport.barrier();

        for tick in cfg.start_tick..=cfg.end_tick {
            self.tick = tick;
            self.run_one_tick(tick, cfg)?;
        }

        let buffers: Vec<ChangeLogBuffer> = std::mem::take(&mut self.change_logs).into_vec();
        flush_change_log(&self.transport, &buffers, &cfg.output_path, cfg.has_location)?;
        self.change_logs = ThreadContext::new(buffers.into_iter().map(|_| ChangeLogBuffer::new()).collect(), 0);
        Ok(())
    }

    fn run_one_tick(&mut self, tick: u64, cfg: &RunConfig) -> Result<()> {
        // 1. CChanges.clear(): fresh per-thread CSV buffer and delta
        // counters for this tick.
        for log in self.change_logs.iter_mut() {
            log.clear();
        }
        for deltas in self.entered.iter_mut().chain(self.exited.iter_mut()) {
            deltas.iter_mut().for_each(|v| *v = 0);
        }

        // 2. CVariableList.resetAll(force=false).
        self.variables.borrow_mut().reset_due(tick, self.rank == 0);

        // 3. CDependencyGraph.applyUpdateOrder(): recompute every
        // registered set from the current network/variable state, in the
        // order the dependency graph says is safe (a set that reads
        // another set is recomputed only after its dependency). Every set
        // is conservatively marked both changed and requested each tick,
        // since nothing here tracks which individual properties changed;
        // collectors (§4.6) are the incremental fast path layered on top
        // of this same contract for single-property selectors.
        self.recompute_sets();

        // 4. Trigger phase.
        self.run_triggers(tick);

        // 5. Transmission phase.
        self.run_transmission_kernel(tick, cfg);

        // 6. Action drain, to a fixed point across threads and ranks.
        self.drain_tick(tick)?;

        // 7 & 8. Record + summary, then barrier-reduced global counts.
        self.record_and_summarize(tick, cfg)?;

        Ok(())
    }

    // ---- dependency/sets -------------------------------------------------

    fn recompute_sets(&mut self) {
        if self.sets.is_empty() {
            return;
        }
        let all_ids: Vec<ComputableId> = (0..self.sets.len()).collect();
        for &id in &all_ids {
            self.set_graph.mark_changed(id);
            self.set_graph.mark_requested(id);
        }
        let order = self.set_graph.apply_update_order(&all_ids, &all_ids);

        let mut registry: HashMap<String, SetResult> = HashMap::new();
        for id in order {
            let set_idx = self.set_graph_order[id];
            let previous = self.set_cache.get(&self.sets[set_idx].name).cloned();
            let result = recompute_one_set(
                &self.sets[set_idx],
                &mut self.set_collectors[set_idx],
                &self.network,
                &self.variables,
                self.tick,
                &registry,
                previous,
            );
            registry.insert(self.sets[set_idx].name.clone(), result);
        }
        self.set_cache = registry;
    }

    fn environment<'a>(&'a self, sets: &'a HashMap<String, SetResult>) -> EngineEnv<'a> {
        EngineEnv { network: &self.network, variables: &self.variables, tick: self.tick, sets }
    }

    // ---- triggers ---------------------------------------------------------

    fn run_triggers(&mut self, tick: u64) {
        let mut to_enqueue: Vec<(usize, Option<NodeIndex>)> = Vec::new();
        {
            let env = self.environment(&self.set_cache);
            for trigger in &self.triggers {
                if trigger.condition.evaluate(&env, Bound::None) {
                    match &trigger.target_set {
                        None => to_enqueue.push((trigger.action_def, None)),
                        Some(set_name) => {
                            if let Some(SetResult::Nodes(members)) = self.set_cache.get(set_name) {
                                for &node in members {
                                    to_enqueue.push((trigger.action_def, Some(node)));
                                }
                            }
                        }
                    }
                }
            }
        }
        for (action_def, node) in to_enqueue {
            let def = &self.action_defs[action_def];
            let kind = match node {
                Some(node) => ActionKind::Node { node },
                None => ActionKind::Variable,
            };
            let thread = node.map(|n| self.owner_thread(n)).unwrap_or(0);
            self.queues.active_mut(thread).add(tick, def.delay, def.order, Action { definition: action_def, kind });
        }
    }

    // ---- transmission kernel ----------------------------------------------

    /// Runs the transmission test once per owned node, one partition at a
    /// time, each partition drawing only from its own RNG stream so the
    /// result is reproducible regardless of how a future change splits the
    /// work across lanes. `self.rngs` is taken out for the duration so the
    /// closure below captures only local values, never `self`.
    fn run_transmission_kernel(&mut self, tick: u64, cfg: &RunConfig) {
        let partitions = self.partitions();
        let disease = self.disease.clone();
        let global_transmissibility = disease.global_transmissibility;
        let time_resolution = cfg.time_resolution.max(f64::EPSILON);

        let mut rngs = std::mem::take(&mut self.rngs);
        let network = self.network.borrow();
        let fired: Vec<Vec<Action>> = partitions
            .iter()
            .zip(rngs.iter_mut())
            .map(|(range, rng)| {
                let mut out = Vec::new();
                for node_idx in range.clone() {
                    if let Some(action) =
                        fire_transmission(node_idx, &network, &disease, rng, global_transmissibility, time_resolution)
                    {
                        out.push(action);
                    }
                }
                out
            })
            .collect();
        drop(network);
        self.rngs = rngs;

        for (lane, batch) in fired.into_iter().enumerate() {
            for action in batch {
                self.queues.active_mut(lane).add(tick, 0, DISEASE_EFFECT_ORDER, action);
            }
        }
    }

    // ---- drain --------------------------------------------------------------

    /// Drains every thread's current-tick bucket, re-checking the global
    /// pending count after each pass so actions enqueued during this tick's
    /// own execution (an intervention scheduling a same-tick follow-up) are
    /// picked up before the tick is considered settled. Cross-rank action
    /// relay isn't implemented here: nothing in this data model currently
    /// produces a remote-owned action to relay, since a contact edge's
    /// source is always a local `NodeIndex`.
    fn drain_tick(&mut self, tick: u64) -> Result<()> {
        loop {
            for thread in 0..self.threads_per_process {
                if let Some(mut bucket) = self.queues.active_mut(thread).detach(tick) {
                    for (_order, mut actions) in bucket.orders_ascending() {
                        self.rngs.active_mut(thread).shuffle(&mut actions);
                        for action in actions {
                            self.execute_action(thread, tick, action)?;
                        }
                    }
                }
            }

            self.transport.barrier();
            let local_pending: usize =
                (0..self.threads_per_process).map(|t| self.queues.active(t).pending_count_at(tick)).sum();
            let total = self.reduce_pending_count(local_pending)?;
            if total == 0 {
                break;
            }
        }
        Ok(())
    }

    fn reduce_pending_count(&self, local: usize) -> Result<usize> {
        self.transport.sequential(|| {
            let _ = self.counters.update(PENDING_COUNT_SLOT, Operator::Add, local as f64);
        });
        let total_bytes = if self.rank == 0 {
            let total = self.counters.get(PENDING_COUNT_SLOT)? as usize;
            self.counters.reset(PENDING_COUNT_SLOT, 0.0)?;
            total.to_le_bytes().to_vec()
        } else {
            0usize.to_le_bytes().to_vec()
        };
        let bytes = self.transport.broadcast_from(0, total_bytes);
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes[0..8]);
        Ok(usize::from_le_bytes(arr))
    }

    fn execute_action(&mut self, thread: usize, tick: u64, action: Action) -> Result<()> {
        let current_state = action.target_node().map(|n| self.network.borrow().nodes[n].health_state);
        if let Some(state) = current_state {
            if !action.is_live(state) {
                // Stale action: silently no-op (§8 property 5).
                return Ok(());
            }
        }

        match &action.kind {
            ActionKind::Variable | ActionKind::Node { .. } | ActionKind::Edge { .. } => {
                let def = self.action_defs[action.definition].clone();
                let bound = action.bound();
                let sets = self.set_cache.clone();
                let env = EngineEnv { network: &self.network, variables: &self.variables, tick, sets: &sets };
                let mut write = EngineWrite {
                    network: &self.network,
                    variables: &self.variables,
                    change_log: self.change_logs.active_mut(thread),
                    entered: self.entered.active_mut(thread),
                    exited: self.exited.active_mut(thread),
                    disease: &self.disease,
                    tick,
                    contact_node_id: None,
                    location_id: None,
                    sets: &self.sets,
                    set_collectors: &mut self.set_collectors,
                };
                let state_changed = def.execute(&env, &mut write, bound);
                if state_changed {
                    if let Some(node) = action.target_node() {
                        self.schedule_next_progression(thread, node, tick);
                    }
                }
            }
            ActionKind::TransmissionOrProgression { node, effect, contact_node_id, .. } => {
                let node = *node;
                let exit_state = match effect {
                    Effect::Transmission(id) => self.disease.transmission_by_id(id).map(|t| (t.exit_state, t.factor_ops.clone())),
                    Effect::Progression(id) => self.disease.progression_by_id(id).map(|p| (p.exit_state, p.factor_ops.clone())),
                };
                if let Some((exit_state, factor_ops)) = exit_state {
                    self.apply_disease_effect(thread, tick, node, exit_state, &factor_ops, *contact_node_id)?;
                    self.schedule_next_progression(thread, node, tick);
                }
            }
        }
        Ok(())
    }

    /// §4.3 "Action execution": writes the new health state (which itself
    /// refreshes susceptibility/infectivity and records the change row),
    /// then applies the transmission's or progression's factor operations.
    fn apply_disease_effect(
        &mut self,
        thread: usize,
        tick: u64,
        node: NodeIndex,
        exit_state: u32,
        factor_ops: &[Operation],
        contact_node_id: Option<u64>,
    ) -> Result<()> {
        let sets = self.set_cache.clone();
        let env = EngineEnv { network: &self.network, variables: &self.variables, tick, sets: &sets };
        let mut write = EngineWrite {
            network: &self.network,
            variables: &self.variables,
            change_log: self.change_logs.active_mut(thread),
            entered: self.entered.active_mut(thread),
            exited: self.exited.active_mut(thread),
            disease: &self.disease,
            tick,
            contact_node_id,
            location_id: None,
            sets: &self.sets,
            set_collectors: &mut self.set_collectors,
        };
        write.write_node_property(node, NodeProperty::HealthState, Value::Int(exit_state as i64))?;
        for op in factor_ops {
            op.apply(&env, &mut write, Bound::Node(node))?;
        }
        Ok(())
    }

    fn schedule_next_progression(&mut self, thread: usize, node: NodeIndex, tick: u64) {
        let state_idx = self.network.borrow().nodes[node].health_state;
        let state = self.disease.state(state_idx).clone();
        let hook = self.disease.progression_hook(state_idx).clone();
        if let Some(prog_idx) = hook.select(&state, self.rngs.active_mut(thread).inner()) {
            let progression = state.progressions[prog_idx].clone();
            let dwell_hook = self.disease.dwell_hook(&progression.id).clone();
            let delay = dwell_hook.dwell_time(&progression, self.rngs.active_mut(thread).inner());
            let action = Action {
                definition: 0,
                kind: ActionKind::TransmissionOrProgression {
                    node,
                    state_at_schedule: state_idx,
                    effect: Effect::Progression(progression.id),
                    contact_node_id: None,
                },
            };
            self.queues.active_mut(thread).add(tick, delay, DISEASE_EFFECT_ORDER, action);
        }
    }

    // ---- record & summary -----------------------------------------------

    fn record_and_summarize(&mut self, tick: u64, cfg: &RunConfig) -> Result<()> {
        self.transport.barrier();

        let local_current: Vec<i64> = {
            let network = self.network.borrow();
            (0..self.state_ids.len() as u32)
                .map(|s| network.nodes.iter().filter(|n| n.health_state == s).count() as i64)
                .collect()
        };
        let mut local_entered = vec![0i64; self.state_ids.len()];
        let mut local_exited = vec![0i64; self.state_ids.len()];
        for thread in 0..self.threads_per_process {
            for s in 0..self.state_ids.len() {
                local_entered[s] += self.entered.active(thread)[s];
                local_exited[s] += self.exited.active(thread)[s];
            }
        }

        // Three reduced slots per state: current, in, out. All three must
        // be reduced across ranks, not just read from this rank's own
        // partition, so a multi-process run reports the whole population.
        self.transport.sequential(|| {
            for idx in 0..self.state_ids.len() {
                let base = 1 + idx * 3;
                let _ = self.counters.update(base, Operator::Add, local_current[idx] as f64);
                let _ = self.counters.update(base + 1, Operator::Add, local_entered[idx] as f64);
                let _ = self.counters.update(base + 2, Operator::Add, local_exited[idx] as f64);
            }
        });
        self.transport.barrier();

        if self.rank == 0 {
            let mut state_counts = Vec::with_capacity(self.state_ids.len());
            for idx in 0..self.state_ids.len() {
                let base = 1 + idx * 3;
                let current = self.counters.get(base)? as i64;
                let inn = self.counters.get(base + 1)? as i64;
                let out = self.counters.get(base + 2)? as i64;
                self.counters.reset(base, 0.0)?;
                self.counters.reset(base + 1, 0.0)?;
                self.counters.reset(base + 2, 0.0)?;
                state_counts.push((current, inn, out));
            }
            let variables = {
                let vars = self.variables.borrow();
                vars.ids().iter().map(|id| (id.clone(), vars.read(id).as_f64().unwrap_or(0.0))).collect()
            };
            append_summary_row(&cfg.summary_output_path, &SummaryRow { tick, state_counts, variables, seed: cfg.master_seed })?;
        }
        self.transport.barrier();
        Ok(())
    }
}

/// The single candidate a node's incoming edges produce for the
/// propensity-weighted draw (§4.3).
struct Candidate {
    transmission_id: String,
    propensity: f64,
    source_id: u64,
}

fn fire_transmission(
    node_idx: NodeIndex,
    network: &Network,
    disease: &DiseaseModel,
    rng: &mut SimRng,
    global_transmissibility: f64,
    time_resolution: f64,
) -> Option<Action> {
    let node = &network.nodes[node_idx];
    if node.effective_susceptibility() <= 0.0 {
        return None;
    }
    let state_idx = node.health_state;

    let mut candidates: Vec<Candidate> = Vec::new();
    for &edge_idx in &node.incoming {
        let edge = &network.edges[edge_idx];
        if !edge.active {
            continue;
        }
        let source = &network.nodes[edge.source];
        if source.effective_infectivity() <= 0.0 {
            continue;
        }
        if let Some(transmission) = disease.transmission_for(state_idx, source.health_state) {
            let hook = disease.transmission_hook(&transmission.id);
            let propensity = hook.propensity(transmission, edge, node, source.effective_infectivity());
            if propensity > 0.0 {
                candidates.push(Candidate { transmission_id: transmission.id.clone(), propensity, source_id: source.id });
            }
        }
    }

    if candidates.is_empty() {
        return None;
    }
    let a0: f64 = candidates.iter().map(|c| c.propensity).sum();
    if a0 <= 0.0 {
        return None;
    }

    let u1 = rng.uniform01().max(f64::EPSILON);
    let u2 = rng.uniform01();
    if -u1.ln() >= a0 * global_transmissibility / time_resolution {
        return None;
    }

    let threshold = u2 * a0;
    let mut acc = 0.0;
    let mut chosen = &candidates[candidates.len() - 1];
    for c in &candidates {
        acc += c.propensity;
        if threshold <= acc {
            chosen = c;
            break;
        }
    }

    Some(Action {
        definition: 0,
        kind: ActionKind::TransmissionOrProgression {
            node: node_idx,
            state_at_schedule: state_idx,
            effect: Effect::Transmission(chosen.transmission_id.clone()),
            contact_node_id: Some(chosen.source_id),
        },
    })
}

/// Read-only environment over a rank's network/variables for condition and
/// operation evaluation. Holds a shared `&RefCell<_>` rather than `&T`
/// directly so it can coexist with an [`EngineWrite`] borrowing the same
/// underlying state within a single `Operation::apply` call.
struct EngineEnv<'a> {
    network: &'a RefCell<Network>,
    variables: &'a RefCell<VariableStore>,
    tick: u64,
    sets: &'a HashMap<String, SetResult>,
}

impl<'a> Environment for EngineEnv<'a> {
    fn node_property(&self, node: NodeIndex, prop: NodeProperty) -> Value {
        prop.read(&self.network.borrow().nodes[node])
    }

    fn edge_property(&self, edge: EdgeIndex, prop: EdgeProperty) -> Value {
        prop.read(&self.network.borrow().edges[edge])
    }

    fn variable(&self, name: &str) -> Value {
        self.variables.borrow().read(name)
    }

    fn observable(&self, obs: &Observable) -> Value {
        let network = self.network.borrow();
        match obs {
            Observable::CurrentTick => Value::Int(self.tick as i64),
            Observable::TotalPopulation => Value::Int(network.nodes.len() as i64),
            Observable::HealthStateAbsoluteCount(state) => {
                Value::Int(network.nodes.iter().filter(|n| n.health_state == *state).count() as i64)
            }
            Observable::HealthStateRelativeCount(state) => {
                let total = network.nodes.len();
                let count = network.nodes.iter().filter(|n| n.health_state == *state).count();
                Value::Number(if total == 0 { 0.0 } else { count as f64 / total as f64 })
            }
        }
    }

    fn set_size(&self, set_name: &str) -> usize {
        self.sets.get(set_name).map(SetResult::len).unwrap_or(0)
    }
}

/// Mutation seam over a rank's network/variables, plus the bookkeeping a
/// raw `Operation::apply` can't see: refreshing derived susceptibility and
/// infectivity on a health-state change, recording the change row, and
/// tallying this thread's entered/exited counts for the tick.
struct EngineWrite<'a> {
    network: &'a RefCell<Network>,
    variables: &'a RefCell<VariableStore>,
    change_log: &'a mut ChangeLogBuffer,
    entered: &'a mut Vec<i64>,
    exited: &'a mut Vec<i64>,
    disease: &'a DiseaseModel,
    tick: u64,
    contact_node_id: Option<u64>,
    location_id: Option<u64>,
    sets: &'a [SetDefinition],
    set_collectors: &'a mut [SetCollectorKind],
}

impl<'a> EngineWrite<'a> {
    /// Re-tests every collectible set whose watched property is `prop`
    /// against the single element just written, recording the delta on its
    /// collector instead of waiting for the next full `recompute_sets` scan.
    fn record_node_collectors(&mut self, node: NodeIndex, prop: NodeProperty) {
        let network = self.network.borrow();
        let empty = HashMap::new();
        let env = EngineEnv { network: self.network, variables: self.variables, tick: self.tick, sets: &empty };
        for (set, collector) in self.sets.iter().zip(self.set_collectors.iter_mut()) {
            if set.content.collectible_property() == Some(CollectibleProperty::Node(prop)) {
                if let Some(now_matches) = set.content.node_matches(node, &network, &env) {
                    collector.record_node(node, now_matches);
                }
            }
        }
    }

    fn record_edge_collectors(&mut self, edge: EdgeIndex, prop: EdgeProperty) {
        let network = self.network.borrow();
        let empty = HashMap::new();
        let env = EngineEnv { network: self.network, variables: self.variables, tick: self.tick, sets: &empty };
        for (set, collector) in self.sets.iter().zip(self.set_collectors.iter_mut()) {
            if set.content.collectible_property() == Some(CollectibleProperty::Edge(prop)) {
                if let Some(now_matches) = set.content.edge_matches(edge, &network, &env) {
                    collector.record_edge(edge, now_matches);
                }
            }
        }
    }
}

impl<'a> WriteTarget for EngineWrite<'a> {
    fn write_node_property(&mut self, node: NodeIndex, prop: NodeProperty, value: Value) -> outbreak_core::Result<bool> {
        let changed = {
            let mut network = self.network.borrow_mut();
            let old_state = network.nodes[node].health_state;
            let changed = prop.write(&mut network.nodes[node], value)?;
            if changed && prop == NodeProperty::HealthState {
                let new_state = network.nodes[node].health_state;
                let state = self.disease.state(new_state);
                network.nodes[node].susceptibility = state.base_susceptibility;
                network.nodes[node].infectivity = state.base_infectivity;
                self.exited[old_state as usize] += 1;
                self.entered[new_state as usize] += 1;
                self.change_log.record(ChangeRow {
                    tick: self.tick,
                    node_id: network.nodes[node].id,
                    exit_state: state.id.clone(),
                    contact_node_id: self.contact_node_id,
                    location_id: self.location_id,
                });
            }
            changed
        };
        if changed {
            self.record_node_collectors(node, prop);
        }
        Ok(changed)
    }

    fn write_edge_property(&mut self, edge: EdgeIndex, prop: EdgeProperty, value: Value) -> outbreak_core::Result<()> {
        prop.write(&mut self.network.borrow_mut().edges[edge], value)?;
        self.record_edge_collectors(edge, prop);
        Ok(())
    }

    fn write_variable(&mut self, name: &str, operator: Operator, operand: Value) -> outbreak_core::Result<()> {
        self.variables.borrow_mut().write(name, operator, operand).map_err(|e| outbreak_core::CoreError::Engine(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::disease::distribution::Distribution;
    use outbreak_core::disease::model::{Progression, Transmission};
    use outbreak_core::network::{Edge, Node};
    use outbreak_core::value::TraitBits;
    use outbreak_core::variable::{Scope as VarScope, VariableDefinition};

    fn two_node_model() -> DiseaseModel {
        let states = vec![("S".to_string(), 1.0, 0.0), ("I".to_string(), 0.0, 1.0)];
        let transmissions = vec![Transmission {
            id: "S_I".to_string(),
            entry_state: 0,
            contact_state: 1,
            exit_state: 1,
            transmissibility: 1.0,
            factor_ops: vec![],
        }];
        DiseaseModel::build(states, vec![], transmissions, "S").unwrap()
    }

    fn build_rank(model: DiseaseModel, seed: u64) -> Rank {
        let mut network = Network::new();
        let a = network.add_node(Node::new(1, 0)); // susceptible
        let b = network.add_node(Node::new(2, 1)); // infectious
        network.nodes[a].susceptibility = 1.0;
        network.nodes[b].infectivity = 1.0;
        network.add_edge(Edge {
            target_id: 1,
            source_id: 2,
            target_activity: TraitBits::ZERO,
            source_activity: TraitBits::ZERO,
            duration: 1.0,
            weight: 1.0,
            active: true,
            edge_trait: TraitBits::ZERO,
            target: a,
            source: b,
        });
        network.finalize();

        let counters = Arc::new(CounterStore::new(16));
        let transports = LocalTransport::new_ring(1);
        let transport = transports.into_iter().next().unwrap();
        let variables = VariableStore::new(vec![], counters.clone());

        Rank::new(0, 1, network, Arc::new(model), variables, vec![], vec![], vec![], transport, counters, seed, 0)
    }

    fn temp_paths(name: &str) -> (PathBuf, PathBuf) {
        let changes = std::env::temp_dir().join(format!("outbreak_test_{name}.csv"));
        let summary = std::env::temp_dir().join(format!("outbreak_test_{name}_summary.csv"));
        let _ = std::fs::remove_file(&changes);
        let _ = std::fs::remove_file(&summary);
        (changes, summary)
    }

    #[test]
    fn single_infection_transmits_at_tick_zero() {
        let mut rank = build_rank(two_node_model(), 42);
        let (output_path, summary_output_path) = temp_paths("s1");
        let cfg = RunConfig {
            start_tick: 0,
            end_tick: 0,
            master_seed: 42,
            time_resolution: 1.0,
            output_path,
            summary_output_path,
            has_location: false,
        };
        rank.run(&cfg).unwrap();
        assert_eq!(rank.network.borrow().nodes[0].health_state, 1, "node A should have transitioned S -> I");
    }

    #[test]
    fn zero_transmissibility_never_fires() {
        let states = vec![("S".to_string(), 1.0, 0.0), ("I".to_string(), 0.0, 1.0)];
        let transmissions = vec![Transmission {
            id: "S_I".to_string(),
            entry_state: 0,
            contact_state: 1,
            exit_state: 1,
            transmissibility: 0.0,
            factor_ops: vec![],
        }];
        let model = DiseaseModel::build(states, vec![], transmissions, "S").unwrap();
        let mut rank = build_rank(model, 7);
        let (output_path, summary_output_path) = temp_paths("zero");
        let cfg = RunConfig {
            start_tick: 0,
            end_tick: 5,
            master_seed: 7,
            time_resolution: 1.0,
            output_path,
            summary_output_path,
            has_location: false,
        };
        rank.run(&cfg).unwrap();
        assert_eq!(rank.network.borrow().nodes[0].health_state, 0, "S should never transition with zero transmissibility");
    }

    #[test]
    fn delayed_variable_action_fires_on_schedule() {
        let mut rank = build_rank(two_node_model(), 1);
        let def = ActionDefinition {
            index: 0,
            priority: 1.0,
            order: 0,
            delay: 3,
            condition: None,
            operations: vec![Operation {
                target: outbreak_core::operation::OperationTarget::Variable("v".to_string()),
                operator: Operator::Add,
                source: outbreak_core::valueinstance::ValueInstance::Literal(Value::Number(1.0)),
            }],
        };
        rank.action_defs.push(def);
        rank.variables = RefCell::new(VariableStore::new(
            vec![VariableDefinition { id: "v".to_string(), scope: VarScope::Local, initial_value: Value::Int(0), reset_period: 0, global_index: None }],
            Arc::new(CounterStore::new(16)),
        ));
        rank.triggers.push(Trigger {
            condition: Condition::Comparison {
                op: outbreak_core::condition::Comparator::Eq,
                left: outbreak_core::valueinstance::ValueInstance::Observable(Observable::CurrentTick),
                right: outbreak_core::valueinstance::ValueInstance::Literal(Value::Int(0)),
            },
            action_def: 0,
            target_set: None,
        });

        let (output_path, summary_output_path) = temp_paths("s2");
        let cfg = RunConfig {
            start_tick: 0,
            end_tick: 3,
            master_seed: 1,
            time_resolution: 1.0,
            output_path,
            summary_output_path,
            has_location: false,
        };
        rank.run(&cfg).unwrap();
        assert_eq!(rank.variables.borrow().read("v"), Value::Number(1.0));
    }

    #[test]
    fn stale_progression_is_a_noop() {
        let states = vec![("S".to_string(), 1.0, 0.0), ("I".to_string(), 0.0, 1.0), ("R".to_string(), 0.0, 0.0)];
        let progressions = vec![Progression {
            id: "I_to_R".to_string(),
            entry_state: 1,
            exit_state: 2,
            propensity: 1.0,
            dwell_time: Distribution::Fixed(5),
            factor_ops: vec![],
        }];
        let model = DiseaseModel::build(states, progressions, vec![], "S").unwrap();
        let mut rank = build_rank(model, 3);
        // Schedule a stale progression action directly: node 1 was in I at
        // schedule time but is back to S by the time it would fire.
        rank.network.borrow_mut().nodes[1].health_state = 0;
        let action = Action {
            definition: 0,
            kind: ActionKind::TransmissionOrProgression {
                node: 1,
                state_at_schedule: 1,
                effect: Effect::Progression("I_to_R".to_string()),
                contact_node_id: None,
            },
        };
        rank.queues.active_mut(0).add(0, 0, DISEASE_EFFECT_ORDER, action);
        let (output_path, summary_output_path) = temp_paths("s4");
        let cfg = RunConfig {
            start_tick: 0,
            end_tick: 0,
            master_seed: 3,
            time_resolution: 1.0,
            output_path,
            summary_output_path,
            has_location: false,
        };
        rank.run(&cfg).unwrap();
        assert_eq!(rank.network.borrow().nodes[1].health_state, 0, "stale progression must not overwrite the node's current state");
    }
}
