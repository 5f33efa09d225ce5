/// Step-by-step simulation API for external interfaces.
///
/// Wraps a `Simulation` and its `NetworkRuntime` behind a small surface
/// for stepping, inspection and JSON export. The JSON snapshots need
/// the `serialize` feature.

use crate::dsl::BuiltSimulation;
use crate::runtime::NetworkRuntime;
use crate::simulation::Simulation;
use crate::time::VirtualTime;

#[cfg(feature = "serialize")]
use crate::error::SimResult;

// ── StepResult ────────────────────────────────────────────────────────

/// Result of a single simulation step.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StepResult {
    pub event_id: u64,
    /// Virtual time of the event, in ticks.
    pub time: u64,
    pub description: String,
    /// Total events processed so far.
    pub total_events: u64,
}

// ── SimulationApi ─────────────────────────────────────────────────────

/// High-level API wrapping a simulation for external consumption.
pub struct SimulationApi {
    sim: Simulation,
    rt: NetworkRuntime,
}

impl SimulationApi {
    pub fn new(sim: Simulation, rt: NetworkRuntime) -> Self {
        SimulationApi { sim, rt }
    }

    /// Execute a single step. Returns `None` if simulation is complete.
    pub fn step(&mut self) -> Option<StepResult> {
        let event = self.sim.step(&mut self.rt)?;
        Some(StepResult {
            event_id: event.id.raw(),
            time: event.scheduled_at.ticks(),
            description: event.payload.to_string(),
            total_events: self.sim.events_processed(),
        })
    }

    /// Run to completion. Returns number of events processed.
    pub fn run(&mut self) -> u64 {
        self.sim.run(&mut self.rt)
    }

    /// Run every event up to and including `stop`.
    pub fn run_until(&mut self, stop: VirtualTime) -> u64 {
        self.sim.run_until(stop, &mut self.rt)
    }

    /// Run up to `n` steps. Returns number actually processed.
    pub fn run_steps(&mut self, n: u64) -> u64 {
        self.sim.run_for(n, &mut self.rt)
    }

    pub fn is_finished(&self) -> bool {
        self.sim.is_finished()
    }

    pub fn current_time(&self) -> VirtualTime {
        self.sim.current_time()
    }

    pub fn events_processed(&self) -> u64 {
        self.sim.events_processed()
    }

    pub fn runtime(&self) -> &NetworkRuntime {
        &self.rt
    }

    /// Mutable runtime access, e.g. to flip interfaces between steps.
    pub fn runtime_mut(&mut self) -> &mut NetworkRuntime {
        &mut self.rt
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    // ── JSON Export ───────────────────────────────────────────

    /// Clock, counters and per-interface status as JSON.
    #[cfg(feature = "serialize")]
    pub fn state_json(&self) -> SimResult<String> {
        #[derive(serde::Serialize)]
        struct InterfaceState {
            node: u32,
            interface: u32,
            address: Option<String>,
            up: bool,
        }

        #[derive(serde::Serialize)]
        struct ApiState<'a> {
            current_time: u64,
            events_processed: u64,
            pending_events: usize,
            is_finished: bool,
            recomputes: u64,
            stats: &'a crate::runtime::ForwardingStats,
            interfaces: Vec<InterfaceState>,
        }

        let interfaces = self
            .rt
            .topology()
            .nodes()
            .iter()
            .flat_map(|node| {
                node.interfaces().iter().map(move |i| InterfaceState {
                    node: node.id().raw(),
                    interface: i.index().raw(),
                    address: i.address().map(|a| a.to_string()),
                    up: i.is_up(),
                })
            })
            .collect();

        let state = ApiState {
            current_time: self.sim.current_time().ticks(),
            events_processed: self.sim.events_processed(),
            pending_events: self.sim.pending_count(),
            is_finished: self.sim.is_finished(),
            recomputes: self.rt.recompute_count(),
            stats: self.rt.stats(),
            interfaces,
        };

        Ok(serde_json::to_string_pretty(&state)?)
    }

    /// Every node's current routing table as a JSON array.
    #[cfg(feature = "serialize")]
    pub fn routes_json(&self) -> SimResult<String> {
        let tables: Vec<_> = self.rt.routing_tables().values().collect();
        Ok(serde_json::to_string_pretty(&tables)?)
    }

    /// The runtime trace as a JSON array.
    #[cfg(feature = "serialize")]
    pub fn trace_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(&self.rt.trace)?)
    }

    /// The recorded event log, or `null` when logging is off.
    #[cfg(feature = "serialize")]
    pub fn event_log_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(&self.sim.event_log())?)
    }
}

impl From<BuiltSimulation> for SimulationApi {
    fn from(built: BuiltSimulation) -> Self {
        SimulationApi::new(built.sim, built.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::scenario;

    fn api() -> SimulationApi {
        scenario::reference(NetworkConfig::reactive()).unwrap().into()
    }

    #[test]
    fn test_api_step_by_step() {
        let mut api = api();
        let first = api.step().unwrap();
        // First flow packet leaves n1 at 1.2 s.
        assert_eq!(first.time, VirtualTime::from_millis(1_200).ticks());
        assert!(first.description.starts_with("Send(n1"));
        assert_eq!(first.total_events, 1);
        assert!(!api.is_finished());
    }

    #[test]
    fn test_api_run_until_and_mutate() {
        let mut api = api();
        api.run_until(VirtualTime::from_secs(5));
        assert_eq!(api.current_time(), VirtualTime::from_secs(5));

        let (node, iface) = scenario::N1_DIRECT;
        let before = api.runtime().recompute_count();
        assert!(api.runtime_mut().set_down(node, iface).unwrap());
        assert_eq!(api.runtime().recompute_count(), before + 1);

        api.run();
        assert!(api.is_finished());
    }

    #[test]
    fn test_api_run_steps() {
        let mut api = api();
        assert_eq!(api.run_steps(10), 10);
        assert_eq!(api.events_processed(), 10);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_api_json_exports() {
        let mut api = api();
        api.run_until(VirtualTime::from_secs(7));

        let state: serde_json::Value = serde_json::from_str(&api.state_json().unwrap()).unwrap();
        assert_eq!(state["current_time"], VirtualTime::from_secs(7).ticks());
        assert_eq!(state["recomputes"], 3);
        let n1_direct = &state["interfaces"]
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["node"] == 1 && i["interface"] == 0)
            .unwrap()
            .clone();
        assert_eq!(n1_direct["up"], false);
        assert_eq!(n1_direct["address"], "172.16.1.1/24");

        let routes: serde_json::Value = serde_json::from_str(&api.routes_json().unwrap()).unwrap();
        assert_eq!(routes.as_array().unwrap().len(), 7);

        let trace: serde_json::Value = serde_json::from_str(&api.trace_json().unwrap()).unwrap();
        assert!(!trace.as_array().unwrap().is_empty());

        assert_eq!(api.event_log_json().unwrap(), "null");
    }
}
