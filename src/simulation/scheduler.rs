//! Per-tick antenna update scheduler.
//!
//! Directional antennas register once; every tick the scheduler invokes each
//! antenna's update function in registration order against one committed
//! network context and records the resulting pointing target.

use super::antenna::AntennaMode;
use super::targeting::{AntennaState, NetworkContext, TargetDecision, select_target};
use super::types::TrackingTarget;

/// Update function invoked once per tick for one antenna.
pub type AntennaUpdate = Box<dyn for<'a> FnMut(&NetworkContext<'a>, &AntennaState) -> TargetDecision>;

/// Index of a registered antenna, stable for the scheduler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AntennaHandle(usize);

struct RegisteredAntenna {
    name: String,
    state: AntennaState,
    update: AntennaUpdate,
    target: Option<TrackingTarget>,
}

/// Pointing result of one antenna for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaReport {
    pub antenna: AntennaHandle,
    pub name: String,
    pub mode: AntennaMode,
    pub target: Option<TrackingTarget>,
    /// The target differs from the previous tick.
    pub changed: bool,
}

/// Pointing results of every antenna for one tick, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub antennas: Vec<AntennaReport>,
}

impl TickReport {
    /// Antennas whose target changed during this tick.
    pub fn changes(&self) -> impl Iterator<Item = &AntennaReport> {
        self.antennas.iter().filter(|report| report.changed)
    }
}

/// Registered directional antennas and their current targets.
#[derive(Default)]
pub struct TickScheduler {
    antennas: Vec<RegisteredAntenna>,
    tick: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an antenna driven by the standard target selection.
    ///
    /// # Parameters
    ///
    /// * `state` - Initial host-side state of the antenna
    /// * `name` - Label used in logs and reports
    ///
    /// # Returns
    ///
    /// Handle used to query the target or change the antenna state later.
    pub fn register(&mut self, state: AntennaState, name: impl Into<String>) -> AntennaHandle {
        self.register_with(state, name, Box::new(select_target))
    }

    /// Register an antenna with a custom update function.
    ///
    /// The function is called once per tick, after every antenna registered
    /// before it. It starts without a target.
    ///
    /// # Parameters
    ///
    /// * `state` - Initial host-side state of the antenna
    /// * `name` - Label used in logs and reports
    /// * `update` - Update function returning this tick's decision
    ///
    /// # Returns
    ///
    /// Handle of the new antenna.
    pub fn register_with(&mut self, state: AntennaState, name: impl Into<String>, update: AntennaUpdate) -> AntennaHandle {
        let handle = AntennaHandle(self.antennas.len());
        let name = name.into();
        log::debug!("Registered {:?} antenna {} on node {:?}", state.mode, name, state.node);
        self.antennas.push(RegisteredAntenna {
            name,
            state,
            update,
            target: None,
        });
        handle
    }

    /// Host-side state (on/off, power, mode) of a registered antenna.
    pub fn antenna_mut(&mut self, handle: AntennaHandle) -> Option<&mut AntennaState> {
        self.antennas.get_mut(handle.0).map(|antenna| &mut antenna.state)
    }

    /// Current pointing target of an antenna, `None` when it points nowhere.
    pub fn target(&self, handle: AntennaHandle) -> Option<&TrackingTarget> {
        self.antennas.get(handle.0).and_then(|antenna| antenna.target.as_ref())
    }

    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.antennas.is_empty()
    }

    /// Completed ticks.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Run one tick over every registered antenna.
    ///
    /// Each update function sees the same committed context. Target changes
    /// are logged at debug level.
    ///
    /// # Parameters
    ///
    /// * `ctx` - Link table, routes and active node of the current epoch
    ///
    /// # Returns
    ///
    /// Per-antenna results of this tick in registration order.
    pub fn tick(&mut self, ctx: &NetworkContext<'_>) -> TickReport {
        self.tick += 1;
        let mut reports = Vec::with_capacity(self.antennas.len());

        for (index, antenna) in self.antennas.iter_mut().enumerate() {
            let previous = antenna.target.clone();
            match (antenna.update)(ctx, &antenna.state) {
                TargetDecision::Track(target) => antenna.target = Some(target),
                TargetDecision::Clear => antenna.target = None,
            }
            let changed = previous != antenna.target;
            if changed {
                match &antenna.target {
                    Some(target) => log::debug!("Tick {}: {} now tracking {}", self.tick, antenna.name, target.name),
                    None => log::debug!("Tick {}: {} cleared its target", self.tick, antenna.name),
                }
            }
            reports.push(AntennaReport {
                antenna: AntennaHandle(index),
                name: antenna.name.clone(),
                mode: antenna.state.mode,
                target: antenna.target.clone(),
                changed,
            });
        }

        TickReport {
            tick: self.tick,
            antennas: reports,
        }
    }
}
