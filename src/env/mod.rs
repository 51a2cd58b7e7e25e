//! Gym-style environment around the dispatch engine and reward decomposer.
//!
//! An [`Environment`] owns its [`TimeseriesStore`], the BESS state and the
//! episode accumulator. Nothing is shared between instances, so parallel
//! training workers each open their own.

pub mod accumulator;
pub mod action;
pub mod clock;
pub mod info;
pub mod observation;

use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::devices::{Bess, BessState};
use crate::dispatch::{DispatchParams, Regime, StepInputs, dispatch};
use crate::error::{DatasetError, EnvError};
use crate::reward::RewardDecomposer;
use crate::store::TimeseriesStore;

pub use accumulator::{ClassService, EpisodeAccumulator};
pub use clock::EpisodeClock;
pub use info::StepInfo;
pub use observation::{BoxSpace, action_space, observation_dim, observation_space, observe};

/// Result of one [`Environment::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f64>,
    pub reward: f64,
    /// Set after the last step of the episode.
    pub terminated: bool,
    /// Always false; episodes have a fixed length.
    pub truncated: bool,
    pub info: StepInfo,
}

/// What a policy may know about the step it is acting on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyContext {
    pub t: usize,
    pub hour: usize,
    pub regime: Regime,
    pub sockets: usize,
}

/// The hub as seen by a learning agent.
#[derive(Debug, Clone)]
pub struct Environment {
    config: HubConfig,
    store: TimeseriesStore,
    params: DispatchParams,
    decomposer: RewardDecomposer,
    clock: EpisodeClock,
    state: BessState,
    accumulator: EpisodeAccumulator,
    session_kwh: Vec<f64>,
    started: bool,
}

impl Environment {
    /// Creates an environment over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: HubConfig, store: TimeseriesStore) -> Result<Self, EnvError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(EnvError::InvalidConfig(errors));
        }
        let params = DispatchParams::from_config(&config);
        let decomposer = RewardDecomposer::new(&config, store.max_carbon_intensity(), store.max_tariff());
        let sockets = store.socket_count();
        Ok(Self {
            clock: EpisodeClock::new(config.episode_hours),
            state: BessState::at_floor(&params.bess),
            config,
            store,
            params,
            decomposer,
            accumulator: EpisodeAccumulator::default(),
            session_kwh: vec![0.0; sockets],
            started: false,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn store(&self) -> &TimeseriesStore {
        &self.store
    }

    pub fn bess(&self) -> &Bess {
        &self.params.bess
    }

    pub fn state(&self) -> &BessState {
        &self.state
    }

    pub fn accumulator(&self) -> &EpisodeAccumulator {
        &self.accumulator
    }

    pub fn decomposer(&self) -> &RewardDecomposer {
        &self.decomposer
    }

    pub fn socket_count(&self) -> usize {
        self.store.socket_count()
    }

    pub fn observation_space(&self) -> BoxSpace {
        observation_space(self.socket_count())
    }

    pub fn action_space(&self) -> BoxSpace {
        action_space(self.socket_count())
    }

    /// Index of the step the next call to [`Environment::step`] will run.
    pub fn current_step(&self) -> usize {
        self.clock.current()
    }

    pub fn is_terminated(&self) -> bool {
        self.started && self.clock.is_finished()
    }

    /// Context for the step about to run.
    pub fn policy_context(&self) -> PolicyContext {
        let t = self.clock.current();
        let hour = self.store.hour_of_day(t);
        PolicyContext {
            t,
            hour,
            regime: self.params.regime(hour),
            sockets: self.socket_count(),
        }
    }

    fn check_consistency(&self) -> Result<(), DatasetError> {
        if self.store.len() != self.config.episode_hours {
            return Err(DatasetError::Inconsistent(format!(
                "dataset holds {} hours, config expects episode_hours = {}",
                self.store.len(),
                self.config.episode_hours
            )));
        }
        if self.store.socket_count() != self.config.socket_count {
            return Err(DatasetError::Inconsistent(format!(
                "dataset holds {} sockets, config expects socket_count = {}",
                self.store.socket_count(),
                self.config.socket_count
            )));
        }
        if *self.store.bess() != self.config.bess {
            return Err(DatasetError::Inconsistent(
                "dataset BESS parameters differ from the configured [bess] table".into(),
            ));
        }
        Ok(())
    }

    /// Starts a new episode at step 0 with the BESS at `soc_min`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Dataset`] if the store disagrees with the
    /// configuration on episode length, socket count or BESS parameters.
    pub fn reset(&mut self) -> Result<(Vec<f64>, StepInfo), EnvError> {
        self.check_consistency()?;
        self.clock.rewind();
        self.state = BessState::at_floor(&self.params.bess);
        self.accumulator = EpisodeAccumulator::default();
        self.session_kwh.iter_mut().for_each(|e| *e = 0.0);
        self.store.reset_socs();
        self.started = true;

        let hour = self.store.hour_of_day(0);
        let info = StepInfo::initial(hour, self.params.regime(hour), self.state.soc, self.state.mode);
        debug!(hours = self.store.len(), sockets = self.socket_count(), "episode reset");
        Ok((observe(&self.store, 0, &self.state), info))
    }

    /// Advances one hour under `action`.
    ///
    /// # Errors
    ///
    /// - [`EnvError::NotReset`] before the first [`Environment::reset`].
    /// - [`EnvError::EpisodeFinished`] after the last step.
    /// - [`EnvError::Action`] on a malformed action.
    /// - [`EnvError::State`] if the dispatch violates an invariant.
    ///
    /// Action and state errors abort the episode; the next call must be `reset`.
    pub fn step(&mut self, action: &[f64]) -> Result<StepOutcome, EnvError> {
        if !self.started {
            return Err(EnvError::NotReset);
        }
        if self.clock.is_finished() {
            return Err(EnvError::EpisodeFinished(self.clock.total()));
        }
        let result = self.advance(action);
        if let Err(err) = &result {
            warn!(t = self.clock.current(), error = %err, "episode aborted");
            self.started = false;
        }
        result
    }

    fn advance(&mut self, action: &[f64]) -> Result<StepOutcome, EnvError> {
        let control = action::decode(action, self.params.bess.max_power_kw, self.socket_count())?;
        let Some(t) = self.clock.tick() else {
            return Err(EnvError::EpisodeFinished(self.clock.total()));
        };
        let Some(view) = self.store.step(t) else {
            return Err(DatasetError::Inconsistent(format!("store has no step {t}")).into());
        };

        let inputs = StepInputs {
            t,
            hour: view.hour,
            pv_kwh: view.pv.ac_kwh,
            mall_kwh: view.mall.demand_kwh,
            chargers: self.store.chargers(),
            sockets: &view.chargers,
            session_kwh: &self.session_kwh,
            state: self.state,
        };
        let outcome = dispatch(&self.params, &inputs, &control)?;

        // Carry served SOC and session energy forward
        for (i, socket) in view.chargers.iter().enumerate() {
            if !socket.available {
                continue;
            }
            self.session_kwh[i] += outcome.socket_kwh[i];
            let carried = self.store.carry_soc(i, t, outcome.socket_soc[i]);
            if !carried {
                self.session_kwh[i] = 0.0;
            }
        }
        self.state = outcome.state;

        let reward = self.decomposer.decompose(
            t,
            &outcome.flows,
            &view.grid,
            view.pv.ac_kwh,
            &outcome.departures,
        );
        let info = StepInfo {
            t,
            hour: view.hour,
            regime: outcome.regime,
            flows: outcome.flows,
            reward,
            clips: outcome.clips,
            departures: outcome.departures,
            bess_soc: self.state.soc,
            bess_mode: self.state.mode,
            closing_bleed_kwh: outcome.closing_bleed_kwh,
            pv_kwh: view.pv.ac_kwh,
            mall_kwh: view.mall.demand_kwh,
            numeric_coercions: self.accumulator.numeric_coercions + reward.coercions,
        };
        self.accumulator.record(&info);

        let terminated = self.clock.is_finished();
        if terminated {
            let acc = &self.accumulator;
            info!(
                steps = acc.steps,
                co2_net_kg = acc.co2_net_kg,
                cost = acc.cost,
                self_consumption = acc.self_consumption(),
                peak_grid_import_kw = acc.peak_grid_import_kw,
                clips = acc.clips,
                "episode finished"
            );
        }

        Ok(StepOutcome {
            observation: observe(&self.store, self.clock.current(), &self.state),
            reward: reward.total,
            terminated,
            truncated: false,
            info,
        })
    }
}
