//! Integration tests for the environment lifecycle.

mod common;

use evhub_sim::config::HubConfig;
use evhub_sim::dispatch::Regime;
use evhub_sim::env::{Environment, observation_dim};
use evhub_sim::error::{ActionError, DatasetError, EnvError};
use evhub_sim::eval::policy::{Policy, RegimeRulePolicy};
use evhub_sim::eval::runner::run_episode;

#[test]
fn step_before_reset_is_rejected() {
    let mut env = common::environment(common::synthetic(1, 2));
    let a = common::action(env.socket_count(), 0.0, 1.0);
    assert!(matches!(env.step(&a), Err(EnvError::NotReset)));
}

#[test]
fn episode_terminates_after_configured_hours() {
    let mut env = common::environment(common::synthetic(1, 2));
    let (obs, info) = env.reset().expect("reset");
    assert_eq!(obs.len(), observation_dim(4));
    assert_eq!(info.t, 0);

    let a = common::action(env.socket_count(), 0.0, 1.0);
    let mut last = None;
    for _ in 0..24 {
        last = Some(env.step(&a).expect("step"));
    }
    let last = last.expect("ran");
    assert!(last.terminated);
    assert!(!last.truncated);
    assert!(env.is_terminated());
    assert!(matches!(env.step(&a), Err(EnvError::EpisodeFinished(24))));
}

#[test]
fn observations_stay_in_space() {
    let mut env = common::environment(common::synthetic(2, 8));
    let space = env.observation_space();
    let (mut obs, _) = env.reset().expect("reset");
    let mut policy = RegimeRulePolicy;
    while !env.is_terminated() {
        assert!(space.contains(&obs), "observation out of bounds: {obs:?}");
        let a = policy.act(&obs, &env.policy_context());
        obs = env.step(&a).expect("step").observation;
    }
}

#[test]
fn malformed_action_aborts_episode() {
    let mut env = common::environment(common::synthetic(1, 2));
    env.reset().expect("reset");

    let err = env.step(&[0.0]).unwrap_err();
    assert!(matches!(err, EnvError::Action(ActionError::WrongShape { expected: 5, actual: 1 })));
    let a = common::action(env.socket_count(), 0.0, 1.0);
    assert!(matches!(env.step(&a), Err(EnvError::NotReset)));

    env.reset().expect("reset after abort");
    assert!(env.step(&a).is_ok());
}

#[test]
fn out_of_range_action_aborts_episode() {
    let mut env = common::environment(common::synthetic(1, 2));
    env.reset().expect("reset");
    let mut a = common::action(env.socket_count(), 0.0, 1.0);
    a[2] = 1.5;
    assert!(matches!(
        env.step(&a),
        Err(EnvError::Action(ActionError::OutOfBounds { index: 2, .. }))
    ));
}

#[test]
fn reset_restores_initial_state() {
    let mut env = common::environment(common::synthetic(2, 4));
    let floor = env.config().bess.soc_min;
    let first = run_episode(&mut env, &mut RegimeRulePolicy, true).expect("first run");

    let (_, info) = env.reset().expect("reset");
    assert_eq!(info.bess_soc, floor);
    assert_eq!(env.state().soc, floor);
    assert_eq!(env.accumulator().steps, 0);
    assert_eq!(env.current_step(), 0);

    let second = run_episode(&mut env, &mut RegimeRulePolicy, true).expect("second run");
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.trace, second.trace);
}

#[test]
fn closing_hour_pins_bess_to_floor() {
    let mut env = common::environment(common::synthetic(3, 6));
    let floor = env.config().bess.soc_min;
    let run = run_episode(&mut env, &mut RegimeRulePolicy, true).expect("run");
    let closings: Vec<_> = run
        .trace
        .iter()
        .filter(|i| i.regime == Regime::DischargeToFloor)
        .collect();
    assert_eq!(closings.len(), 3);
    for info in closings {
        assert!((info.bess_soc - floor).abs() <= 0.01 * floor, "soc {} at t={}", info.bess_soc, info.t);
    }
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let ds = common::synthetic(1, 2);
    let mut config = common::config_for(&ds);
    config.weights.co2 = 5.0;
    config.bess.soc_min = 0.9;
    config.bess.soc_max = 0.5;
    let err = Environment::new(config, ds.into_store().expect("store")).unwrap_err();
    let EnvError::InvalidConfig(errors) = err else {
        panic!("expected InvalidConfig");
    };
    assert!(errors.iter().any(|e| e.field == "weights"));
    assert!(errors.iter().any(|e| e.field == "bess.soc_min"));
}

#[test]
fn mismatched_dataset_fails_on_reset() {
    let ds = common::synthetic(1, 2);
    let config = HubConfig {
        episode_hours: 48,
        ..common::config_for(&ds)
    };
    let mut env = Environment::new(config, ds.into_store().expect("store")).expect("valid config");
    assert!(matches!(env.reset(), Err(EnvError::Dataset(DatasetError::Inconsistent(_)))));
}

#[test]
fn bess_mismatch_fails_on_reset() {
    let ds = common::synthetic(1, 2);
    let mut config = common::config_for(&ds);
    config.bess.capacity_kwh *= 2.0;
    let mut env = Environment::new(config, ds.into_store().expect("store")).expect("valid config");
    assert!(matches!(env.reset(), Err(EnvError::Dataset(DatasetError::Inconsistent(_)))));
}

#[test]
fn info_serialises_to_json() {
    let mut env = common::environment(common::synthetic(1, 2));
    env.reset().expect("reset");
    let a = common::action(env.socket_count(), 1.0, 1.0);
    let outcome = env.step(&a).expect("step");
    let json = outcome.info.to_json();
    assert!(json.get("pv_to_load").is_some());
    assert!(json.get("reward").is_some());
    assert!(serde_json::to_string(&json).is_ok());
}
