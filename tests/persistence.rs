use std::{fs, sync::Arc};

use adaptive_control_sim::control::hybrid::ControlMode;
use adaptive_control_sim::learning::ddpg::DdpgAgent;
use adaptive_control_sim::runtime::runner::SimulationRunner;
use adaptive_control_sim::utils::{config::{DdpgConfig, SimConfig}, error::ControlError, sink::NoopSink};

fn agent_config(seed: u64, hidden: Vec<usize>) -> DdpgConfig {
    DdpgConfig {
        hidden,
        seed: Some(seed),
        ..DdpgConfig::default()
    }
}

#[test]
fn saved_policy_reproduces_actions() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("policy");

    let mut trained = DdpgAgent::new(agent_config(1, vec![24, 24]));
    trained.save(&prefix).unwrap();
    assert!(dir.path().join("policy_actor.json").exists());
    assert!(dir.path().join("policy_critic.json").exists());

    let mut restored = DdpgAgent::new(agent_config(2, vec![24, 24]));
    assert!(restored.load(&prefix));
    for state in [[0.0, 0.0, 5.0, 5.0], [4.0, 1.0, 5.0, 1.0], [-1.0, -2.0, 0.0, 1.0]] {
        assert_eq!(trained.select_action(&state, 0.0), restored.select_action(&state, 0.0));
    }
}

#[test]
fn incompatible_artifacts_leave_agent_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("wide");
    DdpgAgent::new(agent_config(3, vec![48, 48])).save(&prefix).unwrap();

    let mut agent = DdpgAgent::new(agent_config(4, vec![24, 24]));
    let before = agent.actor().clone();
    let err = agent.try_load(&prefix).unwrap_err();
    assert!(matches!(err, ControlError::ShapeMismatch { .. }));
    assert!(!agent.load(&prefix));
    assert_eq!(agent.actor(), &before);
}

#[test]
fn truncated_critic_is_rejected_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("half");
    DdpgAgent::new(agent_config(5, vec![24, 24])).save(&prefix).unwrap();
    fs::write(dir.path().join("half_critic.json"), "{\"layers\": [").unwrap();

    let mut agent = DdpgAgent::new(agent_config(6, vec![24, 24]));
    let actor = agent.actor().clone();
    let critic = agent.critic().clone();
    assert!(!agent.load(&prefix));
    assert_eq!(agent.actor(), &actor);
    assert_eq!(agent.critic(), &critic);
}

#[test]
fn runner_persists_agent_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("runner_agent");

    let mut cfg = SimConfig::default();
    cfg.agent.hidden = vec![16, 16];
    cfg.agent.seed = Some(7);

    let first = SimulationRunner::new(cfg.clone(), Arc::new(NoopSink));
    first.set_mode(ControlMode::RlTrain);
    first.save_agent(&prefix).unwrap();

    cfg.agent.seed = Some(8);
    let second = SimulationRunner::new(cfg, Arc::new(NoopSink));
    assert!(second.load_agent(&prefix));
    assert!(!second.load_agent(dir.path().join("missing")));
}
