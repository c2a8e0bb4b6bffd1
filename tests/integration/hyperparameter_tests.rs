use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use skill_processor::{
    model::{
        config::InferenceConfig,
        hyperparameters::{GammaPrior, HyperPriors},
        processor::SkillProcessor,
        structures::hyper_posterior::HyperPosterior
    },
    utils::test_utils::{generate_skills, simulate_matches, Simulation}
};

use crate::common::init_test_env;

fn estimating_config() -> InferenceConfig {
    InferenceConfig {
        max_sweeps: 30,
        priors: HyperPriors {
            beta: GammaPrior::new(1.0, 125.0 * 125.0),
            ..HyperPriors::default()
        },
        ..InferenceConfig::default()
    }
}

fn estimated_beta(performance_sd: f64) -> f64 {
    let skills = generate_skills(30, 1500.0, 250.0, 7);
    let simulation = Simulation {
        matches: 200,
        performance_sd,
        ..Simulation::default()
    };
    let matches = simulate_matches(&skills, &simulation);

    let mut processor = SkillProcessor::new(estimating_config(), HashMap::new()).unwrap();
    processor.process(&matches).unwrap();

    processor.hyperparameters().beta
}

/// Simulated skills never move, so the dynamics and decay are pinned near
/// zero and only β is left to explain upsets.
fn static_skill_config() -> InferenceConfig {
    InferenceConfig {
        max_sweeps: 100,
        priors: HyperPriors {
            beta: GammaPrior::new(1.0, 125.0 * 125.0),
            gamma: GammaPrior::new(1.0e4, 1.0e4),
            tau: GammaPrior::new(1.0e4, 1.0e4),
            ..HyperPriors::default()
        },
        ..InferenceConfig::default()
    }
}

#[test]
fn test_beta_recovers_the_generating_performance_deviation() {
    init_test_env();

    let skills = generate_skills(40, 1500.0, 250.0, 19);
    // Starting from a 125 point deviation, once from each side
    for truth in [60.0, 250.0] {
        let simulation = Simulation {
            matches: 600,
            performance_sd: truth,
            hours_between: 1,
            ..Simulation::default()
        };
        let matches = simulate_matches(&skills, &simulation);

        let mut processor = SkillProcessor::new(static_skill_config(), HashMap::new()).unwrap();
        processor.process(&matches).unwrap();
        let estimate = 1.0 / processor.hyperparameters().beta.sqrt();

        let error = (estimate - truth).abs() / truth;
        assert!(
            error < 0.4,
            "estimated performance deviation {} is more than 40% away from {}",
            estimate,
            truth
        );
    }
}

#[test]
fn test_noisier_outcomes_lower_beta() {
    init_test_env();

    let sharp = estimated_beta(25.0);
    let noisy = estimated_beta(1500.0);

    assert!(sharp.is_finite() && noisy.is_finite());
    assert!(sharp > 0.0 && noisy > 0.0);
    assert!(noisy < sharp, "noisy beta {} should be below sharp beta {}", noisy, sharp);
}

#[test]
fn test_posterior_shapes_count_residuals() {
    init_test_env();

    let skills = generate_skills(30, 1500.0, 250.0, 11);
    let matches = simulate_matches(
        &skills,
        &Simulation {
            matches: 40,
            ..Simulation::default()
        }
    );
    let config = estimating_config();
    let priors = config.priors.clone();

    let mut processor = SkillProcessor::new(config, HashMap::new()).unwrap();
    processor.process(&matches).unwrap();
    let output = processor.output();

    // One performance residual per slot, one transition per repeat appearance
    let appearances = 40 * 10;
    let transitions = appearances - output.skills.len();

    match output.hyperparameters["beta"] {
        HyperPosterior::Gamma { shape, rate } => {
            assert_abs_diff_eq!(shape, priors.beta.shape + 0.5 * appearances as f64, epsilon = 1e-9);
            assert!(rate > priors.beta.rate);
        }
        other => panic!("beta should be Gamma, got {:?}", other)
    }
    match output.hyperparameters["gamma"] {
        HyperPosterior::Gamma { shape, .. } => {
            assert_abs_diff_eq!(shape, priors.gamma.shape + 0.5 * transitions as f64, epsilon = 1e-9);
        }
        other => panic!("gamma should be Gamma, got {:?}", other)
    }
    assert!(matches!(output.hyperparameters["offset"], HyperPosterior::Gaussian { .. }));

    let hyper = processor.hyperparameters();
    assert_abs_diff_eq!(hyper.beta, output.hyperparameters["beta"].point_estimate(), epsilon = 1e-12);
    assert_abs_diff_eq!(hyper.gamma, output.hyperparameters["gamma"].point_estimate(), epsilon = 1e-12);
}

#[test]
fn test_fixed_hyperparameters_stay_at_prior_means() {
    init_test_env();

    let skills = generate_skills(20, 1500.0, 250.0, 3);
    let matches = simulate_matches(
        &skills,
        &Simulation {
            matches: 30,
            ..Simulation::default()
        }
    );
    let config = InferenceConfig {
        estimate_hyperparameters: false,
        ..InferenceConfig::default()
    };
    let priors = config.priors.clone();

    let mut processor = SkillProcessor::new(config, HashMap::new()).unwrap();
    processor.process(&matches).unwrap();
    let hyper = processor.hyperparameters();

    assert_abs_diff_eq!(hyper.beta, priors.beta.mean(), epsilon = 1e-15);
    assert_abs_diff_eq!(hyper.gamma, priors.gamma.mean(), epsilon = 1e-15);
    assert_abs_diff_eq!(hyper.tau, priors.tau.mean(), epsilon = 1e-15);
    assert_abs_diff_eq!(hyper.offset, priors.offset.mean, epsilon = 1e-15);
}
