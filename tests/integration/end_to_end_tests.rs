use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use chrono::Duration;
use skill_processor::{
    model::{
        config::InferenceConfig,
        processor::SkillProcessor,
        structures::skill_belief::SkillBelief,
        truncated
    },
    utils::test_utils::{generate_match, generate_skills, match_date, simulate_matches, Simulation, StatModel}
};

use crate::common::{init_test_env, plain_config};

#[test]
fn test_disjoint_rosters_rank_winners_above_losers() {
    init_test_env();

    // Three matches, thirty different players, a few minutes apart
    let matches: Vec<_> = (0..3)
        .map(|i| {
            let base = i * 10;
            let winners: Vec<i32> = (base + 1..=base + 5).collect();
            let losers: Vec<i32> = (base + 6..=base + 10).collect();
            generate_match(i + 1, match_date(0) + Duration::minutes(5 * i as i64), &winners, &losers, 0)
        })
        .collect();

    let mut processor = SkillProcessor::new(InferenceConfig::default(), HashMap::new()).unwrap();
    processor.process(&matches).unwrap();
    let output = processor.output();

    assert_eq!(output.skills.len(), 30);
    assert_eq!(output.batches.len(), 1);

    let winners = output.skills.iter().filter(|(id, _)| (**id - 1) % 10 < 5);
    let losers = output.skills.iter().filter(|(id, _)| (**id - 1) % 10 >= 5);
    let worst_winner = winners.map(|(_, b)| b.mean).fold(f64::INFINITY, f64::min);
    let best_loser = losers.map(|(_, b)| b.mean).fold(f64::NEG_INFINITY, f64::max);

    assert!(worst_winner > 1500.0);
    assert!(best_loser < 1500.0);
    assert!(worst_winner > best_loser);

    let leaders: Vec<i32> = processor.store().leaderboard().take(15).map(|s| s.player_id).collect();
    assert!(leaders.iter().all(|id| (id - 1) % 10 < 5));
}

#[test]
fn test_single_duel_matches_truncated_gaussian_moments() {
    init_test_env();

    let sigma: f64 = 250.0;
    let mut priors = HashMap::new();
    priors.insert(1, SkillBelief::new(1500.0, sigma * sigma));
    priors.insert(2, SkillBelief::new(1500.0, sigma * sigma));
    let config = InferenceConfig {
        max_sweeps: 1,
        ..plain_config(1)
    };
    let beta = config.priors.beta.mean();

    let mut processor = SkillProcessor::new(config, priors).unwrap();
    processor
        .process(&[generate_match(1, match_date(0), &[1], &[2], 0)])
        .unwrap();
    let skills = processor.output().skills;

    let c = 2.0 * (sigma * sigma + 1.0 / beta);
    let shift = sigma * sigma / c.sqrt() * truncated::v(0.0);
    let variance = sigma * sigma - sigma.powi(4) / c * truncated::w(0.0);

    assert!(skills[&1].mean > 1500.0 && skills[&2].mean < 1500.0);
    assert_abs_diff_eq!(skills[&1].mean, 1500.0 + shift, epsilon = 1e-6);
    assert_abs_diff_eq!(skills[&2].mean, 1500.0 - shift, epsilon = 1e-6);
    assert_abs_diff_eq!(skills[&1].variance, variance, epsilon = 1e-4);
    assert_abs_diff_eq!(skills[&2].variance, variance, epsilon = 1e-4);
}

#[test]
fn test_zero_sweeps_return_the_priors() {
    init_test_env();

    let mut priors = HashMap::new();
    for id in 1..=10 {
        priors.insert(id, SkillBelief::new(1400.0 + 20.0 * id as f64, 150.0 * 150.0));
    }
    let config = InferenceConfig {
        max_sweeps: 0,
        ..InferenceConfig::default()
    };

    let mut processor = SkillProcessor::new(config, priors.clone()).unwrap();
    processor
        .process(&[generate_match(1, match_date(0), &[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10], 1)])
        .unwrap();
    let output = processor.output();

    assert_eq!(output.batches[0].inference.sweeps, 0);
    for (id, prior) in priors {
        assert_abs_diff_eq!(output.skills[&id].mean, prior.mean, epsilon = 1e-9);
        assert_abs_diff_eq!(output.skills[&id].variance, prior.variance, epsilon = 1e-6);
    }
}

#[test]
fn test_malformed_matches_are_reported_and_skipped() {
    init_test_env();

    let mut unknown_winner = generate_match(2, match_date(0), &[11, 12, 13, 14, 15], &[16, 17, 18, 19, 20], 0);
    unknown_winner.winner = 7;
    let mut short_roster = generate_match(3, match_date(0), &[21, 22, 23, 24, 25], &[26, 27, 28, 29, 30], 0);
    short_roster.rosters[1].pop();
    let matches = vec![
        generate_match(1, match_date(0), &[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10], 0),
        unknown_winner,
        short_roster,
    ];

    let mut processor = SkillProcessor::new(InferenceConfig::default(), HashMap::new()).unwrap();
    processor.process(&matches).unwrap();
    let output = processor.output();

    let skipped: Vec<i32> = output.batches[0].skipped.iter().map(|s| s.match_id).collect();
    assert_eq!(skipped, vec![2, 3]);
    assert_eq!(output.batches[0].matches, 1);
    assert_eq!(output.skills.len(), 10);
}

#[test]
fn test_stat_regression_recovers_weight_signs() {
    init_test_env();

    let skills = generate_skills(40, 1500.0, 250.0, 42);
    let simulation = Simulation {
        matches: 300,
        stat: Some(StatModel {
            own_weight: 0.0004,
            opponent_weight: -0.0002,
            noise: 4.0
        }),
        ..Simulation::default()
    };
    let matches = simulate_matches(&skills, &simulation);
    let config = InferenceConfig {
        stat_schema: vec!["kills".to_string()],
        max_sweeps: 60,
        ..InferenceConfig::default()
    };

    let mut processor = SkillProcessor::new(config, HashMap::new()).unwrap();
    processor.process(&matches).unwrap();
    let output = processor.output();

    assert!(output.batches[0].skipped.is_empty());
    for name in ["kills.own_weight", "kills.opponent_weight", "kills.noise"] {
        let estimate = output.hyperparameters[name].point_estimate();
        assert!(estimate.is_finite(), "{} = {}", name, estimate);
    }

    let own = output.hyperparameters["kills.own_weight"].point_estimate();
    let opponent = output.hyperparameters["kills.opponent_weight"].point_estimate();
    assert!(own > 0.0, "own weight {}", own);
    assert!(opponent < 0.0, "opponent weight {}", opponent);
    // The mean stat pins the sum of the weights far better than either one
    assert!(
        ((own + opponent) - 0.0002).abs() < 0.25 * 0.0002,
        "weights {} and {} should sum to 0.0002",
        own,
        opponent
    );
    assert!(output.hyperparameters["kills.noise"].point_estimate() > 0.0);
    assert!(output
        .skills
        .values()
        .all(|belief| belief.mean.is_finite() && belief.variance > 0.0));
}

#[test]
fn test_censored_stats_with_zero_starting_weights_stay_finite() {
    init_test_env();

    // Mostly zero observations, so the first sweep sees censored sites under a zero projection
    let skills = generate_skills(20, 1500.0, 250.0, 5);
    let simulation = Simulation {
        matches: 40,
        stat: Some(StatModel {
            own_weight: 0.0001,
            opponent_weight: -0.0003,
            noise: 1.0
        }),
        ..Simulation::default()
    };
    let matches = simulate_matches(&skills, &simulation);
    let zeros = matches
        .iter()
        .flat_map(|m| m.stats.values())
        .filter(|stats| stats[0] == Some(0.0))
        .count();
    assert!(zeros > 0);

    let config = InferenceConfig {
        stat_schema: vec!["kills".to_string()],
        max_sweeps: 5,
        ..InferenceConfig::default()
    };
    let mut processor = SkillProcessor::new(config, HashMap::new()).unwrap();
    processor.process(&matches).unwrap();

    let hyper = processor.hyperparameters();
    assert!(hyper.stats[0].own_weight.is_finite());
    assert!(hyper.stats[0].opponent_weight.is_finite());
    assert!(hyper.stats[0].noise.is_finite() && hyper.stats[0].noise > 0.0);
    assert!(hyper.beta.is_finite() && hyper.gamma.is_finite());
}

#[test]
fn test_negative_stats_are_skipped_as_malformed() {
    init_test_env();

    let mut negative = generate_match(2, match_date(0), &[11, 12, 13, 14, 15], &[16, 17, 18, 19, 20], 0);
    negative.stats.insert(13, vec![Some(-1.0)]);
    let mut valid = generate_match(1, match_date(0), &[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10], 0);
    valid.stats.insert(1, vec![Some(0.0)]);

    let config = InferenceConfig {
        stat_schema: vec!["kills".to_string()],
        ..InferenceConfig::default()
    };
    let mut processor = SkillProcessor::new(config, HashMap::new()).unwrap();
    processor.process(&[valid, negative]).unwrap();
    let output = processor.output();

    assert_eq!(output.batches[0].matches, 1);
    assert_eq!(output.batches[0].skipped.len(), 1);
    assert_eq!(output.batches[0].skipped[0].match_id, 2);
    assert!(output.batches[0].skipped[0].reason.contains("player 13"));
}
