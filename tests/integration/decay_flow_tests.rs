use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use serial_test::serial;
use skill_processor::{
    model::{batch::Batch, config::InferenceConfig, processor::SkillProcessor},
    utils::test_utils::{generate_match, match_date}
};

use crate::common::{init_test_env, plain_config};

const FIRST: [i32; 5] = [1, 2, 3, 4, 5];
const SECOND: [i32; 5] = [6, 7, 8, 9, 10];
const THIRD: [i32; 5] = [11, 12, 13, 14, 15];
const FOURTH: [i32; 5] = [16, 17, 18, 19, 20];

#[test]
#[serial]
fn test_idle_players_decay_on_return() {
    init_test_env();

    let config = plain_config(5);
    let per_day = config.decay.variance_per_day;
    let mut processor = SkillProcessor::new(config.clone(), HashMap::new()).unwrap();

    processor
        .process_batch(&[generate_match(1, match_date(0), &FIRST, &SECOND, 0)])
        .unwrap();
    let after_first = processor.store().get(1).unwrap().clone();
    assert_eq!(after_first.last_played, match_date(0));
    assert_eq!(after_first.decayed_through, match_date(0));

    // Players 1-10 sit this batch out and keep their belief. Only the
    // leaderboard position moves as ten new players are ranked.
    processor
        .process_batch(&[generate_match(2, match_date(30), &THIRD, &FOURTH, 1)])
        .unwrap();
    let idle = processor.store().get(1).unwrap();
    assert_eq!(idle.belief, after_first.belief);
    assert_eq!(idle.last_played, after_first.last_played);
    assert_eq!(idle.decayed_through, after_first.decayed_through);
    assert_eq!(idle.matches_played, after_first.matches_played);
    assert_eq!(processor.store().len(), 20);

    let returning = [generate_match(3, match_date(200), &FIRST, &THIRD, 0)];
    let batch = Batch::assemble(2, &returning, processor.store(), &config).unwrap();
    let prior = batch.players[&1].prior;

    assert_abs_diff_eq!(prior.mean, after_first.belief.mean, epsilon = 1e-9);
    assert_abs_diff_eq!(
        prior.variance,
        after_first.belief.variance + per_day * (200.0 - 30.0),
        epsilon = 1e-6
    );

    processor.process_batch(&returning).unwrap();
    let returned = processor.store().get(1).unwrap();
    assert_eq!(returned.last_played, match_date(200));
    assert_eq!(returned.matches_played, 2);
    assert!(returned.belief.variance < prior.variance);

    // Players 6-10 are still idle
    assert_eq!(processor.store().get(6).unwrap().decayed_through, match_date(0));
}

#[test]
#[serial]
fn test_decay_already_charged_is_not_charged_twice() {
    init_test_env();

    let config = plain_config(5);
    let per_day = config.decay.variance_per_day;
    let mut processor = SkillProcessor::new(config.clone(), HashMap::new()).unwrap();

    // One batch spanning 100 days; players 1-10 only play on day 0
    processor
        .process_batch(&[
            generate_match(1, match_date(0), &FIRST, &SECOND, 0),
            generate_match(2, match_date(100), &THIRD, &FOURTH, 0),
        ])
        .unwrap();

    let stored = processor.store().get(1).unwrap().clone();
    assert_eq!(stored.last_played, match_date(0));
    assert_eq!(stored.decayed_through, match_date(100));

    let adjustments = processor.store().adjustments(1).unwrap();
    let decay = adjustments.last().unwrap();
    let before = decay.before.unwrap();
    assert_abs_diff_eq!(decay.after.variance - before.variance, per_day * (100.0 - 30.0), epsilon = 1e-6);

    let prior = processor.store().prior_for(1, match_date(150), &config);
    assert_abs_diff_eq!(prior.variance, stored.belief.variance + per_day * 50.0, epsilon = 1e-6);
}

#[test]
fn test_priors_widen_with_inactivity() {
    init_test_env();

    let config = InferenceConfig::default();
    let mut processor = SkillProcessor::new(config.clone(), HashMap::new()).unwrap();
    processor
        .process_batch(&[generate_match(1, match_date(0), &FIRST, &SECOND, 0)])
        .unwrap();

    let store = processor.store();
    let variances: Vec<f64> = [0, 10, 30, 31, 60, 365]
        .iter()
        .map(|day| store.prior_for(1, match_date(*day), &config).variance)
        .collect();

    assert!(variances.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_abs_diff_eq!(variances[0], variances[2], epsilon = 1e-9);
    assert!(variances[5] > variances[2]);
}
