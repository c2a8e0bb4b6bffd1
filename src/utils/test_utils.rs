use std::{collections::HashMap, f64::consts::PI};

use chrono::{DateTime, Duration, FixedOffset};
use indexmap::IndexMap;
use rand::{seq::index::sample, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::structures::match_record::{Match, PlayerId};

/// Midnight UTC on 2024-01-01 plus `day` days.
pub fn match_date(day: i64) -> DateTime<FixedOffset> {
    let epoch: DateTime<FixedOffset> = "2024-01-01T00:00:00+00:00".parse().unwrap();
    epoch + Duration::days(day)
}

/// A 30 minute match between rosters 1 and 2, `winner` being the roster index.
pub fn generate_match(id: i32, date: DateTime<FixedOffset>, team_a: &[PlayerId], team_b: &[PlayerId], winner: usize) -> Match {
    let mut rosters = IndexMap::new();
    rosters.insert(1, team_a.to_vec());
    rosters.insert(2, team_b.to_vec());

    Match {
        id,
        date,
        rosters,
        winner: if winner == 0 { 1 } else { 2 },
        tier: 0,
        length: 30.0,
        stats: HashMap::new()
    }
}

/// Draws from `N(mean, sd²)` with the Box-Muller transform.
pub fn sample_normal(rng: &mut ChaCha8Rng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random();

    mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Latent skills for players `1..=n`.
pub fn generate_skills(n: usize, mean: f64, sd: f64, seed: u64) -> Vec<(PlayerId, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (1..=n as PlayerId).map(|id| (id, sample_normal(&mut rng, mean, sd))).collect()
}

/// A stat generated as `max(0, len·(own·p + opponent·T/n) + N(0, 1/(noise·len)))`.
#[derive(Debug, Clone, Copy)]
pub struct StatModel {
    pub own_weight: f64,
    pub opponent_weight: f64,
    /// Noise precision per minute of match length
    pub noise: f64
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub matches: usize,
    pub team_size: usize,
    pub performance_sd: f64,
    pub hours_between: i64,
    pub stat: Option<StatModel>,
    pub seed: u64
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            matches: 100,
            team_size: 5,
            performance_sd: 125.0,
            hours_between: 6,
            stat: None,
            seed: 42
        }
    }
}

/// Plays random matches between the given players. Every player samples a
/// performance around their latent skill and the roster with the larger sum
/// wins.
pub fn simulate_matches(skills: &[(PlayerId, f64)], simulation: &Simulation) -> Vec<Match> {
    let mut rng = ChaCha8Rng::seed_from_u64(simulation.seed);
    let n = simulation.team_size;
    let mut matches = Vec::with_capacity(simulation.matches);

    for i in 0..simulation.matches {
        let picked: Vec<(PlayerId, f64)> = sample(&mut rng, skills.len(), 2 * n)
            .iter()
            .map(|index| skills[index])
            .collect();
        let performances: Vec<f64> = picked
            .iter()
            .map(|(_, skill)| sample_normal(&mut rng, *skill, simulation.performance_sd))
            .collect();

        let team_a: Vec<PlayerId> = picked[..n].iter().map(|(id, _)| *id).collect();
        let team_b: Vec<PlayerId> = picked[n..].iter().map(|(id, _)| *id).collect();
        let total_a: f64 = performances[..n].iter().sum();
        let total_b: f64 = performances[n..].iter().sum();
        let winner = if total_a > total_b { 0 } else { 1 };

        let date = match_date(0) + Duration::hours(simulation.hours_between * i as i64);
        let mut m = generate_match(i as i32 + 1, date, &team_a, &team_b, winner);

        if let Some(stat) = simulation.stat {
            for (slot, (player_id, _)) in picked.iter().enumerate() {
                let opponents = if slot < n { total_b } else { total_a };
                let mean = m.length * (stat.own_weight * performances[slot] + stat.opponent_weight * opponents / n as f64);
                let y = sample_normal(&mut rng, mean, 1.0 / (stat.noise * m.length).sqrt());
                m.stats.insert(*player_id, vec![Some(y.max(0.0))]);
            }
        }

        matches.push(m);
    }

    matches
}
