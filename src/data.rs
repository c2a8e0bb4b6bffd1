use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{
    config::InferenceConfig,
    structures::{
        match_record::{Match, PlayerId},
        processing::ProcessorOutput,
        skill_belief::SkillBelief
    }
};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prior for player {player_id} needs a finite mean and a positive variance")]
    InvalidPrior { player_id: PlayerId }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DataError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn load_matches(path: &Path) -> Result<Vec<Match>, DataError> {
    let matches: Vec<Match> = read_json(path)?;
    info!(count = matches.len(), path = %path.display(), "Loaded matches");

    Ok(matches)
}

/// Reads a JSON object of player id to `[mean, variance]`.
pub fn load_priors(path: &Path) -> Result<HashMap<PlayerId, SkillBelief>, DataError> {
    let raw: HashMap<PlayerId, [f64; 2]> = read_json(path)?;
    let priors = parse_priors(raw)?;
    info!(count = priors.len(), path = %path.display(), "Loaded priors");

    Ok(priors)
}

fn parse_priors(raw: HashMap<PlayerId, [f64; 2]>) -> Result<HashMap<PlayerId, SkillBelief>, DataError> {
    raw.into_iter()
        .map(|(player_id, [mean, variance])| {
            let belief = SkillBelief::new(mean, variance);
            if belief.is_valid() {
                Ok((player_id, belief))
            } else {
                Err(DataError::InvalidPrior { player_id })
            }
        })
        .collect()
}

pub fn load_config(path: &Path) -> Result<InferenceConfig, DataError> {
    read_json(path)
}

pub fn save_output(path: &Path, output: &ProcessorOutput) -> Result<(), DataError> {
    write_json(path, output)?;
    info!(players = output.skills.len(), path = %path.display(), "Wrote output");

    Ok(())
}
