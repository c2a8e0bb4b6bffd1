pub mod batch;
pub mod config;
pub mod constants;
pub mod decay;
pub mod error;
pub mod gaussian;
pub mod hyperparameters;
pub mod inference;
pub mod local_posterior;
pub mod outcome;
pub mod prediction;
pub mod processor;
pub mod skill_store;
pub mod stat_regression;
pub mod structures;
pub mod timeline;
pub mod truncated;
pub mod updater;
