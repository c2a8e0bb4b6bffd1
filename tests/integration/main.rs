#[path = "../common/mod.rs"]
mod common;

mod decay_flow_tests;
mod end_to_end_tests;
mod hyperparameter_tests;
