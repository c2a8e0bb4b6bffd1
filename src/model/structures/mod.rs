pub mod adjustment_type;
pub mod batch_player_record;
pub mod chain_direction;
pub mod hyper_posterior;
pub mod malformed_match_policy;
pub mod match_outcome_node;
pub mod match_record;
pub mod processing;
pub mod skill_belief;
