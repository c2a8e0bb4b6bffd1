use std::sync::Once;

use skill_processor::model::config::InferenceConfig;

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Fixed hyperparameters, a single batch and full message replacement
pub fn plain_config(team_size: usize) -> InferenceConfig {
    InferenceConfig {
        team_size,
        damping: 1.0,
        estimate_hyperparameters: false,
        ..InferenceConfig::default()
    }
}
