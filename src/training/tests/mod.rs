//! Test suite for the training pipeline
//!
//! Covers the epoch loop with gradient accumulation, validation scoring and
//! prediction passes. Unit tests for individual components live next to
//! their modules.

// Test modules
pub mod evaluation_tests;
pub mod inference_tests;

pub mod test_utils;

// Re-export commonly used test utilities
pub use test_utils::{
    assert_metrics_valid, assert_scalar_close, create_test_config, create_test_device,
    create_test_model, CountingModel, Counters, IdentityModel,
};

pub use mock_data::{
    create_binary_score_batches, create_identical_batches, create_input_batches,
    create_mock_batches, create_one_hot_batches,
};
