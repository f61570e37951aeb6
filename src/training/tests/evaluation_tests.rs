//! Tests for validation passes

use std::sync::Arc;

use approx::assert_relative_eq;
use candle_core::Tensor;

use crate::error::Error;
use crate::training::metrics::{
    EVAL_ACCURACY_AVG, EVAL_ACCURACY_OVERALL, EVAL_F1, EVAL_KAPPA, EVAL_LOSS,
};
use crate::training::{
    BinaryCrossEntropyWithLogitsLoss, ClassificationTrainer, Criterion, CrossEntropyLoss,
    MetricEvaluationEngine, TrainableModule,
};

use super::mock_data::{create_binary_score_batches, create_mock_batches, create_one_hot_batches};
use super::test_utils::{
    assert_metrics_valid, assert_scalar_close, create_test_config, create_test_device,
    CountingModel, Counters, IdentityModel,
};

fn engine(num_classes: usize, criterion: Arc<dyn Criterion>) -> MetricEvaluationEngine {
    MetricEvaluationEngine::new(num_classes, criterion, create_test_device()).unwrap()
}

fn multiclass_labels() -> Vec<Vec<u32>> {
    vec![vec![0, 1, 2, 1], vec![2, 0, 0], vec![1, 2, 3, 3]]
}

#[test]
fn test_perfect_multiclass_classifier() {
    let device = create_test_device();
    let source = create_one_hot_batches(&multiclass_labels(), 4, 8.0, &device);
    let mut engine = engine(4, Arc::new(CrossEntropyLoss));
    let mut model = IdentityModel::default();

    let metrics = engine.validate(&mut model, &source).unwrap();

    assert_metrics_valid(&metrics);
    for key in [EVAL_F1, EVAL_ACCURACY_OVERALL, EVAL_ACCURACY_AVG, EVAL_KAPPA] {
        assert_relative_eq!(metrics[key], 1.0, epsilon = 1e-12);
    }

    // Loss is the criterion applied to the concatenated raw outputs
    let logits: Vec<Tensor> = source.iter().map(|(x, _)| x.clone()).collect();
    let targets: Vec<Tensor> = source.iter().map(|(_, y)| y.clone()).collect();
    let expected = CrossEntropyLoss
        .loss(
            &Tensor::cat(&logits, 0).unwrap(),
            &Tensor::cat(&targets, 0).unwrap(),
        )
        .unwrap();
    assert_scalar_close(&expected, metrics[EVAL_LOSS]);
}

#[test]
fn test_perfect_binary_classifier() {
    let device = create_test_device();
    let labels = vec![vec![0, 1, 1], vec![1, 0], vec![0, 0, 1]];
    let source = create_binary_score_batches(&labels, 6.0, &device);
    let mut engine = engine(2, Arc::new(BinaryCrossEntropyWithLogitsLoss));
    let mut model = IdentityModel::default();

    let metrics = engine.validate(&mut model, &source).unwrap();
    for key in [EVAL_F1, EVAL_ACCURACY_OVERALL, EVAL_ACCURACY_AVG, EVAL_KAPPA] {
        assert_relative_eq!(metrics[key], 1.0, epsilon = 1e-12);
    }
    // log(1 + e^-6)
    assert_relative_eq!(metrics[EVAL_LOSS], (-6f64).exp().ln_1p(), epsilon = 1e-5);
}

#[test]
fn test_validate_switches_to_eval_mode() {
    let device = create_test_device();
    let mut model = IdentityModel { training: true };
    let source = create_one_hot_batches(&multiclass_labels(), 4, 1.0, &device);

    engine(4, Arc::new(CrossEntropyLoss))
        .validate(&mut model, &source)
        .unwrap();
    assert!(!model.training);
}

#[test]
fn test_engine_is_reset_between_calls() {
    let device = create_test_device();
    let mut engine = engine(3, Arc::new(CrossEntropyLoss));
    let mut model = IdentityModel::default();

    let perfect = create_one_hot_batches(&[vec![0, 1, 2]], 3, 5.0, &device);
    let first = engine.validate(&mut model, &perfect).unwrap();
    assert_relative_eq!(first[EVAL_ACCURACY_AVG], 1.0);

    // Every sample predicted as class 0
    let wrong = vec![(
        create_one_hot_batches(&[vec![0, 0, 0]], 3, 5.0, &device)[0].0.clone(),
        Tensor::new(&[1u32, 2, 1], &device).unwrap(),
    )];
    let second = engine.validate(&mut model, &wrong).unwrap();
    assert_relative_eq!(second[EVAL_ACCURACY_AVG], 0.0);

    let again = engine.validate(&mut model, &perfect).unwrap();
    assert_eq!(again, first);
}

#[test]
fn test_label_outside_class_count_is_a_config_error() {
    let device = create_test_device();
    let source = create_one_hot_batches(&multiclass_labels(), 4, 1.0, &device);
    let mut engine = engine(3, Arc::new(CrossEntropyLoss));
    let mut model = IdentityModel::default();

    let result = engine.validate(&mut model, &source);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_empty_evaluation_source() {
    let mut engine = engine(3, Arc::new(CrossEntropyLoss));
    let mut model = IdentityModel::default();
    let source: Vec<(Tensor, Tensor)> = Vec::new();

    let result = engine.validate(&mut model, &source);
    assert!(matches!(result, Err(Error::EmptySource(_))));
}

#[test]
fn test_single_class_kappa_is_nan() {
    let device = create_test_device();
    let source = create_one_hot_batches(&[vec![0, 0], vec![0]], 2, 3.0, &device);
    let mut engine = engine(2, Arc::new(CrossEntropyLoss));
    let mut model = IdentityModel::default();

    let metrics = engine.validate(&mut model, &source).unwrap();
    assert!(metrics[EVAL_KAPPA].is_nan());
    assert_relative_eq!(metrics[EVAL_ACCURACY_AVG], 1.0);
}

#[test]
fn test_trainer_validate_uses_counting_model() {
    let device = create_test_device();
    let mut trainer = ClassificationTrainer::new(
        create_test_config(1, 3),
        Arc::new(CrossEntropyLoss),
        device.clone(),
    )
    .unwrap();
    let mut model = CountingModel::new(4, 3);
    let counters = model.counters();
    let source = create_mock_batches(3, 2, 4, 3, &device);

    let metrics = trainer.validate(&mut model, &source).unwrap();
    assert_metrics_valid(&metrics);
    assert_eq!(Counters::get(&counters.forward_calls), 3);
    assert_eq!(Counters::get(&counters.eval_mode_calls), 1);
    assert_eq!(Counters::get(&counters.optimizer_steps), 0);

    // Outputs carry no autograd history
    let output = model.forward(&source[0].0).unwrap().detach();
    assert!(!output.is_variable());
}
