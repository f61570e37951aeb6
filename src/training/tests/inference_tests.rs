//! Tests for prediction passes

use std::sync::Arc;

use candle_core::Tensor;

use crate::training::{
    ClassificationTrainer, CrossEntropyLoss, DataLoader, DataLoaderConfig, InferenceRunner,
    TensorDataset,
};

use super::mock_data::{create_input_batches, create_mock_batches};
use super::test_utils::{
    create_test_config, create_test_device, setup_test_logging, CountingModel, Counters,
    IdentityModel,
};

fn trainer() -> ClassificationTrainer {
    ClassificationTrainer::new(
        create_test_config(1, 3),
        Arc::new(CrossEntropyLoss),
        create_test_device(),
    )
    .unwrap()
}

fn to_vec2(tensor: &Tensor) -> Vec<Vec<f32>> {
    tensor.to_vec2::<f32>().unwrap()
}

#[test]
fn test_predict_labeled_aligns_batches() {
    setup_test_logging();
    let device = create_test_device();
    let source = create_mock_batches(4, 3, 5, 3, &device);
    let mut model = CountingModel::new(5, 3);
    let counters = model.counters();

    let output = trainer().predict_labeled(&mut model, &source).unwrap();

    assert_eq!(output.len(), 4);
    assert_eq!(output.inputs.len(), 4);
    assert_eq!(output.targets.len(), 4);
    for (i, (x, y)) in source.iter().enumerate() {
        assert_eq!(to_vec2(&output.inputs[i]), to_vec2(x));
        assert_eq!(
            output.targets[i].to_vec1::<u32>().unwrap(),
            y.to_vec1::<u32>().unwrap()
        );
        assert_eq!(output.predictions[i].dims(), &[3, 3]);
    }

    assert_eq!(Counters::get(&counters.forward_calls), 4);
    assert_eq!(Counters::get(&counters.eval_mode_calls), 1);
    assert_eq!(Counters::get(&counters.train_mode_calls), 0);
    assert_eq!(Counters::get(&counters.optimizer_steps), 0);
}

#[test]
fn test_predict_returns_raw_outputs() {
    let device = create_test_device();
    let inputs = create_input_batches(3, 2, 4, &device);
    let mut model = IdentityModel { training: true };

    let output = trainer().predict(&mut model, &inputs).unwrap();

    assert!(!model.training);
    assert_eq!(output.len(), 3);
    for (raw, input) in output.predictions.iter().zip(&inputs) {
        assert_eq!(to_vec2(raw), to_vec2(input));
    }
}

#[test]
fn test_predict_over_unlabeled_loader() {
    let device = create_test_device();
    let inputs = Tensor::arange(0f32, 20.0, &device)
        .unwrap()
        .reshape((10, 2))
        .unwrap();
    let dataset = Arc::new(TensorDataset::unlabeled(inputs));
    let loader = DataLoader::new(
        dataset,
        DataLoaderConfig {
            batch_size: 4,
            ..DataLoaderConfig::default()
        },
    )
    .unwrap();

    let runner = InferenceRunner::new(device);
    let output = runner
        .predict(&mut IdentityModel::default(), &loader)
        .unwrap();

    let rows: Vec<usize> = output.inputs.iter().map(|x| x.dim(0).unwrap()).collect();
    assert_eq!(rows, vec![4, 4, 2]);
    assert_eq!(to_vec2(&output.predictions[2]), vec![vec![16.0, 17.0], vec![18.0, 19.0]]);
}

#[test]
fn test_predict_on_empty_source() {
    let inputs: Vec<Tensor> = Vec::new();
    let output = trainer()
        .predict(&mut IdentityModel::default(), &inputs)
        .unwrap();
    assert!(output.is_empty());
}
