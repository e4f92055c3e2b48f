//! Integration tests for the AppContext pipeline
//!
//! These tests drive the public surface end to end:
//! - Capture under a label, train, predict
//! - Single-flight training under a real multi-thread runtime
//! - Save / load through both store backings
//! - Error propagation and observer events

use std::ops::ControlFlow;
use std::sync::{mpsc, Arc};

use blow_detector::analysis::features::{N_FRAMES, N_MELS};
use blow_detector::{
    AppConfig, AppContext, ChannelObserver, FnObserver, Label, MemoryStore, ModelError,
    ModelStatus, TrainOutcome, TrainingError, TrainingEvent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SAMPLE_RATE: u32 = 16000;
const CLIP_LEN: usize = 8000;

/// Broadband burst standing in for a breath on the microphone
fn blow_clip(seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..CLIP_LEN)
        .map(|i| {
            let envelope = (i as f32 / CLIP_LEN as f32 * std::f32::consts::PI).sin();
            rng.gen_range(-0.8f32..0.8) * envelope
        })
        .collect()
}

/// Quiet low tone standing in for background sound
fn ambient_clip(freq: f32) -> Vec<f32> {
    (0..CLIP_LEN)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.05)
        .collect()
}

fn test_config(epochs: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.training.epochs = epochs;
    config.training.batch_size = 4;
    config.training.seed = Some(7);
    config
}

fn context_with_corpus(config: AppConfig, per_class: u64) -> AppContext {
    let ctx = AppContext::with_store(config, Arc::new(MemoryStore::new()));
    for i in 0..per_class {
        assert_eq!(ctx.add_capture(Label::Blow, &blow_clip(i), SAMPLE_RATE), Ok(true));
        assert_eq!(
            ctx.add_capture(Label::NotBlow, &ambient_clip(150.0 + 40.0 * i as f32), SAMPLE_RATE),
            Ok(true)
        );
    }
    ctx
}

#[test]
fn test_untrained_context_rejects_predict_and_save() {
    let ctx = AppContext::new_test();
    assert_eq!(
        ctx.predict_clip(&blow_clip(0), SAMPLE_RATE),
        Err(ModelError::NotReady)
    );
    assert_eq!(ctx.save_model(Some("m")), Err(ModelError::NotReady));
}

#[tokio::test]
async fn test_train_with_missing_class_reports_failure_event() {
    let ctx = AppContext::new_test();
    ctx.add_capture(Label::Blow, &blow_clip(1), SAMPLE_RATE).unwrap();

    let (mut observer, mut rx) = ChannelObserver::channel();
    let result = ctx.train(&mut observer).await;
    assert!(matches!(result, Err(TrainingError::EmptyClass { .. })));

    match rx.try_recv().unwrap() {
        TrainingEvent::TrainEnd(TrainOutcome::Failed { code, .. }) => assert_eq!(code, 3001),
        other => panic!("Expected failed TrainEnd, got {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_capture_train_predict() {
    let ctx = context_with_corpus(test_config(2), 3);

    let (mut observer, mut rx) = ChannelObserver::channel();
    let history = ctx.train(&mut observer).await.unwrap();
    assert_eq!(history.epochs_completed(), 2);
    assert_eq!(ctx.classifier().status(), Ok(ModelStatus::Trained));

    let mut epoch_events = 0;
    let mut end_events = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            TrainingEvent::EpochEnd { epoch, logs } => {
                assert_eq!(epoch, epoch_events);
                assert!(logs.loss.is_finite());
                epoch_events += 1;
            }
            TrainingEvent::TrainEnd(outcome) => {
                assert_eq!(outcome, TrainOutcome::Completed { epochs: 2 });
                end_events += 1;
            }
        }
    }
    assert_eq!((epoch_events, end_events), (2, 1));

    for clip in [blow_clip(99), ambient_clip(500.0)] {
        let prediction = ctx.predict_clip(&clip, SAMPLE_RATE).unwrap().unwrap();
        assert!((prediction.blow + prediction.not_blow - 1.0).abs() < 1e-5);
        assert_eq!(
            prediction.label == Label::Blow,
            prediction.blow > prediction.not_blow
        );
    }

    // Too short for one analysis window
    assert_eq!(ctx.predict_clip(&blow_clip(0)[..1000], SAMPLE_RATE), Ok(None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_train_fails_while_first_in_flight() {
    let ctx = Arc::new(context_with_corpus(test_config(2), 2));

    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let mut blocking_observer = FnObserver::new(move |epoch, _| {
        if epoch == 0 {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }
        ControlFlow::Continue(())
    });

    let first = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.train(&mut blocking_observer).await })
    };

    tokio::task::spawn_blocking(move || started_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(ctx.classifier().is_training());

    let mut rejected_observer = FnObserver::new(|_, _| ControlFlow::Continue(()));
    let second = ctx.train(&mut rejected_observer).await;
    assert!(matches!(second, Err(TrainingError::AlreadyTraining)));
    assert_eq!(rejected_observer.train_end_calls(), 1);

    // Loading is refused for the same reason
    assert_eq!(ctx.load_model(Some("any")), Err(ModelError::Busy));
    assert!(ctx.classifier().is_training());

    release_tx.send(()).unwrap();
    let history = first.await.unwrap().unwrap();
    assert_eq!(history.epochs_completed(), 2);
    assert!(!ctx.classifier().is_training());

    // Same seed and corpus, no interference: the rejected calls left no trace
    let reference = context_with_corpus(test_config(2), 2);
    let undisturbed = reference.train(&mut ()).await.unwrap();
    assert_eq!(history, undisturbed);
    for clip in [blow_clip(50), ambient_clip(275.0)] {
        assert_eq!(
            ctx.predict_clip(&clip, SAMPLE_RATE).unwrap(),
            reference.predict_clip(&clip, SAMPLE_RATE).unwrap()
        );
    }
}

#[tokio::test]
async fn test_save_and_load_across_contexts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1);
    config.store.directory = dir.path().join("models");

    let trainer = AppContext::new(config.clone());
    for i in 0..2 {
        trainer.add_capture(Label::Blow, &blow_clip(i), SAMPLE_RATE).unwrap();
        trainer
            .add_capture(Label::NotBlow, &ambient_clip(200.0 + 50.0 * i as f32), SAMPLE_RATE)
            .unwrap();
    }
    trainer.train(&mut ()).await.unwrap();
    trainer.save_model(None).unwrap();
    assert!(dir.path().join("models/blow_detector.json").exists());

    let player = AppContext::new(config);
    player.load_model(None).unwrap();
    assert_eq!(player.classifier().status(), Ok(ModelStatus::Loaded));

    for clip in [blow_clip(42), ambient_clip(330.0)] {
        assert_eq!(
            trainer.predict_clip(&clip, SAMPLE_RATE).unwrap(),
            player.predict_clip(&clip, SAMPLE_RATE).unwrap()
        );
    }
}

#[test]
fn test_extraction_shape_through_corpus() {
    let ctx = AppContext::new_test();
    // Long clip gets downsampled, short clip padded, both to the fixed shape
    let long: Vec<f32> = (0..5).flat_map(blow_clip).collect();
    assert_eq!(ctx.add_capture(Label::Blow, &long, SAMPLE_RATE), Ok(true));
    assert_eq!(ctx.add_capture(Label::NotBlow, &ambient_clip(300.0)[..2100], SAMPLE_RATE), Ok(true));

    let extractor = blow_detector::FeatureExtractor::new(SAMPLE_RATE);
    let spec = extractor.extract(&long).unwrap();
    assert_eq!(spec.shape(), [N_FRAMES, N_MELS]);
}
