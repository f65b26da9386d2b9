use std::sync::Arc;

use ndarray::{Array2, s};
use trace_container::data::model::{Metadata, MetadataValue};
use trace_container::preprocess::builtin;
use trace_container::{
    Container, ContainerError, Frame, InMemoryTraceHeaderSet, Preprocess, Preprocesses,
    TraceHeaderSet,
};

const N_TRACES: usize = 2000;
const N_SAMPLES: usize = 1000;

/// Deterministic stand-in for random byte-valued traces with 16-byte plaintexts.
fn byte_traces(n: usize, width: usize) -> Arc<InMemoryTraceHeaderSet> {
    let samples = Array2::from_shape_fn((n, width), |(i, j)| ((i * 31 + j * 7) % 255) as f64);
    let mut md = Metadata::new();
    md.insert(
        "plaintext".into(),
        (0..n)
            .map(|i| MetadataValue::Bytes((0..16).map(|b| ((i + b) % 256) as u8).collect()))
            .collect(),
    );
    Arc::new(InMemoryTraceHeaderSet::new(samples, md).unwrap())
}

fn minus_2() -> Preprocess {
    Preprocess::infallible("minus_2", |t: Array2<f64>| t - 2.0)
}

fn square(t: &Array2<f64>) -> Array2<f64> {
    t.mapv(|v| v * v)
}

#[test]
fn batches_iterate_over_every_trace() {
    let ths = byte_traces(10 * 250 + 100, 64);
    let container = Container::new(ths, Frame::All, Preprocesses::none()).unwrap();

    let batches = container.batches(Some(250)).unwrap();
    let mut seen = 0;
    for batch in &batches {
        let batch = batch.unwrap();
        assert!(batch.len() == 250 || batch.len() == 100);
        assert_eq!(batch.samples.nrows(), batch.len());
        assert_eq!(batch.metadatas["plaintext"].len(), batch.len());
        seen += batch.len();
    }
    assert_eq!(seen, 2600);
}

#[test]
fn default_batch_size_caps_at_trace_count() {
    let ths = byte_traces(300, 100);
    let container = Container::plain(ths);
    let batches = container.batches(None).unwrap();
    assert_eq!(batches.batch_size(), 300);
    assert_eq!(batches.num_batches(), 1);
}

#[test]
fn explicit_batch_size_larger_than_set() {
    let ths = byte_traces(1500, 8);
    let container = Container::plain(ths.clone());
    let sizes: Vec<usize> = container
        .batches(Some(2000))
        .unwrap()
        .iter()
        .map(|b| b.unwrap().len())
        .collect();
    assert_eq!(sizes, vec![ths.len()]);
}

#[test]
fn two_hundred_batches_of_ten() {
    let container = Container::plain(byte_traces(N_TRACES, N_SAMPLES));
    let batches = container.batches(Some(10)).unwrap();
    assert_eq!(batches.num_batches(), 200);
    assert!(batches.ranges().all(|r| r.len() == 10));
}

#[test]
fn trace_size_follows_frame() {
    let ths = byte_traces(N_TRACES, N_SAMPLES);
    assert_eq!(Container::plain(ths.clone()).trace_size(), N_SAMPLES);
    for (frame, expected) in [
        (Frame::from(..10_usize), 10),
        (Frame::from(..2000_usize), 1000),
        (Frame::from(1_usize), 1),
    ] {
        let c = Container::new(ths.clone(), frame, Preprocesses::none()).unwrap();
        assert_eq!(c.trace_size(), expected, "{frame:?}");
    }
}

#[test]
fn frame_index_past_width_is_rejected() {
    let ths = byte_traces(10, 5);
    let err = Container::new(ths, 5_usize, Preprocesses::none()).unwrap_err();
    assert!(matches!(err, ContainerError::Value(_)));
}

#[test]
fn batch_size_zero_is_rejected() {
    let container = Container::plain(byte_traces(10, 5));
    assert!(matches!(container.batches(Some(0)), Err(ContainerError::Value(_))));
}

#[test]
fn one_preprocess() {
    let ths = byte_traces(N_TRACES, N_SAMPLES);
    let c = Container::new(ths.clone(), Frame::All, builtin::square()).unwrap();
    let b = c.batches(Some(10)).unwrap().get(0).unwrap();
    assert_eq!(b.samples, square(&ths.raw_samples().slice(s![..10, ..]).to_owned()));
}

#[test]
fn preprocesses_compose_in_order() {
    let ths = byte_traces(N_TRACES, N_SAMPLES);
    let c = Container::new(ths.clone(), Frame::All, vec![builtin::square(), minus_2()]).unwrap();
    let b = c.batches(Some(10)).unwrap().get(0).unwrap();
    let raw = ths.raw_samples().slice(s![..10, ..]).to_owned();
    assert_eq!(b.samples, square(&raw) - 2.0);
}

#[test]
fn frame_selects_columns() {
    let ths = byte_traces(N_TRACES, N_SAMPLES);
    let c = Container::new(ths.clone(), ..20_usize, Preprocesses::none()).unwrap();
    let b = c.batches(Some(10)).unwrap().get(0).unwrap();
    assert_eq!(b.samples, ths.raw_samples().slice(s![..10, ..20]));
}

#[test]
fn frame_is_applied_before_preprocesses() {
    let ths = byte_traces(N_TRACES, N_SAMPLES);
    let c = Container::new(ths.clone(), 10..30_usize, [builtin::square(), minus_2()]).unwrap();
    let b = c.batches(Some(10)).unwrap().get(2).unwrap();
    let raw = ths.raw_samples().slice(s![20..30, 10..30]).to_owned();
    assert_eq!(b.samples, square(&raw) - 2.0);
    assert_eq!(b.range(), 20..30);
}

#[test]
fn stages_see_framed_width() {
    let ths = byte_traces(40, 100);
    let width_check = Preprocess::new("width_check", |t: Array2<f64>| {
        anyhow::ensure!(t.ncols() == 5, "stage saw {} columns", t.ncols());
        Ok(t)
    });
    let c = Container::new(ths, 50..55_usize, width_check).unwrap();
    for batch in c.batches(Some(7)).unwrap() {
        assert_eq!(batch.unwrap().samples.ncols(), 5);
    }
}

#[test]
fn stage_failure_propagates() {
    let ths = byte_traces(20, 4);
    let failing = Preprocess::new("drop_rows", |_t: Array2<f64>| {
        anyhow::bail!("refusing to process")
    });
    let c = Container::new(ths, Frame::All, failing).unwrap();
    let batches = c.batches(Some(5)).unwrap();
    match batches.get(1) {
        Err(ContainerError::Preprocess { stage, .. }) => assert_eq!(stage, "drop_rows"),
        other => panic!("expected a preprocess error, got {other:?}"),
    }
}

#[test]
fn stage_output_shape_is_not_checked() {
    let ths = byte_traces(20, 4);
    let widen = Preprocess::infallible("widen", |t: Array2<f64>| {
        Array2::zeros((t.nrows(), t.ncols() * 2))
    });
    let c = Container::new(ths, Frame::All, widen).unwrap();
    let b = c.batches(Some(5)).unwrap().get(0).unwrap();
    assert_eq!(b.samples.dim(), (5, 8));
}

#[test]
fn indexed_and_iterated_batches_match() {
    let ths = byte_traces(503, 32);
    let c = Container::new(ths, 3..19_usize, builtin::center()).unwrap();
    let batches = c.batches(Some(50)).unwrap();
    for (k, iterated) in batches.iter().enumerate() {
        let iterated = iterated.unwrap();
        let indexed = batches.get(k).unwrap();
        assert_eq!(iterated, indexed);
    }
    // Random access in any order is reproducible.
    assert_eq!(batches.get(10).unwrap(), batches.get(10).unwrap());
    assert_eq!(batches.get(10).unwrap().len(), 3);
}

#[test]
fn out_of_range_index() {
    let c = Container::plain(byte_traces(N_TRACES, 4));
    let batches = c.batches(Some(10)).unwrap();
    assert!(batches.get(199).is_ok());
    match batches.get(200) {
        Err(ContainerError::Range { index, count }) => assert_eq!((index, count), (200, 200)),
        other => panic!("expected a range error, got {other:?}"),
    }
}
