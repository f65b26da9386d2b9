use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{FixedSizeBinaryArray, Float64Builder, Int64Array, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;

/// Fixed key whose first byte leaks into every trace.
const KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];

/// Traces per record batch written to the file.
const CHUNK: usize = 1_000;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn plaintext(&mut self) -> [u8; 16] {
        let mut p = [0u8; 16];
        for chunk in p.chunks_mut(8) {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes()[..chunk.len()]);
        }
        p
    }
}

/// Noisy trace with the Hamming weight of `p[0] ^ k[0]` at `leak_at`.
fn generate_trace(width: usize, leak_at: usize, plaintext: &[u8; 16], rng: &mut SimpleRng) -> Vec<f64> {
    let hw = (plaintext[0] ^ KEY[0]).count_ones() as f64;
    (0..width)
        .map(|j| {
            let signal = if j == leak_at { hw } else { 0.0 };
            128.0 + signal + rng.gauss(0.0, 1.0)
        })
        .collect()
}

fn arg_or(args: &[String], idx: usize, default: usize) -> Result<usize> {
    args.get(idx)
        .map(|s| s.parse::<usize>().with_context(|| format!("argument {idx}: '{s}' is not a count")))
        .unwrap_or(Ok(default))
}

fn main() -> Result<()> {
    env_logger::init();

    // generate_traces [n_traces] [n_samples] [output]
    let args: Vec<String> = std::env::args().collect();
    let n_traces = arg_or(&args, 1, 5_000)?;
    let width = arg_or(&args, 2, 1_000)?;
    let output_path = args.get(3).map_or("sample_traces.parquet", String::as_str);
    let leak_at = width / 2;

    let schema = Arc::new(Schema::new(vec![
        Field::new("samples", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("plaintext", DataType::FixedSizeBinary(16), false),
        Field::new("trace_id", DataType::Int64, false),
    ]));

    let file = std::fs::File::create(output_path)
        .with_context(|| format!("creating {output_path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None).context("creating parquet writer")?;

    let mut rng = SimpleRng::new(42);
    let mut written = 0usize;
    while written < n_traces {
        let n = CHUNK.min(n_traces - written);

        let mut samples_builder = ListBuilder::new(Float64Builder::new());
        let mut plaintexts = Vec::with_capacity(n);
        for _ in 0..n {
            let p = rng.plaintext();
            let values = samples_builder.values();
            for v in generate_trace(width, leak_at, &p, &mut rng) {
                values.append_value(v);
            }
            samples_builder.append(true);
            plaintexts.push(p);
        }

        let plaintext_array = FixedSizeBinaryArray::try_from_iter(plaintexts.iter())
            .context("building plaintext column")?;
        let id_array = Int64Array::from_iter_values((written..written + n).map(|i| i as i64));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(samples_builder.finish()),
                Arc::new(plaintext_array),
                Arc::new(id_array),
            ],
        )
        .context("assembling record batch")?;
        writer.write(&batch).context("writing record batch")?;
        written += n;
        info!("wrote {written}/{n_traces} traces");
    }
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {n_traces} traces ({width} samples each, leakage at sample {leak_at}) to {output_path}"
    );
    Ok(())
}
