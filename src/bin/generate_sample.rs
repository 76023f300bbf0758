use std::path::PathBuf;

use anyhow::{Context, Result};
use tasc::data::value::cells;
use tasc::domains::{Coordinate, CoordinateMap};
use tasc::{Column, ColumnCollection, Metadata, Value};

/// Elastic stiffness [kN/mm], yield displacement [mm] and post-yield ratio.
const STIFFNESS: f64 = 5.0;
const YIELD_DISP: f64 = 2.0;
const HARDENING: f64 = 0.1;

/// Displacement amplitudes of the loading protocol [mm].
const AMPLITUDES: [f64; 4] = [1.0, 2.0, 4.0, 6.0];
const POINTS_PER_QUARTER: usize = 10;

/// Envelope load for a monotonic excursion to `d`.
fn bilinear(d: f64) -> f64 {
    let sign = d.signum();
    let d = d.abs();
    if d <= YIELD_DISP {
        sign * STIFFNESS * d
    } else {
        sign * STIFFNESS * (YIELD_DISP + HARDENING * (d - YIELD_DISP))
    }
}

/// Fully reversed cycles: 0 → +a → 0 → −a → 0 for every amplitude.
fn protocol() -> Vec<f64> {
    let mut disp = vec![0.0];
    for &a in &AMPLITUDES {
        for target in [a, 0.0, -a, 0.0] {
            let from = *disp.last().unwrap_or(&0.0);
            for i in 1..=POINTS_PER_QUARTER {
                disp.push(from + (target - from) * i as f64 / POINTS_PER_QUARTER as f64);
            }
        }
    }
    disp
}

/// Deterministic measurement noise (xoshiro256** + Box-Muller).
struct NoiseSource {
    state: [u64; 4],
}

impl NoiseSource {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        NoiseSource { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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

    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Cyclic load-displacement record with three strain gauges along the
/// specimen; gauge strain scales with load and falls off with height.
fn cyclic_record(rng: &mut NoiseSource) -> Result<ColumnCollection> {
    let disp = protocol();
    let load: Vec<f64> = disp.iter().map(|&d| bilinear(d) + rng.normal(0.0, 0.05)).collect();
    let gauges = [("SG1", 0.0), ("SG2", 100.0), ("SG3", 200.0)];

    let mut columns = vec![
        Column::detect("Load", cells(load.iter().copied()))
            .with_channel("CH0")
            .with_unit("kN"),
        Column::detect("Disp", cells(disp.iter().copied()))
            .with_channel("CH1")
            .with_unit("mm"),
    ];
    for (i, (name, height)) in gauges.iter().enumerate() {
        let factor = 40.0 * (1.0 - height / 400.0);
        let strain = load.iter().map(|l| l * factor + rng.normal(0.0, 2.0));
        columns.push(
            Column::detect(*name, cells(strain))
                .with_channel(format!("CH{}", i + 2))
                .with_unit("με"),
        );
    }

    let mut metadata = Metadata::new();
    metadata.insert("title".to_string(), Value::from("cyclic loading test"));
    let step = (1..=disp.len()).map(|i| i as f64).collect();
    let record = ColumnCollection::new(step, columns, metadata)
        .context("assembling the cyclic record")?;

    let mut positions = CoordinateMap::default();
    for (name, height) in gauges {
        positions.insert(name, Coordinate::new(Some(0.0), Some(height), None));
    }
    Ok(positions.attach(record)?)
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "sample_data".into()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = NoiseSource::new(42);
    let record = cyclic_record(&mut rng)?;

    let txt = out_dir.join("cyclic_test.txt");
    record.to_file(&txt, "tasc_txt").context("writing text record")?;
    let csv = out_dir.join("cyclic_test.csv");
    record.to_file(&csv, "csv").context("writing csv record")?;
    let parquet = out_dir.join("cyclic_test.parquet");
    record.to_parquet(&parquet).context("writing parquet record")?;
    let json = out_dir.join("cyclic_test.json");
    record.write_json(&json).context("writing json record")?;

    println!(
        "Wrote {} steps ({} columns) to {}",
        record.len(),
        record.columns().len(),
        out_dir.display()
    );
    Ok(())
}
