use arrow::datatypes::Schema;
use arrow::ipc::writer::FileWriter;

use clap::{ArgAction, Parser, ValueEnum};
use crossbeam_channel::bounded;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use dl_distance_calculator::batch::{compute_range, BatchShape};
use dl_distance_calculator::output::{self, DistanceRecord, IpcDataBatch};
use dl_distance_calculator::{seq_reader, DistanceConfig, DistanceError};

const CHUNK_SIZE: usize = 1 << 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Ipc,
    Json,
}

/// Weighted Damerau-Levenshtein distances between two sequence files
#[derive(Debug, Parser)]
#[command(name = "dl_distance_calculator", version, about)]
struct Cli {
    /// Source sequences, one per line (`NA` marks a missing element, `.gz` is gunzipped)
    sources: String,

    /// Target sequences, same format as the sources
    targets: String,

    /// Output file
    output: String,

    /// JSON file with `weights` and `max_distance`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deletion, insertion, substitution and transposition weights, e.g. 1,1,1,1
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    weights: Option<Vec<f64>>,

    /// Report -1 for pairs whose distance exceeds this value (0 disables the ceiling)
    #[arg(long)]
    max_distance: Option<f64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Ipc)]
    format: OutputFormat,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Increase logging verbosity (-v: debug, -vv+: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, thiserror::Error)]
enum WorkerError {
    #[error(transparent)]
    Distance(#[from] DistanceError),
    #[error("Worker failed to send chunk to writer thread")]
    ChannelSend,
}

fn directive_for_verbosity(v: u8) -> &'static str {
    match v {
        0 => "dl_distance_calculator=info",
        1 => "dl_distance_calculator=debug",
        _ => "dl_distance_calculator=trace",
    }
}

/// Config file first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<DistanceConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => DistanceConfig::from_json_file(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => DistanceConfig::default(),
    };
    if let Some(weights) = &cli.weights {
        config.weights = weights
            .as_slice()
            .try_into()
            .map_err(|_| DistanceError::WeightCount(weights.len()))?;
    }
    if let Some(max_distance) = cli.max_distance {
        config.max_distance = max_distance;
    }
    Ok(config)
}

enum Sink {
    Ipc {
        writer: FileWriter<BufWriter<File>>,
        batch: IpcDataBatch,
        schema: Arc<Schema>,
    },
    Json {
        writer: BufWriter<File>,
        records: Vec<DistanceRecord>,
    },
}

impl Sink {
    fn create(path: &str, format: OutputFormat) -> Result<Self, DistanceError> {
        let file = File::create(path)?;
        let buf_writer = BufWriter::with_capacity(128 * 1024, file);
        Ok(match format {
            OutputFormat::Ipc => {
                let schema = output::distance_schema();
                let writer = FileWriter::try_new(buf_writer, &schema)?;
                Sink::Ipc { writer, batch: IpcDataBatch::new(), schema }
            }
            OutputFormat::Json => Sink::Json { writer: buf_writer, records: Vec::new() },
        })
    }

    fn push(&mut self, record: DistanceRecord) -> Result<(), DistanceError> {
        match self {
            Sink::Ipc { writer, batch, schema } => {
                batch.add(&record);
                if batch.is_full() {
                    batch.write_to_arrow_and_clear(writer, schema)?;
                }
            }
            Sink::Json { records, .. } => records.push(record),
        }
        Ok(())
    }

    fn finish(self) -> Result<(), DistanceError> {
        match self {
            Sink::Ipc { mut writer, mut batch, schema } => {
                batch.write_to_arrow_and_clear(&mut writer, &schema)?;
                writer.finish()?;
            }
            Sink::Json { mut writer, records } => {
                serde_json::to_writer(&mut writer, &records)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli)?;
    let (weights, max_distance) = config.validate()?;
    debug!(?weights, max_distance, "resolved parameters");

    let num_threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new().num_threads(num_threads).build_global()?;
    info!("Using Rayon thread pool with {} threads for computation.", num_threads);

    let sources = seq_reader::load_sequences(&cli.sources)
        .map_err(|e| format!("Failed to load source sequences '{}': {}", cli.sources, e))?;
    let targets = seq_reader::load_sequences(&cli.targets)
        .map_err(|e| format!("Failed to load target sequences '{}': {}", cli.targets, e))?;
    info!("Loaded {} source and {} target sequence(s).", sources.len(), targets.len());

    let shape = BatchShape::new(sources.len(), targets.len())?;
    if !shape.recycles_evenly() {
        warn!(
            "Longer input ({} sequences) is not a multiple of the shorter one ({} sequences).",
            shape.output_len(),
            shape.len_a.min(shape.len_b)
        );
    }
    let total = shape.output_len();
    let num_chunks = total.div_ceil(CHUNK_SIZE);
    info!("{} pairwise comparisons in {} chunk(s).", total, num_chunks);

    let mut sink = Sink::create(&cli.output, cli.format)
        .map_err(|e| format!("Failed to create output file '{}': {}", cli.output, e))?;

    let (tx, rx) = bounded::<(usize, Vec<Option<f64>>)>(num_threads * 2);

    let writer_thread = thread::spawn(move || -> Result<usize, DistanceError> {
        // Chunks arrive in completion order; hold them until their turn.
        let mut pending: BTreeMap<usize, Vec<Option<f64>>> = BTreeMap::new();
        let mut next_chunk = 0;
        let mut rows_written = 0;
        for (chunk, results) in rx.iter() {
            pending.insert(chunk, results);
            while let Some(results) = pending.remove(&next_chunk) {
                for record in output::records(shape, next_chunk * CHUNK_SIZE, &results) {
                    sink.push(record)?;
                }
                rows_written += results.len();
                next_chunk += 1;
                if next_chunk % 100 == 0 {
                    info!("Writer thread: {} chunks ({} rows) written.", next_chunk, rows_written);
                }
            }
        }
        if !pending.is_empty() {
            warn!("Writer thread: {} chunk(s) arrived after a gap and were dropped.", pending.len());
        }
        sink.finish()?;
        Ok(rows_written)
    });

    let computation_result = (0..num_chunks).into_par_iter().try_for_each(|chunk| -> Result<(), WorkerError> {
        let start = chunk * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(total);
        let results = compute_range(&sources, &targets, &weights, max_distance, start..end)?;
        if tx.send((chunk, results)).is_err() {
            error!("Worker (chunk {}) failed to send results. Writer thread might be down.", chunk);
            return Err(WorkerError::ChannelSend);
        }
        Ok(())
    });

    drop(tx);

    let rows_written = match writer_thread.join() {
        Ok(Ok(rows)) => rows,
        Ok(Err(write_err)) => {
            error!("Writer thread failed: {}", write_err);
            return Err(Box::new(write_err));
        }
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Writer thread panicked with an unknown type".to_string()
            };
            return Err(panic_msg.into());
        }
    };

    if let Err(e) = computation_result {
        error!("Computation stopped early: {}", e);
        return Err(Box::new(e));
    }

    info!("Finished: {} rows written to '{}'.", rows_written, cli.output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_defaults() {
        assert_eq!(directive_for_verbosity(0), "dl_distance_calculator=info");
        assert_eq!(directive_for_verbosity(1), "dl_distance_calculator=debug");
        assert_eq!(directive_for_verbosity(5), "dl_distance_calculator=trace");
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "dl_distance_calculator", "a.txt", "b.txt.gz", "out.json",
            "--weights", "1,2,0.5,1", "--max-distance", "3", "--format", "json", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.weights, Some(vec![1.0, 2.0, 0.5, 1.0]));
        assert_eq!(cli.max_distance, Some(3.0));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"weights": [2, 2, 2, 2], "max_distance": 5}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["x", "a", "b", "c", "--config", &path, "--max-distance", "1"]).unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.weights, [2.0; 4]);
        assert_eq!(config.max_distance, 1.0);
    }

    #[test]
    fn wrong_weight_count_is_an_error() {
        let cli = Cli::try_parse_from(["x", "a", "b", "c", "--weights", "1,1,1"]).unwrap();
        assert!(resolve_config(&cli).is_err());
    }
}
