use std::path::PathBuf;

use burn::backend::{Autodiff, NdArray};
use chatgen_core::text::corpus::Corpus;
use chatgen_core::{GenerationContext, Pipeline, PipelineConfig};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

type TrainBackend = Autodiff<NdArray>;
type InferBackend = NdArray;

const DEFAULT_OUT_DIR: &str = "model";
/// Matches the default corpus filter, which keeps texts under 120 characters.
const DEFAULT_MAX_LEN: usize = 120;

#[derive(Parser, Debug)]
#[command(author, version, about = "Character-level chat name generator", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv)
	#[arg(short = 'v', long, global = true, action = ArgAction::Count)]
	verbose: u8,

	/// Decrease verbosity (-q, -qq)
	#[arg(short = 'q', long, global = true, action = ArgAction::Count)]
	quiet: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Train a model on a corpus with one text per line
	Train(TrainArgs),
	/// Generate texts with a trained model
	Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
	/// Corpus file, one text per line
	corpus: PathBuf,

	/// Directory receiving vocab.bin, dataset.bin, checkpoints and model.snapshot
	#[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUT_DIR)]
	out_dir: PathBuf,

	#[arg(long, value_name = "COUNT")]
	epochs: Option<usize>,

	#[arg(long, value_name = "SIZE")]
	batch_size: Option<usize>,

	/// Context length minus one
	#[arg(long, value_name = "LEN")]
	seq_length: Option<usize>,

	/// Stride between consecutive windows
	#[arg(long, value_name = "LEN")]
	step: Option<usize>,

	#[arg(long, value_name = "UNITS")]
	rnn_units: Option<usize>,

	#[arg(long, value_name = "RATE")]
	learning_rate: Option<f64>,

	/// Skip texts with this many characters or more
	#[arg(long, value_name = "LEN")]
	max_chars: Option<usize>,

	/// Shuffle seed
	#[arg(long)]
	seed: Option<u64>,

	/// Start from the latest checkpoint in the output directory
	#[arg(long)]
	resume: bool,

	/// Texts to sample once training is done
	#[arg(long, value_name = "COUNT", default_value_t = 0)]
	samples: usize,

	#[command(flatten)]
	sampling: SamplingArgs,
}

#[derive(Args, Debug)]
struct SamplingArgs {
	/// Maximum characters per text [default: --max-chars, else 120]
	#[arg(long, value_name = "LEN")]
	max_len: Option<usize>,

	/// Below 1 sharpens the distribution, above 1 flattens it
	#[arg(short, long, default_value_t = 1.0)]
	temperature: f64,
}

impl SamplingArgs {
	fn max_len(&self, max_chars: Option<usize>) -> usize {
		self.max_len.or(max_chars).unwrap_or(DEFAULT_MAX_LEN)
	}
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// Directory written by `train`
	#[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUT_DIR)]
	model_dir: PathBuf,

	/// Snapshot to load instead of `<model-dir>/model.snapshot`
	#[arg(long, value_name = "PATH")]
	snapshot: Option<PathBuf>,

	/// Vocabulary to load instead of `<model-dir>/vocab.bin`
	#[arg(long, value_name = "PATH")]
	vocab: Option<PathBuf>,

	/// Number of texts
	#[arg(short, default_value_t = 10)]
	n: usize,

	#[command(flatten)]
	sampling: SamplingArgs,

	/// Seed for reproducible output
	#[arg(long)]
	seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Commands::Train(args) => run_train(args),
		Commands::Generate(args) => run_generate(args),
	}
}

/// Level forced by `-v`/`-q`; `None` leaves `RUST_LOG` in charge.
fn verbosity(verbose: u8, quiet: u8) -> Option<LevelFilter> {
	match (quiet, verbose) {
		(0, 0) => None,
		(1, _) => Some(LevelFilter::Warn),
		(2.., _) => Some(LevelFilter::Error),
		(0, 1) => Some(LevelFilter::Debug),
		(0, _) => Some(LevelFilter::Trace),
	}
}

fn init_logging(verbose: u8, quiet: u8) {
	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	builder.format_timestamp_millis();
	if let Some(level) = verbosity(verbose, quiet) {
		builder.filter_level(level);
	}
	let _ = builder.try_init();
}

fn rng(seed: Option<u64>) -> StdRng {
	match seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	}
}

fn run_train(args: TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
	let mut config = PipelineConfig::default();
	if let Some(seq_length) = args.seq_length {
		config.seq_length = seq_length;
	}
	if let Some(step) = args.step {
		config.step = step;
	}
	if let Some(rnn_units) = args.rnn_units {
		config.rnn_units = rnn_units;
	}
	if let Some(learning_rate) = args.learning_rate {
		config.learning_rate = learning_rate;
	}
	if args.max_chars.is_some() {
		config.max_chars = args.max_chars;
	}
	if let Some(epochs) = args.epochs {
		config.training.epochs = epochs;
	}
	if let Some(batch_size) = args.batch_size {
		config.training.batch_size = batch_size;
	}
	if let Some(seed) = args.seed {
		config.training.seed = seed;
	}
	config.training.resume = args.resume;

	let max_len = args.sampling.max_len(config.max_chars);
	let corpus = Corpus::from_file(&args.corpus, config.max_chars)?;
	let pipeline = Pipeline::new(config, &args.out_dir);
	let device = Default::default();
	let (context, report) = pipeline.run::<TrainBackend>(corpus, &device)?;

	if let Some(loss) = report.final_loss() {
		info!("final loss {loss:.4} after {:.1?}", report.total_duration);
	}

	if args.samples > 0 {
		let texts = context.generate(args.samples, max_len, args.sampling.temperature, &mut rng(args.seed))?;
		for text in texts {
			println!("{text}");
		}
	}
	Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
	let snapshot = args.snapshot.unwrap_or_else(|| args.model_dir.join(chatgen_core::pipeline::SNAPSHOT_FILE));
	let vocab = args.vocab.unwrap_or_else(|| args.model_dir.join(chatgen_core::pipeline::VOCAB_FILE));

	let device = Default::default();
	let context = GenerationContext::<InferBackend>::load(&snapshot, &vocab, &device)?;
	let max_len = args.sampling.max_len(None);
	let texts = context.generate(args.n, max_len, args.sampling.temperature, &mut rng(args.seed))?;
	for text in texts {
		println!("{text}");
	}
	Ok(())
}
