use clap::{Parser, ValueEnum};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use synched_rounds::{
    Config, ConsoleReporter, MultiplyMode, Product, Reporter, Runtime, TracingReporter,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportStyle {
    /// Structured log events
    Log,
    /// Per-worker banners on stdout
    Console,
}

/// Runs worker threads over matrices that a producer thread grows every round.
#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    /// TOML file with a base configuration; flags below override it
    #[clap(long, env = "SYNCHED_ROUNDS_CONFIG")]
    config: Option<PathBuf>,
    #[clap(long)]
    workers: Option<usize>,
    #[clap(long)]
    initial_size: Option<usize>,
    #[clap(long)]
    growth_factor: Option<usize>,
    /// Fail instead of generating matrices larger than this
    #[clap(long)]
    size_ceiling: Option<usize>,
    /// Stop cleanly after this many rounds; runs forever if unset
    #[clap(long)]
    max_rounds: Option<u64>,
    /// Abort if a round takes longer than this many milliseconds
    #[clap(long)]
    round_timeout_ms: Option<u64>,
    /// Split each product across the rayon pool
    #[clap(long)]
    parallel: bool,
    #[clap(long, value_enum, default_value_t = ReportStyle::Log)]
    report: ReportStyle,
}

impl Args {
    fn into_config(self) -> synched_rounds::Result<(Config, ReportStyle)> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(initial_size) = self.initial_size {
            config.initial_size = initial_size;
        }
        if let Some(growth_factor) = self.growth_factor {
            config.growth_factor = growth_factor;
        }
        if self.size_ceiling.is_some() {
            config.size_ceiling = self.size_ceiling;
        }
        if self.max_rounds.is_some() {
            config.max_rounds = self.max_rounds;
        }
        if self.round_timeout_ms.is_some() {
            config.round_timeout_ms = self.round_timeout_ms;
        }
        if self.parallel {
            config.workload = MultiplyMode::Parallel;
        }

        config.validate()?;
        Ok((config, self.report))
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    let (config, style) = match Args::parse().into_config() {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(error = %err, "invalid startup parameters");
            return ExitCode::FAILURE;
        }
    };

    let reporter: Arc<dyn Reporter<Product>> = match style {
        ReportStyle::Log => Arc::new(TracingReporter),
        ReportStyle::Console => Arc::new(ConsoleReporter),
    };

    let result = Runtime::start_matrix(&config, reporter).and_then(Runtime::join);
    match result {
        Ok(summary) => {
            #[cfg(feature = "profiler")]
            summary.timing.plot();

            #[cfg(not(feature = "profiler"))]
            let _ = summary;

            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}
