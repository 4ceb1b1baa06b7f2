use std::{fmt::Debug, time::Duration};
use tracing::{info, warn};

use crate::{barrier::Round, timer::duration_to_ms};

/// What a worker observed in one round.
#[derive(Debug)]
pub struct RoundReport<'a, O> {
    pub worker: usize,
    pub round: Round,
    pub size: usize,
    pub elapsed: Duration,
    pub outcome: &'a anyhow::Result<O>,
}

/// Receives one report per worker per round. Called from worker threads.
pub trait Reporter<O>: Send + Sync {
    fn report(&self, report: &RoundReport<'_, O>);
}

/// Emits each report as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl<O: Debug> Reporter<O> for TracingReporter {
    fn report(&self, report: &RoundReport<'_, O>) {
        let elapsed_ms = duration_to_ms(report.elapsed);
        match report.outcome {
            Ok(output) => info!(
                worker = report.worker,
                round = report.round,
                size = report.size,
                elapsed_ms,
                ?output,
                "round computed"
            ),
            Err(err) => warn!(
                worker = report.worker,
                round = report.round,
                size = report.size,
                elapsed_ms,
                error = %err,
                "round failed"
            ),
        }
    }
}

/// Prints a banner per worker per round to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl<O> Reporter<O> for ConsoleReporter {
    fn report(&self, report: &RoundReport<'_, O>) {
        let status = match report.outcome {
            Ok(_) => "completed".to_string(),
            Err(err) => format!("failed ({err})"),
        };
        println!(
            "=============================================\n\
             >>> Worker {} {} round {}\n\
             Matrix size : {}x{}\n\
             lead time : [{:.6} seconds]\n\
             =============================================",
            report.worker,
            status,
            report.round,
            report.size,
            report.size,
            report.elapsed.as_secs_f64()
        );
    }
}
