//! Scenario replay: parse command lines and drive an [`OrderBook`] with them.

pub mod error;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::metrics::OrderBookMetrics;
use crate::orderbook::{Order, OrderBook, OrderBookError, OrderId, OrderModify, Trades};

pub use error::ScenarioError;
pub use parser::parse_line;

/// One parsed scenario instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(Order),
    Modify(OrderModify),
    Cancel(OrderId),
}

/// What a replay did, beyond the book's own state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub commands: usize,
    pub rejected: usize,
    pub trades: usize,
    pub traded_volume: u64,
}

/// Applies commands to a book, recording metrics as it goes
pub struct Replayer<'a> {
    book: &'a OrderBook,
    metrics: &'a OrderBookMetrics,
    summary: ReplaySummary,
}

impl<'a> Replayer<'a> {
    pub fn new(book: &'a OrderBook, metrics: &'a OrderBookMetrics) -> Self {
        Self {
            book,
            metrics,
            summary: ReplaySummary::default(),
        }
    }

    /// Apply one command. Rejections are logged and counted; fatal engine errors abort.
    pub fn apply(&mut self, line_no: usize, command: Command) -> Result<(), ScenarioError> {
        self.summary.commands += 1;

        let (operation, result) = match command {
            Command::Add(order) => {
                let result = self.metrics.time_add_order(|| self.book.add_order(order));
                if result.is_ok() {
                    self.metrics.increment_orders_added();
                }
                ("add", result)
            }
            Command::Modify(modify) => {
                let result = self
                    .metrics
                    .time_modify_order(|| self.book.modify_order(modify));
                if result.is_ok() {
                    self.metrics.increment_orders_modified();
                }
                ("modify", result)
            }
            Command::Cancel(order_id) => {
                let result = self
                    .metrics
                    .time_cancel_order(|| self.book.cancel_order(order_id));
                if result.is_ok() {
                    self.metrics.increment_orders_cancelled();
                }
                ("cancel", result.map(|_| Trades::new()))
            }
        };

        match result {
            Ok(trades) => {
                self.record(&trades);
                Ok(())
            }
            Err(e) if e.is_rejection() => {
                warn!("Line {}: {} rejected: {}", line_no, operation, e);
                self.metrics.increment_orders_rejected(operation);
                self.summary.rejected += 1;
                Ok(())
            }
            Err(e) => Err(fatal(line_no, e)),
        }
    }

    /// Parse and apply line by line; a bad line stops the run with earlier commands kept
    pub fn replay<R: BufRead>(&mut self, reader: R) -> Result<(), ScenarioError> {
        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line?;
            if let Some(command) = parse_line(line_no, &line)? {
                debug!("Line {}: {:?}", line_no, command);
                self.apply(line_no, command)?;
            }
        }
        self.metrics.record_book(&self.book.get_stats());
        Ok(())
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    pub fn into_summary(self) -> ReplaySummary {
        self.summary
    }

    fn record(&mut self, trades: &Trades) {
        self.metrics.record_trades(trades);
        self.summary.trades += trades.len();
        self.summary.traded_volume = trades
            .iter()
            .fold(self.summary.traded_volume, |acc, t| acc.saturating_add(t.quantity()));
    }
}

fn fatal(line_no: usize, e: OrderBookError) -> ScenarioError {
    error!("Line {}: engine failure: {}", line_no, e);
    ScenarioError::Engine(e)
}

/// Replay a scenario file into `book`
pub fn replay_file(
    book: &OrderBook,
    metrics: &OrderBookMetrics,
    path: impl AsRef<Path>,
) -> Result<ReplaySummary, ScenarioError> {
    let path = path.as_ref();
    info!("Replaying scenario {}", path.display());

    let file = File::open(path)?;
    let mut replayer = Replayer::new(book, metrics);
    replayer.replay(BufReader::new(file))?;

    let summary = replayer.into_summary();
    info!(
        "Replayed {} commands: {} rejected, {} trades for {} units",
        summary.commands, summary.rejected, summary.trades, summary.traded_volume
    );
    Ok(summary)
}
