use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use crate::orderbook::{OrderBookStats, Trade};

/// Metrics collector for order book operations
#[derive(Debug)]
pub struct OrderBookMetrics {
    // Latency tracking
    add_order_latency: LatencyTracker,
    cancel_order_latency: LatencyTracker,
    modify_order_latency: LatencyTracker,

    // Throughput counters
    orders_added: AtomicU64,
    orders_cancelled: AtomicU64,
    orders_modified: AtomicU64,
    orders_rejected: AtomicU64,
    trades_executed: AtomicU64,

    // Volume tracking
    total_volume: AtomicU64,
    total_notional: AtomicU64,
}

impl OrderBookMetrics {
    pub fn new() -> Self {
        describe_counter!("orderbook_orders_total", "Total number of orders processed");
        describe_counter!("orderbook_rejections_total", "Orders refused by the book");
        describe_counter!("orderbook_trades_total", "Total number of trades executed");
        describe_histogram!(
            "orderbook_operation_duration_seconds",
            "Duration of order book operations"
        );
        describe_gauge!(
            "orderbook_levels_total",
            "Number of price levels in the book"
        );
        describe_gauge!(
            "orderbook_orders_current",
            "Current number of orders in the book"
        );
        describe_gauge!("orderbook_spread_ticks", "Current bid-ask spread in ticks");

        Self {
            add_order_latency: LatencyTracker::new("add_order"),
            cancel_order_latency: LatencyTracker::new("cancel_order"),
            modify_order_latency: LatencyTracker::new("modify_order"),
            orders_added: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            orders_modified: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            total_notional: AtomicU64::new(0),
        }
    }

    // Latency measurement methods
    pub fn time_add_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.add_order_latency.time(f)
    }

    pub fn time_cancel_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_order_latency.time(f)
    }

    pub fn time_modify_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.modify_order_latency.time(f)
    }

    // Counter methods
    pub fn increment_orders_added(&self) {
        self.orders_added.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "add").increment(1);
    }

    pub fn increment_orders_cancelled(&self) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "cancel").increment(1);
    }

    pub fn increment_orders_modified(&self) {
        self.orders_modified.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "modify").increment(1);
    }

    pub fn increment_orders_rejected(&self, operation: &'static str) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_rejections_total", "operation" => operation).increment(1);
    }

    pub fn record_trades(&self, trades: &[Trade]) {
        for trade in trades {
            let quantity = trade.quantity();
            let notional = quantity.saturating_mul(trade.price());

            self.trades_executed.fetch_add(1, Ordering::Relaxed);
            self.total_volume.fetch_add(quantity, Ordering::Relaxed);
            self.total_notional.fetch_add(notional, Ordering::Relaxed);

            counter!("orderbook_trades_total").increment(1);
            counter!("orderbook_volume_total").increment(quantity);
            counter!("orderbook_notional_total").increment(notional);
        }
    }

    /// Publish the book's current shape as gauges
    pub fn record_book(&self, stats: &OrderBookStats) {
        gauge!("orderbook_orders_current").set(stats.total_orders as f64);
        gauge!("orderbook_levels_total", "side" => "bid").set(stats.bid_levels as f64);
        gauge!("orderbook_levels_total", "side" => "ask").set(stats.ask_levels as f64);
        if let Some(spread) = stats.spread {
            gauge!("orderbook_spread_ticks").set(spread as f64);
        }
        if let Some(price) = stats.best_bid {
            gauge!("orderbook_best_bid").set(price as f64);
        }
        if let Some(price) = stats.best_ask {
            gauge!("orderbook_best_ask").set(price as f64);
        }
    }

    // Getters for current values
    pub fn get_orders_added(&self) -> u64 {
        self.orders_added.load(Ordering::Relaxed)
    }

    pub fn get_orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    pub fn get_orders_modified(&self) -> u64 {
        self.orders_modified.load(Ordering::Relaxed)
    }

    pub fn get_orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn get_trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn get_total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    pub fn get_total_notional(&self) -> u64 {
        self.total_notional.load(Ordering::Relaxed)
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        LatencyStats {
            add_order: self.add_order_latency.get_stats(),
            cancel_order: self.cancel_order_latency.get_stats(),
            modify_order: self.modify_order_latency.get_stats(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_added: self.get_orders_added(),
            orders_cancelled: self.get_orders_cancelled(),
            orders_modified: self.get_orders_modified(),
            orders_rejected: self.get_orders_rejected(),
            trades_executed: self.get_trades_executed(),
            total_volume: self.get_total_volume(),
            total_notional: self.get_total_notional(),
            latency: self.get_latency_stats(),
        }
    }
}

impl Default for OrderBookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record_latency(start.elapsed());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("orderbook_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        let avg = if samples > 0 { total / samples } else { 0 };

        OperationLatencyStats {
            operation: self.operation.to_string(),
            samples,
            avg_nanos: avg,
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyStats {
    pub add_order: OperationLatencyStats,
    pub cancel_order: OperationLatencyStats,
    pub modify_order: OperationLatencyStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLatencyStats {
    pub operation: String,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn min_micros(&self) -> f64 {
        self.min_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub orders_added: u64,
    pub orders_cancelled: u64,
    pub orders_modified: u64,
    pub orders_rejected: u64,
    pub trades_executed: u64,
    pub total_volume: u64,
    pub total_notional: u64,
    pub latency: LatencyStats,
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Arc<OrderBookMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<OrderBookMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    /// Log a summary every interval until `shutdown` flips to true or its sender goes away
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.report(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.report();
        debug!("Metrics reporter stopped");
    }

    fn report(&self) {
        let stats = self.metrics.get_latency_stats();

        info!(
            "OrderBook Metrics - Orders: +{} -{} ~{} !{} | Trades: {} | Latency (μs): add={:.2} cancel={:.2} modify={:.2}",
            self.metrics.get_orders_added(),
            self.metrics.get_orders_cancelled(),
            self.metrics.get_orders_modified(),
            self.metrics.get_orders_rejected(),
            self.metrics.get_trades_executed(),
            stats.add_order.avg_micros(),
            stats.cancel_order.avg_micros(),
            stats.modify_order.avg_micros()
        );
    }
}
