use chrono::NaiveTime;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::time_until_cutoff;
use crate::orderbook::operations::BookState;
use crate::utils::time::Clock;

/// Background worker that sweeps good-for-day orders once the daily cutoff passes.
///
/// The worker sleeps on a channel rather than the clock, so [`ExpiryScheduler::stop`]
/// wakes it immediately instead of waiting out the day.
#[derive(Debug)]
pub struct ExpiryScheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryScheduler {
    pub fn spawn(
        state: Arc<Mutex<BookState>>,
        cutoff: NaiveTime,
        slack: Duration,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("gfd-expiry".to_string())
            .spawn(move || {
                info!("Good-for-day expiry scheduled daily at {} UTC", cutoff);

                loop {
                    let wait = time_until_cutoff(clock.now(), cutoff) + slack;
                    debug!("Next good-for-day sweep in {:?}", wait);

                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            let mut book = state.lock();
                            if let Err(e) = book.prune_good_for_day() {
                                error!("Good-for-day sweep failed: {}", e);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                info!("Good-for-day expiry stopped");
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Signal the worker and wait for it to exit. Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // A full channel means a stop is already pending
        let _ = self.stop_tx.try_send(());
        if handle.join().is_err() {
            error!("Good-for-day expiry worker panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
