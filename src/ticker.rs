//! Fixed-interval background tickers whose lifetime is bound to an owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

/// Runs `on_tick` every `interval` on a named thread until dropped or
/// stopped. The first tick fires one interval after start.
pub struct PeriodicTicker {
    name: String,
    running: Arc<AtomicBool>,
}

impl PeriodicTicker {
    pub fn start<F>(name: &str, interval: Duration, mut on_tick: F) -> Option<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let spawn_result = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while thread_running.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    if !thread_running.load(Ordering::Acquire) {
                        break;
                    }
                    on_tick();
                }
            });
        match spawn_result {
            Ok(_) => {
                debug!("PeriodicTicker: started {} every {:?}", name, interval);
                Some(Self {
                    name: name.to_string(),
                    running,
                })
            }
            Err(err) => {
                warn!("PeriodicTicker: failed to spawn {}: {}", name, err);
                None
            }
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("PeriodicTicker: stopped {}", self.name);
        }
    }
}

impl Drop for PeriodicTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::PeriodicTicker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_ticker_fires_until_dropped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = PeriodicTicker::start("test-ticker", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("ticker thread");
        std::thread::sleep(Duration::from_millis(100));
        drop(ticker);

        std::thread::sleep(Duration::from_millis(30));
        let after_drop = ticks.load(Ordering::SeqCst);
        assert!(after_drop >= 2);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    }
}
