use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use super::Driver;

/// Ticks a shared driver from a background thread at a fixed interval.
/// Every tick holds the driver lock, so readers always see a whole tick.
pub(crate) struct AutoRunner {
    should_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<u64>>,
}

impl AutoRunner {
    pub fn start(driver: Arc<Mutex<Driver>>, interval: Duration, max_ticks: u64) -> AutoRunner {
        let should_stop = Arc::new(AtomicBool::new(false));
        let should_stop_clone = should_stop.clone();

        let worker = thread::spawn(move || {
            let mut ticks = 0;

            while ticks < max_ticks && !should_stop_clone.load(Ordering::Relaxed) {
                let halted = {
                    let mut driver = driver.lock().unwrap_or_else(PoisonError::into_inner);
                    driver.tick();
                    driver.is_halted()
                };
                ticks += 1;

                if halted {
                    break;
                }
                thread::sleep(interval);
            }

            debug!("auto-run thread exiting after {} ticks", ticks);
            ticks
        });

        info!("auto-run started, one tick every {:?}", interval);

        AutoRunner {
            should_stop,
            worker: Some(worker),
        }
    }

    /// Blocks until the simulation halts or the tick limit is hit. Returns
    /// the number of ticks run.
    pub fn wait(mut self) -> u64 {
        self.worker
            .take()
            .map_or(0, |worker| worker.join().unwrap_or_default())
    }
}

impl Drop for AutoRunner {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::Relaxed);

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
