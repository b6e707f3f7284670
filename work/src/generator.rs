//! PoW generation (multi-threaded CPU).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::{validate_work, Difficulty, WorkCounter, WorkError};

/// Searches for a work counter using all available CPU cores.
pub struct WorkGenerator;

/// Counters tried per thread before checking whether another thread succeeded.
const BATCH_SIZE: u64 = 4096;

impl WorkGenerator {
    /// Find a counter such that `payload || counter` hashes to at least
    /// `difficulty` leading zero bits.
    ///
    /// Threads search interleaved strides of the counter space; the first hit
    /// stops the others. With several hits in one batch any of them may win.
    pub fn generate(
        &self,
        payload: &[u8],
        difficulty: Difficulty,
    ) -> Result<WorkCounter, WorkError> {
        if difficulty.bits() == 0 {
            return Ok(WorkCounter(0));
        }

        let found = AtomicU64::new(0);
        let done = AtomicBool::new(false);
        let num_threads = rayon::current_num_threads().max(1) as u64;

        (0..num_threads).into_par_iter().for_each(|thread_id| {
            let mut counter = thread_id;
            loop {
                if done.load(Ordering::Relaxed) {
                    return;
                }
                let end = counter.saturating_add(BATCH_SIZE * num_threads);
                while counter < end {
                    if validate_work(payload, WorkCounter(counter), difficulty) {
                        if !done.swap(true, Ordering::AcqRel) {
                            found.store(counter, Ordering::Release);
                        }
                        return;
                    }
                    counter = match counter.checked_add(num_threads) {
                        Some(next) => next,
                        None => return,
                    };
                }
            }
        });

        if done.load(Ordering::Acquire) {
            Ok(WorkCounter(found.load(Ordering::Acquire)))
        } else {
            Err(WorkError::Exhausted)
        }
    }
}
