/*
 * Created on Thu Mar 09 2023
 *
 * This file is a part of Skytree
 * Skytree is a free and open-source concurrent directory tree engine
 * written by Sayan Nandan ("the Author") with the
 * vision to provide a fast and fair hierarchical namespace for
 * multithreaded systems software
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use parking_lot::{Condvar, Mutex};

/// A counting semaphore that doesn't let latecomers barge past parked
/// waiters: if anyone is enrolled as a waiter, a fresh `acquire` enrolls
/// behind them instead of grabbing a permit that a `release` just made
/// available. The monitor protocol builds its critical-section handovers on
/// exactly this property
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    on_release: Condvar,
}

struct SemaphoreState {
    permits: u32,
    waiting: u32,
}

impl Semaphore {
    pub fn new(permits: u32) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                permits,
                waiting: 0,
            }),
            on_release: Condvar::new(),
        }
    }
    /// Take one permit, parking until one is handed to us. A thread that
    /// finds waiters ahead of it (or no free permit) enrolls and sleeps at
    /// least once before consuming anything
    pub fn acquire(&self) {
        let mut state = self.state.lock();
        if state.permits <= state.waiting {
            state.waiting += 1;
            loop {
                self.on_release.wait(&mut state);
                if state.permits > 0 {
                    break;
                }
            }
            state.waiting -= 1;
        }
        state.permits -= 1;
    }
    /// Put one permit back and wake a single parked waiter, if any
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        self.on_release.notify_one();
    }
    #[cfg(test)]
    pub fn permits(&self) -> u32 {
        self.state.lock().permits
    }
}

#[cfg(test)]
mod tests {
    use {
        super::Semaphore,
        std::{
            sync::{
                atomic::{AtomicU32, Ordering},
                mpsc, Arc,
            },
            thread,
            time::Duration,
        },
    };

    #[test]
    fn uncontended() {
        let sem = Semaphore::new(2);
        sem.acquire();
        sem.acquire();
        assert_eq!(sem.permits(), 0);
        sem.release();
        sem.release();
        assert_eq!(sem.permits(), 2);
    }
    #[test]
    fn handoff() {
        let sem = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || {
                sem.acquire();
                tx.send(()).unwrap();
            })
        };
        // the waiter must be parked, not through
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        sem.release();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }
    #[test]
    fn mutual_exclusion() {
        const THREADS: u32 = 8;
        const ROUNDS: u32 = 1000;
        let sem = Arc::new(Semaphore::new(1));
        let inside = Arc::new(AtomicU32::new(0));
        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let (sem, inside) = (sem.clone(), inside.clone());
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        sem.acquire();
                        assert_eq!(inside.fetch_add(1, Ordering::Relaxed), 0);
                        assert_eq!(inside.fetch_sub(1, Ordering::Relaxed), 1);
                        sem.release();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(sem.permits(), 1);
    }
}
