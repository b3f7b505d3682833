/*
 * Created on Fri Mar 10 2023
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

//! # The node monitor
//!
//! Each tree node carries one of these: a reader/writer coordinator with two
//! twists over a textbook rwlock.
//!
//! 1) **An entry gate.** Both entry protocols pass through the `entry`
//! semaphore before they so much as look at the lock state. Because that
//! pass-through is FIFO, a parked writer can't be starved by a stream of
//! readers (nor the other way around). And because the gate is a semaphore
//! we hold rather than a critical section we merely cross, the engine can
//! [`gate_close`](NodeMonitor::gate_close) it to quarantine a node — new
//! readers *and* writers park before reaching the lock state, while threads
//! already inside exit unhindered. A renamed subtree stays gated until every
//! tenant has traced back out.
//!
//! 2) **Critical-section inheritance.** The lock state is guarded by the
//! `mutex` semaphore, and a thread that wakes a peer off `readers` or
//! `writers` hands its critical section over instead of releasing it: the
//! woken thread continues under the same exclusion, with no window in which
//! the state could be observed mid-transition. This is what makes the
//! wakeup cascades (writer exit waking a whole reader batch, one by one)
//! race-free.
//!
//! Scheduling: writers are preferred at reader entry (a reader behind an
//! active or waiting writer parks), readers are preferred at writer exit
//! (a departing writer flushes the parked reader batch first). Together
//! with the FIFO gate neither side starves.

use {crate::sync::Semaphore, core::cell::Cell};

pub struct NodeMonitor {
    /// the FIFO entry gate; closed by `gate_close` to quarantine the node
    entry: Semaphore,
    /// guards the four counters below, by direct hold or by inheritance
    mutex: Semaphore,
    /// parked readers; a release here hands over `mutex`
    readers: Semaphore,
    /// parked writers; a release here hands over `mutex`
    writers: Semaphore,
    reading: Cell<u32>,
    writing: Cell<u32>,
    waiting_r: Cell<u32>,
    waiting_w: Cell<u32>,
}

// UNSAFE(@ohsayan): the counters are plain `Cell`s, but every access happens
// with `mutex` held (directly, or inherited through a `readers`/`writers`
// wakeup), and the semaphore's internal lock orders those critical sections
// across threads. So: no concurrent access, and a happens-before chain
// between successive ones
unsafe impl Send for NodeMonitor {}
unsafe impl Sync for NodeMonitor {}

impl NodeMonitor {
    pub fn new() -> Self {
        Self {
            entry: Semaphore::new(1),
            mutex: Semaphore::new(1),
            readers: Semaphore::new(0),
            writers: Semaphore::new(0),
            reading: Cell::new(0),
            writing: Cell::new(0),
            waiting_r: Cell::new(0),
            waiting_w: Cell::new(0),
        }
    }
    /// Enter as a reader. Parks while a writer is active or waiting
    pub fn reader_enter(&self) {
        self.entry.acquire();
        self.mutex.acquire();
        self.entry.release();
        if self.writing.get() + self.waiting_w.get() > 0 {
            self.waiting_r.set(self.waiting_r.get() + 1);
            self.mutex.release();
            self.readers.acquire();
            // woken with the critical section handed to us
            self.waiting_r.set(self.waiting_r.get() - 1);
        }
        self.reading.set(self.reading.get() + 1);
        if self.waiting_r.get() > 0 {
            // cascade: pass the critical section to the next parked reader
            self.readers.release();
        } else {
            self.mutex.release();
        }
    }
    /// Exit as a reader; the last reader out hands the node to a parked
    /// writer, if any
    pub fn reader_exit(&self) {
        self.mutex.acquire();
        self.reading.set(self.reading.get() - 1);
        if self.reading.get() == 0 && self.waiting_w.get() > 0 {
            self.writers.release();
        } else {
            self.mutex.release();
        }
    }
    /// Enter as the sole writer. Parks while anyone is inside
    pub fn writer_enter(&self) {
        self.entry.acquire();
        self.mutex.acquire();
        self.entry.release();
        if self.reading.get() + self.writing.get() > 0 {
            self.waiting_w.set(self.waiting_w.get() + 1);
            self.mutex.release();
            self.writers.acquire();
            // woken with the critical section handed to us
            self.waiting_w.set(self.waiting_w.get() - 1);
        }
        self.writing.set(self.writing.get() + 1);
        self.mutex.release();
    }
    /// Exit as the writer: flush the parked reader batch if there is one,
    /// else hand the node to the next parked writer
    pub fn writer_exit(&self) {
        self.mutex.acquire();
        self.writing.set(self.writing.get() - 1);
        if self.waiting_r.get() > 0 {
            self.readers.release();
        } else if self.waiting_w.get() > 0 {
            self.writers.release();
        } else {
            self.mutex.release();
        }
    }
    /// Shut the entry gate: every subsequent `reader_enter`/`writer_enter`
    /// parks before evaluating the lock state. Threads already inside are
    /// unaffected and may exit
    pub fn gate_close(&self) {
        self.entry.acquire();
    }
    /// Reopen the entry gate, admitting parked entrants in arrival order
    pub fn gate_open(&self) {
        self.entry.release();
    }
    #[cfg(test)]
    /// Quiescent-state check: nobody inside, nobody parked, gate open.
    /// Only meaningful when no operation is in flight
    pub fn is_idle(&self) -> bool {
        self.reading.get() == 0
            && self.writing.get() == 0
            && self.waiting_r.get() == 0
            && self.waiting_w.get() == 0
            && self.entry.permits() == 1
    }
}

#[cfg(test)]
mod tests {
    use {
        super::NodeMonitor,
        std::{
            sync::{
                atomic::{AtomicI32, Ordering},
                mpsc, Arc,
            },
            thread,
            time::Duration,
        },
    };

    #[test]
    fn readers_share() {
        let mon = Arc::new(NodeMonitor::new());
        let peak = Arc::new(AtomicI32::new(0));
        let inside = Arc::new(AtomicI32::new(0));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let (mon, peak, inside) = (mon.clone(), peak.clone(), inside.clone());
                thread::spawn(move || {
                    mon.reader_enter();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    mon.reader_exit();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        // with a 20ms dwell, at least two of the four readers must overlap
        assert!(peak.load(Ordering::SeqCst) >= 2);
        assert!(mon.is_idle());
    }
    #[test]
    fn writers_exclude() {
        const THREADS: i32 = 4;
        const ROUNDS: i32 = 250;
        let mon = Arc::new(NodeMonitor::new());
        let inside = Arc::new(AtomicI32::new(0));
        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let (mon, inside) = (mon.clone(), inside.clone());
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        mon.writer_enter();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        assert_eq!(inside.fetch_sub(1, Ordering::SeqCst), 1);
                        mon.writer_exit();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(mon.is_idle());
    }
    #[test]
    fn writer_excludes_readers() {
        let mon = Arc::new(NodeMonitor::new());
        let state = Arc::new(AtomicI32::new(0));
        let writer = {
            let (mon, state) = (mon.clone(), state.clone());
            thread::spawn(move || {
                for _ in 0..100 {
                    mon.writer_enter();
                    assert_eq!(state.swap(-1, Ordering::SeqCst), 0);
                    assert_eq!(state.swap(0, Ordering::SeqCst), -1);
                    mon.writer_exit();
                }
            })
        };
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let (mon, state) = (mon.clone(), state.clone());
                thread::spawn(move || {
                    for _ in 0..100 {
                        mon.reader_enter();
                        assert!(state.fetch_add(1, Ordering::SeqCst) >= 0);
                        assert!(state.fetch_sub(1, Ordering::SeqCst) >= 1);
                        mon.reader_exit();
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert!(mon.is_idle());
    }
    #[test]
    fn gate_quarantines() {
        let mon = Arc::new(NodeMonitor::new());
        mon.gate_close();
        let (tx, rx) = mpsc::channel();
        let reader = {
            let (mon, tx) = (mon.clone(), tx.clone());
            thread::spawn(move || {
                mon.reader_enter();
                tx.send("r").unwrap();
                mon.reader_exit();
            })
        };
        let writer = {
            let mon = mon.clone();
            thread::spawn(move || {
                mon.writer_enter();
                tx.send("w").unwrap();
                mon.writer_exit();
            })
        };
        // neither entrant may pass the closed gate
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        mon.gate_open();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        reader.join().unwrap();
        writer.join().unwrap();
        assert!(mon.is_idle());
    }
    #[test]
    fn exit_while_gated() {
        // a thread inside the monitor exits unhindered while the gate is shut
        let mon = NodeMonitor::new();
        mon.reader_enter();
        mon.gate_close();
        mon.reader_exit();
        mon.gate_open();
        assert!(mon.is_idle());
    }
}
