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

//! # Synchronization primitives
//!
//! In several scenarios we may find `std`'s or other crates' implementations
//! of synchronization primitives to be either _too sophisticated_ or _not
//! what we want_. Both primitives here exist for the second reason: the tree
//! protocol needs a counting semaphore whose waiters cannot be barged past,
//! and a per-node reader/writer monitor whose entry can be shut
//! independently of its lock state. Neither is something a stock lock gives
//! us, so we build them here on top of `parking_lot`.

mod monitor;
mod semaphore;

pub(crate) use {monitor::NodeMonitor, semaphore::Semaphore};
