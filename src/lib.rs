/*
 * Created on Tue Mar 07 2023
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

//! # Skytree
//!
//! An in-memory, concurrent, hierarchical directory tree. A [`Tree`] is shared
//! across any number of threads, each of which may [`Tree::list`],
//! [`Tree::create`], [`Tree::remove`] or [`Tree::rename`] nodes addressed by
//! `/lowercase/component/` paths. Concurrent operations are serializable while
//! operations on disjoint subtrees run in parallel.
//!
//! The interesting part is the locking protocol: every node carries a fair
//! reader/writer monitor and an in-subtree resident counter; descents take
//! hand-over-hand read locks, and every descent is undone by a traceback that
//! walks the parent chain — the chain in effect at the time of the ascent,
//! which is what makes subtree renames safe while other threads are still
//! inside the moved subtree.
//!
//! Set `RUST_LOG=skytree=trace` (with a logger installed) to watch the locking
//! protocol at work.

#[macro_use]
mod macros;
mod error;
mod path;
mod sync;
mod tree;

pub use {
    error::{TreeError, TreeResult},
    tree::Tree,
};
