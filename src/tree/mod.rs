/*
 * Created on Sun Mar 12 2023
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

//! # The tree engine
//!
//! How the locking protocol hangs together:
//!
//! - **Descent** ([`Tree::find`]) walks from a start node towards a target,
//!   holding at most one read lock above the node it is examining
//!   (hand-over-hand), and bumping every visited node's `in_subtree` counter.
//!   The target itself is taken as a reader or writer depending on the
//!   operation.
//! - **Two-target descent** ([`Tree::find_two`]) write-locks two nodes by
//!   going through their lowest common ancestor and always locking the
//!   lexicographically smaller side first. All multi-lock acquisition in the
//!   engine follows that one global order, which is what rules out
//!   deadlock.
//! - **Traceback** ([`Tree::trace_back`]) is the ascent: it undoes the
//!   counter bumps by following each node's *current* parent pointer under
//!   its metadata mutex. A thread that entered a subtree before a rename
//!   therefore leaves along the pre-rename chain, while the renamed node's
//!   entry gate keeps new threads out; the last one out installs the new
//!   parent and reopens the gate.
//!
//! Remove has one extra wrinkle: a node may only be freed once every thread
//! that passed it on descent has traced back out, so a remover finding
//! `in_subtree > 1` parks on the node's `remove_gate` and is handed control
//! by the last tracer.

use {
    crate::{
        error::{TreeError, TreeResult},
        path::Path,
    },
    log::trace,
    node::Node,
    std::{collections::btree_map::Entry, sync::Arc},
};

mod node;
#[cfg(test)]
mod tests;

/// A concurrent in-memory directory tree. Share it (it is `Sync`; wrap in an
/// [`Arc`] or scope threads around it) and call any operation from any
/// thread: the result is always equivalent to some serial ordering of the
/// calls, and operations on disjoint subtrees proceed in parallel
pub struct Tree {
    root: Arc<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            root: Node::new(None),
        }
    }
    /// List the names of the children of the node at `path`, comma-separated
    /// and sorted, with no trailing comma (empty string for a leaf)
    pub fn list(&self, path: &str) -> TreeResult<String> {
        let path = Path::parse(path)?;
        let target = Self::find(&self.root, path, false)?;
        let listing = unsafe {
            // UNSAFE(@ohsayan): reader lock on `target` held
            target.children()
        }
        .keys()
        .map(|name| &**name)
        .collect::<Vec<&str>>()
        .join(",");
        Self::trace_back(&target, false, &self.root, true);
        Ok(listing)
    }
    /// Create an empty node at `path`. The parent must exist
    pub fn create(&self, path: &str) -> TreeResult<()> {
        let path = Path::parse(path)?;
        let (parent_path, name) = match path.parent() {
            Some(split) => split,
            // the root always exists
            None => return Err(TreeError::AlreadyExists),
        };
        let parent = Self::find(&self.root, parent_path, true)?;
        let outcome = {
            let children = unsafe {
                // UNSAFE(@ohsayan): writer lock on `parent` held
                parent.children_mut()
            };
            match children.entry(name.into()) {
                Entry::Vacant(slot) => {
                    slot.insert(Node::new(Some(&parent)));
                    Ok(())
                }
                Entry::Occupied(_) => Err(TreeError::AlreadyExists),
            }
        };
        Self::trace_back(&parent, true, &self.root, true);
        outcome
    }
    /// Remove the empty node at `path`. Blocks until every thread that
    /// passed the node on its way down has traced back out
    pub fn remove(&self, path: &str) -> TreeResult<()> {
        let path = Path::parse(path)?;
        let (parent_path, name) = match path.parent() {
            Some(split) => split,
            None => return Err(TreeError::Busy),
        };
        // the parent is a proper prefix of the path and hence orders first:
        // it comes back as the write-locked lesser side
        let (_, parent, target) = Self::find_two(&self.root, parent_path, path)?;
        if !unsafe {
            // UNSAFE(@ohsayan): writer lock on `target` held
            target.children()
        }
        .is_empty()
        {
            Self::trace_back(&target, true, &target, true);
            Self::trace_back(&parent, true, &self.root, true);
            return Err(TreeError::NotEmpty);
        }
        {
            let mut meta = target.meta();
            if meta.in_subtree > 1 {
                // others still owe a traceback through this node: park on
                // the gate, the last of them hands us control
                meta.remove_waiting = true;
                drop(meta);
                target.remove_gate().acquire();
                target.meta().remove_waiting = false;
            }
        }
        unsafe {
            // UNSAFE(@ohsayan): writer lock on `parent` held
            parent.children_mut()
        }
        .remove(name);
        // the node dies here, still write-locked: nobody else can reach it
        drop(target);
        Self::trace_back(&parent, true, &self.root, true);
        Ok(())
    }
    /// Move the node at `source` (with its whole subtree) to `target`.
    /// Renaming a node onto itself is a no-op that succeeds. Threads still
    /// inside the moved subtree finish against the old topology; the node
    /// stays gated against new entrants until they have all left
    pub fn rename(&self, source: &str, target: &str) -> TreeResult<()> {
        let source = Path::parse(source)?;
        let target = Path::parse(target)?;
        if source.is_root() || source.is_proper_prefix_of(&target) {
            return Err(TreeError::Busy);
        }
        if target.is_root() {
            return Err(TreeError::AlreadyExists);
        }
        let (source_parent_path, source_name) = match source.parent() {
            Some(split) => split,
            None => return Err(TreeError::Busy),
        };
        let (target_parent_path, target_name) = match target.parent() {
            Some(split) => split,
            None => return Err(TreeError::AlreadyExists),
        };
        let same_parent = source_parent_path == target_parent_path;
        let same_path = source == target;
        let (lca, source_parent, target_parent) = if same_parent {
            let parent = Self::find(&self.root, source_parent_path, true)?;
            (parent.clone(), parent.clone(), parent)
        } else {
            Self::find_two(&self.root, source_parent_path, target_parent_path)?
        };
        let outcome = Self::relink(
            &source_parent,
            source_name,
            &target_parent,
            target_name,
            same_path,
        );
        // ordered release, mirroring acquisition; the LCA is traced exactly
        // once overall
        if same_parent {
            Self::trace_back(&target_parent, true, &self.root, true);
        } else if Arc::ptr_eq(&target_parent, &lca) {
            Self::trace_back(&source_parent, true, &lca, false);
            Self::trace_back(&target_parent, true, &self.root, true);
        } else {
            Self::trace_back(&target_parent, true, &lca, false);
            Self::trace_back(&source_parent, true, &self.root, true);
        }
        outcome
    }
    /// Detach `source_name` from under `source_parent` and attach the node
    /// as `target_name` under `target_parent`. Caller holds writer locks on
    /// both parents. Re-parenting a subtree with threads still inside is
    /// deferred: the new parent is parked in the node's metadata and its
    /// entry gate closed, and the last tracer out commits the swap
    fn relink(
        source_parent: &Arc<Node>,
        source_name: &str,
        target_parent: &Arc<Node>,
        target_name: &str,
        same_path: bool,
    ) -> TreeResult<()> {
        let child = unsafe {
            // UNSAFE(@ohsayan): writer lock on `source_parent` held
            source_parent.children()
        }
        .get(source_name)
        .cloned();
        let child = match child {
            Some(child) => child,
            None => return Err(TreeError::NotFound),
        };
        if !same_path
            && unsafe {
                // UNSAFE(@ohsayan): writer lock on `target_parent` held
                target_parent.children()
            }
            .contains_key(target_name)
        {
            return Err(TreeError::AlreadyExists);
        }
        let mut meta = child.meta();
        unsafe {
            // UNSAFE(@ohsayan): writer locks on both parents held
            source_parent.children_mut().remove(source_name);
            target_parent
                .children_mut()
                .insert(target_name.into(), child.clone());
        }
        if meta.in_subtree == 0 {
            // no tenants to confuse: swap the parent in place
            meta.set_parent(target_parent);
        } else {
            meta.defer_parent(target_parent);
            child.monitor().gate_close();
        }
        Ok(())
    }
    /// Descend from `start` to the target of `path`, hand-over-hand: at most
    /// one read lock is held above the node under examination, and every
    /// visited node's `in_subtree` is bumped. On success the target is
    /// locked (reader, or writer if `write_at_target`) and counted; on
    /// `NotFound` everything from the failure point back down to `start` has
    /// been released. Locks above `start` are never touched
    fn find(start: &Arc<Node>, path: Path<'_>, write_at_target: bool) -> TreeResult<Arc<Node>> {
        let mut current = start.clone();
        // the one read lock held above `current`
        let mut held: Option<Arc<Node>> = None;
        let mut rest = path;
        while let Some((component, tail)) = rest.split_head() {
            current.monitor().reader_enter();
            {
                let mut meta = current.meta();
                if let Some(prev) = held.take() {
                    prev.monitor().reader_exit();
                }
                meta.in_subtree += 1;
            }
            let child = unsafe {
                // UNSAFE(@ohsayan): reader lock on `current` held
                current.children()
            }
            .get(component)
            .cloned();
            match child {
                Some(child) => {
                    rest = tail;
                    held = Some(current);
                    current = child;
                }
                None => {
                    Self::trace_back(&current, false, start, true);
                    return Err(TreeError::NotFound);
                }
            }
        }
        // `current` is the target, found under the read lock we still hold
        // on its parent: it can be neither removed nor moved from under us
        if write_at_target {
            current.monitor().writer_enter();
        } else {
            current.monitor().reader_enter();
        }
        {
            let mut meta = current.meta();
            if let Some(prev) = held.take() {
                prev.monitor().reader_exit();
            }
            meta.in_subtree += 1;
        }
        Ok(current)
    }
    /// Write-lock the two distinct targets of `p1` and `p2` in lexicographic
    /// path order via their LCA, returning `(lca, node1, node2)`. The LCA's
    /// read lock is already given back unless it is one of the targets; its
    /// counter bump, and everything above, is owed to the caller's
    /// tracebacks
    fn find_two<'a>(
        root: &Arc<Node>,
        p1: Path<'a>,
        p2: Path<'a>,
    ) -> TreeResult<(Arc<Node>, Arc<Node>, Arc<Node>)> {
        trace!("locking pair: {p1} and {p2}");
        let (lca_path, mut s1, mut s2) = p1.lca(p2);
        let swapped = p2 < p1;
        if swapped {
            core::mem::swap(&mut s1, &mut s2);
        }
        // if the lesser suffix is empty the LCA *is* the lesser target and
        // must be write-locked on the way down
        let lca_is_lesser = s1.is_root();
        let lca = Self::find(root, lca_path, lca_is_lesser)?;
        let lesser = if lca_is_lesser {
            lca.clone()
        } else {
            match Self::descend_branch(&lca, s1) {
                Ok(node) => node,
                Err(e) => {
                    Self::trace_back(&lca, false, root, true);
                    return Err(e);
                }
            }
        };
        let greater = match Self::descend_branch(&lca, s2) {
            Ok(node) => node,
            Err(e) => {
                if lca_is_lesser {
                    Self::trace_back(&lesser, true, root, true);
                } else {
                    Self::trace_back(&lesser, true, &lca, false);
                    Self::trace_back(&lca, false, root, true);
                }
                return Err(e);
            }
        };
        if !lca_is_lesser {
            // the LCA was only a waypoint: give back its read lock now; the
            // counter stays owed until the caller's final traceback
            lca.monitor().reader_exit();
        }
        if swapped {
            Ok((lca, greater, lesser))
        } else {
            Ok((lca, lesser, greater))
        }
    }
    /// One step down from a locked interior node, then a full descent along
    /// `suffix` ending in a write lock. The caller keeps its lock on `from`
    fn descend_branch(from: &Arc<Node>, suffix: Path<'_>) -> TreeResult<Arc<Node>> {
        let (component, rest) = match suffix.split_head() {
            Some(split) => split,
            None => return Err(TreeError::NotFound),
        };
        let child = unsafe {
            // UNSAFE(@ohsayan): caller holds a lock on `from`
            from.children()
        }
        .get(component)
        .cloned();
        match child {
            Some(child) => Self::find(&child, rest, true),
            None => Err(TreeError::NotFound),
        }
    }
    /// Ascend from `from` (whose monitor we hold as reader, or writer if
    /// `write_locked`) back towards the root, undoing descent's counter
    /// bumps up to the `up_to` boundary (`inclusive` or not). Each step
    /// reads the parent pointer in effect *now*, under that node's metadata
    /// mutex: that is what routes threads out of a renamed subtree along the
    /// topology they came in through. Side duties: the tracer that drops a
    /// node's count to zero commits a deferred re-parent and reopens the
    /// entry gate; the one that drops it to one hands control to a parked
    /// remover
    fn trace_back(from: &Arc<Node>, write_locked: bool, up_to: &Arc<Node>, inclusive: bool) {
        trace!(
            "traceback from {:p} up to {:p} (write: {write_locked}, inclusive: {inclusive})",
            Arc::as_ptr(from),
            Arc::as_ptr(up_to)
        );
        let mut current = from.clone();
        let mut parent = {
            let mut meta = current.meta();
            let parent = meta.parent_handle();
            meta.in_subtree -= 1;
            if meta.in_subtree == 0 && meta.has_deferred_parent() {
                meta.commit_deferred_parent();
                current.monitor().gate_open();
            }
            parent
        };
        // the starting node gives back a monitor lock; the nodes above only
        // owe counter updates
        if write_locked {
            current.monitor().writer_exit();
        } else {
            current.monitor().reader_exit();
        }
        while (inclusive && !Arc::ptr_eq(&current, up_to))
            || (!inclusive && !parent.as_ref().is_some_and(|p| Arc::ptr_eq(p, up_to)))
        {
            current = match parent {
                Some(parent) => parent,
                None => fatal!("traceback overran the root"),
            };
            let mut meta = current.meta();
            parent = meta.parent_handle();
            meta.in_subtree -= 1;
            if meta.in_subtree == 0 && meta.has_deferred_parent() {
                meta.commit_deferred_parent();
                current.monitor().gate_open();
            } else if meta.in_subtree == 1 && meta.remove_waiting {
                // hand the node to the parked remover
                current.remove_gate().release();
            }
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

cfg_test! {
    impl Tree {
        /// Walk the whole tree asserting the quiescent-state invariants:
        /// counters zero, no deferred parents, no parked removers, gates
        /// open, and parent/child links agreeing both ways. Only valid with
        /// no operation in flight
        pub(crate) fn assert_quiescent(&self) {
            fn walk(node: &Arc<Node>) {
                node.assert_settled();
                let children = unsafe {
                    // UNSAFE(@ohsayan): quiescent tree, test-only
                    node.children()
                };
                for child in children.values() {
                    assert!(child.is_child_of(node));
                    walk(child);
                }
            }
            assert!(self.root.meta().parent_handle().is_none());
            walk(&self.root);
        }
    }
}
