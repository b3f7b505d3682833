/*
 * Created on Sat Mar 11 2023
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

use {
    crate::sync::{NodeMonitor, Semaphore},
    parking_lot::{Mutex, MutexGuard},
    std::{
        cell::UnsafeCell,
        collections::BTreeMap,
        sync::{Arc, Weak},
    },
};

/// The child map. Ordered, so a listing falls out of a plain key walk.
/// Guarded by the node's monitor, not by a lock of its own
pub(super) type ChildMap = BTreeMap<Box<str>, Arc<Node>>;

/// A directory node. Children are owned (`Arc` in the child map); the parent
/// back-reference is non-owning (`Weak`), which keeps teardown a plain
/// recursive drop
pub(super) struct Node {
    /// the metadata mutex: guards parent/new_parent/in_subtree/remove_waiting.
    /// Held for O(1) work only
    meta: Mutex<NodeMeta>,
    /// one-shot handover to a remover waiting for this subtree to drain
    remove_gate: Semaphore,
    /// reader/writer monitor guarding `children` and the node-as-target
    monitor: NodeMonitor,
    children: UnsafeCell<ChildMap>,
}

// UNSAFE(@ohsayan): the `UnsafeCell` payload is reached only through
// `children()`/`children_mut()`, whose contracts tie access to the monitor:
// shared references under a reader lock, the exclusive reference under the
// writer lock. Everything else in a node synchronizes itself
unsafe impl Send for Node {}
unsafe impl Sync for Node {}

pub(super) struct NodeMeta {
    /// current logical parent; `None` for the root
    parent: Option<Weak<Node>>,
    /// parent-to-be while a rename of this node is draining; `Some` implies
    /// the entry gate is closed and `in_subtree > 0`
    new_parent: Option<Weak<Node>>,
    /// threads that have passed this node on descent and not yet traced back
    pub in_subtree: u32,
    /// a remover is parked on `remove_gate` waiting for `in_subtree` to
    /// reach one
    pub remove_waiting: bool,
}

impl NodeMeta {
    /// Resolve the current parent handle. `None` for the root
    pub fn parent_handle(&self) -> Option<Arc<Node>> {
        self.parent.as_ref().map(|parent| match parent.upgrade() {
            Some(parent) => parent,
            None => fatal!("dangling parent handle: a node outlived its ancestor"),
        })
    }
    pub fn set_parent(&mut self, parent: &Arc<Node>) {
        self.parent = Some(Arc::downgrade(parent));
    }
    pub fn defer_parent(&mut self, parent: &Arc<Node>) {
        self.new_parent = Some(Arc::downgrade(parent));
    }
    pub fn has_deferred_parent(&self) -> bool {
        self.new_parent.is_some()
    }
    /// Install the deferred parent. Called by the last thread tracing out of
    /// a renamed subtree
    pub fn commit_deferred_parent(&mut self) {
        self.parent = self.new_parent.take();
    }
}

impl Node {
    pub fn new(parent: Option<&Arc<Node>>) -> Arc<Self> {
        Arc::new(Self {
            meta: Mutex::new(NodeMeta {
                parent: parent.map(Arc::downgrade),
                new_parent: None,
                in_subtree: 0,
                remove_waiting: false,
            }),
            remove_gate: Semaphore::new(0),
            monitor: NodeMonitor::new(),
            children: UnsafeCell::new(ChildMap::new()),
        })
    }
    pub fn meta(&self) -> MutexGuard<'_, NodeMeta> {
        self.meta.lock()
    }
    pub fn monitor(&self) -> &NodeMonitor {
        &self.monitor
    }
    pub fn remove_gate(&self) -> &Semaphore {
        &self.remove_gate
    }
    /// Shared view of the child map
    ///
    /// ## Safety
    /// The caller must hold this node's monitor as a reader or writer (or
    /// otherwise know the tree to be quiescent)
    pub unsafe fn children(&self) -> &ChildMap {
        &*self.children.get()
    }
    /// Exclusive view of the child map
    ///
    /// ## Safety
    /// The caller must hold this node's monitor as the writer, and drop the
    /// reference before the lock
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn children_mut(&self) -> &mut ChildMap {
        &mut *self.children.get()
    }
}

cfg_test! {
    impl Node {
        /// Quiescent-state invariants for this node alone: no residents, no
        /// deferred parent, no parked remover, gate open
        pub fn assert_settled(&self) {
            let meta = self.meta();
            assert_eq!(meta.in_subtree, 0);
            assert!(!meta.has_deferred_parent());
            assert!(!meta.remove_waiting);
            assert!(self.monitor.is_idle());
            assert_eq!(self.remove_gate.permits(), 0);
        }
        /// Does `parent` currently own `self`? (link agreement, both ways)
        pub fn is_child_of(&self, parent: &Arc<Self>) -> bool {
            let back = self.meta().parent_handle();
            let down = unsafe {
                // UNSAFE(@ohsayan): quiescent tree, test-only
                parent.children()
            };
            back.is_some_and(|back| Arc::ptr_eq(&back, parent))
                && down
                    .values()
                    .filter(|child| Arc::as_ptr(child) == self as *const Self)
                    .count()
                    == 1
        }
    }
}
