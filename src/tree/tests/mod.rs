/*
 * Created on Thu Mar 16 2023
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
    super::Tree,
    std::{sync::mpsc, thread, time::Duration},
};


fn logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A tree pre-populated with the given paths (parents first, please)
fn tree_with(paths: &[&str]) -> Tree {
    let tree = Tree::new();
    for path in paths {
        tree.create(path).unwrap();
    }
    tree
}

/// Run `f` on its own thread and panic if it doesn't finish within `dur`.
/// Every test that could conceivably hang on a lock goes through this
fn panic_timeout<T, F>(dur: Duration, f: F) -> T
where
    T: Send + 'static,
    F: (FnOnce() -> T) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        let val = f();
        tx.send(()).unwrap();
        val
    });
    match rx.recv_timeout(dur) {
        Ok(_) => handle.join().expect("thread panicked"),
        Err(_) => panic!("thread passed timeout"),
    }
}
