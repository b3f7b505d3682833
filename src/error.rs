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

use core::fmt;

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// Logical errors returned by tree operations. Every error leaves the tree
/// unchanged with all locks released
pub enum TreeError {
    /// the path is malformed (bad characters, missing slashes, overlong)
    InvalidPath,
    /// an intermediate node or the target doesn't exist
    NotFound,
    /// the target already exists
    AlreadyExists,
    /// attempted to remove a node that still has children
    NotEmpty,
    /// a disallowed structural op: removing the root, moving the root, or
    /// moving a node into its own subtree
    Busy,
}

impl TreeError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPath => "invalid path",
            Self::NotFound => "no such node",
            Self::AlreadyExists => "node already exists",
            Self::NotEmpty => "node is not empty",
            Self::Busy => "node is busy",
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for TreeError {}
