/*
 * Created on Wed Mar 08 2023
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

//! # Paths
//!
//! A tree path is written `/a/b/c/`: a leading slash, `[a-z]` components of
//! up to [`MAX_COMPONENT_LEN`] bytes each separated by slashes, and a
//! trailing slash. The root is `/`. [`Path`] borrows the caller's string, so
//! every derived path (suffix, parent, LCA) is a zero-copy subslice.
//!
//! Paths order lexicographically on their raw bytes; since an ancestor is a
//! strict prefix of its descendants, an ancestor always orders before them.
//! The engine leans on this for its lock-ordering discipline.

use {
    crate::error::{TreeError, TreeResult},
    core::fmt,
};

/// Maximum length of a single path component
pub const MAX_COMPONENT_LEN: usize = 255;
/// Maximum length of a full path, including the slashes
pub const MAX_PATH_LEN: usize = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path<'a> {
    raw: &'a str,
}

impl<'a> Path<'a> {
    /// Validate a raw string as a path. Fails with [`TreeError::InvalidPath`]
    /// on anything that isn't `/` or `/component/.../`
    pub fn parse(raw: &'a str) -> TreeResult<Self> {
        let bytes = raw.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_PATH_LEN {
            return Err(TreeError::InvalidPath);
        }
        if bytes[0] != b'/' || bytes[bytes.len() - 1] != b'/' {
            return Err(TreeError::InvalidPath);
        }
        for component in raw[1..].split_terminator('/') {
            let okay = !component.is_empty()
                && component.len() <= MAX_COMPONENT_LEN
                && component.bytes().all(|b| b.is_ascii_lowercase());
            if !okay {
                return Err(TreeError::InvalidPath);
            }
        }
        Ok(Self { raw })
    }
    #[inline(always)]
    pub fn as_str(&self) -> &'a str {
        self.raw
    }
    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.raw.len() == 1
    }
    /// Split off the first component: `/a/b/` becomes `("a", /b/)`. Returns
    /// [`None`] for the root
    pub fn split_head(&self) -> Option<(&'a str, Path<'a>)> {
        if self.is_root() {
            return None;
        }
        // the validated format guarantees a second slash
        let sep = match self.raw[1..].find('/') {
            Some(idx) => idx + 1,
            None => fatal!("malformed path slipped past validation: {}", self.raw),
        };
        Some((&self.raw[1..sep], Self { raw: &self.raw[sep..] }))
    }
    /// Split off the last component: `/a/b/` becomes `(/a/, "b")`. Returns
    /// [`None`] for the root
    pub fn parent(&self) -> Option<(Path<'a>, &'a str)> {
        if self.is_root() {
            return None;
        }
        let trimmed = &self.raw[..self.raw.len() - 1];
        let sep = match trimmed.rfind('/') {
            Some(idx) => idx,
            None => fatal!("malformed path slipped past validation: {}", self.raw),
        };
        Some((Self { raw: &self.raw[..sep + 1] }, &trimmed[sep + 1..]))
    }
    /// Compute the lowest common ancestor of two paths, returning
    /// `(lca, self_suffix, other_suffix)`. The suffixes begin at the LCA's
    /// trailing slash, so they are themselves paths relative to the LCA
    /// (`/` when the LCA *is* that path)
    pub fn lca(self, other: Path<'a>) -> (Path<'a>, Path<'a>, Path<'a>) {
        let (a, b) = (self.raw.as_bytes(), other.raw.as_bytes());
        let mut last_slash = 0;
        let mut pos = 1;
        while pos < a.len() && pos < b.len() && a[pos] == b[pos] {
            if a[pos] == b'/' {
                last_slash = pos;
            }
            pos += 1;
        }
        (
            Self {
                raw: &self.raw[..last_slash + 1],
            },
            Self {
                raw: &self.raw[last_slash..],
            },
            Self {
                raw: &other.raw[last_slash..],
            },
        )
    }
    /// Is `self` a proper ancestor of `other`? (Strict: a path is not its own
    /// prefix)
    pub fn is_proper_prefix_of(&self, other: &Path) -> bool {
        self.raw.len() < other.raw.len() && other.raw.starts_with(self.raw)
    }
}

impl<'a> fmt::Display for Path<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> Path<'_> {
        Path::parse(raw).unwrap()
    }

    #[test]
    fn validity() {
        assert!(Path::parse("/").is_ok());
        assert!(Path::parse("/a/").is_ok());
        assert!(Path::parse("/abc/def/").is_ok());
        for bad in [
            "", "a/", "/a", "//", "/a//b/", "/A/", "/a1/", "/a b/", "/a/../",
        ] {
            assert_eq!(Path::parse(bad), Err(TreeError::InvalidPath), "{bad}");
        }
        let long_component = format!("/{}/", "a".repeat(MAX_COMPONENT_LEN + 1));
        assert_eq!(Path::parse(&long_component), Err(TreeError::InvalidPath));
        let long_path = format!("/{}", "a/".repeat(MAX_PATH_LEN));
        assert_eq!(Path::parse(&long_path), Err(TreeError::InvalidPath));
    }
    #[test]
    fn split_head() {
        assert_eq!(p("/").split_head(), None);
        let (head, rest) = p("/a/b/").split_head().unwrap();
        assert_eq!(head, "a");
        assert_eq!(rest.as_str(), "/b/");
        let (head, rest) = rest.split_head().unwrap();
        assert_eq!(head, "b");
        assert!(rest.is_root());
    }
    #[test]
    fn parent() {
        assert_eq!(p("/").parent(), None);
        let (parent, name) = p("/a/").parent().unwrap();
        assert!(parent.is_root());
        assert_eq!(name, "a");
        let (parent, name) = p("/a/b/c/").parent().unwrap();
        assert_eq!(parent.as_str(), "/a/b/");
        assert_eq!(name, "c");
    }
    #[test]
    fn lca() {
        let (lca, s1, s2) = p("/a/b/c/").lca(p("/a/x/"));
        assert_eq!(lca.as_str(), "/a/");
        assert_eq!(s1.as_str(), "/b/c/");
        assert_eq!(s2.as_str(), "/x/");
        // one path is an ancestor of the other
        let (lca, s1, s2) = p("/a/").lca(p("/a/b/"));
        assert_eq!(lca.as_str(), "/a/");
        assert!(s1.is_root());
        assert_eq!(s2.as_str(), "/b/");
        // nothing in common but the root
        let (lca, s1, s2) = p("/a/").lca(p("/b/"));
        assert!(lca.is_root());
        assert_eq!(s1.as_str(), "/a/");
        assert_eq!(s2.as_str(), "/b/");
        // sibling components sharing a name prefix don't confuse the scan
        let (lca, _, _) = p("/ab/").lca(p("/ac/"));
        assert!(lca.is_root());
    }
    #[test]
    fn proper_prefix() {
        assert!(p("/").is_proper_prefix_of(&p("/a/")));
        assert!(p("/a/").is_proper_prefix_of(&p("/a/b/")));
        assert!(!p("/a/").is_proper_prefix_of(&p("/a/")));
        assert!(!p("/a/").is_proper_prefix_of(&p("/ab/")));
        assert!(!p("/a/b/").is_proper_prefix_of(&p("/a/")));
    }
    #[test]
    fn ordering() {
        assert!(p("/a/") < p("/a/b/"));
        assert!(p("/a/b/") < p("/b/"));
        assert!(p("/") < p("/a/"));
    }
}
