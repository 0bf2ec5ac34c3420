// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Where class source text comes from.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;

pub const CLASS_EXTENSION: &str = "mac";

/// A provider of class source text. The compiler asks for each class it needs to load (the class
/// being compiled, and any classes it imports) by class path.
pub trait ClassSource {
    /// Return the source text of `class_path`, or `None` if the class doesn't exist.
    fn load_class(&mut self, class_path: &str) -> Option<String>;
}

/// Load classes from one or more directory trees. A class path `MEng.User.Foo` maps to
/// `<root>/User/Foo.mac`; roots are searched in order.
pub struct FsClassSource {
    roots: Vec<PathBuf>,
}

impl FsClassSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        FsClassSource { roots }
    }

    /// The file `class_path` would be stored in under `root`.
    pub fn class_file(root: &Path, class_path: &str) -> PathBuf {
        let rel = match class_path.find('.') {
            Some(i) if class_path[..i].eq_ignore_ascii_case("MEng") => &class_path[i + 1..],
            _ => class_path,
        };
        let mut pb = root.to_path_buf();
        for part in rel.split('.') {
            pb.push(part);
        }
        pb.set_extension(CLASS_EXTENSION);
        pb
    }
}

impl ClassSource for FsClassSource {
    fn load_class(&mut self, class_path: &str) -> Option<String> {
        for root in &self.roots {
            let pb = FsClassSource::class_file(root, class_path);
            if pb.is_file() {
                debug!("Loading {} from {}", class_path, pb.display());
                return fs::read_to_string(&pb).ok();
            }
        }
        None
    }
}

/// Classes held in memory, keyed by class path.
#[derive(Default)]
pub struct MemClassSource {
    classes: HashMap<String, String>,
}

impl MemClassSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, class_path: &str, text: &str) {
        self.classes.insert(class_path.to_owned(), text.to_owned());
    }
}

impl ClassSource for MemClassSource {
    fn load_class(&mut self, class_path: &str) -> Option<String> {
        self.classes.get(class_path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_file() {
        let root = Path::new("/macros");
        assert_eq!(
            FsClassSource::class_file(root, "MEng.User.Foo"),
            PathBuf::from("/macros/User/Foo.mac")
        );
        assert_eq!(
            FsClassSource::class_file(root, "MEng.Hello"),
            PathBuf::from("/macros/Hello.mac")
        );
        assert_eq!(
            FsClassSource::class_file(root, "Other.Foo"),
            PathBuf::from("/macros/Other/Foo.mac")
        );
    }

    #[test]
    fn test_mem_source() {
        let mut src = MemClassSource::new();
        src.add("MEng.User.Foo", "Class=");
        assert_eq!(src.load_class("MEng.User.Foo").as_deref(), Some("Class="));
        assert!(src.load_class("MEng.User.Bar").is_none());
    }
}
