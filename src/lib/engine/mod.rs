// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The engine: the table of every class known about, both intrinsic and compiled, and the
//! queries the compiler makes of it.

use std::collections::HashMap;

use log::debug;

pub mod class;
pub mod intrinsics;
pub mod method;
pub mod source;
pub mod value;

use class::{ClassInfo, ClassKind};
use intrinsics::{Intrinsic, ARRAY_PATH, VECTOR_PATH};
use value::NumType;

pub type ClassId = u16;
pub type MethodId = u16;

#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// If true, the contents of `#BeginDebug`/`#EndDebug` blocks are compiled; otherwise they are
    /// skipped.
    pub debug_mode: bool,
    /// Run the stricter post-compile checks on each class.
    pub validation: bool,
    /// The class path `DynTypeRef("$DynTypeRef")` resolves to.
    pub special_dyn_ref: Option<String>,
}

/// How far through loading a class path is. A class is `InProgress` from the moment its header
/// has been read until it has been completely compiled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadState {
    NotStarted,
    InProgress,
    Complete,
}

/// The result of resolving a possibly partial class name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClassMatch {
    NotFound,
    Unique(ClassId),
    Ambiguous(Vec<ClassId>),
}

pub struct Engine {
    pub config: EngineConfig,
    classes: Vec<ClassInfo>,
    by_path: HashMap<String, ClassId>,
    load_states: HashMap<String, LoadState>,
    /// How many classes are built in: everything from this index on has been compiled.
    builtin_count: usize,
    vector_id: ClassId,
    array_id: ClassId,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut engine = Engine {
            config,
            classes: Vec::new(),
            by_path: HashMap::new(),
            load_states: HashMap::new(),
            builtin_count: 0,
            vector_id: 0,
            array_id: 0,
        };
        intrinsics::register(&mut engine);
        engine.builtin_count = engine.classes.len();
        engine.vector_id = engine.find_class(VECTOR_PATH).unwrap_or(0);
        engine.array_id = engine.find_class(ARRAY_PATH).unwrap_or(0);
        engine
    }

    /// Throw away every compiled class, keeping only the built in ones.
    pub fn reset(&mut self) {
        let n = self.builtin_count;
        self.classes.truncate(n);
        self.by_path.retain(|_, id| usize::from(*id) < n);
        self.load_states.clear();
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Add `cls` to the class table, returning the id it was given. The caller must have checked
    /// that no class with the same path exists.
    pub fn add_class(&mut self, mut cls: ClassInfo) -> ClassId {
        let id = self.classes.len() as ClassId;
        debug!("Registering class {} as {}", cls.path, id);
        cls.id = id;
        if self.classes.is_empty() {
            cls.parent_id = id;
        }
        self.by_path.insert(cls.path.clone(), id);
        self.classes.push(cls);
        id
    }

    /// The class with id `id`. Ids are only handed out by the engine, so an unknown id is a bug.
    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[usize::from(id)]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassInfo {
        &mut self.classes[usize::from(id)]
    }

    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    pub fn find_class(&self, path: &str) -> Option<ClassId> {
        self.by_path.get(path).cloned()
    }

    pub fn load_state(&self, path: &str) -> LoadState {
        match self.load_states.get(path) {
            Some(s) => *s,
            None if self.find_class(path).is_some() => LoadState::Complete,
            None => LoadState::NotStarted,
        }
    }

    pub fn set_load_state(&mut self, path: &str, state: LoadState) {
        self.load_states.insert(path.to_owned(), state);
    }

    /// Resolve a possibly partial class name. A name with no periods is matched against the short
    /// names of every class and may be ambiguous. A name `A.B` not starting with `MEng` names the
    /// nested type `B` of the class whose short name is `A`. Anything else is a fully qualified
    /// path.
    pub fn resolve_class_name(&self, name: &str) -> ClassMatch {
        match name.find('.') {
            None => {
                let hits = self
                    .classes
                    .iter()
                    .filter(|c| c.name == name)
                    .map(|c| c.id)
                    .collect::<Vec<_>>();
                match hits.len() {
                    0 => ClassMatch::NotFound,
                    1 => ClassMatch::Unique(hits[0]),
                    _ => ClassMatch::Ambiguous(hits),
                }
            }
            Some(i) => {
                let fully = name
                    .get(..4)
                    .map_or(false, |p| p.eq_ignore_ascii_case("MEng"))
                    || name[i + 1..].contains('.');
                if fully {
                    return match self.find_class(name) {
                        Some(id) => ClassMatch::Unique(id),
                        None => ClassMatch::NotFound,
                    };
                }
                let outer = &name[..i];
                let owner = match self.classes.iter().rev().find(|c| c.name == outer) {
                    Some(c) => c,
                    None => return ClassMatch::NotFound,
                };
                match self.find_class(&format!("{}.{}", owner.path, &name[i + 1..])) {
                    Some(id) => ClassMatch::Unique(id),
                    None => ClassMatch::NotFound,
                }
            }
        }
    }

    /// Is `id` the class `base`, or derived from it?
    pub fn is_derived_from(&self, id: ClassId, base: ClassId) -> bool {
        let mut cur = id;
        loop {
            if cur == base {
                return true;
            }
            if cur == Intrinsic::Object.id() {
                return false;
            }
            cur = self.class(cur).parent_id;
        }
    }

    /// Is `id` one of the collection base classes?
    pub fn is_collection_class(&self, id: ClassId) -> bool {
        id == self.vector_id || id == self.array_id
    }

    /// Can objects of class `id` be indexed with `[]`?
    pub fn is_indexable_class(&self, id: ClassId) -> bool {
        matches!(self.class(id).kind, ClassKind::Collection { .. })
    }

    /// The element type of the collection class `id`.
    pub fn elem_class(&self, id: ClassId) -> Option<ClassId> {
        match self.class(id).kind {
            ClassKind::Collection { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Are the collection classes `a` and `b` interchangeable? They must share a base collection
    /// class and either have the same element type or, if `same_elem` is false, `b`'s element
    /// type must derive from `a`'s.
    pub fn are_equiv_cols(&self, a: ClassId, b: ClassId, same_elem: bool) -> bool {
        let (ca, cb) = (self.class(a), self.class(b));
        if !self.is_collection_class(ca.parent_id) || ca.parent_id != cb.parent_id {
            return false;
        }
        match (self.elem_class(a), self.elem_class(b)) {
            (Some(ea), Some(eb)) if same_elem => ea == eb,
            (Some(ea), Some(eb)) => self.is_derived_from(eb, ea),
            _ => false,
        }
    }

    pub fn is_intrinsic_class(&self, id: ClassId) -> bool {
        id < intrinsics::INTRINSIC_COUNT
    }

    /// Can a named literal be of class `id`?
    pub fn is_literal_class(&self, id: ClassId) -> bool {
        id == Intrinsic::Boolean.id()
            || id == Intrinsic::Char.id()
            || id == Intrinsic::String.id()
            || self.xlat_num_type(id).is_some()
    }

    /// Is `id` a user defined enum (i.e. derived from, but not, `MEng.Enum`)?
    pub fn is_enum_class(&self, id: ClassId) -> bool {
        id != Intrinsic::Enum.id() && self.is_derived_from(id, Intrinsic::Enum.id())
    }

    pub fn xlat_num_type(&self, id: ClassId) -> Option<NumType> {
        NumType::from_class_id(id)
    }

    /// Add `src`, its ancestors, and (transitively) their nested types to `target`'s imports.
    /// Ancestors are exported first.
    pub fn export_to(&mut self, src: ClassId, target: ClassId) {
        if src != Intrinsic::Object.id() {
            let parent = self.class(src).parent_id;
            self.export_to(parent, target);
        }
        let path = self.class(src).path.clone();
        if self.class_mut(target).add_import(&path) {
            let nested = self
                .class(src)
                .imports()
                .iter()
                .filter(|i| i.nested)
                .filter_map(|i| self.find_class(&i.path))
                .collect::<Vec<_>>();
            for id in nested {
                self.export_to(id, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use class::ColKind;

    fn add_user_class(engine: &mut Engine, name: &str, base: &str, kind: ClassKind) -> ClassId {
        let parent = match kind {
            ClassKind::Enum(_) => Intrinsic::Enum.id(),
            ClassKind::Collection { .. } => engine.vector_id,
            _ => Intrinsic::Object.id(),
        };
        let mut cls = ClassInfo::new(name, base, parent, kind);
        cls.base_init(engine.class(parent));
        engine.add_class(cls)
    }

    #[test]
    fn test_resolve_class_name() {
        let mut engine = Engine::new(EngineConfig::default());
        let foo = add_user_class(&mut engine, "Foo", "MEng.User", ClassKind::Standard);
        let color = add_user_class(&mut engine, "Color", "MEng.User.Foo", ClassKind::Enum(vec![]));
        add_user_class(&mut engine, "Color", "MEng.Other", ClassKind::Standard);

        assert_eq!(engine.resolve_class_name("Foo"), ClassMatch::Unique(foo));
        assert_eq!(
            engine.resolve_class_name("MEng.User.Foo"),
            ClassMatch::Unique(foo)
        );
        assert_eq!(engine.resolve_class_name("Foo.Color"), ClassMatch::Unique(color));
        assert_eq!(engine.resolve_class_name("Foo.Size"), ClassMatch::NotFound);
        assert_eq!(engine.resolve_class_name("Bar"), ClassMatch::NotFound);
        match engine.resolve_class_name("Color") {
            ClassMatch::Ambiguous(ids) => assert_eq!(ids.len(), 2),
            m => panic!("{:?}", m),
        }
        assert_eq!(
            engine.resolve_class_name("Card4"),
            ClassMatch::Unique(Intrinsic::Card4.id())
        );
    }

    #[test]
    fn test_derivation_and_kinds() {
        let mut engine = Engine::new(EngineConfig::default());
        let color = add_user_class(&mut engine, "Color", "MEng.User.Foo", ClassKind::Enum(vec![]));
        assert!(engine.is_derived_from(color, Intrinsic::Formattable.id()));
        assert!(!engine.is_derived_from(color, Intrinsic::String.id()));
        assert!(engine.is_enum_class(color));
        assert!(!engine.is_enum_class(Intrinsic::Enum.id()));
        assert!(engine.is_literal_class(Intrinsic::Int2.id()));
        assert!(!engine.is_literal_class(color));
        assert!(engine.is_intrinsic_class(Intrinsic::StringOutStream.id()));
        assert!(!engine.is_intrinsic_class(color));
        assert_eq!(engine.xlat_num_type(Intrinsic::Float4.id()), Some(NumType::Float4));
    }

    #[test]
    fn test_equiv_cols() {
        let mut engine = Engine::new(EngineConfig::default());
        let card4 = Intrinsic::Card4.id();
        let v1 = add_user_class(
            &mut engine,
            "V1",
            "MEng.User.A",
            ClassKind::Collection { kind: ColKind::Vector, elem: card4 },
        );
        let v2 = add_user_class(
            &mut engine,
            "V2",
            "MEng.User.B",
            ClassKind::Collection { kind: ColKind::Vector, elem: card4 },
        );
        let v3 = add_user_class(
            &mut engine,
            "V3",
            "MEng.User.B",
            ClassKind::Collection { kind: ColKind::Vector, elem: Intrinsic::String.id() },
        );
        assert!(engine.are_equiv_cols(v1, v2, true));
        assert!(!engine.are_equiv_cols(v1, v3, true));
        assert!(engine.is_indexable_class(v1));
        assert!(!engine.is_indexable_class(card4));
    }

    #[test]
    fn test_export_to() {
        let mut engine = Engine::new(EngineConfig::default());
        let base = add_user_class(&mut engine, "Base", "MEng.User", ClassKind::Standard);
        let color = add_user_class(&mut engine, "Color", "MEng.User.Base", ClassKind::Enum(vec![]));
        engine.class_mut(base).set_nested("MEng.User.Base.Color");
        let user = add_user_class(&mut engine, "User", "MEng.User", ClassKind::Standard);
        engine.export_to(base, user);
        let imports = engine.class(user).imports();
        assert_eq!(imports[0].path, "MEng.Object");
        assert!(engine.class(user).imports_class("MEng.User.Base"));
        assert!(engine.class(user).imports_class(&engine.class(color).path));
        assert!(engine.class(user).imports_class("MEng.Enum"));
    }

    #[test]
    fn test_reset_keeps_builtins() {
        let mut engine = Engine::new(EngineConfig::default());
        let n = engine.class_count();
        add_user_class(&mut engine, "Foo", "MEng.User", ClassKind::Standard);
        engine.set_load_state("MEng.User.Foo", LoadState::Complete);
        engine.reset();
        assert_eq!(engine.class_count(), n);
        assert_eq!(engine.find_class("MEng.User.Foo"), None);
        assert_eq!(engine.load_state("MEng.User.Foo"), LoadState::NotStarted);
        assert!(engine.find_class(VECTOR_PATH).is_some());
    }
}
