// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

use smartstring::alias::String as SmartString;

use crate::engine::{
    intrinsics::Intrinsic,
    method::{MethodImpl, MethodInfo},
    value::Value,
    ClassId, Engine, MethodId,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassExt {
    Abstract,
    NonFinal,
    Final,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColKind {
    Vector,
    Array,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumItem {
    pub name: SmartString,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClassKind {
    Intrinsic,
    Standard,
    /// A nested enum type: its items in ordinal order.
    Enum(Vec<EnumItem>),
    /// A nested `VectorOf` or `ArrayOf` type.
    Collection { kind: ColKind, elem: ClassId },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberInfo {
    pub name: SmartString,
    pub class_id: ClassId,
    pub is_const: bool,
    pub id: u16,
}

/// A named compile time constant.
#[derive(Clone, Debug, PartialEq)]
pub struct LiteralVal {
    pub name: SmartString,
    pub value: Value,
}

impl LiteralVal {
    pub fn new(name: &str, value: Value) -> Self {
        LiteralVal {
            name: SmartString::from(name),
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub path: String,
    /// Is this one of the importing class's own nested types?
    pub nested: bool,
}

#[derive(Debug)]
pub struct ClassInfo {
    pub name: SmartString,
    pub base_path: String,
    pub path: String,
    /// Set when the class is added to the engine.
    pub id: ClassId,
    pub parent_id: ClassId,
    pub ext: ClassExt,
    pub copyable: bool,
    pub kind: ClassKind,
    pub first_method_id: MethodId,
    pub first_member_id: u16,
    methods: Vec<MethodInfo>,
    impls: Vec<MethodImpl>,
    members: Vec<MemberInfo>,
    literals: Vec<LiteralVal>,
    imports: Vec<Import>,
    directives: Vec<(SmartString, String)>,
}

impl ClassInfo {
    pub fn new(name: &str, base_path: &str, parent_id: ClassId, kind: ClassKind) -> Self {
        let path = if base_path.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", base_path, name)
        };
        ClassInfo {
            name: SmartString::from(name),
            base_path: base_path.to_owned(),
            path,
            id: 0,
            parent_id,
            ext: ClassExt::NonFinal,
            copyable: true,
            kind,
            first_method_id: 0,
            first_member_id: 0,
            methods: Vec::new(),
            impls: Vec::new(),
            members: Vec::new(),
            literals: Vec::new(),
            imports: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// Inherit `parent`'s methods and members so that this class's own ids start after them.
    pub fn base_init(&mut self, parent: &ClassInfo) {
        self.parent_id = parent.id;
        self.methods = parent.methods.clone();
        self.members = parent.members.clone();
        self.first_method_id = self.methods.len() as MethodId;
        self.first_member_id = self.members.len() as u16;
        self.copyable &= parent.copyable;
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ClassKind::Enum(_))
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Add a method signature, returning the id it was given.
    pub fn add_method_info(&mut self, mut mi: MethodInfo) -> MethodId {
        let id = self.methods.len() as MethodId;
        mi.id = id;
        self.methods.push(mi);
        id
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodInfo> {
        self.methods.get(usize::from(id))
    }

    pub fn method_mut(&mut self, id: MethodId) -> Option<&mut MethodInfo> {
        self.methods.get_mut(usize::from(id))
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The methods first declared by this class. Overrides of inherited methods keep their
    /// inherited ids, so aren't included.
    pub fn own_methods(&self) -> &[MethodInfo] {
        &self.methods[usize::from(self.first_method_id)..]
    }

    pub fn add_method_impl(&mut self, imp: MethodImpl) {
        self.impls.push(imp);
    }

    pub fn impls(&self) -> &[MethodImpl] {
        &self.impls
    }

    pub fn find_impl(&self, id: MethodId) -> Option<&MethodImpl> {
        self.impls.iter().find(|i| i.id == id)
    }

    /// This class's own default constructor, if it has one.
    pub fn def_ctor(&self) -> Option<&MethodInfo> {
        self.own_methods()
            .iter()
            .find(|m| m.is_ctor && m.parms.is_empty())
    }

    /// This class's own constructors.
    pub fn ctors(&self) -> impl Iterator<Item = &MethodInfo> {
        self.own_methods().iter().filter(|m| m.is_ctor)
    }

    /// The parameter class lists of this class's own constructors, paired with each
    /// constructor's id.
    pub fn ctor_parm_list(&self) -> Vec<(MethodId, Vec<ClassId>)> {
        self.ctors()
            .map(|m| (m.id, m.parms.iter().map(|p| p.class_id).collect()))
            .collect()
    }

    /// Add a member, returning its id. `copyable` is whether the member's class is copyable: a
    /// class with a non-copyable member is itself not copyable.
    pub fn add_member(
        &mut self,
        name: &str,
        class_id: ClassId,
        is_const: bool,
        copyable: bool,
    ) -> u16 {
        let id = self.members.len() as u16;
        self.members.push(MemberInfo {
            name: SmartString::from(name),
            class_id,
            is_const,
            id,
        });
        self.copyable &= copyable;
        id
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn member(&self, id: u16) -> Option<&MemberInfo> {
        self.members.get(usize::from(id))
    }

    /// Find a member declared by this class itself. Inherited members are not visible.
    pub fn find_member(&self, name: &str) -> Option<&MemberInfo> {
        self.members
            .iter()
            .find(|m| m.name == name && m.id >= self.first_member_id)
    }

    pub fn add_literal(&mut self, lit: LiteralVal) {
        self.literals.push(lit);
    }

    pub fn literals(&self) -> &[LiteralVal] {
        &self.literals
    }

    /// Find the literal `name` in this class or, if `recurse` is true, in any of its ancestors.
    pub fn find_literal<'a>(
        &'a self,
        engine: &'a Engine,
        name: &str,
        recurse: bool,
    ) -> Option<&'a LiteralVal> {
        let mut cls = self;
        loop {
            if let Some(l) = cls.literals.iter().find(|l| l.name == name) {
                return Some(l);
            }
            if !recurse || cls.id == Intrinsic::Object.id() {
                return None;
            }
            cls = engine.class(cls.parent_id);
        }
    }

    /// Is `name` already used by a member, method, or (possibly inherited) literal?
    pub fn check_dup_name(&self, engine: &Engine, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
            || self.find_method(name).is_some()
            || self.literals.iter().any(|l| l.name == name)
            || (self.id != Intrinsic::Object.id()
                && engine
                    .class(self.parent_id)
                    .find_literal(engine, name, true)
                    .is_some())
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Add an import, returning `true` if the class was not already imported.
    pub fn add_import(&mut self, path: &str) -> bool {
        self.add_import_item(path, false)
    }

    /// Record one of this class's nested types. Returns `true` if it was not already recorded.
    pub fn set_nested(&mut self, path: &str) -> bool {
        self.add_import_item(path, true)
    }

    fn add_import_item(&mut self, path: &str, nested: bool) -> bool {
        if self.imports_class(path) {
            return false;
        }
        self.imports.push(Import {
            path: path.to_owned(),
            nested,
        });
        true
    }

    pub fn imports_class(&self, path: &str) -> bool {
        self.imports.iter().any(|i| i.path == path)
    }

    /// Add a directive, returning `false` if one of that name already exists.
    pub fn add_directive(&mut self, name: &str, value: String) -> bool {
        if self.find_directive(name).is_some() {
            return false;
        }
        self.directives.push((SmartString::from(name), value));
        true
    }

    pub fn find_directive(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Add an enum item, returning `false` if the name is already used. A no-op on non-enums.
    pub fn add_enum_item(&mut self, name: &str, text: String) -> bool {
        if let ClassKind::Enum(ref mut items) = self.kind {
            if items.iter().any(|i| i.name == name) {
                return false;
            }
            items.push(EnumItem {
                name: SmartString::from(name),
                text,
            });
            true
        } else {
            false
        }
    }

    /// The ordinal of the enum item `name`.
    pub fn find_enum_item(&self, name: &str) -> Option<u16> {
        match self.kind {
            ClassKind::Enum(ref items) => items
                .iter()
                .position(|i| i.name == name)
                .map(|p| p as u16),
            _ => None,
        }
    }

    pub fn enum_item_count(&self) -> usize {
        match self.kind {
            ClassKind::Enum(ref items) => items.len(),
            _ => 0,
        }
    }

    /// Can a value of class `src` be cast to this class with `TypeCast`?
    pub fn can_cast_from(&self, engine: &Engine, src: ClassId) -> bool {
        let src_num = engine.xlat_num_type(src).is_some();
        if engine.xlat_num_type(self.id).is_some() {
            src_num || src == Intrinsic::Boolean.id() || engine.is_enum_class(src)
        } else if self.id == Intrinsic::Boolean.id() {
            src_num
        } else if self.is_enum() {
            [
                Intrinsic::Card1,
                Intrinsic::Card2,
                Intrinsic::Card4,
                Intrinsic::Int1,
                Intrinsic::Int2,
                Intrinsic::Int4,
            ]
            .iter()
            .any(|i| i.id() == src)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    #[test]
    fn test_base_init_ids() {
        let engine = Engine::new(EngineConfig::default());
        let mut cls = ClassInfo::new("Foo", "MEng.User", 0, ClassKind::Standard);
        cls.base_init(engine.class(Intrinsic::Object.id()));
        let first = cls.first_method_id;
        assert_eq!(usize::from(first), cls.methods().len());
        let mut mi = MethodInfo::new(
            "Bar",
            Intrinsic::Void.id(),
            crate::engine::method::Visibility::Public,
            crate::engine::method::MethodExt::NonFinal,
            false,
        );
        mi.is_ctor = false;
        assert_eq!(cls.add_method_info(mi), first);
        assert_eq!(cls.own_methods().len(), 1);
        assert_eq!(cls.path, "MEng.User.Foo");
    }

    #[test]
    fn test_imports_and_directives() {
        let mut cls = ClassInfo::new("Foo", "MEng.User", 0, ClassKind::Standard);
        assert!(cls.add_import("MEng.User.Bar"));
        assert!(!cls.add_import("MEng.User.Bar"));
        assert!(cls.imports_class("MEng.User.Bar"));
        assert!(cls.set_nested("MEng.User.Foo.Colors"));
        assert!(cls.imports()[1].nested);
        assert!(cls.add_directive("Version", "1".to_owned()));
        assert!(!cls.add_directive("Version", "2".to_owned()));
        assert_eq!(cls.find_directive("Version"), Some("1"));
    }

    #[test]
    fn test_enum_items() {
        let mut cls = ClassInfo::new("Color", "MEng.User.Foo", 4, ClassKind::Enum(vec![]));
        assert!(cls.add_enum_item("Red", "R".to_owned()));
        assert!(cls.add_enum_item("Green", "G".to_owned()));
        assert!(!cls.add_enum_item("Red", "X".to_owned()));
        assert_eq!(cls.find_enum_item("Green"), Some(1));
        assert_eq!(cls.enum_item_count(), 2);
    }

    #[test]
    fn test_casts() {
        let engine = Engine::new(EngineConfig::default());
        let card4 = engine.class(Intrinsic::Card4.id());
        assert!(card4.can_cast_from(&engine, Intrinsic::Float8.id()));
        assert!(card4.can_cast_from(&engine, Intrinsic::Boolean.id()));
        assert!(!card4.can_cast_from(&engine, Intrinsic::String.id()));
        let boolean = engine.class(Intrinsic::Boolean.id());
        assert!(boolean.can_cast_from(&engine, Intrinsic::Int2.id()));
        assert!(!boolean.can_cast_from(&engine, Intrinsic::Char.id()));
    }

    #[test]
    fn test_literal_lookup_recurses() {
        let engine = Engine::new(EngineConfig::default());
        let card1 = engine.class(Intrinsic::Card1.id());
        assert_eq!(
            card1.find_literal(&engine, "kMaxValue", false).map(|l| &l.value),
            Some(&Value::Card1(255))
        );
        let f8 = engine.class(Intrinsic::Float8.id());
        assert!(f8.find_literal(&engine, "kNoSuch", true).is_none());
    }
}
