// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The built in classes. These have method signatures but no method bodies: the compiler only
//! needs to know what can be called on them.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use static_assertions::const_assert_eq;

use crate::engine::{
    class::{ClassExt, ClassInfo, ClassKind, ColKind, LiteralVal},
    method::{MethodExt, MethodInfo, ParmDir, Visibility},
    value::{max_value, min_value, NumType},
    ClassId, Engine,
};

/// The intrinsic classes. Their ids are fixed: the numeric value of each variant is the class id
/// it is registered under.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Intrinsic {
    Object = 0,
    Void,
    TextOutStream,
    Formattable,
    Enum,
    BaseInfo,
    Boolean,
    Char,
    String,
    Card1,
    Card2,
    Card4,
    Card8,
    Float4,
    Float8,
    Int1,
    Int2,
    Int4,
    Time,
    StringList,
    Exception,
    MemBuf,
    StringOutStream,
}

pub const INTRINSIC_COUNT: u16 = 23;
const_assert_eq!(Intrinsic::StringOutStream as u16 + 1, INTRINSIC_COUNT);

pub const FIRST_NUM: Intrinsic = Intrinsic::Card1;
pub const LAST_NUM: Intrinsic = Intrinsic::Int4;

pub const VECTOR_PATH: &str = "MEng.System.Runtime.Vector";
pub const ARRAY_PATH: &str = "MEng.System.Runtime.Array";

impl Intrinsic {
    pub fn id(self) -> ClassId {
        self.into()
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Object => "Object",
            Intrinsic::Void => "Void",
            Intrinsic::TextOutStream => "TextOutStream",
            Intrinsic::Formattable => "Formattable",
            Intrinsic::Enum => "Enum",
            Intrinsic::BaseInfo => "BaseInfo",
            Intrinsic::Boolean => "Boolean",
            Intrinsic::Char => "Char",
            Intrinsic::String => "String",
            Intrinsic::Card1 => "Card1",
            Intrinsic::Card2 => "Card2",
            Intrinsic::Card4 => "Card4",
            Intrinsic::Card8 => "Card8",
            Intrinsic::Float4 => "Float4",
            Intrinsic::Float8 => "Float8",
            Intrinsic::Int1 => "Int1",
            Intrinsic::Int2 => "Int2",
            Intrinsic::Int4 => "Int4",
            Intrinsic::Time => "Time",
            Intrinsic::StringList => "StringList",
            Intrinsic::Exception => "Exception",
            Intrinsic::MemBuf => "MemBuf",
            Intrinsic::StringOutStream => "StringOutStream",
        }
    }

    pub fn path(self) -> String {
        format!("MEng.{}", self.name())
    }

    fn parent(self) -> Intrinsic {
        match self {
            Intrinsic::Object
            | Intrinsic::Void
            | Intrinsic::TextOutStream
            | Intrinsic::Formattable
            | Intrinsic::BaseInfo
            | Intrinsic::StringList
            | Intrinsic::Exception
            | Intrinsic::MemBuf => Intrinsic::Object,
            Intrinsic::StringOutStream => Intrinsic::TextOutStream,
            _ => Intrinsic::Formattable,
        }
    }

    fn ext(self) -> ClassExt {
        match self {
            Intrinsic::Object | Intrinsic::Exception => ClassExt::NonFinal,
            Intrinsic::Void
            | Intrinsic::TextOutStream
            | Intrinsic::Formattable
            | Intrinsic::Enum
            | Intrinsic::BaseInfo => ClassExt::Abstract,
            _ => ClassExt::Final,
        }
    }

    fn copyable(self) -> bool {
        !matches!(self, Intrinsic::TextOutStream | Intrinsic::StringOutStream)
    }

    fn num_type(self) -> Option<NumType> {
        NumType::from_class_id(self.id())
    }
}

fn all() -> impl Iterator<Item = Intrinsic> {
    (0..INTRINSIC_COUNT).filter_map(|i| Intrinsic::try_from_primitive(i).ok())
}

/// A public, non-final method whose parameters are all `In`.
fn method(name: &str, ret: ClassId, is_const: bool, parms: &[(&str, ClassId)]) -> MethodInfo {
    let mut mi = MethodInfo::new(
        name,
        ret,
        Visibility::Public,
        MethodExt::NonFinal,
        is_const,
    );
    for (pname, pcls) in parms {
        mi.add_parm(pname, *pcls, ParmDir::In);
    }
    mi
}

/// The `n`th constructor of the built in class `path`.
fn ctor(path: &str, n: usize, parms: &[(&str, ClassId)]) -> MethodInfo {
    let mut mi = method(&format!("ctor{}_{}", n, path), Intrinsic::Void.id(), false, parms);
    mi.ext = MethodExt::Final;
    mi.is_ctor = true;
    mi
}

const CMP_OPS: &[&str] = &["Equal", "GtThan", "GtThanEq", "LsThan", "LsThanEq"];

fn numeric_methods(id: ClassId, path: &str, ty: NumType) -> Vec<MethodInfo> {
    let void = Intrinsic::Void.id();
    let boolean = Intrinsic::Boolean.id();
    let mut v = vec![ctor(path, 1, &[]), ctor(path, 2, &[("InitVal", id)])];
    let mut ops = vec!["Add", "Div", "ModDiv", "Mul", "Sub"];
    let mut eq_ops = vec!["DivEq", "MinusEq", "ModDivEq", "MulEq", "PlusEq"];
    if !ty.is_float() {
        ops.extend(&["And", "Or", "Xor"]);
        eq_ops.extend(&["AndEq", "OrEq", "XorEq"]);
    }
    for op in ops {
        v.push(method(op, id, true, &[("Val", id)]));
    }
    for op in eq_ops {
        v.push(method(op, void, false, &[("Val", id)]));
    }
    for op in CMP_OPS {
        v.push(method(op, boolean, true, &[("Val", id)]));
    }
    v.push(method("Dec", id, false, &[]));
    v.push(method("Inc", id, false, &[]));
    v.push(method("MaxVal", id, true, &[("Val", id)]));
    v.push(method("MinVal", id, true, &[("Val", id)]));
    v
}

fn methods_of(i: Intrinsic) -> Vec<MethodInfo> {
    let id = i.id();
    let path = i.path();
    let void = Intrinsic::Void.id();
    let boolean = Intrinsic::Boolean.id();
    let card4 = Intrinsic::Card4.id();
    let string = Intrinsic::String.id();
    if let Some(ty) = i.num_type() {
        return numeric_methods(id, &path, ty);
    }
    let mut v = Vec::new();
    match i {
        Intrinsic::Void => (),
        Intrinsic::Object | Intrinsic::BaseInfo | Intrinsic::TextOutStream => {
            v.push(ctor(&path, 1, &[]));
            if i == Intrinsic::TextOutStream {
                v.push(method("Flush", void, false, &[]));
                v.push(method("FmtStr", void, false, &[("ToFmt", string)]));
                v.push(method(
                    "Format",
                    void,
                    false,
                    &[("ToFmt", Intrinsic::Formattable.id())],
                ));
                v.push(method("NewLn", void, false, &[]));
            }
        }
        Intrinsic::Formattable => {
            v.push(ctor(&path, 1, &[]));
            let mut fmt = method("FormatTo", void, true, &[]);
            fmt.add_parm("TarStrm", Intrinsic::TextOutStream.id(), ParmDir::InOut);
            v.push(fmt);
        }
        Intrinsic::Enum => {
            v.push(ctor(&path, 1, &[]));
            v.push(method("Dec", id, false, &[]));
            v.push(method("GetName", string, true, &[]));
            v.push(method("GetOrdinal", card4, true, &[]));
            v.push(method("GetText", string, true, &[]));
            v.push(method("Inc", id, false, &[]));
            v.push(method("IsAtMax", boolean, true, &[]));
            v.push(method("IsAtMin", boolean, true, &[]));
            v.push(method("SetOrdinal", void, false, &[("ToSet", card4)]));
            v.push(method("SetToMax", void, false, &[]));
            v.push(method("SetToMin", void, false, &[]));
        }
        Intrinsic::Boolean => {
            v.push(ctor(&path, 1, &[]));
            v.push(ctor(&path, 2, &[("InitVal", id)]));
            for op in &["And", "Or", "Xor"] {
                v.push(method(op, id, true, &[("Val", id)]));
            }
            for op in &["AndEq", "OrEq", "XorEq"] {
                v.push(method(op, void, false, &[("Val", id)]));
            }
            v.push(method("Equal", boolean, true, &[("Val", id)]));
            v.push(method("Negate", void, false, &[]));
        }
        Intrinsic::Char => {
            v.push(ctor(&path, 1, &[]));
            v.push(ctor(&path, 2, &[("InitVal", id)]));
            for op in CMP_OPS {
                v.push(method(op, boolean, true, &[("Val", id)]));
            }
            v.push(method("GetOrdinal", card4, true, &[]));
            v.push(method("SetOrdinal", void, false, &[("ToSet", card4)]));
            v.push(method("ToLower", void, false, &[]));
            v.push(method("ToUpper", void, false, &[]));
        }
        Intrinsic::String => {
            v.push(ctor(&path, 1, &[]));
            v.push(ctor(&path, 2, &[("InitVal", id)]));
            for op in CMP_OPS {
                v.push(method(op, boolean, true, &[("Val", id)]));
            }
            v.push(method("Add", id, true, &[("Val", id)]));
            v.push(method("Append", void, false, &[("ToAppend", id)]));
            v.push(method("AppendCard4", void, false, &[("ToAppend", card4), ("Radix", Intrinsic::Card4.id())]));
            v.push(method("AppendChar", void, false, &[("ToAppend", Intrinsic::Char.id())]));
            v.push(method("Clear", void, false, &[]));
            v.push(method("GetAt", Intrinsic::Char.id(), true, &[("Index", card4)]));
            v.push(method("GetLength", card4, true, &[]));
            v.push(method("IsEmpty", boolean, true, &[]));
            v.push(method("PlusEq", void, false, &[("Val", id)]));
            v.push(method("ToCard4", card4, true, &[]));
        }
        Intrinsic::Time => {
            v.push(ctor(&path, 1, &[]));
            v.push(method("Equal", boolean, true, &[("Val", id)]));
            v.push(method("GetCurMillis", card4, true, &[]));
            v.push(method("GetStamp", Intrinsic::Card8.id(), true, &[]));
            v.push(method("Sleep", void, true, &[("Millis", card4)]));
        }
        Intrinsic::StringList => {
            v.push(ctor(&path, 1, &[]));
            v.push(method("Append", void, false, &[("ToAdd", string)]));
            v.push(method("GetAt", string, true, &[("Index", card4)]));
            v.push(method("GetElemCount", card4, true, &[]));
            v.push(method("IsEmpty", boolean, true, &[]));
            v.push(method("RemoveAll", void, false, &[]));
        }
        Intrinsic::Exception => {
            v.push(ctor(&path, 1, &[]));
            v.push(method("Check", boolean, true, &[("ToCheck", Intrinsic::Enum.id())]));
            v.push(method("GetClass", string, true, &[]));
            v.push(method("GetErrorNum", card4, true, &[]));
            v.push(method("GetErrorText", string, true, &[]));
            v.push(method("GetLine", card4, true, &[]));
        }
        Intrinsic::MemBuf => {
            v.push(ctor(&path, 1, &[]));
            v.push(ctor(&path, 2, &[("InitSize", card4), ("MaxSize", card4)]));
            v.push(method("GetAlloc", card4, true, &[]));
            v.push(method("GetCard1At", Intrinsic::Card1.id(), true, &[("At", card4)]));
        }
        Intrinsic::StringOutStream => {
            v.push(ctor(&path, 1, &[]));
            v.push(ctor(&path, 2, &[("InitSize", card4)]));
            let mut get = method("GetText", void, true, &[]);
            get.add_parm("ToFill", string, ParmDir::Out);
            v.push(get);
            v.push(method("Reset", void, false, &[]));
        }
        _ => unreachable!(),
    }
    v
}

/// Create and register every intrinsic class, followed by the two collection base classes.
/// Must only be called on an empty engine, since the intrinsic ids are fixed.
pub(crate) fn register(engine: &mut Engine) {
    debug_assert_eq!(engine.class_count(), 0);
    for i in all() {
        let mut cls = ClassInfo::new(i.name(), "MEng", i.parent().id(), ClassKind::Intrinsic);
        cls.ext = i.ext();
        cls.copyable = i.copyable();
        if i != Intrinsic::Object {
            cls.base_init(engine.class(i.parent().id()));
        }
        for mi in methods_of(i) {
            cls.add_method_info(mi);
        }
        if let Some(ty) = i.num_type() {
            cls.add_literal(LiteralVal::new("kMaxValue", max_value(ty)));
            cls.add_literal(LiteralVal::new("kMinValue", min_value(ty)));
        }
        let id = engine.add_class(cls);
        debug_assert_eq!(id, i.id());
    }

    let card4 = Intrinsic::Card4.id();
    let boolean = Intrinsic::Boolean.id();
    let void = Intrinsic::Void.id();
    for (path, kind) in &[(VECTOR_PATH, ColKind::Vector), (ARRAY_PATH, ColKind::Array)] {
        let (base, name) = split_class_path(path);
        let mut cls = ClassInfo::new(name, base, Intrinsic::Object.id(), ClassKind::Intrinsic);
        cls.ext = ClassExt::Abstract;
        cls.base_init(engine.class(Intrinsic::Object.id()));
        cls.add_method_info(ctor(path, 1, &[]));
        cls.add_method_info(method("GetElemCount", card4, true, &[]));
        match kind {
            ColKind::Vector => {
                cls.add_method_info(method("IsEmpty", boolean, true, &[]));
                cls.add_method_info(method("RemoveAll", void, false, &[]));
                cls.add_method_info(method("RemoveAt", void, false, &[("At", card4)]));
            }
            ColKind::Array => {
                cls.add_method_info(method("Reallocate", void, false, &[("NewSize", card4)]));
            }
        }
        engine.add_class(cls);
    }
}

/// The methods a nested `Enum` type adds to those it inherits from `MEng.Enum`.
pub(crate) fn enum_methods(id: ClassId, path: &str) -> Vec<MethodInfo> {
    let boolean = Intrinsic::Boolean.id();
    let mut v = vec![
        ctor(path, 1, &[]),
        ctor(path, 2, &[("InitVal", id)]),
    ];
    for op in CMP_OPS {
        v.push(method(op, boolean, true, &[("Val", id)]));
    }
    v.push(method("GetOrdinalCount", Intrinsic::Card4.id(), true, &[]));
    v.push(method("FromText", boolean, false, &[("ToFind", Intrinsic::String.id())]));
    v
}

/// The methods a nested `VectorOf` or `ArrayOf` type adds to its base class.
pub(crate) fn collection_methods(kind: ColKind, path: &str, elem: ClassId) -> Vec<MethodInfo> {
    let card4 = Intrinsic::Card4.id();
    let void = Intrinsic::Void.id();
    match kind {
        ColKind::Vector => vec![
            ctor(path, 1, &[]),
            method("AddObject", void, false, &[("ToAdd", elem)]),
            method("InsertObject", void, false, &[("ToIns", elem), ("At", card4)]),
        ],
        ColKind::Array => vec![ctor(path, 1, &[("InitSize", card4)])],
    }
}

/// Split `MEng.User.Foo` into (`MEng.User`, `Foo`).
pub fn split_class_path(path: &str) -> (&str, &str) {
    match path.rfind('.') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    #[test]
    fn test_ids_are_fixed() {
        let engine = Engine::new(EngineConfig::default());
        for i in all() {
            assert_eq!(engine.class(i.id()).path.as_str(), i.path());
        }
        assert_eq!(Intrinsic::Card1.id(), 9);
        assert_eq!(Intrinsic::Int4.id(), 17);
        assert!(FIRST_NUM.id() < LAST_NUM.id());
    }

    #[test]
    fn test_numeric_classes() {
        let engine = Engine::new(EngineConfig::default());
        let card1 = engine.class(Intrinsic::Card1.id());
        assert!(card1.find_method("ctor1_MEng.Card1").is_some());
        assert!(card1.find_method("Xor").is_some());
        assert!(card1.find_literal(&engine, "kMaxValue", true).is_some());
        let f8 = engine.class(Intrinsic::Float8.id());
        assert!(f8.find_method("Add").is_some());
        assert!(f8.find_method("Xor").is_none());
        assert!(engine.is_derived_from(Intrinsic::Float8.id(), Intrinsic::Formattable.id()));
    }

    #[test]
    fn test_split_class_path() {
        assert_eq!(split_class_path("MEng.User.Foo"), ("MEng.User", "Foo"));
        assert_eq!(split_class_path("Foo"), ("", "Foo"));
    }
}
