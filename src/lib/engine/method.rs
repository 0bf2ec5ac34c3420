// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Method signatures ([MethodInfo]) and method bodies ([MethodImpl]). The two are separate because
//! intrinsic classes have signatures but no bodies.

use std::{collections::HashMap, fmt::Write};

use smartstring::alias::String as SmartString;

use crate::{
    compiler::{
        error::CompileError,
        instrs::{JumpTable, Opcode},
    },
    engine::{ClassId, MethodId},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MethodExt {
    NonFinal,
    /// Must be overridden by every concrete subclass.
    Required,
    Final,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParmDir {
    In,
    Out,
    InOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParmInfo {
    pub name: SmartString,
    pub class_id: ClassId,
    pub dir: ParmDir,
    pub id: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodInfo {
    pub name: SmartString,
    /// Set when the method is added to a class.
    pub id: MethodId,
    pub ret_class: ClassId,
    pub vis: Visibility,
    pub ext: MethodExt,
    pub is_const: bool,
    pub is_ctor: bool,
    pub parms: Vec<ParmInfo>,
}

impl MethodInfo {
    pub fn new(
        name: &str,
        ret_class: ClassId,
        vis: Visibility,
        ext: MethodExt,
        is_const: bool,
    ) -> Self {
        MethodInfo {
            name: SmartString::from(name),
            id: 0,
            ret_class,
            vis,
            ext,
            is_const,
            is_ctor: false,
            parms: Vec::new(),
        }
    }

    /// Add a parameter, returning its id.
    pub fn add_parm(&mut self, name: &str, class_id: ClassId, dir: ParmDir) -> u16 {
        let id = self.parms.len() as u16;
        self.parms.push(ParmInfo {
            name: SmartString::from(name),
            class_id,
            dir,
            id,
        });
        id
    }

    pub fn find_parm(&self, name: &str) -> Option<&ParmInfo> {
        self.parms.iter().find(|p| p.name == name)
    }

    pub fn parm_count(&self) -> usize {
        self.parms.len()
    }

    /// Can `new` override this method? The parameter count, parameter types and directions, and
    /// return type must all match. If they do, this signature takes on `new`'s parameter names
    /// (which are allowed to differ) and its extension attribute.
    pub fn legal_override(&mut self, new: &MethodInfo) -> bool {
        if self.ret_class != new.ret_class || self.parms.len() != new.parms.len() {
            return false;
        }
        let same_parms = self
            .parms
            .iter()
            .zip(new.parms.iter())
            .all(|(old, new)| old.class_id == new.class_id && old.dir == new.dir);
        if !same_parms {
            return false;
        }
        for (old, new) in self.parms.iter_mut().zip(new.parms.iter()) {
            old.name = new.name.clone();
        }
        self.ext = new.ext;
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalInfo {
    pub name: SmartString,
    pub class_id: ClassId,
    pub is_const: bool,
    pub id: u16,
}

/// The body of a method: its opcodes, the jump tables its `Switch` statements use, its locals, and
/// the string literals it pushes.
#[derive(Debug, Default)]
pub struct MethodImpl {
    pub name: SmartString,
    pub id: MethodId,
    opcodes: Vec<Opcode>,
    jump_tables: Vec<JumpTable>,
    locals: Vec<LocalInfo>,
    strings: Vec<String>,
    /// A reverse index of `strings` so that repeated literals share a pool entry.
    reverse_strings: HashMap<String, usize>,
}

impl MethodImpl {
    pub fn new(name: &str, id: MethodId) -> Self {
        MethodImpl {
            name: SmartString::from(name),
            id,
            ..Default::default()
        }
    }

    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    pub fn jump_tables(&self) -> &[JumpTable] {
        &self.jump_tables
    }

    pub fn locals(&self) -> &[LocalInfo] {
        &self.locals
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// The offset the next opcode will be placed at.
    pub fn cur_offset(&self) -> usize {
        self.opcodes.len()
    }

    /// Append `op`, returning its offset.
    pub fn add_opcode(&mut self, op: Opcode) -> usize {
        self.opcodes.push(op);
        self.opcodes.len() - 1
    }

    pub fn last_opcode(&self) -> Option<&Opcode> {
        self.opcodes.last()
    }

    /// Overwrite the most recently added opcode.
    pub fn replace_last(&mut self, op: Opcode) -> Result<(), CompileError> {
        match self.opcodes.len() {
            0 => Err(CompileError::Internal(
                "replace_last on an empty method".to_owned(),
            )),
            n => self.replace_at(n - 1, op),
        }
    }

    /// Overwrite the opcode at offset `off`.
    pub fn replace_at(&mut self, off: usize, op: Opcode) -> Result<(), CompileError> {
        match self.opcodes.get_mut(off) {
            Some(old) => {
                *old = op;
                Ok(())
            }
            None => Err(CompileError::Internal(format!(
                "opcode offset {} out of range",
                off
            ))),
        }
    }

    /// Patch the jump at offset `off` to go to `target`.
    pub fn set_jump_target(&mut self, off: usize, target: usize) -> Result<(), CompileError> {
        match self.opcodes.get_mut(off) {
            Some(op) => op.set_jump_target(target),
            None => Err(CompileError::Internal(format!(
                "jump offset {} out of range",
                off
            ))),
        }
    }

    /// Add a new, empty, jump table, returning its index.
    pub fn add_jump_table(&mut self) -> usize {
        self.jump_tables.push(JumpTable::default());
        self.jump_tables.len() - 1
    }

    pub fn jump_table(&self, idx: usize) -> Option<&JumpTable> {
        self.jump_tables.get(idx)
    }

    pub fn jump_table_mut(&mut self, idx: usize) -> Option<&mut JumpTable> {
        self.jump_tables.get_mut(idx)
    }

    /// Add a local, returning its id.
    pub fn add_local(&mut self, name: &str, class_id: ClassId, is_const: bool) -> u16 {
        let id = self.locals.len() as u16;
        self.locals.push(LocalInfo {
            name: SmartString::from(name),
            class_id,
            is_const,
            id,
        });
        id
    }

    pub fn find_local(&self, name: &str) -> Option<&LocalInfo> {
        self.locals.iter().find(|l| l.name == name)
    }

    /// Add the string `s` to this method's pool, returning its index. Identical strings share a
    /// single entry.
    pub fn add_string(&mut self, s: String) -> usize {
        if let Some(&idx) = self.reverse_strings.get(&s) {
            return idx;
        }
        let idx = self.strings.len();
        self.reverse_strings.insert(s.clone(), idx);
        self.strings.push(s);
        idx
    }

    /// A human readable listing of this method's opcodes, one per line, followed by its jump
    /// tables.
    pub fn listing(&self) -> String {
        let mut s = String::new();
        for (i, op) in self.opcodes.iter().enumerate() {
            match op {
                Opcode::PushStrPoolItem(idx) => {
                    let text = self.strings.get(*idx).map(|s| s.as_str()).unwrap_or("");
                    writeln!(s, "{:>5}: PushStrPoolItem({}) {:?}", i, idx, text).ok();
                }
                _ => {
                    writeln!(s, "{:>5}: {:?}", i, op).ok();
                }
            }
        }
        for (i, jt) in self.jump_tables.iter().enumerate() {
            writeln!(s, "  table {}:", i).ok();
            for (val, off) in jt.cases() {
                writeln!(s, "    {} => {}", val, off).ok();
            }
            if let Some(off) = jt.default_target() {
                writeln!(s, "    Default => {}", off).ok();
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(ret: ClassId, parms: &[(ClassId, ParmDir)]) -> MethodInfo {
        let mut mi = MethodInfo::new("Foo", ret, Visibility::Public, MethodExt::NonFinal, false);
        for (i, (cls, dir)) in parms.iter().enumerate() {
            mi.add_parm(&format!("P{}", i), *cls, *dir);
        }
        mi
    }

    #[test]
    fn test_legal_override() {
        let mut base = sig(1, &[(11, ParmDir::In), (8, ParmDir::Out)]);
        let mut new = sig(1, &[(11, ParmDir::In), (8, ParmDir::Out)]);
        new.parms[0].name = SmartString::from("Renamed");
        new.ext = MethodExt::Final;
        assert!(base.legal_override(&new));
        assert_eq!(base.parms[0].name, "Renamed");
        assert_eq!(base.ext, MethodExt::Final);

        assert!(!base.legal_override(&sig(2, &[(11, ParmDir::In), (8, ParmDir::Out)])));
        assert!(!base.legal_override(&sig(1, &[(11, ParmDir::In), (8, ParmDir::InOut)])));
        assert!(!base.legal_override(&sig(1, &[(11, ParmDir::In)])));
    }

    #[test]
    fn test_string_pool() {
        let mut imp = MethodImpl::new("Start", 3);
        assert_eq!(imp.add_string("a".to_owned()), 0);
        assert_eq!(imp.add_string("b".to_owned()), 1);
        assert_eq!(imp.add_string("a".to_owned()), 0);
        assert_eq!(imp.strings().len(), 2);
    }

    #[test]
    fn test_jump_patching() {
        let mut imp = MethodImpl::new("Start", 0);
        let j = imp.add_opcode(Opcode::NotCondJump(0));
        imp.add_opcode(Opcode::NoOp);
        imp.set_jump_target(j, 2).unwrap();
        assert_eq!(imp.opcodes()[0], Opcode::NotCondJump(2));
        assert!(imp.set_jump_target(1, 2).is_err());
        assert!(imp.set_jump_target(9, 2).is_err());
    }
}
