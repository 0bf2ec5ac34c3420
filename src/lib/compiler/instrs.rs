// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

use crate::{
    compiler::error::CompileError,
    engine::{value::Value, ClassId, MethodId},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Opcode {
    /// Call a method on the exception object of the enclosing catch block.
    CallExcept(MethodId),
    /// Call method on the local with the given id.
    CallLocal(u16, MethodId),
    CallMember(u16, MethodId),
    /// Call the parent class's version of a method on `this`.
    CallParent(MethodId),
    CallParm(u16, MethodId),
    /// Call a method on the object `n` entries down the stack.
    CallStack(u32, MethodId),
    CallThis(MethodId),
    ColIndex,
    /// Increment the enum on top of the stack, pushing `False` if it was already at its maximum.
    CondEnumInc,
    CondJump(usize),
    /// As `CondJump`, but the condition is left on the stack.
    CondJumpNP(usize),
    Copy,
    CurLine(u32),
    FlipTop,
    Jump(usize),
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    MultiPop(u32),
    Negate,
    NoOp,
    NotCondJump(usize),
    NotCondJumpNP(usize),
    PopTop,
    PopToReturn,
    PushCurLine,
    PushEnum(ClassId, u16),
    PushException,
    PushImBoolean(bool),
    PushImCard1(u8),
    PushImCard2(u16),
    PushImCard4(u32),
    PushImCard8(u64),
    PushImChar(char),
    PushImFloat4(f32),
    PushImFloat8(f64),
    PushImInt1(i8),
    PushImInt2(i16),
    PushImInt4(i32),
    PushLocal(u16),
    PushMember(u16),
    PushParm(u16),
    /// Push the entry with the given index from the method's string pool.
    PushStrPoolItem(usize),
    PushTempConst(ClassId),
    PushTempVar(ClassId),
    PushThis,
    Repush,
    ResetEnum,
    Return,
    /// Jump via the jump table with the given index, using the value on top of the stack, whose
    /// class is given.
    TableJump(usize, ClassId),
    /// Throw the error on top of the stack. `true` if it's a rethrow.
    Throw(bool),
    /// Throw the error on top of the stack, formatting its text with the given number of tokens.
    ThrowFmt(u32),
    /// Start a try block whose catch block starts at the given offset.
    Try(usize),
    TypeCast(ClassId),
}

impl Opcode {
    /// Patch this jump to go to `target`.
    pub fn set_jump_target(&mut self, target: usize) -> Result<(), CompileError> {
        match *self {
            Opcode::CondJump(ref mut t)
            | Opcode::CondJumpNP(ref mut t)
            | Opcode::Jump(ref mut t)
            | Opcode::NotCondJump(ref mut t)
            | Opcode::NotCondJumpNP(ref mut t)
            | Opcode::Try(ref mut t) => {
                *t = target;
                Ok(())
            }
            _ => Err(CompileError::Internal(format!(
                "{:?} is not a jump opcode",
                self
            ))),
        }
    }

    /// If this is a jump, where does it go to?
    pub fn jump_target(&self) -> Option<usize> {
        match *self {
            Opcode::CondJump(t)
            | Opcode::CondJumpNP(t)
            | Opcode::Jump(t)
            | Opcode::NotCondJump(t)
            | Opcode::NotCondJumpNP(t)
            | Opcode::Try(t) => Some(t),
            _ => None,
        }
    }
}

/// The cases of a `Switch` statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JumpTable {
    cases: Vec<(Value, usize)>,
    default: Option<usize>,
}

impl JumpTable {
    pub fn cases(&self) -> impl Iterator<Item = (&Value, usize)> {
        self.cases.iter().map(|(v, off)| (v, *off))
    }

    pub fn default_target(&self) -> Option<usize> {
        self.default
    }

    pub fn find_match(&self, val: &Value) -> Option<usize> {
        self.cases.iter().find(|(v, _)| v == val).map(|(_, off)| *off)
    }

    /// Add a case, returning `false` if `val` is already present.
    pub fn add_case(&mut self, val: Value, off: usize) -> bool {
        if self.find_match(&val).is_some() {
            return false;
        }
        self.cases.push((val, off));
        true
    }

    /// Set the default case, returning `false` if one was already set.
    pub fn set_default(&mut self, off: usize) -> bool {
        if self.default.is_some() {
            return false;
        }
        self.default = Some(off);
        true
    }

    pub fn has_required_items(&self) -> bool {
        !self.cases.is_empty() && self.default.is_some()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_table() {
        let mut jt = JumpTable::default();
        assert_eq!(jt.default_target(), None);
        assert!(jt.add_case(Value::Card4(1), 3));
        assert!(!jt.add_case(Value::Card4(1), 7));
        assert!(jt.add_case(Value::Card4(2), 3));
        assert!(!jt.has_required_items());
        assert!(jt.set_default(9));
        assert!(!jt.set_default(10));
        assert_eq!(jt.default_target(), Some(9));
        assert!(jt.has_required_items());
        assert_eq!(jt.find_match(&Value::Card4(2)), Some(3));
        assert_eq!(jt.find_match(&Value::Card4(3)), None);
        assert_eq!(jt.len(), 2);
    }

    #[test]
    fn test_set_jump_target() {
        let mut op = Opcode::Try(0);
        op.set_jump_target(12).unwrap();
        assert_eq!(op.jump_target(), Some(12));
        assert!(Opcode::PopTop.set_jump_target(1).is_err());
        assert_eq!(Opcode::ThrowFmt(2).jump_target(), None);
    }
}
