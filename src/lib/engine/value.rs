// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Compile time values: the contents of named literals, switch case values, and the operands of
//! the various "push immediate" opcodes.

use std::{convert::TryFrom, fmt};

use num_traits::{Bounded, FromPrimitive, ToPrimitive};

use crate::{
    compiler::instrs::Opcode,
    engine::{intrinsics::Intrinsic, ClassId},
};

/// The numeric intrinsic types.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NumType {
    Card1,
    Card2,
    Card4,
    Card8,
    Float4,
    Float8,
    Int1,
    Int2,
    Int4,
}

impl NumType {
    pub fn class_id(self) -> ClassId {
        let i = match self {
            NumType::Card1 => Intrinsic::Card1,
            NumType::Card2 => Intrinsic::Card2,
            NumType::Card4 => Intrinsic::Card4,
            NumType::Card8 => Intrinsic::Card8,
            NumType::Float4 => Intrinsic::Float4,
            NumType::Float8 => Intrinsic::Float8,
            NumType::Int1 => Intrinsic::Int1,
            NumType::Int2 => Intrinsic::Int2,
            NumType::Int4 => Intrinsic::Int4,
        };
        i.id()
    }

    pub fn from_class_id(id: ClassId) -> Option<NumType> {
        match Intrinsic::try_from(id).ok()? {
            Intrinsic::Card1 => Some(NumType::Card1),
            Intrinsic::Card2 => Some(NumType::Card2),
            Intrinsic::Card4 => Some(NumType::Card4),
            Intrinsic::Card8 => Some(NumType::Card8),
            Intrinsic::Float4 => Some(NumType::Float4),
            Intrinsic::Float8 => Some(NumType::Float8),
            Intrinsic::Int1 => Some(NumType::Int1),
            Intrinsic::Int2 => Some(NumType::Int2),
            Intrinsic::Int4 => Some(NumType::Int4),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumType::Float4 | NumType::Float8)
    }
}

/// A number before it has been given its final type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawNum {
    Int(i128),
    Float(f64),
}

impl RawNum {
    /// Convert to `ty`, returning `None` if the value is out of range for `ty`. Floats are
    /// truncated towards zero when converted to an integral type.
    pub fn to_value(self, ty: NumType) -> Option<Value> {
        match self {
            RawNum::Int(i) => match ty {
                NumType::Card1 => int_to(i).map(Value::Card1),
                NumType::Card2 => int_to(i).map(Value::Card2),
                NumType::Card4 => int_to(i).map(Value::Card4),
                NumType::Card8 => int_to(i).map(Value::Card8),
                NumType::Int1 => int_to(i).map(Value::Int1),
                NumType::Int2 => int_to(i).map(Value::Int2),
                NumType::Int4 => int_to(i).map(Value::Int4),
                NumType::Float4 => i.to_f32().map(Value::Float4),
                NumType::Float8 => i.to_f64().map(Value::Float8),
            },
            RawNum::Float(f) => match ty {
                NumType::Float8 => Some(Value::Float8(f)),
                NumType::Float4 => {
                    if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                        None
                    } else {
                        f.to_f32().map(Value::Float4)
                    }
                }
                _ => {
                    if !f.is_finite() {
                        return None;
                    }
                    RawNum::Int(i128::from_f64(f.trunc())?).to_value(ty)
                }
            },
        }
    }
}

fn int_to<T: TryFrom<i128>>(i: i128) -> Option<T> {
    T::try_from(i).ok()
}

/// The largest value `ty` can hold, as used for the `kMaxValue` literal of numeric classes.
pub fn max_value(ty: NumType) -> Value {
    match ty {
        NumType::Card1 => Value::Card1(u8::max_value()),
        NumType::Card2 => Value::Card2(u16::max_value()),
        NumType::Card4 => Value::Card4(u32::max_value()),
        NumType::Card8 => Value::Card8(u64::max_value()),
        NumType::Float4 => Value::Float4(<f32 as Bounded>::max_value()),
        NumType::Float8 => Value::Float8(<f64 as Bounded>::max_value()),
        NumType::Int1 => Value::Int1(i8::max_value()),
        NumType::Int2 => Value::Int2(i16::max_value()),
        NumType::Int4 => Value::Int4(i32::max_value()),
    }
}

pub fn min_value(ty: NumType) -> Value {
    match ty {
        NumType::Card1 => Value::Card1(0),
        NumType::Card2 => Value::Card2(0),
        NumType::Card4 => Value::Card4(0),
        NumType::Card8 => Value::Card8(0),
        NumType::Float4 => Value::Float4(<f32 as Bounded>::min_value()),
        NumType::Float8 => Value::Float8(<f64 as Bounded>::min_value()),
        NumType::Int1 => Value::Int1(i8::min_value()),
        NumType::Int2 => Value::Int2(i16::min_value()),
        NumType::Int4 => Value::Int4(i32::min_value()),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Boolean(bool),
    Char(char),
    String(String),
    Card1(u8),
    Card2(u16),
    Card4(u32),
    Card8(u64),
    Float4(f32),
    Float8(f64),
    Int1(i8),
    Int2(i16),
    Int4(i32),
    /// An ordinal of the enum class `class`.
    Enum { class: ClassId, ordinal: u16 },
}

impl Value {
    pub fn class_id(&self) -> ClassId {
        match self {
            Value::Boolean(_) => Intrinsic::Boolean.id(),
            Value::Char(_) => Intrinsic::Char.id(),
            Value::String(_) => Intrinsic::String.id(),
            Value::Enum { class, .. } => *class,
            _ => match self.num_type() {
                Some(t) => t.class_id(),
                None => Intrinsic::Void.id(),
            },
        }
    }

    pub fn num_type(&self) -> Option<NumType> {
        match self {
            Value::Card1(_) => Some(NumType::Card1),
            Value::Card2(_) => Some(NumType::Card2),
            Value::Card4(_) => Some(NumType::Card4),
            Value::Card8(_) => Some(NumType::Card8),
            Value::Float4(_) => Some(NumType::Float4),
            Value::Float8(_) => Some(NumType::Float8),
            Value::Int1(_) => Some(NumType::Int1),
            Value::Int2(_) => Some(NumType::Int2),
            Value::Int4(_) => Some(NumType::Int4),
            _ => None,
        }
    }

    pub fn raw_num(&self) -> Option<RawNum> {
        Some(match *self {
            Value::Card1(v) => RawNum::Int(i128::from(v)),
            Value::Card2(v) => RawNum::Int(i128::from(v)),
            Value::Card4(v) => RawNum::Int(i128::from(v)),
            Value::Card8(v) => RawNum::Int(i128::from(v)),
            Value::Int1(v) => RawNum::Int(i128::from(v)),
            Value::Int2(v) => RawNum::Int(i128::from(v)),
            Value::Int4(v) => RawNum::Int(i128::from(v)),
            Value::Float4(v) => RawNum::Float(f64::from(v)),
            Value::Float8(v) => RawNum::Float(v),
            _ => return None,
        })
    }

    /// Convert a numeric value to another numeric type if it can be represented there. Non
    /// numeric values (including chars) are never converted.
    pub fn convert_num(&self, ty: NumType) -> Option<Value> {
        self.raw_num()?.to_value(ty)
    }

    /// The zero value of `ty`.
    pub fn zero(ty: NumType) -> Value {
        match RawNum::Int(0).to_value(ty) {
            Some(v) => v,
            None => Value::Card4(0),
        }
    }

    /// The opcode which pushes this value as an immediate. Strings are not immediates (they live
    /// in a method's string pool) so return `None`.
    pub fn im_opcode(&self) -> Option<Opcode> {
        Some(match *self {
            Value::Boolean(b) => Opcode::PushImBoolean(b),
            Value::Char(c) => Opcode::PushImChar(c),
            Value::String(_) => return None,
            Value::Card1(v) => Opcode::PushImCard1(v),
            Value::Card2(v) => Opcode::PushImCard2(v),
            Value::Card4(v) => Opcode::PushImCard4(v),
            Value::Card8(v) => Opcode::PushImCard8(v),
            Value::Float4(v) => Opcode::PushImFloat4(v),
            Value::Float8(v) => Opcode::PushImFloat8(v),
            Value::Int1(v) => Opcode::PushImInt1(v),
            Value::Int2(v) => Opcode::PushImInt2(v),
            Value::Int4(v) => Opcode::PushImInt4(v),
            Value::Enum { class, ordinal } => Opcode::PushEnum(class, ordinal),
        })
    }

    /// The inverse of `im_opcode`.
    pub fn from_opcode(op: &Opcode) -> Option<Value> {
        Some(match *op {
            Opcode::PushImBoolean(b) => Value::Boolean(b),
            Opcode::PushImChar(c) => Value::Char(c),
            Opcode::PushImCard1(v) => Value::Card1(v),
            Opcode::PushImCard2(v) => Value::Card2(v),
            Opcode::PushImCard4(v) => Value::Card4(v),
            Opcode::PushImCard8(v) => Value::Card8(v),
            Opcode::PushImFloat4(v) => Value::Float4(v),
            Opcode::PushImFloat8(v) => Value::Float8(v),
            Opcode::PushImInt1(v) => Value::Int1(v),
            Opcode::PushImInt2(v) => Value::Int2(v),
            Opcode::PushImInt4(v) => Value::Int4(v),
            Opcode::PushEnum(class, ordinal) => Value::Enum { class, ordinal },
            _ => return None,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Char(c) => write!(f, "'{}'", c.escape_default()),
            Value::String(s) => write!(f, "\"{}\"", s.escape_default()),
            Value::Card1(v) => write!(f, "{}", v),
            Value::Card2(v) => write!(f, "{}", v),
            Value::Card4(v) => write!(f, "{}", v),
            Value::Card8(v) => write!(f, "{}", v),
            Value::Float4(v) => write!(f, "{}", v),
            Value::Float8(v) => write!(f, "{}", v),
            Value::Int1(v) => write!(f, "{}", v),
            Value::Int2(v) => write!(f, "{}", v),
            Value::Int4(v) => write!(f, "{}", v),
            Value::Enum { class, ordinal } => write!(f, "enum({}:{})", class, ordinal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_conversions() {
        let v = Value::Card4(200);
        assert_eq!(v.convert_num(NumType::Card1), Some(Value::Card1(200)));
        assert_eq!(v.convert_num(NumType::Int1), None);
        assert_eq!(v.convert_num(NumType::Int2), Some(Value::Int2(200)));
        assert_eq!(v.convert_num(NumType::Card8), Some(Value::Card8(200)));
        assert_eq!(v.convert_num(NumType::Float8), Some(Value::Float8(200.0)));
        assert_eq!(Value::Card8(1 << 40).convert_num(NumType::Card4), None);
    }

    #[test]
    fn test_signed_conversions() {
        assert_eq!(Value::Int4(-1).convert_num(NumType::Card1), None);
        assert_eq!(Value::Int4(-1).convert_num(NumType::Card8), None);
        assert_eq!(Value::Int4(-1).convert_num(NumType::Int1), Some(Value::Int1(-1)));
        assert_eq!(Value::Int4(70000).convert_num(NumType::Int2), None);
        assert_eq!(Value::Int4(12).convert_num(NumType::Card2), Some(Value::Card2(12)));
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(Value::Float8(3.9).convert_num(NumType::Card1), Some(Value::Card1(3)));
        assert_eq!(Value::Float8(-3.9).convert_num(NumType::Int1), Some(Value::Int1(-3)));
        assert_eq!(Value::Float8(300.0).convert_num(NumType::Card1), None);
        assert_eq!(Value::Float8(1e300).convert_num(NumType::Float4), None);
        assert_eq!(Value::Float8(2.5).convert_num(NumType::Float4), Some(Value::Float4(2.5)));
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(Value::Char('a').convert_num(NumType::Card4), None);
        assert_eq!(Value::Boolean(true).convert_num(NumType::Card4), None);
        assert_eq!(Value::String("1".to_owned()).im_opcode(), None);
    }

    #[test]
    fn test_opcode_round_trip() {
        let v = Value::Int2(-5);
        let op = v.im_opcode().unwrap();
        assert_eq!(Value::from_opcode(&op), Some(v));
        assert_eq!(Value::from_opcode(&Opcode::PopTop), None);
    }
}
