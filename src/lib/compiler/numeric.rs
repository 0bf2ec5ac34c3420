// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Numeric literals. A literal is a sign, digits in one of three radixes, an optional fraction,
//! and an optional `#` suffix forcing its type (e.g. `0x1F#C1`, `-3#I2`, `2.5#F4`).

use std::{convert::TryFrom, num::IntErrorKind};

use crate::engine::value::{NumType, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Radix {
    Oct,
    Dec,
    Hex,
}

impl Radix {
    fn base(self) -> u32 {
        match self {
            Radix::Oct => 8,
            Radix::Dec => 10,
            Radix::Hex => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumericLit {
    /// The literal's text with any type suffix removed.
    pub text: String,
    pub ty: NumType,
    pub radix: Radix,
    /// Was the type given by a suffix?
    pub explicit: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Sign,
    Initial,
    LeadingZero,
    Digits,
    Fraction,
    Suffix,
    Suffix2,
    End,
}

/// Check that `text` is a well formed numeric literal, working out its type and radix. Returns
/// `None` if it isn't well formed.
pub fn classify_numeric(text: &str) -> Option<NumericLit> {
    let chars = text.chars().collect::<Vec<_>>();
    let mut ty = NumType::Card4;
    let mut radix = Radix::Dec;
    let mut state = State::Sign;
    let mut digits = 0;
    let mut suffixed = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Sign => {
                if c == '-' || c == '+' {
                    ty = NumType::Int4;
                    i += 1;
                }
                state = State::Initial;
                continue;
            }
            State::Initial => {
                match c {
                    '0' => state = State::LeadingZero,
                    '1'..='9' => state = State::Digits,
                    _ => return None,
                }
                radix = Radix::Dec;
                digits += 1;
            }
            State::LeadingZero => match c {
                'x' | 'X' => {
                    radix = Radix::Hex;
                    digits = 0;
                    state = State::Digits;
                }
                '#' => state = State::Suffix,
                '.' => {
                    ty = NumType::Float8;
                    state = State::Fraction;
                }
                _ => {
                    // Reprocess this character as the first octal digit.
                    radix = Radix::Oct;
                    digits = 0;
                    state = State::Digits;
                    continue;
                }
            },
            State::Digits => match c {
                '.' => {
                    if radix != Radix::Dec || digits == 0 {
                        return None;
                    }
                    ty = NumType::Float8;
                    state = State::Fraction;
                }
                '#' => {
                    if digits == 0 {
                        return None;
                    }
                    state = State::Suffix;
                }
                _ => {
                    if !c.is_digit(radix.base()) {
                        return None;
                    }
                    digits += 1;
                }
            },
            State::Fraction => match c {
                '0'..='9' => (),
                '#' => state = State::Suffix,
                _ => return None,
            },
            State::Suffix => {
                ty = match c {
                    'C' => NumType::Card4,
                    'F' => NumType::Float8,
                    'I' => NumType::Int4,
                    _ => return None,
                };
                state = State::Suffix2;
            }
            State::Suffix2 => {
                ty = match (ty, c) {
                    (NumType::Card4, '1') => NumType::Card1,
                    (NumType::Card4, '2') => NumType::Card2,
                    (NumType::Card4, '4') => NumType::Card4,
                    (NumType::Card4, '8') => NumType::Card8,
                    (NumType::Int4, '1') => NumType::Int1,
                    (NumType::Int4, '2') => NumType::Int2,
                    (NumType::Int4, '4') => NumType::Int4,
                    (NumType::Float8, '4') => NumType::Float4,
                    (NumType::Float8, '8') => NumType::Float8,
                    _ => return None,
                };
                suffixed = true;
                state = State::End;
            }
            State::End => return None,
        }
        i += 1;
    }

    if digits == 0 || state == State::Suffix || state == State::Suffix2 {
        return None;
    }
    let text = if suffixed {
        chars[..chars.len() - 3].iter().collect()
    } else {
        text.to_owned()
    };
    Some(NumericLit {
        text,
        ty,
        radix,
        explicit: suffixed,
    })
}

/// A numeric literal converted to a value.
#[derive(Clone, Debug, PartialEq)]
pub struct NumLiteral {
    pub value: Value,
    /// The text's value didn't fit in the literal's type, so `value` has been truncated.
    pub out_of_range: bool,
}

/// Parse the integer `text`, returning its value and whether it overflowed (in which case the
/// value is saturated).
fn parse_int(text: &str, radix: Radix) -> Option<(i128, bool)> {
    let (neg, rest) = match text.chars().next()? {
        '-' => (true, &text[1..]),
        '+' => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = match radix {
        Radix::Hex => rest.get(2..)?,
        _ => rest,
    };
    match i128::from_str_radix(digits, radix.base()) {
        Ok(v) => Some((if neg { -v } else { v }, false)),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
            Some((if neg { i128::MIN } else { i128::MAX }, true))
        }
        Err(_) => None,
    }
}

fn narrow<T: TryFrom<i128>>(v: i128, truncate: impl Fn(i128) -> T) -> (T, bool) {
    match T::try_from(v) {
        Ok(x) => (x, false),
        Err(_) => (truncate(v), true),
    }
}

/// Convert the literal `text` to a value. If `expected` is given, the value is of that type
/// regardless of the type the text implies. Returns `None` if `text` isn't a valid literal or
/// can't be read as the type required.
pub fn make_numeric_literal(text: &str, expected: Option<NumType>) -> Option<NumLiteral> {
    let lit = classify_numeric(text)?;
    let ty = expected.unwrap_or(lit.ty);

    if ty.is_float() {
        let f = if lit.radix == Radix::Dec {
            lit.text.parse::<f64>().ok()?
        } else {
            parse_int(&lit.text, lit.radix)?.0 as f64
        };
        let (value, out_of_range) = match ty {
            NumType::Float4 => (Value::Float4(f as f32), f.abs() > f64::from(std::f32::MAX)),
            _ => (Value::Float8(f), false),
        };
        return Some(NumLiteral {
            value,
            out_of_range,
        });
    }

    let (v, overflowed) = parse_int(&lit.text, lit.radix)?;
    let (value, out_of_range) = match ty {
        NumType::Card1 => {
            let (x, e) = narrow(v, |v| v as u8);
            (Value::Card1(x), e)
        }
        NumType::Card2 => {
            let (x, e) = narrow(v, |v| v as u16);
            (Value::Card2(x), e)
        }
        NumType::Card4 => match u32::try_from(v) {
            Ok(x) => (Value::Card4(x), false),
            // Too big for a Card4, but the type wasn't forced: widen it.
            Err(_) if !lit.explicit && expected.is_none() && u64::try_from(v).is_ok() => {
                (Value::Card8(v as u64), false)
            }
            Err(_) => (Value::Card4(v as u32), true),
        },
        NumType::Card8 => {
            let (x, e) = narrow(v, |v| v as u64);
            (Value::Card8(x), e)
        }
        NumType::Int1 => {
            let (x, e) = narrow(v, |v| v as i8);
            (Value::Int1(x), e)
        }
        NumType::Int2 => {
            let (x, e) = narrow(v, |v| v as i16);
            (Value::Int2(x), e)
        }
        NumType::Int4 => {
            let (x, e) = narrow(v, |v| v as i32);
            (Value::Int4(x), e)
        }
        NumType::Float4 | NumType::Float8 => unreachable!(),
    };
    Some(NumLiteral {
        value,
        out_of_range: out_of_range || overflowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(t: &str) -> Option<(String, NumType, Radix, bool)> {
        classify_numeric(t).map(|l| (l.text, l.ty, l.radix, l.explicit))
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            class("0"),
            Some(("0".to_owned(), NumType::Card4, Radix::Dec, false))
        );
        assert_eq!(
            class("-5"),
            Some(("-5".to_owned(), NumType::Int4, Radix::Dec, false))
        );
        assert_eq!(
            class("0x1F"),
            Some(("0x1F".to_owned(), NumType::Card4, Radix::Hex, false))
        );
        assert_eq!(
            class("017"),
            Some(("017".to_owned(), NumType::Card4, Radix::Oct, false))
        );
        assert_eq!(
            class("3.5"),
            Some(("3.5".to_owned(), NumType::Float8, Radix::Dec, false))
        );
        assert_eq!(
            class("3."),
            Some(("3.".to_owned(), NumType::Float8, Radix::Dec, false))
        );
        assert_eq!(
            class("0.25"),
            Some(("0.25".to_owned(), NumType::Float8, Radix::Dec, false))
        );
        assert_eq!(
            class("10#C1"),
            Some(("10".to_owned(), NumType::Card1, Radix::Dec, true))
        );
        assert_eq!(
            class("-1#I2"),
            Some(("-1".to_owned(), NumType::Int2, Radix::Dec, true))
        );
        assert_eq!(
            class("1.5#F4"),
            Some(("1.5".to_owned(), NumType::Float4, Radix::Dec, true))
        );
        assert_eq!(
            class("0#I1"),
            Some(("0".to_owned(), NumType::Int1, Radix::Dec, true))
        );
        assert_eq!(
            class("0xFF#C8"),
            Some(("0xFF".to_owned(), NumType::Card8, Radix::Hex, true))
        );
    }

    #[test]
    fn test_classify_bad() {
        for t in &[
            "-", "+", "0x", "018", "0x1.5", "5#", "5#C", "5#C3", "5#I8", "5#F1", "5#C1x", "5x",
            ".5", "1.2.3", "0x#C1",
        ] {
            assert_eq!(classify_numeric(t), None, "{}", t);
        }
    }

    #[test]
    fn test_make() {
        let m = |t, e| make_numeric_literal(t, e).map(|l| (l.value, l.out_of_range));
        assert_eq!(m("42", None), Some((Value::Card4(42), false)));
        assert_eq!(m("-42", None), Some((Value::Int4(-42), false)));
        assert_eq!(m("0x1F", None), Some((Value::Card4(31), false)));
        assert_eq!(m("017", None), Some((Value::Card4(15), false)));
        assert_eq!(m("-0x10", None), Some((Value::Int4(-16), false)));
        assert_eq!(m("2.5", None), Some((Value::Float8(2.5), false)));
        assert_eq!(m("5000000000", None), Some((Value::Card8(5_000_000_000), false)));
        assert_eq!(m("5#C8", None), Some((Value::Card8(5), false)));
        assert_eq!(m("300#C1", None), Some((Value::Card1(44), true)));
        assert_eq!(m("-200#I1", None), Some((Value::Int1(56), true)));
        assert_eq!(m("7", Some(NumType::Int2)), Some((Value::Int2(7), false)));
        assert_eq!(m("7", Some(NumType::Float4)), Some((Value::Float4(7.0), false)));
        assert_eq!(
            m("999999999999999999999999999999999999999999", None),
            Some((Value::Card4(u32::MAX), true))
        );
        assert_eq!(
            m("999999999999999999999999999999999999999999#C8", None),
            Some((Value::Card8(u64::MAX), true))
        );
        assert_eq!(m("3.4#C1", None), None);
        assert_eq!(m("bob", None), None);
    }
}
