// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Expressions. There is no operator precedence: the right hand side of a binary operator is
//! itself a whole expression, so `a + b * c` is `a + (b * c)`. Every operator other than `:=` and
//! the logical operators is lowered to a call of a method of the left operand's class.

use crate::{
    compiler::{
        error::ErrorKind,
        instrs::Opcode,
        lexer::{escape_char, escape_str},
        methods::MethodCtx,
        numeric::make_numeric_literal,
        parser::{ParseResult, Parser},
        tokens::{Tok, Token},
    },
    engine::{intrinsics::Intrinsic, method::ParmDir, value::Value, ClassId, ClassMatch},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Side {
    Lhs,
    Rhs,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum ExprKind {
    ObjectRef,
    ConstObjectRef,
    Const,
    /// A numeric literal with no explicit type context: its push opcode can still be retyped.
    NumLiteral,
    StringLiteral,
    EnumValue,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) struct ExprResult {
    pub class_id: ClassId,
    pub kind: ExprKind,
    /// Does the value on the stack refer directly to a variable (rather than to a temporary)?
    pub direct: bool,
}

impl ExprResult {
    fn new(class_id: ClassId, kind: ExprKind, direct: bool) -> Self {
        ExprResult {
            class_id,
            kind,
            direct,
        }
    }

    fn temp(class_id: ClassId) -> Self {
        ExprResult::new(class_id, ExprKind::ConstObjectRef, false)
    }
}

/// The object a call sequence starts from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Target {
    Local(u16),
    Parm(u16),
    Member(u16),
    This,
    /// A call of one of this object's methods without an explicit `This.`.
    ThisCall,
    Parent,
    Exception,
}

/// What a name in an expression refers to.
pub(super) enum NameRef {
    ThisCall { is_const: bool },
    Literal(Value),
    Local { id: u16, class_id: ClassId, is_const: bool },
    Parm { id: u16, class_id: ClassId, is_const: bool },
    Member { id: u16, class_id: ClassId, is_const: bool },
    EnumConst { class_id: ClassId, ordinal: u16 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum OpClass {
    Assign,
    Binary,
    Bitwise,
    Logical,
    Math,
    Unary,
}

/// The class of operator `kind` and the method it is lowered to, if it is an operator.
fn op_info(kind: Tok) -> Option<(OpClass, Option<&'static str>)> {
    Some(match kind {
        Tok::Add => (OpClass::Math, Some("Add")),
        Tok::Subtract => (OpClass::Math, Some("Sub")),
        Tok::Multiply => (OpClass::Math, Some("Mul")),
        Tok::Divide => (OpClass::Math, Some("Div")),
        Tok::ModDiv => (OpClass::Math, Some("ModDiv")),
        Tok::And => (OpClass::Bitwise, Some("And")),
        Tok::Or => (OpClass::Bitwise, Some("Or")),
        Tok::Xor => (OpClass::Bitwise, Some("Xor")),
        Tok::Assign => (OpClass::Assign, None),
        Tok::AndEq => (OpClass::Assign, Some("AndEq")),
        Tok::DivideEq => (OpClass::Assign, Some("DivEq")),
        Tok::MinusEq => (OpClass::Assign, Some("MinusEq")),
        Tok::ModDivEq => (OpClass::Assign, Some("ModDivEq")),
        Tok::MultiplyEq => (OpClass::Assign, Some("MulEq")),
        Tok::OrEq => (OpClass::Assign, Some("OrEq")),
        Tok::PlusEq => (OpClass::Assign, Some("PlusEq")),
        Tok::XorEq => (OpClass::Assign, Some("XorEq")),
        Tok::Inc => (OpClass::Unary, Some("Inc")),
        Tok::Dec => (OpClass::Unary, Some("Dec")),
        Tok::EqualSign | Tok::NotEqual => (OpClass::Binary, Some("Equal")),
        Tok::GtThan => (OpClass::Binary, Some("GtThan")),
        Tok::GtThanEq => (OpClass::Binary, Some("GtThanEq")),
        Tok::LsThan => (OpClass::Binary, Some("LsThan")),
        Tok::LsThanEq => (OpClass::Binary, Some("LsThanEq")),
        Tok::LogAnd | Tok::LogOr | Tok::LogXor => (OpClass::Logical, None),
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    pub(super) fn c_expr(&mut self, ctx: &mut MethodCtx, side: Side) -> ParseResult<ExprResult> {
        let negate = self.if_peeked(Tok::Exclaim)?;
        let mut left = self.c_factor(ctx, side)?;
        if negate {
            if left.class_id != Intrinsic::Boolean.id() {
                self.issue(ErrorKind::ExpectedBoolExpr);
            }
            ctx.imp.add_opcode(Opcode::Negate);
            left = ExprResult::temp(Intrinsic::Boolean.id());
        }

        let tok = self.peek_token()?;
        let op = match tok.kind {
            // `x+1` lexes as `x` followed by the numeric literal `+1`.
            Tok::NumericLiteral if tok.text.starts_with('+') => {
                self.lexer.next_char();
                Tok::Add
            }
            Tok::NumericLiteral if tok.text.starts_with('-') => {
                self.lexer.next_char();
                Tok::Subtract
            }
            k if op_info(k).is_some() => {
                self.next_token()?;
                k
            }
            _ => {
                if side == Side::Lhs {
                    // A bare call leaves its return value on the stack.
                    ctx.imp.add_opcode(Opcode::PopTop);
                } else if left.class_id == Intrinsic::Void.id() {
                    return Err(self.fatal(ErrorKind::MustReturnValue));
                }
                return Ok(left);
            }
        };
        let (opcls, meth_name) = match op_info(op) {
            Some(x) => x,
            None => return Err(self.fatal(ErrorKind::UnexpectedToken(op.text().to_owned()))),
        };

        let method = match meth_name {
            Some(n) => match self.engine.class(left.class_id).find_method(n).cloned() {
                Some(m) => Some(m),
                None => return Err(self.fatal(ErrorKind::OpNotSupported(n.to_owned()))),
            },
            None => None,
        };

        match opcls {
            OpClass::Assign | OpClass::Unary => {
                if side == Side::Rhs {
                    self.issue(ErrorKind::BadOpHere);
                }
                if !left.direct {
                    self.issue(ErrorKind::MustBeObjRef);
                } else if left.kind != ExprKind::ObjectRef {
                    self.issue(ErrorKind::NCOpOnConstObj);
                }
            }
            _ => {
                if side == Side::Lhs {
                    self.issue(ErrorKind::BadOpHere);
                }
            }
        }

        let res = match (opcls, method) {
            (OpClass::Assign, None) => {
                let right = self.c_expr(ctx, Side::Rhs)?;
                if right.class_id != left.class_id
                    && !(right.kind == ExprKind::NumLiteral
                        && self.convert_last(ctx, left.class_id)?)
                    && !self
                        .engine
                        .are_equiv_cols(left.class_id, right.class_id, true)
                {
                    self.issue(ErrorKind::BadAssign);
                }
                if !self.engine.class(left.class_id).copyable {
                    self.issue(ErrorKind::NotCopyable);
                }
                ctx.imp.add_opcode(Opcode::Copy);
                ExprResult::temp(Intrinsic::Void.id())
            }
            (OpClass::Assign, Some(m)) => {
                ctx.imp.add_opcode(Opcode::PushTempConst(Intrinsic::Void.id()));
                let right = self.c_expr(ctx, Side::Rhs)?;
                let want = m.parms.first().map_or(left.class_id, |p| p.class_id);
                if !self.engine.is_derived_from(right.class_id, want)
                    && !(right.kind == ExprKind::NumLiteral && self.convert_last(ctx, want)?)
                {
                    self.issue(ErrorKind::BadAssign);
                }
                ctx.imp.add_opcode(Opcode::CallStack(3, m.id));
                ctx.imp.add_opcode(Opcode::MultiPop(3));
                ExprResult::temp(Intrinsic::Void.id())
            }
            (OpClass::Unary, Some(m)) => {
                ctx.imp.add_opcode(Opcode::PushTempVar(m.ret_class));
                ctx.imp.add_opcode(Opcode::CallStack(2, m.id));
                if side == Side::Rhs {
                    ctx.imp.add_opcode(Opcode::FlipTop);
                    ctx.imp.add_opcode(Opcode::PopTop);
                } else {
                    ctx.imp.add_opcode(Opcode::MultiPop(2));
                }
                ExprResult::temp(m.ret_class)
            }
            (OpClass::Logical, _) => {
                let jump = match op {
                    Tok::LogAnd => Some(ctx.imp.add_opcode(Opcode::NotCondJumpNP(0))),
                    Tok::LogOr => Some(ctx.imp.add_opcode(Opcode::CondJumpNP(0))),
                    _ => None,
                };
                let right = self.c_expr(ctx, Side::Rhs)?;
                let boolean = Intrinsic::Boolean.id();
                if left.class_id != boolean || right.class_id != boolean {
                    self.issue(ErrorKind::LogOpExprs);
                }
                ctx.imp.add_opcode(match op {
                    Tok::LogAnd => Opcode::LogicalAnd,
                    Tok::LogOr => Opcode::LogicalOr,
                    _ => Opcode::LogicalXor,
                });
                if let Some(j) = jump {
                    let cur = ctx.imp.cur_offset();
                    ctx.imp.set_jump_target(j, cur)?;
                }
                ExprResult::temp(boolean)
            }
            (_, Some(m)) => {
                ctx.imp.add_opcode(Opcode::PushTempVar(m.ret_class));
                let right = self.c_expr(ctx, Side::Rhs)?;
                let want = m.parms.first().map_or(left.class_id, |p| p.class_id);
                if !self.engine.is_derived_from(right.class_id, want)
                    && !(right.kind == ExprKind::NumLiteral && self.convert_last(ctx, want)?)
                {
                    self.issue(ErrorKind::ExprSidesMatch);
                }
                ctx.imp.add_opcode(Opcode::CallStack(3, m.id));
                ctx.imp.add_opcode(Opcode::PopTop);
                ctx.imp.add_opcode(Opcode::FlipTop);
                ctx.imp.add_opcode(Opcode::PopTop);
                if op == Tok::NotEqual {
                    ctx.imp.add_opcode(Opcode::Negate);
                }
                ExprResult::temp(m.ret_class)
            }
            (_, None) => {
                return Err(self.fatal(ErrorKind::OpNotSupported(op.text().to_owned())));
            }
        };
        if side == Side::Rhs && res.class_id == Intrinsic::Void.id() {
            return Err(self.fatal(ErrorKind::MustReturnValue));
        }
        Ok(res)
    }

    fn rhs_only(&mut self, side: Side) {
        if side == Side::Lhs {
            self.issue(ErrorKind::NotOnLHS);
        }
    }

    fn c_factor(&mut self, ctx: &mut MethodCtx, side: Side) -> ParseResult<ExprResult> {
        let tok = self.next_token()?;
        match tok.kind {
            Tok::CurClassName => {
                self.rhs_only(side);
                let path = self.engine.class(ctx.cls).path.clone();
                let idx = ctx.imp.add_string(path);
                ctx.imp.add_opcode(Opcode::PushStrPoolItem(idx));
                Ok(ExprResult::new(
                    Intrinsic::String.id(),
                    ExprKind::StringLiteral,
                    false,
                ))
            }
            Tok::CurLine => {
                self.rhs_only(side);
                ctx.imp.add_opcode(Opcode::PushCurLine);
                Ok(ExprResult::new(Intrinsic::Card4.id(), ExprKind::Const, false))
            }
            Tok::Exception => {
                if !self.in_catch {
                    self.issue(ErrorKind::OnlyInCatch);
                }
                let exc = Intrinsic::Exception.id();
                if self.peek_token()?.kind == Tok::Period {
                    self.c_call_sequence(ctx, Target::Exception, true, exc)
                } else {
                    ctx.imp.add_opcode(Opcode::PushException);
                    Ok(ExprResult::new(exc, ExprKind::ConstObjectRef, true))
                }
            }
            Tok::True | Tok::False => {
                self.rhs_only(side);
                ctx.imp
                    .add_opcode(Opcode::PushImBoolean(tok.kind == Tok::True));
                Ok(ExprResult::new(Intrinsic::Boolean.id(), ExprKind::Const, false))
            }
            Tok::Parent => {
                let parent = self.engine.class(ctx.cls).parent_id;
                self.c_call_sequence(ctx, Target::Parent, ctx.info.is_const, parent)
            }
            Tok::This => {
                let next = self.peek_token()?.kind;
                if next == Tok::Period || next == Tok::OpenBracket {
                    self.c_call_sequence(ctx, Target::This, ctx.info.is_const, ctx.cls)
                } else {
                    ctx.imp.add_opcode(Opcode::PushThis);
                    let kind = if ctx.info.is_const {
                        ExprKind::ConstObjectRef
                    } else {
                        ExprKind::ObjectRef
                    };
                    Ok(ExprResult::new(ctx.cls, kind, true))
                }
            }
            Tok::NoMatch => self.c_name(ctx, side, &tok),
            Tok::NumericLiteral => {
                self.rhs_only(side);
                match make_numeric_literal(&tok.text, None) {
                    Some(lit) => {
                        if lit.out_of_range {
                            self.issue(ErrorKind::NumRangeErr(tok.text.clone()));
                        }
                        self.push_value(ctx, &lit.value);
                        Ok(ExprResult::new(
                            lit.value.class_id(),
                            ExprKind::NumLiteral,
                            false,
                        ))
                    }
                    None => {
                        self.issue(ErrorKind::BadNumLiteral(tok.text.clone()));
                        ctx.imp.add_opcode(Opcode::PushImCard4(0));
                        Ok(ExprResult::new(
                            Intrinsic::Card4.id(),
                            ExprKind::NumLiteral,
                            false,
                        ))
                    }
                }
            }
            Tok::OpenParen => {
                let r = self.c_expr(ctx, Side::Rhs)?;
                self.expect(Tok::CloseParen, true)?;
                Ok(r)
            }
            Tok::CharLiteral => {
                self.rhs_only(side);
                let c = match escape_char(&tok.text) {
                    Ok(c) => c,
                    Err(k) => {
                        self.issue(k);
                        '\0'
                    }
                };
                ctx.imp.add_opcode(Opcode::PushImChar(c));
                Ok(ExprResult::new(Intrinsic::Char.id(), ExprKind::Const, false))
            }
            Tok::QuotedString => {
                self.rhs_only(side);
                let idx = ctx.imp.add_string(escape_str(&tok.text));
                ctx.imp.add_opcode(Opcode::PushStrPoolItem(idx));
                Ok(ExprResult::new(
                    Intrinsic::String.id(),
                    ExprKind::StringLiteral,
                    false,
                ))
            }
            Tok::TypeCast => {
                self.rhs_only(side);
                self.c_type_cast(ctx)
            }
            _ => Err(self.fatal(ErrorKind::UnexpectedToken(tok.text))),
        }
    }

    /// Push `val` as an immediate (or, for strings, from the string pool), returning the kind of
    /// expression this makes.
    fn push_value(&mut self, ctx: &mut MethodCtx, val: &Value) -> ExprKind {
        match val.im_opcode() {
            Some(op) => {
                ctx.imp.add_opcode(op);
                ExprKind::Const
            }
            None => {
                let s = match val {
                    Value::String(s) => s.clone(),
                    _ => val.to_string(),
                };
                let idx = ctx.imp.add_string(s);
                ctx.imp.add_opcode(Opcode::PushStrPoolItem(idx));
                ExprKind::StringLiteral
            }
        }
    }

    /// A factor starting with a name.
    fn c_name(&mut self, ctx: &mut MethodCtx, side: Side, tok: &Token) -> ParseResult<ExprResult> {
        let (target, is_const, cls) = match self.resolve_ref(ctx, tok)? {
            NameRef::EnumConst { class_id, ordinal } => {
                self.rhs_only(side);
                ctx.imp.add_opcode(Opcode::PushEnum(class_id, ordinal));
                return Ok(ExprResult::new(class_id, ExprKind::EnumValue, false));
            }
            NameRef::Literal(v) => {
                self.rhs_only(side);
                let kind = self.push_value(ctx, &v);
                return Ok(ExprResult::new(v.class_id(), kind, false));
            }
            NameRef::ThisCall { is_const } => {
                self.push_back(tok);
                (Target::ThisCall, is_const, ctx.cls)
            }
            NameRef::Local {
                id,
                class_id,
                is_const,
            } => (Target::Local(id), is_const, class_id),
            NameRef::Parm {
                id,
                class_id,
                is_const,
            } => (Target::Parm(id), is_const, class_id),
            NameRef::Member {
                id,
                class_id,
                is_const,
            } => (Target::Member(id), is_const, class_id),
        };
        let next = self.peek_token()?.kind;
        if target == Target::ThisCall || next == Tok::Period || next == Tok::OpenBracket {
            return self.c_call_sequence(ctx, target, is_const, cls);
        }
        self.push_target(ctx, target);
        let kind = if is_const {
            ExprKind::ConstObjectRef
        } else {
            ExprKind::ObjectRef
        };
        Ok(ExprResult::new(cls, kind, true))
    }

    fn push_target(&mut self, ctx: &mut MethodCtx, target: Target) {
        ctx.imp.add_opcode(match target {
            Target::Local(id) => Opcode::PushLocal(id),
            Target::Parm(id) => Opcode::PushParm(id),
            Target::Member(id) => Opcode::PushMember(id),
            Target::This | Target::ThisCall | Target::Parent => Opcode::PushThis,
            Target::Exception => Opcode::PushException,
        });
    }

    /// Work out what the name in `tok` refers to. In order: a method of this class about to be
    /// called, a literal, a local, a parameter, a member; failing those, the name is taken as the
    /// start of a path naming an enum value or another class's literal.
    pub(super) fn resolve_ref(&mut self, ctx: &MethodCtx, tok: &Token) -> ParseResult<NameRef> {
        let name = tok.text.as_str();
        let meth_const = self
            .engine
            .class(ctx.cls)
            .find_method(name)
            .map(|m| m.is_const);
        if let Some(is_const) = meth_const {
            if self.peek_token()?.kind == Tok::OpenParen {
                return Ok(NameRef::ThisCall { is_const });
            }
        }
        let lit = {
            let eng = &*self.engine;
            eng.class(ctx.cls)
                .find_literal(eng, name, true)
                .map(|l| l.value.clone())
        };
        if let Some(v) = lit {
            return Ok(NameRef::Literal(v));
        }
        if let Some(l) = ctx.imp.find_local(name) {
            return Ok(NameRef::Local {
                id: l.id,
                class_id: l.class_id,
                is_const: l.is_const,
            });
        }
        if let Some(p) = ctx.info.find_parm(name) {
            return Ok(NameRef::Parm {
                id: p.id,
                class_id: p.class_id,
                is_const: p.dir == ParmDir::In,
            });
        }
        if let Some(m) = self.engine.class(ctx.cls).find_member(name) {
            return Ok(NameRef::Member {
                id: m.id,
                class_id: m.class_id,
                is_const: m.is_const,
            });
        }

        self.push_back(tok);
        let path = self.get_class_path()?;
        let i = match path.rfind('.') {
            Some(i) => i,
            None => return Err(self.fatal(ErrorKind::BadNameRef(path))),
        };
        let owner = self.resolve_path(&path[..i])?;
        let item = &path[i + 1..];
        if self.engine.is_enum_class(owner) {
            let (owner_path, visible, ordinal) = {
                let eng = &*self.engine;
                let c = eng.class(owner);
                (
                    c.path.clone(),
                    eng.class(ctx.cls).imports_class(&c.path),
                    c.find_enum_item(item),
                )
            };
            if !visible {
                self.issue(ErrorKind::ClassNotImported(owner_path));
            }
            let ordinal = match ordinal {
                Some(o) => o,
                None => {
                    self.issue(ErrorKind::BadEnumValue);
                    0
                }
            };
            return Ok(NameRef::EnumConst {
                class_id: owner,
                ordinal,
            });
        }
        let lit = {
            let eng = &*self.engine;
            eng.class(owner)
                .find_literal(eng, item, false)
                .map(|l| l.value.clone())
        };
        match lit {
            Some(v) => Ok(NameRef::Literal(v)),
            None => Err(self.fatal(ErrorKind::ExpectedEnumLit)),
        }
    }

    /// A chain of `.Method(...)` calls and `[index]`es starting from `target`, whose class is
    /// `cls`. Nothing has been pushed for `target` yet.
    fn c_call_sequence(
        &mut self,
        ctx: &mut MethodCtx,
        target: Target,
        is_const: bool,
        cls: ClassId,
    ) -> ParseResult<ExprResult> {
        let mut cur = cls;
        let mut kind = if is_const {
            ExprKind::ConstObjectRef
        } else {
            ExprKind::ObjectRef
        };
        let mut direct = true;
        let mut depth = 0;
        loop {
            let implicit = depth == 0 && target == Target::ThisCall;
            if implicit || self.if_peeked(Tok::Period)? {
                let tok = self.next_token()?;
                if tok.kind != Tok::NoMatch {
                    return Err(self.fatal(ErrorKind::ExpectedDotName));
                }
                if depth == 0 && !implicit {
                    let lit = {
                        let eng = &*self.engine;
                        eng.class(cur)
                            .find_literal(eng, &tok.text, true)
                            .map(|l| l.value.clone())
                    };
                    if let Some(v) = lit {
                        let k = self.push_value(ctx, &v);
                        return Ok(ExprResult::new(v.class_id(), k, false));
                    }
                }
                let m = match self.engine.class(cur).find_method(&tok.text).cloned() {
                    Some(m) => m,
                    None => return Err(self.fatal(ErrorKind::MethodNotFound(tok.text))),
                };
                if !m.is_const {
                    let on_self = matches!(target, Target::Member(_) | Target::This | Target::ThisCall);
                    if kind == ExprKind::ConstObjectRef {
                        self.issue(ErrorKind::MemberIsConst);
                    } else if depth == 0 && on_self && ctx.info.is_const {
                        self.issue(ErrorKind::MethodIsConst);
                    }
                }
                ctx.imp.add_opcode(Opcode::PushTempVar(m.ret_class));
                self.expect(Tok::OpenParen, false)?;
                let mut nparms = 0;
                loop {
                    if self.if_peeked(Tok::CloseParen)? {
                        break;
                    }
                    if nparms > 0 {
                        self.expect(Tok::Comma, true)?;
                    }
                    let r = self.c_expr(ctx, Side::Rhs)?;
                    if let Some(p) = m.parms.get(nparms) {
                        if p.dir != ParmDir::In && r.kind != ExprKind::ObjectRef {
                            self.issue(ErrorKind::InParmOnly);
                        }
                        if !self.engine.is_derived_from(r.class_id, p.class_id)
                            && !(r.kind == ExprKind::NumLiteral
                                && self.convert_last(ctx, p.class_id)?)
                            && !self.engine.are_equiv_cols(p.class_id, r.class_id, false)
                        {
                            self.issue(ErrorKind::ParmType(nparms + 1));
                        }
                    }
                    nparms += 1;
                }
                if nparms != m.parms.len() {
                    self.issue(ErrorKind::BadParmCount(m.name.to_string()));
                }
                let n = nparms as u32;
                ctx.imp.add_opcode(if depth > 0 {
                    Opcode::CallStack(n + 2, m.id)
                } else {
                    match target {
                        Target::Local(id) => Opcode::CallLocal(id, m.id),
                        Target::Parm(id) => Opcode::CallParm(id, m.id),
                        Target::Member(id) => Opcode::CallMember(id, m.id),
                        Target::Parent => Opcode::CallParent(m.id),
                        Target::This | Target::ThisCall => Opcode::CallThis(m.id),
                        Target::Exception => Opcode::CallExcept(m.id),
                    }
                });
                if n > 0 {
                    ctx.imp.add_opcode(Opcode::MultiPop(n));
                }
                if depth > 0 {
                    ctx.imp.add_opcode(Opcode::FlipTop);
                    ctx.imp.add_opcode(Opcode::PopTop);
                }
                cur = m.ret_class;
                kind = ExprKind::ConstObjectRef;
                direct = false;
            } else if self.if_peeked(Tok::OpenBracket)? {
                if !self.engine.is_indexable_class(cur) {
                    return Err(self.fatal(ErrorKind::NotIndexableObj));
                }
                if depth == 0 {
                    self.push_target(ctx, target);
                }
                let r = self.c_expr(ctx, Side::Rhs)?;
                let card4 = Intrinsic::Card4.id();
                if r.class_id != card4
                    && !self.engine.is_enum_class(r.class_id)
                    && !(r.kind == ExprKind::NumLiteral && self.convert_last(ctx, card4)?)
                {
                    self.issue(ErrorKind::NumericIndexType);
                }
                ctx.imp.add_opcode(Opcode::ColIndex);
                self.expect(Tok::CloseBracket, false)?;
                cur = self
                    .engine
                    .elem_class(cur)
                    .unwrap_or_else(|| Intrinsic::Object.id());
                direct = true;
            } else {
                break;
            }
            depth += 1;
        }
        if depth == 0 {
            self.push_target(ctx, target);
        }
        Ok(ExprResult::new(cur, kind, direct))
    }

    /// `TypeCast(Type, expr)`. The `TypeCast` itself has been consumed.
    fn c_type_cast(&mut self, ctx: &mut MethodCtx) -> ParseResult<ExprResult> {
        self.expect(Tok::OpenParen, false)?;
        let path = self.get_class_path()?;
        let target = match self.engine.resolve_class_name(&path) {
            ClassMatch::Unique(id) => id,
            _ => {
                self.issue(ErrorKind::ClassNotFound(path));
                Intrinsic::Card4.id()
            }
        };
        if !self.is_castable(target) {
            self.issue(ErrorKind::BadCastType);
        }
        self.expect(Tok::Comma, false)?;
        let src = self.c_expr(ctx, Side::Rhs)?;
        self.expect(Tok::CloseParen, true)?;
        if !self.is_castable(src.class_id) {
            self.issue(ErrorKind::BadCastType);
        }
        if src.class_id == target {
            return Ok(src);
        }
        let ok = {
            let eng = &*self.engine;
            eng.class(target).can_cast_from(eng, src.class_id)
        };
        if !ok {
            self.issue(ErrorKind::CannotCast);
        }
        ctx.imp.add_opcode(Opcode::TypeCast(target));
        Ok(ExprResult::temp(target))
    }

    fn is_castable(&self, id: ClassId) -> bool {
        self.engine.xlat_num_type(id).is_some()
            || self.engine.is_enum_class(id)
            || id == Intrinsic::Boolean.id()
    }

    /// If the most recent opcode pushes a numeric immediate which can be represented exactly as
    /// class `target`, retype it. Returns whether it was retyped.
    pub(super) fn convert_last(&mut self, ctx: &mut MethodCtx, target: ClassId) -> ParseResult<bool> {
        let ty = match self.engine.xlat_num_type(target) {
            Some(ty) => ty,
            None => return Ok(false),
        };
        let op = match ctx
            .imp
            .last_opcode()
            .and_then(Value::from_opcode)
            .and_then(|v| v.convert_num(ty))
            .and_then(|v| v.im_opcode())
        {
            Some(op) => op,
            None => return Ok(false),
        };
        ctx.imp.replace_last(op)?;
        Ok(true)
    }
}
