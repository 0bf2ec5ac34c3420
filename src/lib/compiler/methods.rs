// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Methods blocks, method and constructor signatures, and method bodies down to the statement
//! level. Expressions are in `expr.rs`.

use log::trace;

use crate::{
    compiler::{
        error::{CompileError, ErrorKind},
        expr::{ExprKind, ExprResult, NameRef, Side},
        flow::{FlowItem, FlowKind},
        instrs::Opcode,
        lexer::escape_char,
        numeric::make_numeric_literal,
        parser::{ParseResult, Parser},
        tokens::Tok,
    },
    engine::{
        intrinsics::Intrinsic,
        method::{MethodExt, MethodImpl, MethodInfo, ParmDir, Visibility},
        value::Value,
        ClassId, MethodId,
    },
};

/// Throws can format at most this many tokens into their error text.
const MAX_THROW_TOKENS: u32 = 8;

/// Everything known about the method currently being compiled.
pub(super) struct MethodCtx {
    pub cls: ClassId,
    pub info: MethodInfo,
    pub imp: MethodImpl,
}

/// The attributes of a `Methods` block.
#[derive(Clone, Copy, Debug)]
struct BlockAttrs {
    vis: Visibility,
    ext: MethodExt,
    overrides: bool,
    is_const: bool,
}

impl Default for BlockAttrs {
    fn default() -> Self {
        BlockAttrs {
            vis: Visibility::Public,
            ext: MethodExt::NonFinal,
            overrides: false,
            is_const: false,
        }
    }
}

impl<'a> Parser<'a> {
    /// A `Methods=[...] ... EndMethods;` block. The `Methods` has been consumed.
    pub(super) fn c_methods(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        let mut attrs = BlockAttrs::default();
        if self.if_peeked(Tok::OpenBracket)? {
            loop {
                let tok = self.next_token()?;
                match tok.kind {
                    Tok::Private => attrs.vis = Visibility::Private,
                    Tok::Public => attrs.vis = Visibility::Public,
                    Tok::Final => attrs.ext = MethodExt::Final,
                    Tok::NonFinal => attrs.ext = MethodExt::NonFinal,
                    Tok::Required => attrs.ext = MethodExt::Required,
                    Tok::Overrides => attrs.overrides = true,
                    Tok::Const => attrs.is_const = true,
                    Tok::NonConst => attrs.is_const = false,
                    _ => return Err(self.fatal(ErrorKind::ExpectedMethAttr)),
                }
                if self.if_peeked(Tok::CloseBracket)? {
                    break;
                }
                self.expect(Tok::Comma, true)?;
            }
        }

        loop {
            let tok = self.next_token()?;
            match tok.kind {
                Tok::EndMethods => break,
                Tok::Method => {
                    let name = self.get_name()?;
                    self.c_method(cls, &name, attrs, false)?;
                }
                Tok::Constructor => {
                    let name = {
                        let c = self.engine.class(cls);
                        format!("ctor{}_{}", c.ctors().count() + 1, c.path)
                    };
                    self.c_method(cls, &name, attrs, true)?;
                }
                _ => return Err(self.fatal(ErrorKind::ExpectedMethodCtor)),
            }
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    fn c_method(
        &mut self,
        cls: ClassId,
        name: &str,
        attrs: BlockAttrs,
        is_ctor: bool,
    ) -> ParseResult<()> {
        let line = self.lexer.line();
        if is_ctor
            && (attrs.ext != MethodExt::Final
                || attrs.vis != Visibility::Public
                || attrs.is_const
                || attrs.overrides)
        {
            self.issue(ErrorKind::CtorAttrs);
        }
        let ext = if is_ctor { MethodExt::Final } else { attrs.ext };
        let mut info = MethodInfo::new(name, Intrinsic::Void.id(), attrs.vis, ext, attrs.is_const);
        info.is_ctor = is_ctor;

        self.expect(Tok::OpenParen, false)?;
        if !self.if_peeked(Tok::CloseParen)? {
            loop {
                self.expect(Tok::OpenBracket, false)?;
                let dir = match self.next_token()?.kind {
                    Tok::In => ParmDir::In,
                    Tok::Out => ParmDir::Out,
                    Tok::InOut => ParmDir::InOut,
                    _ => return Err(self.fatal(ErrorKind::ExpectedParmAttr)),
                };
                self.expect(Tok::CloseBracket, false)?;
                let path = self.get_class_path()?;
                let pcls = self.resolve_path(&path)?;
                let pname = self.get_name()?;
                if is_ctor && dir != ParmDir::In {
                    self.issue(ErrorKind::CtorOutParm);
                }
                let dup = {
                    let eng = &*self.engine;
                    eng.class(cls).check_dup_name(eng, &pname)
                };
                if info.find_parm(&pname).is_some() {
                    self.issue(ErrorKind::DupParmName(pname));
                } else if dup {
                    self.issue(ErrorKind::DupName(pname));
                } else {
                    info.add_parm(&pname, pcls, dir);
                }
                let tok = self.next_token()?;
                match tok.kind {
                    Tok::CloseParen => break,
                    Tok::Comma => (),
                    _ => return Err(self.fatal(ErrorKind::ExpectedToken(Tok::CloseParen.text()))),
                }
            }
        }

        if self.if_peeked(Tok::Returns)? {
            let path = self.get_class_path()?;
            let ret = self.resolve_path(&path)?;
            if is_ctor {
                self.issue(ErrorKind::CtorCantReturn);
            } else {
                if !self.engine.class(ret).copyable {
                    self.issue(ErrorKind::NotCopyable);
                }
                info.ret_class = ret;
            }
        }

        let id = self.register_method(cls, &info, attrs.overrides)?;
        info.id = id;

        let mut ctx = MethodCtx {
            cls,
            info,
            imp: MethodImpl::new(name, id),
        };
        ctx.imp.add_opcode(Opcode::CurLine(line));
        self.flow.drain();
        self.in_catch = false;

        if is_ctor {
            if self.if_peeked(Tok::Colon)? {
                self.c_initializers(&mut ctx)?;
            } else {
                ctx.imp.add_opcode(Opcode::CurLine(self.lexer.line()));
                self.gen_def_parent_ctor(&mut ctx)?;
                let (first, count) = {
                    let c = self.engine.class(cls);
                    (c.first_member_id, c.members().len() as u16)
                };
                for mid in first..count {
                    self.gen_def_member_ctor(&mut ctx, mid)?;
                }
                self.expect(Tok::Begin, false)?;
            }
        } else {
            self.expect(Tok::Begin, false)?;
        }
        self.c_body(&mut ctx)?;
        self.expect(Tok::SemiColon, true)?;

        if ctx.info.ret_class != Intrinsic::Void.id() {
            let mut tail = ctx
                .imp
                .opcodes()
                .iter()
                .rev()
                .filter(|op| !matches!(op, Opcode::NoOp | Opcode::CurLine(_)));
            let returns = tail.next() == Some(&Opcode::Return)
                && tail.next() == Some(&Opcode::PopToReturn);
            if !returns {
                self.issue(ErrorKind::ExpectedReturn);
            }
        }
        for item in self.flow.drain() {
            self.issue(ErrorKind::OpenFlowStatement {
                kind: item.kind.name(),
                line: item.line,
            });
        }

        trace!(
            "{}::{}\n{}",
            self.engine.class(cls).path,
            name,
            ctx.imp.listing()
        );
        self.engine.class_mut(cls).add_method_impl(ctx.imp);
        Ok(())
    }

    /// Add `info` to `cls`, or make it the override of an inherited method, returning the id the
    /// method ends up with.
    fn register_method(
        &mut self,
        cls: ClassId,
        info: &MethodInfo,
        overrides: bool,
    ) -> ParseResult<MethodId> {
        let existing = {
            let c = self.engine.class(cls);
            c.find_method(&info.name)
                .map(|m| (m.id, m.id >= c.first_method_id, m.ext))
        };
        let name = info.name.to_string();
        match existing {
            Some((id, true, _)) => {
                self.issue(ErrorKind::DupMethod(name));
                Ok(id)
            }
            Some((id, false, ext)) => {
                if !overrides {
                    self.issue(ErrorKind::RequiresOverride(name.clone()));
                }
                if ext == MethodExt::Final {
                    self.issue(ErrorKind::ParentMethodIsFinal(name));
                    return Ok(id);
                }
                let legal = match self.engine.class_mut(cls).method_mut(id) {
                    Some(m) => m.legal_override(info),
                    None => {
                        return Err(CompileError::Internal(format!(
                            "no method with id {} in class {}",
                            id, cls
                        )))
                    }
                };
                if !legal {
                    self.issue(ErrorKind::BadOverride(name));
                }
                Ok(id)
            }
            None => {
                if overrides {
                    self.issue(ErrorKind::ParentMethNotFound(name.clone()));
                }
                let dup = {
                    let eng = &*self.engine;
                    eng.class(cls).check_dup_name(eng, &name)
                };
                if dup {
                    self.issue(ErrorKind::DupName(name));
                }
                Ok(self.engine.class_mut(cls).add_method_info(info.clone()))
            }
        }
    }

    /// Call the parent's default constructor.
    fn gen_def_parent_ctor(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        let parent = self.engine.class(ctx.cls).parent_id;
        match self.engine.class(parent).def_ctor().map(|m| m.id) {
            Some(c) => {
                ctx.imp.add_opcode(Opcode::PushTempConst(Intrinsic::Void.id()));
                ctx.imp.add_opcode(Opcode::CallParent(c));
                ctx.imp.add_opcode(Opcode::PopTop);
            }
            None => {
                let p = self.engine.class(parent).path.clone();
                self.issue(ErrorKind::NoDefCtor(p));
            }
        }
        Ok(())
    }

    /// Call the default constructor of member `mid`.
    fn gen_def_member_ctor(&mut self, ctx: &mut MethodCtx, mid: u16) -> ParseResult<()> {
        let mcls = match self.engine.class(ctx.cls).member(mid) {
            Some(m) => m.class_id,
            None => return Err(CompileError::Internal(format!("no member with id {}", mid))),
        };
        match self.engine.class(mcls).def_ctor().map(|m| m.id) {
            Some(c) => {
                ctx.imp.add_opcode(Opcode::PushTempConst(Intrinsic::Void.id()));
                ctx.imp.add_opcode(Opcode::CallMember(mid, c));
                ctx.imp.add_opcode(Opcode::PopTop);
            }
            None => {
                let p = self.engine.class(mcls).path.clone();
                self.issue(ErrorKind::NoDefCtor(p));
            }
        }
        Ok(())
    }

    /// A constructor's initializer list: `: $Parent(...); m_A(...); Begin`. The `:` has been
    /// consumed; the `Begin` is consumed here. Members not mentioned are default constructed.
    fn c_initializers(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        if self.if_peeked(Tok::Begin)? {
            self.issue(ErrorKind::NoInitializers);
            return Ok(());
        }
        let void = Intrinsic::Void.id();
        if self.if_peeked(Tok::Parent)? {
            ctx.imp.add_opcode(Opcode::CurLine(self.lexer.line()));
            ctx.imp.add_opcode(Opcode::PushTempConst(void));
            self.expect(Tok::OpenParen, false)?;
            let parent = self.engine.class(ctx.cls).parent_id;
            let (ctor, n) = self.find_correct_ctor(ctx, parent)?;
            self.expect(Tok::SemiColon, true)?;
            match ctor {
                Some(c) => {
                    ctx.imp.add_opcode(Opcode::CallParent(c));
                    ctx.imp.add_opcode(Opcode::MultiPop(n + 1));
                }
                None => self.issue(ErrorKind::NoParentCtorMatch),
            }
        } else {
            self.gen_def_parent_ctor(ctx)?;
        }

        let (mut expected, count) = {
            let c = self.engine.class(ctx.cls);
            (c.first_member_id, c.members().len() as u16)
        };
        loop {
            if self.if_peeked(Tok::Begin)? {
                break;
            }
            let name = self.get_name()?;
            let (mid, mcls) = match self.engine.class(ctx.cls).find_member(&name) {
                Some(m) => (m.id, m.class_id),
                None => return Err(self.fatal(ErrorKind::MemberNotFound(name))),
            };
            if mid < expected {
                self.issue(ErrorKind::InitOrder(name));
            } else {
                for skipped in expected..mid {
                    self.gen_def_member_ctor(ctx, skipped)?;
                }
                expected = mid + 1;
            }
            ctx.imp.add_opcode(Opcode::CurLine(self.lexer.line()));
            ctx.imp.add_opcode(Opcode::PushTempConst(void));
            self.expect(Tok::OpenParen, false)?;
            let (ctor, n) = self.find_correct_ctor(ctx, mcls)?;
            self.expect(Tok::SemiColon, true)?;
            match ctor {
                Some(c) => {
                    ctx.imp.add_opcode(Opcode::CallMember(mid, c));
                    ctx.imp.add_opcode(Opcode::MultiPop(n + 1));
                }
                None => self.issue(ErrorKind::NoCtorMatch),
            }
        }
        for mid in expected..count {
            self.gen_def_member_ctor(ctx, mid)?;
        }
        Ok(())
    }

    /// Parse a constructor call's parameters (the `(` has been consumed) and choose the
    /// constructor of `cls` which best matches them. Numeric literals passed to the chosen
    /// constructor are retyped to its parameters' types. Returns the constructor, if one
    /// matched, and the number of parameters parsed.
    fn find_correct_ctor(
        &mut self,
        ctx: &mut MethodCtx,
        cls: ClassId,
    ) -> ParseResult<(Option<MethodId>, u32)> {
        let mut parms: Vec<(ExprResult, usize)> = Vec::new();
        loop {
            if self.if_peeked(Tok::CloseParen)? {
                break;
            }
            if !parms.is_empty() {
                self.expect(Tok::Comma, true)?;
            }
            let r = self.c_expr(ctx, Side::Rhs)?;
            parms.push((r, ctx.imp.cur_offset().saturating_sub(1)));
        }

        let candidates = self.engine.class(cls).ctor_parm_list();
        let mut best: Option<(MethodId, usize, &Vec<ClassId>)> = None;
        let mut ambiguous = false;
        for (id, classes) in candidates.iter().filter(|(_, c)| c.len() == parms.len()) {
            let mut score = 0;
            let mut ok = true;
            for ((r, off), want) in parms.iter().zip(classes.iter()) {
                if r.class_id == *want {
                    score += 1;
                } else if !(self.engine.is_derived_from(r.class_id, *want)
                    || self.engine.are_equiv_cols(*want, r.class_id, false)
                    || (r.kind == ExprKind::NumLiteral
                        && self.literal_fits(ctx, *off, *want).is_some()))
                {
                    ok = false;
                    break;
                }
            }
            if !ok {
                continue;
            }
            match best {
                Some((_, s, _)) if s > score => (),
                Some((_, s, _)) if s == score => {
                    ambiguous = true;
                    best = Some((*id, score, classes));
                }
                _ => {
                    ambiguous = false;
                    best = Some((*id, score, classes));
                }
            }
        }
        if ambiguous {
            self.issue(ErrorKind::AmbiguousOverload);
        }

        let n = parms.len() as u32;
        let (id, classes) = match best {
            Some((id, _, classes)) => (id, classes.clone()),
            None => return Ok((None, n)),
        };
        for ((r, off), want) in parms.iter().zip(classes.iter()) {
            if r.kind == ExprKind::NumLiteral && r.class_id != *want {
                if let Some(op) = self.literal_fits(ctx, *off, *want) {
                    ctx.imp.replace_at(*off, op)?;
                }
            }
        }
        Ok((Some(id), n))
    }

    /// If the opcode at `off` pushes a numeric immediate representable as class `want`, return
    /// the opcode which pushes it as that class.
    fn literal_fits(&self, ctx: &MethodCtx, off: usize, want: ClassId) -> Option<Opcode> {
        let ty = self.engine.xlat_num_type(want)?;
        ctx.imp
            .opcodes()
            .get(off)
            .and_then(Value::from_opcode)
            .and_then(|v| v.convert_num(ty))
            .and_then(|v| v.im_opcode())
    }

    /// A `Locals=[...] ... EndLocals;` block. The `Locals` has been consumed.
    fn c_locals(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        let is_const = self.const_attrs(ErrorKind::ExpectedLocalAttr)?;
        loop {
            if self.if_peeked(Tok::EndLocals)? {
                break;
            }
            let path = self.get_class_path()?;
            let lcls = self.resolve_path(&path)?;
            self.check_class_usable(lcls, ctx.cls)?;
            let name = self.get_name()?;
            let dup = {
                let eng = &*self.engine;
                eng.class(ctx.cls).check_dup_name(eng, &name)
                    || ctx.info.find_parm(&name).is_some()
                    || ctx.imp.find_local(&name).is_some()
            };
            let local = if dup {
                self.issue(ErrorKind::DupName(name));
                None
            } else {
                Some(ctx.imp.add_local(&name, lcls, is_const))
            };

            ctx.imp.add_opcode(Opcode::CurLine(self.lexer.line()));
            ctx.imp.add_opcode(Opcode::PushTempConst(Intrinsic::Void.id()));
            let (ctor, n) = if self.if_peeked(Tok::OpenParen)? {
                self.find_correct_ctor(ctx, lcls)?
            } else {
                (self.engine.class(lcls).def_ctor().map(|m| m.id), 0)
            };
            self.expect(Tok::SemiColon, true)?;
            match (ctor, local) {
                (None, _) => self.issue(ErrorKind::NoCtorMatch),
                (Some(c), Some(lid)) => {
                    ctx.imp.add_opcode(Opcode::CallLocal(lid, c));
                }
                (Some(_), None) => (),
            }
            ctx.imp.add_opcode(Opcode::MultiPop(n + 1));
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// Parse a parenthesised condition, which must be Boolean.
    fn c_cond(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        self.expect(Tok::OpenParen, false)?;
        let r = self.c_expr(ctx, Side::Rhs)?;
        self.expect(Tok::CloseParen, true)?;
        if r.class_id != Intrinsic::Boolean.id() {
            self.issue(ErrorKind::ExpectedBoolExpr);
        }
        Ok(())
    }

    /// Check that `seen` legally ends (or continues) the innermost flow statement. A mismatch
    /// is unrecoverable.
    fn flow_check(&mut self, seen: Tok, pop: bool) -> ParseResult<FlowItem> {
        match self.flow.check(seen, pop) {
            Ok(item) => Ok(item),
            Err(k) => Err(self.fatal(k)),
        }
    }

    fn patch_to_here(&mut self, ctx: &mut MethodCtx, offs: &[usize]) -> ParseResult<()> {
        let cur = ctx.imp.cur_offset();
        for off in offs {
            ctx.imp.set_jump_target(*off, cur)?;
        }
        Ok(())
    }

    /// A method body, up to and including its `EndMethod` or `EndConstructor`. The `Begin` has
    /// been consumed.
    fn c_body(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        self.in_catch = false;
        while self.if_peeked(Tok::Locals)? {
            self.c_locals(ctx)?;
        }
        let mut cur_line = 0;
        loop {
            let tok = self.next_token()?;
            if tok.line != cur_line {
                cur_line = tok.line;
                ctx.imp.add_opcode(Opcode::CurLine(cur_line));
            }
            match tok.kind {
                Tok::EndMethod => {
                    if ctx.info.is_ctor {
                        self.issue(ErrorKind::ExpectedEndCtor);
                    }
                    break;
                }
                Tok::EndConstructor => {
                    if !ctx.info.is_ctor {
                        self.issue(ErrorKind::ExpectedEndMethod);
                    }
                    break;
                }
                Tok::Break => {
                    let jump = ctx.imp.add_opcode(Opcode::Jump(0));
                    match self.flow.last_looped_mut() {
                        Some(item) => item.breaks.push(jump),
                        None => self.issue(ErrorKind::UnexpectedBreak),
                    }
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Case | Tok::FTCase | Tok::Default => {
                    self.flow_check(tok.kind, false)?;
                    if self.flow.top().map(|i| i.kind) == Some(FlowKind::EndCase) {
                        self.flow.pop();
                    }
                    self.c_switch_case(ctx, tok.kind)?;
                }
                Tok::EndCase => {
                    let item = self.flow_check(Tok::EndCase, true)?;
                    if item.kind == FlowKind::Case {
                        let jump = ctx.imp.add_opcode(Opcode::Jump(0));
                        match self.flow.top_mut() {
                            Some(sw) if sw.kind == FlowKind::Switch => sw.breaks.push(jump),
                            _ => {
                                return Err(CompileError::Internal(
                                    "case outside a switch".to_owned(),
                                ))
                            }
                        }
                    }
                    self.flow.push(FlowKind::EndCase, 0, tok.line);
                    self.expect(Tok::SemiColon, true)?;
                    match self.peek_token()?.kind {
                        Tok::Case | Tok::FTCase | Tok::Default | Tok::EndSwitch => (),
                        _ => return Err(self.fatal(ErrorKind::ExpectedCaseOrEnd)),
                    }
                }
                Tok::EndSwitch => {
                    self.flow_check(Tok::EndSwitch, true)?;
                    let sw = match self.flow.pop() {
                        Some(sw) if sw.kind == FlowKind::Switch => sw,
                        _ => {
                            return Err(CompileError::Internal(
                                "EndSwitch without a switch".to_owned(),
                            ))
                        }
                    };
                    self.patch_to_here(ctx, &sw.breaks)?;
                    let complete = ctx
                        .imp
                        .jump_table(sw.offset2)
                        .map_or(false, |t| t.has_required_items());
                    if !complete {
                        self.issue(ErrorKind::RequiredCases);
                    }
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Switch => {
                    self.expect(Tok::OpenParen, false)?;
                    let r = self.c_expr(ctx, Side::Rhs)?;
                    self.expect(Tok::CloseParen, true)?;
                    let swcls = r.class_id;
                    let legal = swcls == Intrinsic::Char.id()
                        || self.engine.is_enum_class(swcls)
                        || self
                            .engine
                            .xlat_num_type(swcls)
                            .map_or(false, |t| !t.is_float());
                    if !legal {
                        self.issue(ErrorKind::BadSwitchType);
                    }
                    let idx = ctx.imp.add_jump_table();
                    let off = ctx.imp.add_opcode(Opcode::TableJump(idx, swcls));
                    self.flow.push(FlowKind::Switch, off, tok.line).offset2 = idx;
                }
                Tok::If => {
                    self.c_cond(ctx)?;
                    let jump = ctx.imp.add_opcode(Opcode::NotCondJump(0));
                    self.flow.push(FlowKind::If, jump, tok.line);
                }
                Tok::ElseIf => {
                    let item = self.flow_check(Tok::ElseIf, true)?;
                    let mut ends = item.breaks;
                    ends.push(ctx.imp.add_opcode(Opcode::Jump(0)));
                    self.patch_to_here(ctx, &[item.offset1])?;
                    self.c_cond(ctx)?;
                    let jump = ctx.imp.add_opcode(Opcode::NotCondJump(0));
                    self.flow.push(FlowKind::ElseIf, jump, tok.line).breaks = ends;
                }
                Tok::Else => {
                    let item = self.flow_check(Tok::Else, true)?;
                    let mut ends = item.breaks;
                    ends.push(ctx.imp.add_opcode(Opcode::Jump(0)));
                    self.patch_to_here(ctx, &[item.offset1])?;
                    self.flow.push(FlowKind::Else, 0, tok.line).breaks = ends;
                }
                Tok::EndIf => {
                    let item = self.flow_check(Tok::EndIf, true)?;
                    if item.kind != FlowKind::Else {
                        self.patch_to_here(ctx, &[item.offset1])?;
                    }
                    self.patch_to_here(ctx, &item.breaks)?;
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::While => {
                    let top = ctx.imp.cur_offset();
                    self.c_cond(ctx)?;
                    let jump = ctx.imp.add_opcode(Opcode::NotCondJump(0));
                    self.flow.push(FlowKind::While, top, tok.line).offset2 = jump;
                }
                Tok::EndWhile => {
                    let item = self.flow_check(Tok::EndWhile, true)?;
                    ctx.imp.add_opcode(Opcode::Jump(item.offset1));
                    self.patch_to_here(ctx, &[item.offset2])?;
                    self.patch_to_here(ctx, &item.breaks)?;
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::DoLoop => {
                    let top = ctx.imp.cur_offset();
                    self.flow.push(FlowKind::DoLoop, top, tok.line);
                }
                Tok::DoWhile => {
                    let item = self.flow_check(Tok::DoWhile, true)?;
                    self.c_cond(ctx)?;
                    ctx.imp.add_opcode(Opcode::CondJump(item.offset1));
                    self.patch_to_here(ctx, &item.breaks)?;
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::ForEach => {
                    self.expect(Tok::OpenParen, false)?;
                    let r = self.c_expr(ctx, Side::Rhs)?;
                    self.expect(Tok::CloseParen, true)?;
                    if !self.engine.is_enum_class(r.class_id) {
                        self.issue(ErrorKind::ExpectedEnumObj);
                    } else if !r.direct {
                        self.issue(ErrorKind::MustBeObjRef);
                    } else if r.kind != ExprKind::ObjectRef {
                        self.issue(ErrorKind::NCOpOnConstObj);
                    }
                    // The enum stays on the stack for the whole loop.
                    ctx.imp.add_opcode(Opcode::ResetEnum);
                    let top = ctx.imp.cur_offset();
                    self.flow.push(FlowKind::ForEach, top, tok.line);
                }
                Tok::EndForEach => {
                    let item = self.flow_check(Tok::EndForEach, true)?;
                    ctx.imp.add_opcode(Opcode::CondEnumInc);
                    ctx.imp.add_opcode(Opcode::CondJump(item.offset1));
                    self.patch_to_here(ctx, &item.breaks)?;
                    ctx.imp.add_opcode(Opcode::PopTop);
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Try => {
                    let off = ctx.imp.add_opcode(Opcode::Try(0));
                    self.flow.push(FlowKind::Try, off, tok.line);
                }
                Tok::EndTry => {
                    let item = self.flow_check(Tok::EndTry, true)?;
                    // Pop the try marker pushed by Try before skipping the catch block.
                    ctx.imp.add_opcode(Opcode::PopTop);
                    let jump = ctx.imp.add_opcode(Opcode::Jump(0));
                    self.flow
                        .push(FlowKind::EndTry, item.offset1, item.line)
                        .offset2 = jump;
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Catch => {
                    let item = self.flow_check(Tok::Catch, true)?;
                    self.patch_to_here(ctx, &[item.offset1])?;
                    self.flow.push(FlowKind::Catch, 0, tok.line).offset2 = item.offset2;
                    self.in_catch = true;
                }
                Tok::EndCatch => {
                    let item = self.flow_check(Tok::EndCatch, true)?;
                    self.patch_to_here(ctx, &[item.offset2])?;
                    self.in_catch = self.flow.last_of(FlowKind::Catch).is_some();
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Rethrow => {
                    if !self.in_catch {
                        self.issue(ErrorKind::OnlyInCatch);
                    }
                    ctx.imp.add_opcode(Opcode::PushException);
                    ctx.imp.add_opcode(Opcode::Throw(true));
                    self.expect(Tok::SemiColon, true)?;
                }
                Tok::Throw => self.c_throw(ctx)?,
                Tok::Return => self.c_return(ctx)?,
                Tok::NoMatch | Tok::This | Tok::Parent | Tok::Exception => {
                    self.push_back(&tok);
                    self.c_expr(ctx, Side::Lhs)?;
                    self.expect(Tok::SemiColon, true)?;
                }
                _ => return Err(self.fatal(ErrorKind::ExpectedStatement)),
            }
        }
        ctx.imp.add_opcode(Opcode::NoOp);
        Ok(())
    }

    /// `Throw(ErrEnum.Value[, token, ...]);`. The `Throw` has been consumed.
    fn c_throw(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        self.expect(Tok::OpenParen, false)?;
        let r = self.c_expr(ctx, Side::Rhs)?;
        if !self.engine.is_enum_class(r.class_id) {
            self.issue(ErrorKind::ThrowType);
        }
        let mut ntokens = 0;
        while self.if_peeked(Tok::Comma)? {
            let t = self.c_expr(ctx, Side::Rhs)?;
            if !self
                .engine
                .is_derived_from(t.class_id, Intrinsic::Formattable.id())
            {
                self.issue(ErrorKind::ThrowFmtType);
            }
            ntokens += 1;
            if ntokens == MAX_THROW_TOKENS + 1 {
                self.issue(ErrorKind::TooManyThrowTokens);
            }
        }
        self.expect(Tok::CloseParen, true)?;
        self.expect(Tok::SemiColon, true)?;
        if ntokens == 0 {
            ctx.imp.add_opcode(Opcode::Throw(false));
        } else {
            ctx.imp.add_opcode(Opcode::ThrowFmt(ntokens));
        }
        Ok(())
    }

    /// `Return;` or `Return expr;`. The `Return` has been consumed.
    fn c_return(&mut self, ctx: &mut MethodCtx) -> ParseResult<()> {
        let ret = ctx.info.ret_class;
        if ret == Intrinsic::Void.id() {
            if !self.if_peeked(Tok::SemiColon)? {
                self.issue(ErrorKind::NotRetClass);
                self.c_expr(ctx, Side::Rhs)?;
                self.expect(Tok::SemiColon, true)?;
            }
            ctx.imp.add_opcode(Opcode::Return);
            return Ok(());
        }
        let r = self.c_expr(ctx, Side::Rhs)?;
        if !self.engine.is_derived_from(r.class_id, ret)
            && !(r.kind == ExprKind::NumLiteral && self.convert_last(ctx, ret)?)
            && !self.engine.are_equiv_cols(ret, r.class_id, true)
        {
            self.issue(ErrorKind::NotRetClass);
        }
        ctx.imp.add_opcode(Opcode::PopToReturn);
        ctx.imp.add_opcode(Opcode::Return);
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// The values of a `Case` or `FTCase`, or a `Default`, up to and including the `:`. The
    /// keyword has been consumed.
    fn c_switch_case(&mut self, ctx: &mut MethodCtx, kind: Tok) -> ParseResult<()> {
        let (table, swcls) = {
            let off = match self.flow.last_of(FlowKind::Switch) {
                Some(sw) => sw.offset1,
                None => return Err(CompileError::Internal("case outside a switch".to_owned())),
            };
            match ctx.imp.opcodes().get(off) {
                Some(Opcode::TableJump(idx, cls)) => (*idx, *cls),
                _ => {
                    return Err(CompileError::Internal(
                        "switch does not start with a table jump".to_owned(),
                    ))
                }
            }
        };
        let here = ctx.imp.cur_offset();
        let line = self.lexer.line();

        if kind == Tok::Default {
            let fresh = ctx
                .imp
                .jump_table_mut(table)
                .map_or(false, |t| t.set_default(here));
            if !fresh {
                self.issue(ErrorKind::AlreadyDefCase);
            }
            self.expect(Tok::Colon, true)?;
            self.flow.push(FlowKind::Case, here, line);
            return Ok(());
        }

        let mut nvals = 0;
        loop {
            if self.if_peeked(Tok::Colon)? {
                break;
            }
            if nvals > 0 && !self.if_peeked(Tok::Comma)? {
                self.issue(ErrorKind::ExpectedToken(Tok::Comma.text()));
            }
            let tok = self.next_token()?;
            let val = match tok.kind {
                Tok::CharLiteral => match escape_char(&tok.text) {
                    Ok(c) => Value::Char(c),
                    Err(k) => {
                        self.issue(k);
                        Value::Char('\0')
                    }
                },
                Tok::NumericLiteral => {
                    let ty = self.engine.xlat_num_type(swcls);
                    match make_numeric_literal(&tok.text, ty) {
                        Some(lit) => {
                            if lit.out_of_range {
                                self.issue(ErrorKind::NumRangeErr(tok.text.clone()));
                            }
                            lit.value
                        }
                        None => {
                            self.issue(ErrorKind::CantConvertLiteral);
                            nvals += 1;
                            continue;
                        }
                    }
                }
                Tok::NoMatch => match self.resolve_ref(ctx, &tok)? {
                    NameRef::EnumConst { class_id, ordinal } => Value::Enum {
                        class: class_id,
                        ordinal,
                    },
                    NameRef::Literal(v) => v,
                    _ => return Err(self.fatal(ErrorKind::CantConvertLiteral)),
                },
                _ => {
                    self.issue(ErrorKind::CaseMustBeLiteral);
                    nvals += 1;
                    continue;
                }
            };
            nvals += 1;
            if val.class_id() != swcls {
                self.issue(ErrorKind::NotSwitchType);
                continue;
            }
            let added = ctx
                .imp
                .jump_table_mut(table)
                .map_or(false, |t| t.add_case(val.clone(), here));
            if !added {
                self.issue(ErrorKind::CaseIsUsed(val.to_string()));
            }
        }
        if nvals == 0 {
            self.issue(ErrorKind::NoCaseValue);
        }
        let fk = if kind == Tok::FTCase {
            FlowKind::FTCase
        } else {
            FlowKind::Case
        };
        self.flow.push(fk, here, line);
        Ok(())
    }
}
