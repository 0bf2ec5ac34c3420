// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The class level of the parser: the class header and every section up to the methods blocks,
//! plus the loading of parent and imported classes, which are compiled recursively with the same
//! parser.

use std::mem;

use log::debug;

use crate::{
    compiler::{
        error::{CompileError, Diagnostic, ErrorKind, ParseEvents, Severity},
        flow::FlowStack,
        lexer::{escape_char, escape_str, Lexer},
        numeric::make_numeric_literal,
        tokens::{Tok, Token},
    },
    engine::{
        class::{ClassExt, ClassInfo, ClassKind, ColKind, LiteralVal},
        intrinsics::{
            collection_methods, enum_methods, split_class_path, Intrinsic, ARRAY_PATH,
            INTRINSIC_COUNT, VECTOR_PATH,
        },
        method::MethodExt,
        source::ClassSource,
        value::Value,
        ClassId, ClassMatch, Engine, LoadState,
    },
};

pub(super) type ParseResult<T> = Result<T, CompileError>;

pub(super) struct Parser<'a> {
    pub(super) engine: &'a mut Engine,
    source: &'a mut dyn ClassSource,
    events: &'a mut dyn ParseEvents,
    /// How many errors (of any severity other than warning) have been reported.
    pub(super) err_count: usize,
    /// The paths of the classes currently being compiled, outermost first.
    nesting: Vec<String>,
    pub(super) lexer: Lexer,
    /// The path of the class currently being compiled.
    pub(super) class_path: String,
    pub(super) flow: FlowStack,
    pub(super) in_catch: bool,
}

impl<'a> Parser<'a> {
    pub(super) fn new(
        engine: &'a mut Engine,
        source: &'a mut dyn ClassSource,
        events: &'a mut dyn ParseEvents,
    ) -> Self {
        Parser {
            engine,
            source,
            events,
            err_count: 0,
            nesting: Vec::new(),
            lexer: Lexer::new("", false),
            class_path: String::new(),
            flow: FlowStack::new(),
            in_catch: false,
        }
    }

    fn report(&mut self, severity: Severity, kind: ErrorKind) {
        if severity != Severity::Warning {
            self.err_count += 1;
        }
        let diag = Diagnostic {
            severity,
            kind,
            line: self.lexer.line(),
            col: self.lexer.col(),
            class_path: self.class_path.clone(),
        };
        self.events.parse_event(diag);
    }

    /// Report a recoverable error at the most recently read token.
    pub(super) fn issue(&mut self, kind: ErrorKind) {
        self.report(Severity::Error, kind);
    }

    /// Report an unrecoverable error, returning the error which aborts compilation.
    pub(super) fn fatal(&mut self, kind: ErrorKind) -> CompileError {
        self.report(Severity::Fatal, kind);
        CompileError::Unrecoverable
    }

    /// Lexing errors are always unrecoverable.
    fn lexed<T>(&mut self, r: Result<T, ErrorKind>) -> ParseResult<T> {
        match r {
            Ok(x) => Ok(x),
            Err(k) => Err(self.fatal(k)),
        }
    }

    pub(super) fn next_token(&mut self) -> ParseResult<Token> {
        let r = self.lexer.next_token(false);
        self.lexed(r)
    }

    fn next_token_eof(&mut self) -> ParseResult<Token> {
        let r = self.lexer.next_token(true);
        self.lexed(r)
    }

    pub(super) fn peek_token(&mut self) -> ParseResult<Token> {
        let r = self.lexer.peek_token();
        self.lexed(r)
    }

    pub(super) fn if_peeked(&mut self, kind: Tok) -> ParseResult<bool> {
        let r = self.lexer.if_peeked(kind);
        self.lexed(r)
    }

    pub(super) fn push_back(&mut self, tok: &Token) {
        self.lexer.push_back_token(tok);
    }

    /// Check that the next token is `kind`. If it isn't and `recover` is true, an error is
    /// reported, the token is left in place and `false` returned; otherwise compilation stops.
    pub(super) fn expect(&mut self, kind: Tok, recover: bool) -> ParseResult<bool> {
        let tok = self.next_token()?;
        if tok.kind == kind {
            return Ok(true);
        }
        if recover {
            self.issue(ErrorKind::ExpectedToken(kind.text()));
            self.push_back(&tok);
            Ok(false)
        } else {
            Err(self.fatal(ErrorKind::ExpectedToken(kind.text())))
        }
    }

    /// Read a name (of a member, local, method, etc.).
    pub(super) fn get_name(&mut self) -> ParseResult<String> {
        let tok = self.next_token()?;
        if tok.kind != Tok::NoMatch {
            if Tok::keyword(&tok.text) == Some(tok.kind) {
                self.issue(ErrorKind::ReservedWord(tok.text.clone()));
                return Ok(tok.text);
            }
            return Err(self.fatal(ErrorKind::ExpectedName));
        }
        let mut chars = tok.text.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() => {
                if !chars.all(|c| c.is_alphanumeric() || c == '_') {
                    self.issue(ErrorKind::BadNameChar(tok.text.clone()));
                }
            }
            _ => self.issue(ErrorKind::FirstNameChar(tok.text.clone())),
        }
        Ok(tok.text)
    }

    /// Read a class path: one or more names separated by periods. Only the first part has to be
    /// a non-keyword, so that paths such as `MEng.Enum` can be written.
    pub(super) fn get_class_path(&mut self) -> ParseResult<String> {
        let first = self.next_token()?;
        if first.kind != Tok::NoMatch {
            return Err(self.fatal(ErrorKind::ExpectedClassPath));
        }
        let mut path = first.text;
        let mut after_dot = false;
        loop {
            if self.if_peeked(Tok::Period)? {
                if after_dot {
                    self.issue(ErrorKind::EmptyPathPart);
                }
                path.push('.');
                after_dot = true;
                continue;
            }
            if !after_dot {
                break;
            }
            let tok = self.next_token()?;
            if tok.kind == Tok::NoMatch || Tok::keyword(&tok.text) == Some(tok.kind) {
                path.push_str(&tok.text);
                after_dot = false;
            } else {
                self.push_back(&tok);
                self.issue(ErrorKind::TrailPathPart);
                path.pop();
                break;
            }
        }
        let legal = path.split('.').filter(|p| !p.is_empty()).all(|part| {
            let mut chars = part.chars();
            chars.next().map_or(false, |c| c.is_alphabetic())
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        });
        if !legal {
            self.issue(ErrorKind::BadClassPathChar(path.clone()));
        }
        Ok(path)
    }

    /// Read a quoted string, processing its escapes.
    pub(super) fn get_quoted(&mut self) -> ParseResult<String> {
        let tok = self.next_token()?;
        if tok.kind != Tok::QuotedString {
            return Err(self.fatal(ErrorKind::ExpectedLitStr));
        }
        Ok(escape_str(&tok.text))
    }

    /// Turn a possibly partial class name into a class id.
    pub(super) fn resolve_path(&mut self, path: &str) -> ParseResult<ClassId> {
        match self.engine.resolve_class_name(path) {
            ClassMatch::Unique(id) => Ok(id),
            ClassMatch::NotFound => Err(self.fatal(ErrorKind::ClassNotFound(path.to_owned()))),
            ClassMatch::Ambiguous(_) => {
                Err(self.fatal(ErrorKind::AmbiguousClass(path.to_owned())))
            }
        }
    }

    /// Check that objects of class `cls` can be declared in class `target`: the class must be
    /// visible to `target` and must not be abstract.
    pub(super) fn check_class_usable(&mut self, cls: ClassId, target: ClassId) -> ParseResult<()> {
        let (path, visible, abs) = {
            let eng = &*self.engine;
            let c = eng.class(cls);
            (
                c.path.clone(),
                eng.is_intrinsic_class(cls) || eng.class(target).imports_class(&c.path),
                c.ext == ClassExt::Abstract,
            )
        };
        if !visible {
            self.issue(ErrorKind::ClassNotImported(path));
        }
        if abs {
            return Err(self.fatal(ErrorKind::AbstractClass));
        }
        Ok(())
    }

    /// Parse optional `[Const|NonConst, ...]` attributes, returning whether the block is const.
    pub(super) fn const_attrs(&mut self, err: ErrorKind) -> ParseResult<bool> {
        let mut is_const = false;
        if !self.if_peeked(Tok::OpenBracket)? {
            return Ok(false);
        }
        loop {
            let tok = self.next_token()?;
            match tok.kind {
                Tok::Const => is_const = true,
                Tok::NonConst => is_const = false,
                _ => self.issue(err.clone()),
            }
            if self.if_peeked(Tok::CloseBracket)? {
                break;
            }
            self.expect(Tok::Comma, true)?;
        }
        Ok(is_const)
    }

    /// Compile `class_path`, the class the user asked for.
    pub(super) fn c_main(&mut self, class_path: &str) -> ParseResult<ClassId> {
        match self.source.load_class(class_path) {
            Some(text) => self.c_nested(class_path, &text),
            None => {
                self.class_path = class_path.to_owned();
                let e = self.fatal(ErrorKind::ClassNotFound(class_path.to_owned()));
                self.events.parse_exception(class_path, &e);
                Err(e)
            }
        }
    }

    /// Make sure `path` is loaded, compiling it if it hasn't been already. Returns `None` if
    /// there is no such class.
    pub(super) fn check_class_load(&mut self, path: &str) -> ParseResult<Option<ClassId>> {
        if self.engine.load_state(path) == LoadState::InProgress
            || self.nesting.iter().any(|p| p == path)
        {
            return Err(self.fatal(ErrorKind::CircularImport(path.to_owned())));
        }
        if let Some(id) = self.engine.find_class(path) {
            return Ok(Some(id));
        }
        match self.source.load_class(path) {
            Some(text) => self.c_nested(path, &text).map(Some),
            None => Ok(None),
        }
    }

    /// Compile the class `path`, whose source is `text`, saving and restoring the state of
    /// whatever class is currently being compiled.
    fn c_nested(&mut self, path: &str, text: &str) -> ParseResult<ClassId> {
        debug!("Compiling {}", path);
        let depth = self.nesting.len();
        let lexer = Lexer::new(text, self.engine.config.debug_mode);
        let old_lexer = mem::replace(&mut self.lexer, lexer);
        let old_path = mem::replace(&mut self.class_path, path.to_owned());
        let r = self.c_class();
        self.nesting.truncate(depth);
        self.lexer = old_lexer;
        self.class_path = old_path;
        let state = if self.engine.find_class(path).is_some() {
            LoadState::Complete
        } else {
            LoadState::NotStarted
        };
        self.engine.set_load_state(path, state);
        match r {
            Ok(id) => {
                debug!("Finished compiling {}", path);
                Ok(id)
            }
            Err(e) => {
                self.events.parse_exception(path, &e);
                Err(e)
            }
        }
    }

    /// Turn a class path as written into the path of a known class, if possible.
    fn full_path(&self, path: &str) -> String {
        match self.engine.resolve_class_name(path) {
            ClassMatch::Unique(id) => self.engine.class(id).path.clone(),
            _ => path.to_owned(),
        }
    }

    fn c_class(&mut self) -> ParseResult<ClassId> {
        self.expect(Tok::Class, false)?;
        self.expect(Tok::EqualSign, false)?;
        let mut ext = ClassExt::NonFinal;
        if self.if_peeked(Tok::OpenBracket)? {
            let tok = self.next_token()?;
            ext = match tok.kind {
                Tok::Abstract => ClassExt::Abstract,
                Tok::Final => ClassExt::Final,
                Tok::NonFinal => ClassExt::NonFinal,
                _ => return Err(self.fatal(ErrorKind::ExpectedClassAttr)),
            };
            self.expect(Tok::CloseBracket, false)?;
        }
        self.expect(Tok::ClassPath, false)?;
        let path = self.get_class_path()?;
        if path != self.class_path {
            let expected = self.class_path.clone();
            return Err(self.fatal(ErrorKind::ClassPathMatch {
                expected,
                found: path,
            }));
        }
        self.expect(Tok::SemiColon, true)?;
        if self.engine.load_state(&path) == LoadState::InProgress
            || self.nesting.iter().any(|p| *p == path)
        {
            return Err(self.fatal(ErrorKind::CircularImport(path)));
        }
        self.nesting.push(path.clone());
        self.engine.set_load_state(&path, LoadState::InProgress);

        self.expect(Tok::ParentClass, false)?;
        let parent_path = self.get_class_path()?;
        let parent_path = self.full_path(&parent_path);
        self.expect(Tok::SemiColon, true)?;
        let parent = match self.check_class_load(&parent_path)? {
            Some(id) => id,
            None => return Err(self.fatal(ErrorKind::ParentFailed(parent_path))),
        };
        self.expect(Tok::EndClass, false)?;
        self.expect(Tok::SemiColon, true)?;
        if self.engine.class(parent).ext == ClassExt::Final {
            self.issue(ErrorKind::ParentClassIsFinal(parent_path));
        }
        if self.engine.find_class(&path).is_some() {
            return Err(self.fatal(ErrorKind::DupClassName(path)));
        }

        let (base, name) = split_class_path(&path);
        let mut cls = ClassInfo::new(name, base, parent, ClassKind::Standard);
        cls.ext = ext;
        cls.base_init(self.engine.class(parent));
        let id = self.engine.add_class(cls);
        for i in 0..INTRINSIC_COUNT {
            self.engine.export_to(i, id);
        }
        self.engine.export_to(parent, id);

        if self.if_peeked(Tok::Directives)? {
            self.c_directives(id)?;
        }
        if self.if_peeked(Tok::Imports)? {
            self.c_imports(id)?;
        }
        if self.if_peeked(Tok::Types)? {
            self.c_types(id)?;
        }
        if self.if_peeked(Tok::Literals)? {
            self.c_literals(id)?;
        }
        while self.if_peeked(Tok::Members)? {
            self.c_members(id)?;
        }
        self.expect(Tok::Methods, false)?;
        self.c_methods(id)?;
        loop {
            let tok = self.next_token_eof()?;
            match tok.kind {
                Tok::Eof => break,
                Tok::Methods => self.c_methods(id)?,
                _ => return Err(self.fatal(ErrorKind::ExpectedToken(Tok::Methods.text()))),
            }
        }
        self.validate_class(id);
        Ok(id)
    }

    fn c_directives(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        loop {
            if self.if_peeked(Tok::EndDirectives)? {
                break;
            }
            let name = self.get_name()?;
            if !self.if_peeked(Tok::EqualSign)? {
                self.issue(ErrorKind::ExpectedDirective);
                self.lexer.eat_line_remainder();
                continue;
            }
            let value = self.get_quoted()?;
            self.expect(Tok::SemiColon, true)?;
            if !self.engine.class_mut(cls).add_directive(&name, value) {
                self.issue(ErrorKind::DupDirective(name));
            }
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    fn c_imports(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        loop {
            if self.if_peeked(Tok::EndImports)? {
                break;
            }
            let path = if self.if_peeked(Tok::DynTypeRef)? {
                self.c_dyn_type_ref(cls)?
            } else {
                self.get_class_path()?
            };
            self.expect(Tok::SemiColon, true)?;
            let path = self.full_path(&path);
            let id = match self.check_class_load(&path)? {
                Some(id) => id,
                None => return Err(self.fatal(ErrorKind::ClassNotFound(path))),
            };
            debug!("{} imports {}", self.class_path, path);
            self.engine.export_to(id, cls);
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// Parse the parenthesised part of a `DynTypeRef`, returning the class path it refers to.
    fn c_dyn_type_ref(&mut self, cls: ClassId) -> ParseResult<String> {
        self.expect(Tok::OpenParen, false)?;
        let tok = self.next_token()?;
        let path = match tok.kind {
            Tok::QuotedString => {
                let s = escape_str(&tok.text);
                if s.eq_ignore_ascii_case("$DynTypeRef") {
                    match self.engine.config.special_dyn_ref.clone() {
                        Some(p) if !p.is_empty() => p,
                        _ => return Err(self.fatal(ErrorKind::EmptySpecDynRef)),
                    }
                } else {
                    s
                }
            }
            Tok::NoMatch => {
                self.push_back(&tok);
                let lit_path = self.get_class_path()?;
                let val = match lit_path.rfind('.') {
                    Some(i) => {
                        let owner = self.resolve_path(&lit_path[..i])?;
                        let eng = &*self.engine;
                        eng.class(owner)
                            .find_literal(eng, &lit_path[i + 1..], false)
                            .map(|l| l.value.clone())
                    }
                    None => {
                        let eng = &*self.engine;
                        eng.class(cls)
                            .find_literal(eng, &lit_path, true)
                            .map(|l| l.value.clone())
                    }
                };
                match val {
                    Some(Value::String(s)) => s,
                    _ => return Err(self.fatal(ErrorKind::ExpectedLitStr)),
                }
            }
            _ => return Err(self.fatal(ErrorKind::ExpectedLitStr)),
        };
        self.expect(Tok::CloseParen, false)?;
        if path.is_empty() {
            return Err(self.fatal(ErrorKind::CantResolvePath(tok.text)));
        }
        debug!("Dynamic type reference resolved to {}", path);
        Ok(path)
    }

    fn c_types(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        loop {
            let tok = self.next_token()?;
            match tok.kind {
                Tok::EndTypes => break,
                Tok::Enum => self.c_enum(cls)?,
                Tok::VectorOf => self.c_collection(cls, ColKind::Vector)?,
                Tok::ArrayOf => self.c_collection(cls, ColKind::Array)?,
                _ => return Err(self.fatal(ErrorKind::ExpectedNestedType)),
            }
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// Register a newly parsed nested type of `owner`.
    fn add_nested(&mut self, owner: ClassId, cls: ClassInfo) {
        let path = cls.path.clone();
        let id = self.engine.add_class(cls);
        debug!("Registered nested type {}", path);
        self.engine.class_mut(owner).set_nested(&path);
        self.engine.export_to(id, owner);
    }

    fn c_enum(&mut self, owner: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        let name = self.get_name()?;
        self.expect(Tok::SemiColon, true)?;
        let owner_path = self.engine.class(owner).path.clone();
        let enum_id = Intrinsic::Enum.id();
        let mut cls = ClassInfo::new(&name, &owner_path, enum_id, ClassKind::Enum(Vec::new()));
        cls.base_init(self.engine.class(enum_id));
        cls.ext = ClassExt::Final;
        let dup = self.engine.find_class(&cls.path).is_some();
        if dup {
            self.issue(ErrorKind::DupClassName(cls.path.clone()));
        }
        loop {
            if self.if_peeked(Tok::EndEnum)? {
                break;
            }
            let item = self.get_name()?;
            self.expect(Tok::Colon, true)?;
            let text = self.get_quoted()?;
            self.expect(Tok::SemiColon, true)?;
            if !cls.add_enum_item(&item, text) {
                self.issue(ErrorKind::DupEnumItem(item));
            }
        }
        self.expect(Tok::SemiColon, true)?;
        if cls.enum_item_count() == 0 {
            self.issue(ErrorKind::EmptyEnum);
        }
        if dup {
            return Ok(());
        }
        // The enum's own methods refer to its (not yet assigned) id.
        let id = self.engine.class_count() as ClassId;
        for mi in enum_methods(id, &cls.path) {
            cls.add_method_info(mi);
        }
        self.add_nested(owner, cls);
        Ok(())
    }

    fn c_collection(&mut self, owner: ClassId, kind: ColKind) -> ParseResult<()> {
        self.expect(Tok::OpenBracket, false)?;
        let elem_path = self.get_class_path()?;
        let elem = self.resolve_path(&elem_path)?;
        self.expect(Tok::CloseBracket, false)?;
        let name = self.get_name()?;
        self.expect(Tok::SemiColon, true)?;
        self.check_class_usable(elem, owner)?;
        if kind == ColKind::Array && self.engine.class(elem).def_ctor().is_none() {
            let p = self.engine.class(elem).path.clone();
            self.issue(ErrorKind::NoDefCtor(p));
        }

        let base_path = match kind {
            ColKind::Vector => VECTOR_PATH,
            ColKind::Array => ARRAY_PATH,
        };
        let base = match self.engine.find_class(base_path) {
            Some(id) => id,
            None => {
                return Err(CompileError::Internal(format!(
                    "collection base {} is not registered",
                    base_path
                )))
            }
        };
        let owner_path = self.engine.class(owner).path.clone();
        let mut cls = ClassInfo::new(&name, &owner_path, base, ClassKind::Collection { kind, elem });
        if self.engine.find_class(&cls.path).is_some() {
            self.issue(ErrorKind::DupClassName(cls.path));
            return Ok(());
        }
        cls.base_init(self.engine.class(base));
        cls.ext = ClassExt::Final;
        cls.copyable &= self.engine.class(elem).copyable;
        for mi in collection_methods(kind, &cls.path, elem) {
            cls.add_method_info(mi);
        }
        self.add_nested(owner, cls);
        Ok(())
    }

    fn c_literals(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        loop {
            if self.if_peeked(Tok::EndLiterals)? {
                break;
            }
            let ty_path = self.get_class_path()?;
            let ty = self.resolve_path(&ty_path)?;
            if !self.engine.is_literal_class(ty) {
                return Err(self.fatal(ErrorKind::ClassNotImported(ty_path)));
            }
            let name = self.get_name()?;
            let dup = {
                let eng = &*self.engine;
                eng.class(cls).check_dup_name(eng, &name)
            };
            if dup {
                self.issue(ErrorKind::DupName(name.clone()));
            }
            self.expect(Tok::OpenParen, false)?;
            let tok = self.next_token()?;
            let value = match self.literal_value(ty, &tok) {
                Some(v) => v,
                None => {
                    self.issue(ErrorKind::BadLiteralInit(name.clone()));
                    self.dummy_value(ty)
                }
            };
            self.expect(Tok::CloseParen, true)?;
            self.expect(Tok::SemiColon, true)?;
            if !dup {
                self.engine
                    .class_mut(cls)
                    .add_literal(LiteralVal::new(&name, value));
            }
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// The value of the literal token `tok` as a literal of class `ty`, if it can be one.
    fn literal_value(&mut self, ty: ClassId, tok: &Token) -> Option<Value> {
        match tok.kind {
            Tok::True | Tok::False if ty == Intrinsic::Boolean.id() => {
                Some(Value::Boolean(tok.kind == Tok::True))
            }
            Tok::CharLiteral if ty == Intrinsic::Char.id() => {
                escape_char(&tok.text).ok().map(Value::Char)
            }
            Tok::QuotedString if ty == Intrinsic::String.id() => {
                Some(Value::String(escape_str(&tok.text)))
            }
            Tok::NumericLiteral => {
                let nt = self.engine.xlat_num_type(ty)?;
                let lit = make_numeric_literal(&tok.text, Some(nt))?;
                if lit.out_of_range {
                    self.issue(ErrorKind::NumRangeErr(tok.text.clone()));
                }
                Some(lit.value)
            }
            _ => None,
        }
    }

    fn dummy_value(&self, ty: ClassId) -> Value {
        if let Some(nt) = self.engine.xlat_num_type(ty) {
            Value::zero(nt)
        } else if ty == Intrinsic::Boolean.id() {
            Value::Boolean(false)
        } else if ty == Intrinsic::Char.id() {
            Value::Char('\0')
        } else {
            Value::String(String::new())
        }
    }

    fn c_members(&mut self, cls: ClassId) -> ParseResult<()> {
        self.expect(Tok::EqualSign, false)?;
        let is_const = self.const_attrs(ErrorKind::ExpectedMembAttr)?;
        loop {
            if self.if_peeked(Tok::EndMembers)? {
                break;
            }
            let ty_path = if self.if_peeked(Tok::DynTypeRef)? {
                self.c_dyn_type_ref(cls)?
            } else {
                self.get_class_path()?
            };
            let ty = self.resolve_path(&ty_path)?;
            self.check_class_usable(ty, cls)?;
            let name = self.get_name()?;
            self.expect(Tok::SemiColon, true)?;
            let (dup, copyable) = {
                let eng = &*self.engine;
                (eng.class(cls).check_dup_name(eng, &name), eng.class(ty).copyable)
            };
            if dup {
                self.issue(ErrorKind::DupName(name));
            } else {
                self.engine
                    .class_mut(cls)
                    .add_member(&name, ty, is_const, copyable);
            }
        }
        self.expect(Tok::SemiColon, true)?;
        Ok(())
    }

    /// The checks which can only be made once the whole class has been seen.
    fn validate_class(&mut self, cls: ClassId) {
        let mut errs = Vec::new();
        {
            let eng = &*self.engine;
            let c = eng.class(cls);
            if c.ctors().next().is_none() {
                errs.push(ErrorKind::NoCtors);
            }
            if c.ext != ClassExt::Abstract {
                let inherited = &c.methods()[..usize::from(c.first_method_id)];
                for m in inherited
                    .iter()
                    .filter(|m| m.ext == MethodExt::Required)
                {
                    errs.push(ErrorKind::ReqMethodNotOver(m.name.to_string()));
                }
            }
            if eng.config.validation {
                for m in c.own_methods() {
                    match c.find_impl(m.id) {
                        None => errs.push(ErrorKind::InfoWithoutImpl(m.name.to_string())),
                        Some(imp) if imp.name != m.name => {
                            errs.push(ErrorKind::ImplInfoIdMatch(m.name.to_string()))
                        }
                        Some(_) => (),
                    }
                }
                // Catches overrides, which own_methods doesn't cover.
                for imp in c.impls() {
                    match c.method(imp.id) {
                        Some(m) if m.name == imp.name => (),
                        _ => errs.push(ErrorKind::ImplInfoIdMatch(imp.name.to_string())),
                    }
                }
            }
        }
        for e in errs {
            self.issue(e);
        }
    }
}
