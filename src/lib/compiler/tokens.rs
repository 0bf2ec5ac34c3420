// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

use std::collections::HashMap;

use lazy_static::lazy_static;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tok {
    Abstract,
    ArrayOf,
    Begin,
    BeginDebug,
    Break,
    Case,
    Catch,
    Class,
    ClassPath,
    Const,
    Constructor,
    CurClassName,
    CurLine,
    Default,
    Destructor,
    Directives,
    DoLoop,
    DoWhile,
    DynTypeRef,
    Else,
    ElseIf,
    EndCase,
    EndCatch,
    EndClass,
    EndConstructor,
    EndDebug,
    EndDestructor,
    EndDirectives,
    EndEnum,
    EndForEach,
    EndIf,
    EndImports,
    EndLiterals,
    EndLocals,
    EndMembers,
    EndMethod,
    EndMethods,
    EndSwitch,
    EndTry,
    EndTypes,
    EndWhile,
    Enum,
    Exception,
    False,
    Final,
    ForEach,
    FTCase,
    If,
    Imports,
    In,
    InOut,
    Literals,
    Locals,
    Members,
    Method,
    Methods,
    NonConst,
    NonFinal,
    Out,
    Overrides,
    Parent,
    ParentClass,
    Private,
    Public,
    Required,
    Rethrow,
    Return,
    Returns,
    Switch,
    This,
    Throw,
    True,
    Try,
    TypeCast,
    Types,
    VectorOf,
    While,

    // Single character tokens.
    Colon,
    Comma,
    EqualSign,
    Exclaim,
    CloseBracket,
    CloseParen,
    OpenBracket,
    OpenParen,
    Period,
    SemiColon,

    // Operators.
    Add,
    And,
    AndEq,
    Assign,
    Dec,
    Divide,
    DivideEq,
    GtThan,
    GtThanEq,
    Inc,
    LogAnd,
    LogOr,
    LogXor,
    LsThan,
    LsThanEq,
    ModDiv,
    ModDivEq,
    MinusEq,
    Multiply,
    MultiplyEq,
    NotEqual,
    Or,
    OrEq,
    PlusEq,
    Subtract,
    Xor,
    XorEq,

    Eof,
    QuotedString,
    NumericLiteral,
    CharLiteral,
    /// A word which isn't a keyword: usually a name.
    NoMatch,
}

const KEYWORDS: &[(&str, Tok)] = &[
    ("Abstract", Tok::Abstract),
    ("ArrayOf", Tok::ArrayOf),
    ("Begin", Tok::Begin),
    ("#BeginDebug", Tok::BeginDebug),
    ("Break", Tok::Break),
    ("Case", Tok::Case),
    ("Catch", Tok::Catch),
    ("Class", Tok::Class),
    ("ClassPath", Tok::ClassPath),
    ("Const", Tok::Const),
    ("Constructor", Tok::Constructor),
    ("$CurClassName", Tok::CurClassName),
    ("$CurLine", Tok::CurLine),
    ("Default", Tok::Default),
    ("Destructor", Tok::Destructor),
    ("Directives", Tok::Directives),
    ("DoLoop", Tok::DoLoop),
    ("DoWhile", Tok::DoWhile),
    ("DynTypeRef", Tok::DynTypeRef),
    ("Else", Tok::Else),
    ("ElseIf", Tok::ElseIf),
    ("EndCase", Tok::EndCase),
    ("EndCatch", Tok::EndCatch),
    ("EndClass", Tok::EndClass),
    ("EndConstructor", Tok::EndConstructor),
    ("#EndDebug", Tok::EndDebug),
    ("EndDestructor", Tok::EndDestructor),
    ("EndDirectives", Tok::EndDirectives),
    ("EndEnum", Tok::EndEnum),
    ("EndForEach", Tok::EndForEach),
    ("EndIf", Tok::EndIf),
    ("EndImports", Tok::EndImports),
    ("EndLiterals", Tok::EndLiterals),
    ("EndLocals", Tok::EndLocals),
    ("EndMembers", Tok::EndMembers),
    ("EndMethod", Tok::EndMethod),
    ("EndMethods", Tok::EndMethods),
    ("EndSwitch", Tok::EndSwitch),
    ("EndTry", Tok::EndTry),
    ("EndTypes", Tok::EndTypes),
    ("EndWhile", Tok::EndWhile),
    ("Enum", Tok::Enum),
    ("$Exception", Tok::Exception),
    ("False", Tok::False),
    ("Final", Tok::Final),
    ("ForEach", Tok::ForEach),
    ("FTCase", Tok::FTCase),
    ("If", Tok::If),
    ("Imports", Tok::Imports),
    ("In", Tok::In),
    ("InOut", Tok::InOut),
    ("Literals", Tok::Literals),
    ("Locals", Tok::Locals),
    ("Members", Tok::Members),
    ("Method", Tok::Method),
    ("Methods", Tok::Methods),
    ("NonConst", Tok::NonConst),
    ("NonFinal", Tok::NonFinal),
    ("Out", Tok::Out),
    ("Overrides", Tok::Overrides),
    ("$Parent", Tok::Parent),
    ("ParentClass", Tok::ParentClass),
    ("Private", Tok::Private),
    ("Public", Tok::Public),
    ("Required", Tok::Required),
    ("Rethrow", Tok::Rethrow),
    ("Return", Tok::Return),
    ("Returns", Tok::Returns),
    ("Switch", Tok::Switch),
    ("This", Tok::This),
    ("Throw", Tok::Throw),
    ("True", Tok::True),
    ("Try", Tok::Try),
    ("TypeCast", Tok::TypeCast),
    ("Types", Tok::Types),
    ("VectorOf", Tok::VectorOf),
    ("While", Tok::While),
];

lazy_static! {
    static ref KEYWORD_MAP: HashMap<&'static str, Tok> = KEYWORDS.iter().cloned().collect();
}

impl Tok {
    /// Map a word to its keyword, if it is one.
    pub fn keyword(word: &str) -> Option<Tok> {
        KEYWORD_MAP.get(word).cloned()
    }

    /// The source text of this token, for use in messages.
    pub fn text(self) -> &'static str {
        if let Some((s, _)) = KEYWORDS.iter().find(|(_, t)| *t == self) {
            return s;
        }
        match self {
            Tok::Colon => ":",
            Tok::Comma => ",",
            Tok::EqualSign => "=",
            Tok::Exclaim => "!",
            Tok::CloseBracket => "]",
            Tok::CloseParen => ")",
            Tok::OpenBracket => "[",
            Tok::OpenParen => "(",
            Tok::Period => ".",
            Tok::SemiColon => ";",
            Tok::Add => "+",
            Tok::And => "&",
            Tok::AndEq => "&=",
            Tok::Assign => ":=",
            Tok::Dec => "--",
            Tok::Divide => "/",
            Tok::DivideEq => "/=",
            Tok::GtThan => ">",
            Tok::GtThanEq => ">=",
            Tok::Inc => "++",
            Tok::LogAnd => "&&",
            Tok::LogOr => "||",
            Tok::LogXor => "^^",
            Tok::LsThan => "<",
            Tok::LsThanEq => "<=",
            Tok::ModDiv => "%",
            Tok::ModDivEq => "%=",
            Tok::MinusEq => "-=",
            Tok::Multiply => "*",
            Tok::MultiplyEq => "*=",
            Tok::NotEqual => "!=",
            Tok::Or => "|",
            Tok::OrEq => "|=",
            Tok::PlusEq => "+=",
            Tok::Subtract => "-",
            Tok::Xor => "^",
            Tok::XorEq => "^=",
            Tok::Eof => "end of file",
            Tok::QuotedString => "quoted string",
            Tok::NumericLiteral => "numeric literal",
            Tok::CharLiteral => "character literal",
            _ => "name",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: Tok,
    /// The raw text of the token. Quoted strings and char literals have their quotes removed
    /// but are otherwise unescaped.
    pub text: String,
    pub line: u32,
    pub col: u32,
    /// The position just after the token.
    pub end_line: u32,
    pub end_col: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_map() {
        assert_eq!(Tok::keyword("EndForEach"), Some(Tok::EndForEach));
        assert_eq!(Tok::keyword("$Parent"), Some(Tok::Parent));
        assert_eq!(Tok::keyword("#BeginDebug"), Some(Tok::BeginDebug));
        assert_eq!(Tok::keyword("endforeach"), None);
        assert_eq!(Tok::keyword("m_Count"), None);
    }

    #[test]
    fn test_text() {
        assert_eq!(Tok::EndIf.text(), "EndIf");
        assert_eq!(Tok::Assign.text(), ":=");
        assert_eq!(Tok::CurLine.text(), "$CurLine");
    }
}
