// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The stack of flow control statements open at the current point of a method body. Each item
//! carries the opcode offsets which must be patched once the statement's end is seen.

use crate::compiler::{error::ErrorKind, tokens::Tok};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FlowKind {
    If,
    ElseIf,
    Else,
    While,
    DoLoop,
    ForEach,
    Switch,
    Case,
    FTCase,
    EndCase,
    Try,
    Catch,
    EndTry,
}

impl FlowKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            FlowKind::If => "If",
            FlowKind::ElseIf => "ElseIf",
            FlowKind::Else => "Else",
            FlowKind::While => "While",
            FlowKind::DoLoop => "DoLoop",
            FlowKind::ForEach => "ForEach",
            FlowKind::Switch => "Switch",
            FlowKind::Case => "Case",
            FlowKind::FTCase => "FTCase",
            FlowKind::EndCase => "EndCase",
            FlowKind::Try => "Try",
            FlowKind::Catch => "Catch",
            FlowKind::EndTry => "EndTry",
        }
    }

    /// Can a `Break` jump out of this kind of statement?
    pub(crate) fn is_looped(self) -> bool {
        matches!(self, FlowKind::While | FlowKind::DoLoop | FlowKind::ForEach)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FlowItem {
    pub kind: FlowKind,
    /// The line the statement started on.
    pub line: u32,
    /// What these mean depends on `kind`: usually the offset of a jump to be patched, or of the
    /// top of a loop.
    pub offset1: usize,
    pub offset2: usize,
    /// Forward `Jump`s to be patched to the statement's end: the `Break`s of a loop, or the
    /// jumps out of each branch of an `If` or `Switch`.
    pub breaks: Vec<usize>,
}

/// Is `seen` legal when the innermost open statement is `open`?
fn closes(seen: Tok, open: FlowKind) -> bool {
    match seen {
        Tok::Case | Tok::FTCase | Tok::Default => {
            open == FlowKind::Switch || open == FlowKind::EndCase
        }
        Tok::EndCase => open == FlowKind::Case || open == FlowKind::FTCase,
        Tok::DoWhile => open == FlowKind::DoLoop,
        Tok::Else | Tok::ElseIf => open == FlowKind::If || open == FlowKind::ElseIf,
        Tok::Catch => open == FlowKind::EndTry,
        Tok::EndCatch => open == FlowKind::Catch,
        Tok::EndTry => open == FlowKind::Try,
        Tok::EndIf => matches!(open, FlowKind::If | FlowKind::ElseIf | FlowKind::Else),
        Tok::EndSwitch => open == FlowKind::EndCase,
        Tok::EndWhile => open == FlowKind::While,
        Tok::EndForEach => open == FlowKind::ForEach,
        _ => false,
    }
}

#[derive(Debug, Default)]
pub(crate) struct FlowStack {
    items: Vec<FlowItem>,
}

impl FlowStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, kind: FlowKind, offset1: usize, line: u32) -> &mut FlowItem {
        self.items.push(FlowItem {
            kind,
            line,
            offset1,
            offset2: 0,
            breaks: Vec::new(),
        });
        let i = self.items.len() - 1;
        &mut self.items[i]
    }

    pub(crate) fn pop(&mut self) -> Option<FlowItem> {
        self.items.pop()
    }

    pub(crate) fn top(&self) -> Option<&FlowItem> {
        self.items.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut FlowItem> {
        self.items.last_mut()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Check that `seen` is legal given the innermost open statement, returning (a copy of) that
    /// statement. If `pop` is true the statement is removed from the stack, whether or not
    /// `seen` was legal.
    pub(crate) fn check(&mut self, seen: Tok, pop: bool) -> Result<FlowItem, ErrorKind> {
        let item = if pop {
            self.items.pop()
        } else {
            self.items.last().cloned()
        };
        match item {
            None => Err(ErrorKind::UnexpectedEndFlow(seen.text())),
            Some(item) if closes(seen, item.kind) => Ok(item),
            Some(item) => Err(ErrorKind::ExpectedEndFlow {
                open: item.kind.name(),
                line: item.line,
                seen: seen.text(),
            }),
        }
    }

    /// The innermost loop, if any.
    pub(crate) fn last_looped_mut(&mut self) -> Option<&mut FlowItem> {
        self.items.iter_mut().rev().find(|i| i.kind.is_looped())
    }

    /// The innermost statement of kind `kind`, if any.
    pub(crate) fn last_of(&self, kind: FlowKind) -> Option<&FlowItem> {
        self.items.iter().rev().find(|i| i.kind == kind)
    }

    /// Remove every item, innermost first.
    pub(crate) fn drain(&mut self) -> Vec<FlowItem> {
        let mut v = self.items.drain(..).collect::<Vec<_>>();
        v.reverse();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pairs() {
        let mut fs = FlowStack::new();
        fs.push(FlowKind::If, 3, 10);
        assert_eq!(fs.check(Tok::Else, false).unwrap().offset1, 3);
        assert_eq!(fs.len(), 1);
        assert_eq!(
            fs.check(Tok::EndWhile, false),
            Err(ErrorKind::ExpectedEndFlow {
                open: "If",
                line: 10,
                seen: "EndWhile"
            })
        );
        assert!(fs.check(Tok::EndIf, true).is_ok());
        assert!(fs.is_empty());
        assert_eq!(
            fs.check(Tok::EndIf, true),
            Err(ErrorKind::UnexpectedEndFlow("EndIf"))
        );
    }

    #[test]
    fn test_pop_on_mismatch() {
        let mut fs = FlowStack::new();
        fs.push(FlowKind::Try, 0, 1);
        fs.push(FlowKind::While, 0, 2);
        assert!(fs.check(Tok::EndTry, true).is_err());
        assert_eq!(fs.top().map(|i| i.kind), Some(FlowKind::Try));
    }

    #[test]
    fn test_switch_cases() {
        let mut fs = FlowStack::new();
        fs.push(FlowKind::Switch, 5, 1);
        assert!(fs.check(Tok::Case, false).is_ok());
        fs.push(FlowKind::Case, 0, 2);
        assert!(fs.check(Tok::Default, false).is_err());
        assert!(fs.check(Tok::EndCase, false).is_ok());
        fs.push(FlowKind::EndCase, 0, 3);
        assert!(fs.check(Tok::FTCase, false).is_ok());
        assert!(fs.check(Tok::EndSwitch, true).is_ok());
        assert_eq!(fs.last_of(FlowKind::Switch).map(|i| i.offset1), Some(5));
    }

    #[test]
    fn test_breaks_find_loops() {
        let mut fs = FlowStack::new();
        assert!(fs.last_looped_mut().is_none());
        fs.push(FlowKind::While, 0, 1);
        fs.push(FlowKind::If, 4, 2);
        fs.push(FlowKind::Switch, 6, 3);
        fs.last_looped_mut().unwrap().breaks.push(9);
        let drained = fs.drain();
        assert_eq!(
            drained.iter().map(|i| i.kind).collect::<Vec<_>>(),
            vec![FlowKind::Switch, FlowKind::If, FlowKind::While]
        );
        assert_eq!(drained[2].breaks, vec![9]);
        assert!(fs.is_empty());
    }
}
