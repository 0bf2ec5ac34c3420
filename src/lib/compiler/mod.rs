// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! The CML compiler. This is a single pass recursive descent compiler: there is no AST, and
//! opcodes are emitted as soon as each construct has been parsed, with forward jumps patched
//! once their targets are known. Errors are reported through a [ParseEvents]; most are
//! recoverable, so that one compilation can report as many problems as possible.

use log::debug;

use crate::engine::{source::ClassSource, ClassId, Engine};

pub mod error;
mod expr;
mod flow;
pub mod instrs;
pub mod lexer;
mod methods;
pub mod numeric;
mod parser;
pub mod tokens;

use error::{CompileError, ParseEvents};
use parser::Parser;

/// The outcome of a compilation which ran to completion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Compiled {
    /// The id the requested class was given in the engine's class table.
    pub class_id: ClassId,
    /// How many (recoverable) errors were reported. The class is only usable if this is zero.
    pub err_count: usize,
}

/// Compile `class_path`, loading its source (and that of any class it depends on which hasn't
/// been compiled yet) from `source`. Any classes compiled by a previous call are first removed
/// from `engine`.
pub fn compile(
    engine: &mut Engine,
    source: &mut dyn ClassSource,
    events: &mut dyn ParseEvents,
    class_path: &str,
) -> Result<Compiled, CompileError> {
    engine.reset();
    debug!("Starting compilation of {}", class_path);
    let mut parser = Parser::new(engine, source, events);
    let class_id = parser.c_main(class_path)?;
    let err_count = parser.err_count;
    debug!("{} compiled with {} error(s)", class_path, err_count);
    Ok(Compiled {
        class_id,
        err_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::{
            error::{CollectingEvents, ErrorKind},
            instrs::Opcode,
        },
        engine::{
            class::{ClassKind, ColKind},
            intrinsics::Intrinsic,
            method::MethodImpl,
            source::MemClassSource,
            EngineConfig,
        },
    };

    type Outcome = (Engine, CollectingEvents, Result<Compiled, CompileError>);

    fn run(classes: &[(&str, &str)], main: &str) -> Outcome {
        run_with(EngineConfig::default(), classes, main)
    }

    fn run_with(config: EngineConfig, classes: &[(&str, &str)], main: &str) -> Outcome {
        let mut engine = Engine::new(config);
        let mut src = MemClassSource::new();
        for (path, text) in classes {
            src.add(path, text);
        }
        let mut events = CollectingEvents::new();
        let r = compile(&mut engine, &mut src, &mut events, main);
        (engine, events, r)
    }

    /// A class `MEng.User.<name>` derived from `MEng.Object` with a default constructor.
    fn class_src(name: &str, sections: &str, methods: &str) -> String {
        format!(
            "Class=[NonFinal]
    ClassPath MEng.User.{};
    ParentClass MEng.Object;
EndClass;
{}
Methods=[Public,Final]
    Constructor()
    Begin
    EndConstructor;
{}
EndMethods;
",
            name, sections, methods
        )
    }

    fn method_impl<'a>(engine: &'a Engine, cls: ClassId, name: &str) -> &'a MethodImpl {
        let c = engine.class(cls);
        let id = c.find_method(name).unwrap().id;
        c.find_impl(id).unwrap()
    }

    const COLOR_TYPES: &str = "
Types=
    Enum=Color;
        Red : \"Red\";
        Green : \"Green\";
        Blue : \"Blue\";
    EndEnum;
EndTypes;
";

    #[test]
    fn test_enum_switch() {
        let sections = format!(
            "{}
Members=
    Color m_Color;
    Card4 m_Count;
EndMembers;",
            COLOR_TYPES
        );
        let text = class_src(
            "SwitchTest",
            &sections,
            "
    Method Pick() Returns Card4
    Begin
        Switch(m_Color)
            Case Color.Red :
                m_Count := 1;
            EndCase;
            Case Color.Green :
                m_Count := 2;
            EndCase;
            Default :
                m_Count := 3;
            EndCase;
        EndSwitch;
        Return m_Count;
    EndMethod;",
        );
        let (engine, events, r) = run(&[("MEng.User.SwitchTest", &text)], "MEng.User.SwitchTest");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let c = r.unwrap();
        assert_eq!(c.err_count, 0);
        let imp = method_impl(&engine, c.class_id, "Pick");
        assert_eq!(imp.jump_tables().len(), 1);
        let table = &imp.jump_tables()[0];
        assert_eq!(table.len(), 2);
        assert!(table.default_target().is_some());
        assert_eq!(
            imp.opcodes()
                .iter()
                .filter(|op| matches!(op, Opcode::TableJump(0, _)))
                .count(),
            1
        );
        let n = imp.opcodes().len();
        for (_, off) in table.cases() {
            assert!(off < n);
        }
    }

    #[test]
    fn test_init_order() {
        let text = "Class=[NonFinal]
    ClassPath MEng.User.InitTest;
    ParentClass MEng.Object;
EndClass;
Members=
    Card4 m_A;
    Card4 m_B;
EndMembers;
Methods=[Public,Final]
    Constructor() :
        m_B(2);
        m_A(1);
    Begin
        m_A := 3;
    EndConstructor;
EndMethods;
";
        let (engine, events, r) = run(&[("MEng.User.InitTest", text)], "MEng.User.InitTest");
        let c = r.unwrap();
        assert_eq!(c.err_count, 1);
        assert!(events.any(|k| *k == ErrorKind::InitOrder("m_A".to_owned())));
        let cls = engine.class(c.class_id);
        let ctor = cls.ctors().next().unwrap();
        let imp = cls.find_impl(ctor.id).unwrap();
        assert!(imp.opcodes().contains(&Opcode::Copy));
        assert!(imp
            .opcodes()
            .iter()
            .any(|op| matches!(op, Opcode::CallMember(1, _))));
    }

    #[test]
    fn test_throw_fmt() {
        let sections = "
Types=
    Enum=ErrCodes;
        BadInput : \"Bad input %(1) at %(2)\";
    EndEnum;
EndTypes;
Members=
    String m_Path;
    Card4 m_Count;
EndMembers;";
        let text = class_src(
            "ThrowTest",
            sections,
            "
    Method Fail()
    Begin
        Throw(ErrCodes.BadInput, m_Path, m_Count);
    EndMethod;",
        );
        let (engine, events, r) = run(&[("MEng.User.ThrowTest", &text)], "MEng.User.ThrowTest");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let c = r.unwrap();
        let imp = method_impl(&engine, c.class_id, "Fail");
        assert!(imp.opcodes().contains(&Opcode::ThrowFmt(2)));
    }

    #[test]
    fn test_circular_import() {
        let a = "Class=[NonFinal]
    ClassPath MEng.User.A;
    ParentClass MEng.Object;
EndClass;
Imports=
    MEng.User.B;
EndImports;
Methods=[Public,Final]
    Constructor()
    Begin
    EndConstructor;
EndMethods;
";
        let b = a.replace("MEng.User.A", "MEng.User.X").replace("MEng.User.B", "MEng.User.A").replace("MEng.User.X", "MEng.User.B");
        let (_, events, r) = run(&[("MEng.User.A", a), ("MEng.User.B", &b)], "MEng.User.A");
        assert_eq!(r, Err(CompileError::Unrecoverable));
        assert!(events.any(|k| matches!(k, ErrorKind::CircularImport(_))));
        assert_eq!(events.aborted.len(), 2);
    }

    #[test]
    fn test_missing_class() {
        let (_, events, r) = run(&[], "MEng.User.Nowhere");
        assert_eq!(r, Err(CompileError::Unrecoverable));
        assert!(events.any(|k| *k == ErrorKind::ClassNotFound("MEng.User.Nowhere".to_owned())));
    }

    const PARENT: &str = "Class=[NonFinal]
    ClassPath MEng.User.Base;
    ParentClass MEng.Object;
EndClass;
Methods=[Public,Final]
    Constructor()
    Begin
    EndConstructor;
    Method Fixed()
    Begin
    EndMethod;
EndMethods;
Methods=[Public,Required]
    Method MustDo()
    Begin
    EndMethod;
EndMethods;
";

    fn child(methods: &str) -> String {
        format!(
            "Class=[NonFinal]
    ClassPath MEng.User.Child;
    ParentClass MEng.User.Base;
EndClass;
Methods=[Public,Final]
    Constructor()
    Begin
    EndConstructor;
EndMethods;
{}
",
            methods
        )
    }

    #[test]
    fn test_final_override() {
        let text = child(
            "Methods=[Public,Overrides]
    Method Fixed()
    Begin
    EndMethod;
    Method MustDo()
    Begin
    EndMethod;
EndMethods;",
        );
        let (_, events, r) = run(&[("MEng.User.Base", PARENT), ("MEng.User.Child", &text)], "MEng.User.Child");
        assert_eq!(r.unwrap().err_count, 1);
        assert!(events.any(|k| *k == ErrorKind::ParentMethodIsFinal("Fixed".to_owned())));
    }

    #[test]
    fn test_required_not_overridden() {
        let text = child("");
        let (_, events, r) = run(&[("MEng.User.Base", PARENT), ("MEng.User.Child", &text)], "MEng.User.Child");
        assert_eq!(r.unwrap().err_count, 1);
        assert!(events.any(|k| *k == ErrorKind::ReqMethodNotOver("MustDo".to_owned())));
    }

    #[test]
    fn test_override_checks() {
        let text = child(
            "Methods=[Public,Overrides]
    Method MustDo()
    Begin
    EndMethod;
    Method Nothing()
    Begin
    EndMethod;
EndMethods;
Methods=[Public]
    Method MustDo2() Returns Card4
    Begin
        Return 1;
    EndMethod;
EndMethods;",
        );
        let (engine, events, r) = run(&[("MEng.User.Base", PARENT), ("MEng.User.Child", &text)], "MEng.User.Child");
        let c = r.unwrap();
        assert_eq!(c.err_count, 1);
        assert!(events.any(|k| *k == ErrorKind::ParentMethNotFound("Nothing".to_owned())));
        let cls = engine.class(c.class_id);
        let base = engine.class(cls.parent_id);
        assert_eq!(
            cls.find_method("MustDo").unwrap().id,
            base.find_method("MustDo").unwrap().id
        );
    }

    #[test]
    fn test_validation_covers_overrides() {
        let text = child(
            "Methods=[Public,Overrides]
    Method MustDo()
    Begin
    EndMethod;
EndMethods;",
        );
        let config = EngineConfig {
            validation: true,
            ..EngineConfig::default()
        };
        let (engine, events, r) = run_with(
            config,
            &[("MEng.User.Base", PARENT), ("MEng.User.Child", &text)],
            "MEng.User.Child",
        );
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let c = r.unwrap();
        assert_eq!(c.err_count, 0);
        let cls = engine.class(c.class_id);
        let id = cls.find_method("MustDo").unwrap().id;
        assert!(id < cls.first_method_id);
        assert_eq!(cls.find_impl(id).unwrap().name.as_str(), "MustDo");
    }

    fn body_errors(body: &str) -> Outcome {
        body_with(EngineConfig::default(), body)
    }

    fn body_with(config: EngineConfig, body: &str) -> Outcome {
        let sections = format!(
            "{}
Members=
    Color m_Color;
    Card4 m_Count;
EndMembers;",
            COLOR_TYPES
        );
        let methods = format!(
            "
    Method Test()
    Begin
{}
    EndMethod;",
            body
        );
        let text = class_src("BodyTest", &sections, &methods);
        run_with(config, &[("MEng.User.BodyTest", &text)], "MEng.User.BodyTest")
    }

    /// The offsets of every opcode matching `f`.
    fn offsets(ops: &[Opcode], f: impl Fn(&Opcode) -> bool) -> Vec<usize> {
        ops.iter()
            .enumerate()
            .filter(|(_, op)| f(op))
            .map(|(i, _)| i)
            .collect()
    }

    fn target(ops: &[Opcode], off: usize) -> usize {
        ops[off].jump_target().unwrap()
    }

    #[test]
    fn test_duplicate_case() {
        let (_, events, _) = body_errors(
            "        Switch(m_Color)
            Case Color.Red, Color.Green :
            EndCase;
            Case Color.Red :
            EndCase;
            Default :
            EndCase;
        EndSwitch;",
        );
        assert_eq!(events.errors().count(), 1);
        assert!(events.any(|k| matches!(k, ErrorKind::CaseIsUsed(_))));
    }

    #[test]
    fn test_required_cases() {
        let (_, events, _) = body_errors(
            "        Switch(m_Count)
            Case 1 :
            EndCase;
        EndSwitch;",
        );
        assert_eq!(events.errors().count(), 1);
        assert!(events.any(|k| *k == ErrorKind::RequiredCases));
    }

    #[test]
    fn test_unclosed_if() {
        let (_, events, r) = body_errors(
            "        If (m_Count > 2)
            m_Count := 1;",
        );
        assert_eq!(r.unwrap().err_count, 1);
        assert!(events.any(|k| matches!(k, ErrorKind::OpenFlowStatement { kind: "If", .. })));
    }

    #[test]
    fn test_break_outside_loop() {
        let (_, events, _) = body_errors("        Break;");
        assert!(events.any(|k| *k == ErrorKind::UnexpectedBreak));
    }

    #[test]
    fn test_mismatched_end() {
        let (_, events, r) = body_errors(
            "        While (m_Count < 3)
        EndIf;",
        );
        assert_eq!(r, Err(CompileError::Unrecoverable));
        assert!(events.any(|k| matches!(k, ErrorKind::ExpectedEndFlow { open: "While", .. })));
    }

    #[test]
    fn test_jumps_patched() {
        let (engine, events, r) = body_errors(
            "        Locals=
            Card4 i;
            Boolean b;
        EndLocals;
        While (i < 10)
            i++;
            If (i = 5)
                Break;
            ElseIf (i = 6)
                b := True;
            Else
                b := False;
            EndIf;
        EndWhile;
        DoLoop
            i--;
        DoWhile (i > 0);
        Try
            i := 3;
        EndTry;
        Catch
            i := 4;
        EndCatch;
        ForEach(m_Color)
            m_Count += 1;
        EndForEach;
        b := (i > 2) && b;",
        );
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let imp = method_impl(&engine, r.unwrap().class_id, "Test");
        let n = imp.opcodes().len();
        let mut jumps = 0;
        for op in imp.opcodes() {
            if let Some(t) = op.jump_target() {
                assert!(t > 0 && t <= n, "{:?} in\n{}", op, imp.listing());
                jumps += 1;
            }
        }
        assert!(jumps >= 9);
        assert_eq!(imp.locals().len(), 2);
    }

    #[test]
    fn test_flow_targets() {
        let (engine, events, r) = body_errors(
            "        Locals=
            Card4 i;
            Boolean b;
        EndLocals;
        While (i < 10) If (i = 5) Break; ElseIf (i = 6) b := True; EndIf; EndWhile;
        DoLoop i--; DoWhile (i > 0);
        b := (i > 2) && b;",
        );
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let imp = method_impl(&engine, r.unwrap().class_id, "Test");
        let ops = imp.opcodes();
        let lines = offsets(ops, |op| matches!(op, Opcode::CurLine(_)));
        assert_eq!(lines.len(), 4, "{}", imp.listing());

        let ncj = offsets(ops, |op| matches!(op, Opcode::NotCondJump(_)));
        let jumps = offsets(ops, |op| matches!(op, Opcode::Jump(_)));
        assert_eq!((ncj.len(), jumps.len()), (3, 3), "{}", imp.listing());
        let (while_exit, if_false, elseif_false) = (ncj[0], ncj[1], ncj[2]);
        let (brk, if_done, back) = (jumps[0], jumps[1], jumps[2]);
        // The loop jumps back to its condition, which starts the line.
        assert_eq!(target(ops, back), lines[0] + 1);
        assert_eq!(target(ops, if_false), if_done + 1);
        // EndIf is immediately followed by EndWhile's jump.
        assert_eq!(target(ops, elseif_false), back);
        assert_eq!(target(ops, if_done), back);
        assert_eq!(target(ops, while_exit), back + 1);
        assert_eq!(target(ops, brk), back + 1);
        assert_eq!(back + 1, lines[1]);

        let cj = offsets(ops, |op| matches!(op, Opcode::CondJump(_)));
        assert_eq!(cj.len(), 1);
        assert_eq!(target(ops, cj[0]), lines[1] + 1);

        let and = offsets(ops, |op| matches!(op, Opcode::NotCondJumpNP(_)));
        assert_eq!(and.len(), 1);
        assert!(and[0] > lines[2]);
        assert_eq!(ops[target(ops, and[0]) - 1], Opcode::LogicalAnd);
    }

    #[test]
    fn test_try_catch_targets() {
        let (engine, events, r) =
            body_errors("        Try m_Count := 3; EndTry; Catch m_Count := 4; EndCatch;");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let imp = method_impl(&engine, r.unwrap().class_id, "Test");
        let ops = imp.opcodes();
        let tries = offsets(ops, |op| matches!(op, Opcode::Try(_)));
        let jumps = offsets(ops, |op| matches!(op, Opcode::Jump(_)));
        assert_eq!((tries.len(), jumps.len()), (1, 1), "{}", imp.listing());
        let (t, j) = (tries[0], jumps[0]);
        assert_eq!(ops[j - 1], Opcode::PopTop);
        assert_eq!(target(ops, t), j + 1);
        let copies = offsets(ops, |op| *op == Opcode::Copy);
        assert_eq!(copies.len(), 2);
        assert!(copies[0] < j && copies[1] > j);
        assert_eq!(target(ops, j), copies[1] + 1);
    }

    #[test]
    fn test_statement_after_end_case() {
        let (_, events, r) = body_errors(
            "        Switch(m_Color)
            Case Color.Red :
            EndCase;
            m_Count := 1;
            Default :
            EndCase;
        EndSwitch;",
        );
        assert_eq!(r, Err(CompileError::Unrecoverable));
        assert!(events.any(|k| *k == ErrorKind::ExpectedCaseOrEnd));
    }

    #[test]
    fn test_adjacent_sign() {
        let (engine, events, r) = body_errors(
            "        m_Count := m_Count+1;
        m_Count := m_Count-1;",
        );
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let imp = method_impl(&engine, r.unwrap().class_id, "Test");
        let ops = imp.opcodes();
        let card4 = engine.class(Intrinsic::Card4.id());
        for name in &["Add", "Sub"] {
            let id = card4.find_method(name).unwrap().id;
            let calls = offsets(ops, |op| *op == Opcode::CallStack(3, id));
            assert_eq!(calls.len(), 1, "{}", imp.listing());
            assert_eq!(ops[calls[0] - 1], Opcode::PushImCard4(1));
            assert_eq!(ops[calls[0] - 2], Opcode::PushTempVar(Intrinsic::Card4.id()));
        }
        // Both statements and the EndMethod are on lines of their own.
        assert_eq!(offsets(ops, |op| matches!(op, Opcode::CurLine(_))).len(), 3);
    }

    #[test]
    fn test_debug_blocks() {
        let body = "        m_Count := 1;
        #BeginDebug
        m_Count := 2;
        #EndDebug";
        for &debug_mode in &[false, true] {
            let config = EngineConfig {
                debug_mode,
                ..EngineConfig::default()
            };
            let (engine, events, r) = body_with(config, body);
            assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
            let imp = method_impl(&engine, r.unwrap().class_id, "Test");
            assert!(imp.opcodes().contains(&Opcode::PushImCard4(1)));
            assert_eq!(imp.opcodes().contains(&Opcode::PushImCard4(2)), debug_mode);
        }
    }

    #[test]
    fn test_type_cast() {
        let sections = "
Members=
    Card1 m_Small;
    Card4 m_Count;
    String m_Path;
EndMembers;";
        let text = class_src(
            "CastTest",
            sections,
            "
    Method Widen()
    Begin
        m_Count := TypeCast(Card4, m_Small);
        m_Count := TypeCast(Card4, m_Count);
    EndMethod;",
        );
        let (engine, events, r) = run(&[("MEng.User.CastTest", &text)], "MEng.User.CastTest");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let imp = method_impl(&engine, r.unwrap().class_id, "Widen");
        // Casting to the value's own class is a no-op.
        assert_eq!(
            offsets(imp.opcodes(), |op| *op == Opcode::TypeCast(Intrinsic::Card4.id())).len(),
            1
        );

        let text = class_src(
            "CastTest",
            sections,
            "
    Method Bad()
    Begin
        m_Count := TypeCast(Card4, m_Path);
    EndMethod;",
        );
        let (_, events, _) = run(&[("MEng.User.CastTest", &text)], "MEng.User.CastTest");
        assert!(events.any(|k| *k == ErrorKind::BadCastType));
    }

    const NO_DEF_CTOR: &str = "Class=[NonFinal]
    ClassPath MEng.User.NoDef;
    ParentClass MEng.Object;
EndClass;
Methods=[Public,Final]
    Constructor([In] Card4 val)
    Begin
    EndConstructor;
EndMethods;
";

    #[test]
    fn test_collections() {
        let sections = "
Imports=
    MEng.User.NoDef;
EndImports;
Types=
    VectorOf[Card4] Numbers;
    ArrayOf[Card4] Slots;
    ArrayOf[MEng.User.NoDef] Holders;
EndTypes;
Members=
    Numbers m_Nums;
EndMembers;";
        let text = class_src("ColTest", sections, "");
        let (engine, events, r) = run(
            &[("MEng.User.NoDef", NO_DEF_CTOR), ("MEng.User.ColTest", &text)],
            "MEng.User.ColTest",
        );
        let c = r.unwrap();
        assert_eq!(c.err_count, 1, "{:?}", events.diagnostics);
        assert!(events.any(|k| *k == ErrorKind::NoDefCtor("MEng.User.NoDef".to_owned())));

        let card4 = Intrinsic::Card4.id();
        let nums = engine.find_class("MEng.User.ColTest.Numbers").unwrap();
        assert_eq!(
            engine.class(nums).kind,
            ClassKind::Collection {
                kind: ColKind::Vector,
                elem: card4
            }
        );
        let slots = engine.find_class("MEng.User.ColTest.Slots").unwrap();
        assert_eq!(
            engine.class(slots).kind,
            ClassKind::Collection {
                kind: ColKind::Array,
                elem: card4
            }
        );
        let cls = engine.class(c.class_id);
        assert_eq!(cls.find_member("m_Nums").unwrap().class_id, nums);
    }

    #[test]
    fn test_special_dyn_ref() {
        let sections = "
Members=
    DynTypeRef(\"$DynTypeRef\") m_Dyn;
EndMembers;";
        let text = class_src("DynTest", sections, "");
        let config = EngineConfig {
            special_dyn_ref: Some(Intrinsic::Card4.path()),
            ..EngineConfig::default()
        };
        let (engine, events, r) =
            run_with(config, &[("MEng.User.DynTest", &text)], "MEng.User.DynTest");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let cls = engine.class(r.unwrap().class_id);
        assert_eq!(cls.find_member("m_Dyn").unwrap().class_id, Intrinsic::Card4.id());

        let (_, events, r) = run(&[("MEng.User.DynTest", &text)], "MEng.User.DynTest");
        assert_eq!(r, Err(CompileError::Unrecoverable));
        assert!(events.any(|k| *k == ErrorKind::EmptySpecDynRef));
    }

    #[test]
    fn test_literal_retyping() {
        let text = "Class=[NonFinal]
    ClassPath MEng.User.Retype;
    ParentClass MEng.Object;
EndClass;
Members=
    Card1 m_Small;
    Int2 m_Signed;
EndMembers;
Methods=[Public,Final]
    Constructor() :
        m_Small(5);
    Begin
        m_Signed := 7;
    EndConstructor;
EndMethods;
";
        let (engine, events, r) = run(&[("MEng.User.Retype", text)], "MEng.User.Retype");
        assert_eq!(events.errors().count(), 0, "{:?}", events.diagnostics);
        let cls = engine.class(r.unwrap().class_id);
        let imp = cls.find_impl(cls.ctors().next().unwrap().id).unwrap();
        assert!(imp.opcodes().contains(&Opcode::PushImCard1(5)));
        assert!(imp.opcodes().contains(&Opcode::PushImInt2(7)));
    }

    #[test]
    fn test_non_void_needs_return() {
        let text = class_src(
            "RetTest",
            "",
            "
    Method Get() Returns Card4
    Begin
    EndMethod;",
        );
        let (_, events, _) = run(&[("MEng.User.RetTest", &text)], "MEng.User.RetTest");
        assert!(events.any(|k| *k == ErrorKind::ExpectedReturn));
    }

    #[test]
    fn test_recompile_resets() {
        let text = class_src("Again", "", "");
        let mut engine = Engine::new(EngineConfig::default());
        let mut src = MemClassSource::new();
        src.add("MEng.User.Again", &text);
        let mut events = CollectingEvents::new();
        let first = compile(&mut engine, &mut src, &mut events, "MEng.User.Again").unwrap();
        let count = engine.class_count();
        let second = compile(&mut engine, &mut src, &mut events, "MEng.User.Again").unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.class_count(), count);
        assert_eq!(events.errors().count(), 0);
    }
}
