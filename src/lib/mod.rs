//! A compiler for the CML macro language: a small, class based, statically typed scripting
//! language with enums, parameterised collections, exceptions and the usual structured flow
//! control. Source text is turned directly into a linear opcode stream per method, with jump
//! tables for `Switch` statements, in a single recursive descent pass.
//!
//! macroeng is split into a compiler and an engine. The engine owns the class table (the built in
//! "intrinsic" classes plus everything compiled so far) and the class model; the compiler parses
//! classes, recursively loading whatever they import, and fills that table in. Nothing in this
//! crate executes the generated opcodes.

#![allow(clippy::cognitive_complexity)]
#![allow(clippy::float_cmp)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod compiler;
pub mod engine;

pub use crate::{
    compiler::{
        compile,
        error::{CollectingEvents, CompileError, Diagnostic, ErrorKind, ParseEvents, Severity},
        Compiled,
    },
    engine::{
        source::{ClassSource, FsClassSource, MemClassSource},
        Engine, EngineConfig,
    },
};
