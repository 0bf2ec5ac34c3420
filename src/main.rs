use std::{
    env,
    io::{stderr, Write},
    path::{Path, PathBuf},
    process,
    str::FromStr,
};

use getopts::Options;
use itertools::Itertools;
use log::debug;

use macroeng::{
    compile,
    engine::source::CLASS_EXTENSION,
    CompileError, Diagnostic, Engine, EngineConfig, FsClassSource, ParseEvents,
};

fn usage(prog: &str) -> ! {
    let path = Path::new(prog);
    let leaf = path
        .file_name()
        .map(|x| x.to_str().unwrap_or("macroeng"))
        .unwrap_or("macroeng");
    writeln!(
        &mut stderr(),
        "Usage: {} [-h] [-d] [-l] [-v] [--dynref <class path>] --cp <path> <class path|file.{}>",
        leaf, CLASS_EXTENSION
    )
    .ok();
    process::exit(1)
}

/// Print every diagnostic as soon as it is reported.
#[derive(Default)]
struct ConsoleEvents;

impl ParseEvents for ConsoleEvents {
    fn parse_event(&mut self, diag: Diagnostic) {
        diag.console_print();
    }

    fn parse_exception(&mut self, class_path: &str, err: &CompileError) {
        match err {
            CompileError::Unrecoverable => debug!("Compilation of {} abandoned", class_path),
            CompileError::Internal(msg) => {
                eprintln!("{}: internal compiler error: {}", class_path, msg)
            }
        }
    }
}

/// Work out the class to compile from the command line argument `arg`: either a class path, or
/// a source file whose directory then becomes a class root (so `dir/Foo.mac` is `MEng.Foo`).
fn target(arg: &str) -> (String, Vec<PathBuf>) {
    let p = Path::new(arg);
    if p.extension().and_then(|e| e.to_str()) == Some(CLASS_EXTENSION) {
        if let Some(stem) = p.file_stem().and_then(|s| s.to_str()) {
            let dir = match p.parent() {
                Some(d) if !d.as_os_str().is_empty() => d.to_owned(),
                _ => PathBuf::from("."),
            };
            return (format!("MEng.{}", stem), vec![dir]);
        }
    }
    (arg.to_owned(), vec![])
}

fn print_listing(engine: &Engine) {
    for cls in engine.classes().iter().filter(|c| !c.impls().is_empty()) {
        for imp in cls.impls() {
            let parms = cls
                .method(imp.id)
                .map(|m| {
                    m.parms
                        .iter()
                        .map(|p| format!("{} {}", engine.class(p.class_id).name, p.name))
                        .join(", ")
                })
                .unwrap_or_default();
            println!("{}::{}({})", cls.path, imp.name, parms);
            print!("{}", imp.listing());
        }
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let matches = Options::new()
        .optmulti("", "cp", "Root directory of class sources", "<path>")
        .optflag("d", "debug", "Compile the contents of #BeginDebug blocks")
        .optopt(
            "",
            "dynref",
            "The class path DynTypeRef(\"$DynTypeRef\") refers to",
            "<class path>",
        )
        .optflag("h", "help", "")
        .optflag("l", "listing", "Print the opcodes of every compiled method")
        .optflag("v", "validate", "Check compiled classes for internal consistency")
        .parse(&args[1..])
        .unwrap_or_else(|_| usage(prog));
    if matches.opt_present("h") || matches.free.len() != 1 {
        usage(prog);
    }

    let (class_path, mut roots) = target(&matches.free[0]);
    roots.extend(
        matches
            .opt_strs("cp")
            .iter()
            .filter_map(|x| PathBuf::from_str(x).ok()),
    );
    let config = EngineConfig {
        debug_mode: matches.opt_present("d"),
        validation: matches.opt_present("v"),
        special_dyn_ref: matches.opt_str("dynref"),
    };
    debug!("Class roots: {:?}", roots);

    let mut engine = Engine::new(config);
    let mut source = FsClassSource::new(roots);
    let mut events = ConsoleEvents::default();
    match compile(&mut engine, &mut source, &mut events, &class_path) {
        Ok(c) if c.err_count == 0 => {
            if matches.opt_present("l") {
                print_listing(&engine);
            }
        }
        Ok(c) => {
            eprintln!("{}: {} error(s)", class_path, c.err_count);
            process::exit(1);
        }
        Err(_) => process::exit(1),
    }
}
