use std::{env, fs::read_to_string, path::PathBuf, process::Command};

use lang_tester::LangTester;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

lazy_static! {
    // Expectations are the block of `//` comments at the very start of a test file.
    static ref EXPECTED: Regex = RegexBuilder::new(r"\A((?:[ \t]*//[^\n]*\n)+)")
        .build()
        .unwrap();
    static ref COMMENT_PREFIX: Regex = RegexBuilder::new(r"^[ \t]*// ?")
        .multi_line(true)
        .build()
        .unwrap();
}

fn main() {
    LangTester::new()
        .test_dir("lang_tests")
        .test_file_filter(|p| {
            // Classes in subdirectories are only ever imported by the top-level tests.
            p.parent().unwrap().file_name().unwrap().to_str() == Some("lang_tests")
                && p.extension().and_then(|x| x.to_str()) == Some("mac")
        })
        .test_extract(|p| {
            EXPECTED
                .captures(&read_to_string(p).unwrap())
                .map(|x| {
                    COMMENT_PREFIX
                        .replace_all(x.get(1).unwrap().as_str(), "")
                        .trim()
                        .to_owned()
                })
                .unwrap()
        })
        .test_cmds(|p| {
            // We call target/[debug|release]/macroeng directly, because it's noticeably faster
            // than calling `cargo run`.
            let mut bin = PathBuf::new();
            bin.push(env::var("CARGO_MANIFEST_DIR").unwrap());
            bin.push("target");
            #[cfg(debug_assertions)]
            bin.push("debug");
            #[cfg(not(debug_assertions))]
            bin.push("release");
            bin.push("macroeng");
            let mut compiler = Command::new(bin);
            compiler.args(&["--cp", "lang_tests", "-l", p.to_str().unwrap()]);
            vec![("Compiler", compiler)]
        })
        .run();
}
