use rerun_except::rerun_except;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The compiler has no generated sources: the only reason for this build script is to stop
    // cargo rebuilding everything each time a test class is edited.
    rerun_except(&["/lang_tests/*.mac", "/lang_tests/**/*.mac"])?;
    Ok(())
}
