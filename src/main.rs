use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    archgate::core::trace::init_logging();
    Ok(archgate::run()?)
}
