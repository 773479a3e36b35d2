//! Command line entry point of the benchmark runner.

fn main() -> anyhow::Result<()> {
    ctlbench_runner::cli::execute()
}
