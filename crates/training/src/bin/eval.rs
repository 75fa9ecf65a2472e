use clap::Parser;
use training::{run_eval, EvalArgs};

fn main() -> anyhow::Result<()> {
    let args = EvalArgs::parse();
    let report = run_eval(&args)?;
    println!(
        "Eval complete: loss={:.4} acc={:.4} ({} samples)",
        report.average_loss, report.accuracy, report.samples
    );
    Ok(())
}
