use clap::Parser;
use training::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    run_train(TrainArgs::parse())
}
