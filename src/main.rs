use clap::Parser;
use log::debug;
use srstore::cli::SubCommandExtend;
use srstore::config::{Opts, SubCommand};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    debug!("{:?}", opts);

    match &opts.subcmd {
        SubCommand::Build(config) => config.run(&opts),
        SubCommand::Append(config) => config.run(&opts),
        SubCommand::Read(config) => config.run(&opts),
        SubCommand::Extract(config) => config.run(&opts),
        SubCommand::Count(config) => config.run(&opts),
        SubCommand::Verify(config) => config.run(&opts),
    }
}
