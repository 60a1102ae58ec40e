use clap::Parser;

mod common;
mod decode;
mod encode;
mod hexdump;
mod monitor;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

/// Build, decode and watch Sphero protocol packets.
#[derive(Parser, Debug)]
#[command(version, about)]
struct ToolOptions {
    /// Log more. Repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Frame a command packet.
    Encode(encode::EncodeOpts),
    /// Decode responses from a raw capture file.
    Decode(decode::DecodeOpts),
    /// Print responses from a live connection.
    Monitor(monitor::MonitorOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Encode(o) => o.run(),
            Decode(o) => o.run(),
            Monitor(o) => o.run(),
        }
    }
}

fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> anyhow::Result<()> {
    let opts = ToolOptions::parse();

    // RUST_LOG still wins, if set
    env_logger::Builder::new()
        .filter_level(log_level(opts.verbose))
        .parse_default_env()
        .init();

    opts.command.run()
}
