use sphero_proto::protocol::{Codec, Command, SOP2_SYNC};

use crate::common::{parse_byte, parse_hex};
use crate::hexdump::{hex_line, hexdump};

#[derive(clap::Args, Debug)]
pub struct EncodeOpts {
    /// Device id, in hex.
    #[arg(value_parser = parse_byte)]
    did: u8,
    /// Command id, in hex.
    #[arg(value_parser = parse_byte)]
    cid: u8,
    /// Payload, as hex bytes.
    data: Option<String>,
    /// Sequence number, in hex.
    #[arg(short, long, default_value = "00", value_parser = parse_byte)]
    seq: u8,
    /// Raw SOP2 byte, in hex.
    #[arg(long, default_value = "ff", value_parser = parse_byte)]
    sop2: u8,
    /// Don't ask for a sync response.
    #[arg(long)]
    no_answer: bool,
    /// Don't reset the inactivity timeout.
    #[arg(long)]
    no_reset_timeout: bool,
    /// Write the frame to this file instead of printing it.
    #[arg(short, long)]
    output: Option<std::path::PathBuf>,
}

impl EncodeOpts {
    fn command(&self) -> anyhow::Result<Command> {
        let data = match &self.data {
            Some(hex) => parse_hex(hex)?,
            None => Vec::new(),
        };

        let mut command = Command::new(self.did, self.cid)
            .with_seq(self.seq)
            .with_sop2(self.sop2)
            .with_data(data);
        if self.no_answer {
            command = command.answer(false);
        }
        if self.no_reset_timeout {
            command = command.reset_timeout(false);
        }
        if command.sop2 != SOP2_SYNC {
            log::debug!("sop2 is {:02x}", command.sop2);
        }
        Ok(command)
    }
}

impl crate::ToolRun for EncodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let command = self.command()?;
        let frame = Codec::new().create(&command)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &frame)?;
                log::info!("wrote {} bytes to {}", frame.len(), path.display());
            }
            None => {
                println!("{}", hex_line(&frame));
                println!();
                hexdump(&frame);
            }
        }

        Ok(())
    }
}
