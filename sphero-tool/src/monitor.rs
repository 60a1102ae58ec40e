use std::sync::mpsc;

use sphero_proto::protocol::{Codec, Command};
use sphero_proto::{Client, ClientError, FromStd};

use crate::common::{parse_byte, parse_hex, print_response, SerialPortArgs};

/// Core device ping: no payload, just a sync response.
const PING_DID: u8 = 0x00;
const PING_CID: u8 = 0x01;

#[derive(clap::Args, Debug)]
pub struct MonitorOpts {
    #[command(flatten)]
    port: SerialPortArgs,
    /// Ping the device before listening.
    #[arg(long)]
    ping: bool,
    /// Send a command first, as DID CID [DATA] in hex.
    #[arg(long, num_args = 2..=3, value_names = ["DID", "CID", "DATA"])]
    send: Option<Vec<String>>,
    /// Stop after this many responses.
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

impl MonitorOpts {
    fn commands(&self) -> anyhow::Result<Vec<Command>> {
        let mut commands = Vec::new();
        if self.ping {
            commands.push(Command::new(PING_DID, PING_CID));
        }
        if let Some(send) = &self.send {
            let did = parse_byte(&send[0])?;
            let cid = parse_byte(&send[1])?;
            let data = match send.get(2) {
                Some(hex) => parse_hex(hex)?,
                None => Vec::new(),
            };
            commands.push(Command::new(did, cid).with_data(data));
        }

        // number them so responses can be matched up
        Ok(commands
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_seq(i as u8 + 1))
            .collect())
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

impl crate::ToolRun for MonitorOpts {
    fn run(&self) -> anyhow::Result<()> {
        let commands = self.commands()?;
        let port = self.port.open()?;

        let (errors, corrupt) = mpsc::channel();
        let mut client = Client::new_with(Codec::with_listener(errors), FromStd::new(port));

        for command in commands.iter() {
            log::info!(
                "sending did {:02x} cid {:02x} seq {:02x}",
                command.did,
                command.cid,
                command.seq
            );
            client.write(command)?;
        }

        let mut seen = 0;
        while self.count.map_or(true, |n| seen < n) {
            match client.read() {
                Ok(Some(response)) => {
                    seen += 1;
                    print_response(&response);
                }
                Ok(None) => {}
                Err(ClientError::Io(e)) if is_timeout(&e) => {
                    log::trace!("timed out, still waiting");
                }
                Err(e) => return Err(e.into()),
            }

            for err in corrupt.try_iter() {
                println!("error: {}", err);
            }
        }

        Ok(())
    }
}
