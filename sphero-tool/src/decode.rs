use sphero_proto::protocol::{Codec, PacketError, Response};
use sphero_proto::READ_CHUNK_SIZE;

use crate::common::print_response;
use crate::hexdump::hexdump_prefix;

#[derive(clap::Args, Debug)]
pub struct DecodeOpts {
    /// Raw capture of bytes received from the device.
    capture: std::path::PathBuf,
    /// Feed the capture to the decoder in pieces of this size.
    #[arg(short, long, default_value_t = READ_CHUNK_SIZE)]
    chunk_size: usize,
    /// Stop at the first corrupt packet.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    responses: usize,
    errors: usize,
    leftover: usize,
}

impl DecodeOpts {
    fn decode<F>(&self, raw: &[u8], mut on_response: F) -> anyhow::Result<Summary>
    where
        F: FnMut(&Response),
    {
        anyhow::ensure!(self.chunk_size > 0, "chunk size must be at least 1");

        let mut summary = Summary::default();
        let mut codec = Codec::with_listener(Vec::<PacketError>::new());
        for (i, chunk) in raw.chunks(self.chunk_size).enumerate() {
            log::trace!("chunk {} at offset {:#x}", i, i * self.chunk_size);
            let mut found = codec.parse(chunk);
            loop {
                for err in codec.listener_mut().drain(..) {
                    summary.errors += 1;
                    println!("error: {}", err);
                    if self.strict {
                        return Err(err.into());
                    }
                }

                match found {
                    Some(response) => {
                        summary.responses += 1;
                        on_response(&response);
                        // one chunk can hold several packets
                        found = codec.parse(&[]);
                    }
                    None => break,
                }
            }
        }

        summary.leftover = codec.pending().len();
        Ok(summary)
    }
}

impl crate::ToolRun for DecodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let raw = std::fs::read(&self.capture)?;
        log::info!("read {} bytes from {}", raw.len(), self.capture.display());

        let summary = self.decode(&raw, print_response)?;

        println!();
        println!(
            "{} responses, {} errors, {} bytes left over",
            summary.responses, summary.errors, summary.leftover
        );
        if summary.leftover > 0 {
            hexdump_prefix("    ", &raw[raw.len() - summary.leftover..]);
        }
        Ok(())
    }
}
