use sphero_proto::protocol::{Response, BAUD_RATE};

use crate::hexdump::hexdump_prefix;

#[derive(clap::Args, Debug, Clone)]
pub struct SerialPortArgs {
    /// Serial port, TCP address or file to talk to.
    #[arg(default_value_t = default_serial_port())]
    port: String,
    #[arg(short, long, default_value_t = BAUD_RATE)]
    baud: u32,
    /// Treat the port as a plain file, like a FIFO.
    #[arg(long)]
    plain_file: bool,
    /// Treat the port as a host:port to connect to.
    #[arg(long)]
    tcp: bool,
}

#[derive(Debug)]
pub enum SerialPort {
    Serial(std::io::BufWriter<Box<dyn serialport::SerialPort>>),
    File(std::io::BufWriter<std::fs::File>),
    Tcp(std::io::BufWriter<std::net::TcpStream>),
}

pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        // the robot shows up as a bluetooth serial port named after it
        if let Some(info) = infos.iter().find(|i| i.port_name.contains("Sphero")) {
            return info.port_name.clone();
        }

        for info in infos {
            #[cfg(target_os = "macos")]
            if info.port_name.ends_with(".Bluetooth-Incoming-Port") {
                continue;
            }

            return info.port_name;
        }
    }

    // bound with rfcomm, usually
    "/dev/rfcomm0".to_owned()
}

impl std::io::Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.get_mut().read(buf),
            Self::File(port) => port.get_mut().read(buf),
            Self::Tcp(port) => port.get_mut().read(buf),
        }
    }
}

impl std::io::Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::File(port) => port.write(buf),
            Self::Tcp(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::File(port) => port.flush(),
            Self::Tcp(port) => port.flush(),
        }
    }
}

impl SerialPortArgs {
    pub fn open(&self) -> anyhow::Result<SerialPort> {
        log::info!("opening {}", self.port);
        if self.tcp {
            let port = std::net::TcpStream::connect(&self.port)?;
            port.set_read_timeout(Some(std::time::Duration::from_secs(1)))?;
            Ok(SerialPort::Tcp(std::io::BufWriter::new(port)))
        } else if self.plain_file {
            let port = std::fs::File::options()
                .read(true)
                .write(true)
                .open(&self.port)?;

            Ok(SerialPort::File(std::io::BufWriter::new(port)))
        } else {
            let mut port = serialport::new(&self.port, self.baud).open()?;
            port.set_timeout(std::time::Duration::from_secs(1))?;
            Ok(SerialPort::Serial(std::io::BufWriter::new(port)))
        }
    }
}

/// Parse a single byte written in hex, with or without `0x`.
pub fn parse_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16)
}

/// Parse a run of hex bytes. Whitespace, `:` and `,` between bytes
/// are ignored.
pub fn parse_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|c| !c.is_ascii_whitespace() && *c != b':' && *c != b',')
        .collect();
    if digits.len() % 2 != 0 {
        anyhow::bail!("odd number of hex digits in {:?}", s);
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)?;
            Ok(u8::from_str_radix(pair, 16)?)
        })
        .collect()
}

pub fn print_response(response: &Response) {
    match response {
        Response::Sync(r) => println!(
            "sync  mrsp {:02x} seq {:02x} dlen {:3} chk {:02x}",
            r.mrsp, r.seq, r.dlen, r.checksum
        ),
        Response::Async(r) => println!(
            "async id {:02x} dlen {:3} chk {:02x}",
            r.id_code, r.dlen, r.checksum
        ),
    }
    if !response.data().is_empty() {
        hexdump_prefix("    ", response.data());
    }
}
