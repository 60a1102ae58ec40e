use crate::protocol::serialize::SerializerWrap;
use crate::protocol::{Codec, Command, CommandError, ErrorListener, Response};

/// Re-export to allow using [Client] with [std::io] streams.
#[cfg(feature = "std")]
pub use embedded_io_adapters::std::FromStd;

/// How many bytes [Client] asks the port for at once.
pub const READ_CHUNK_SIZE: usize = 64;

/// An error type for [Client].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError<E> {
    /// EOF in underlying stream.
    #[error("unexpected eof")]
    UnexpectedEof,
    /// The command could not be framed.
    #[error(transparent)]
    Command(CommandError),
    /// Other IO error in underlying stream.
    #[error("io error: {0:?}")]
    Io(E),
}

impl<E> From<E> for ClientError<E> {
    fn from(other: E) -> Self {
        Self::Io(other)
    }
}

impl<E> ClientError<E> {
    fn from_command(other: CommandError<E>) -> Self {
        match other {
            CommandError::DataTooLong(len) => Self::Command(CommandError::DataTooLong(len)),
            CommandError::Write(e) => Self::Io(e),
        }
    }
}

/// A client for the device's serial protocol.
///
/// Reads arrive in whatever pieces the port hands out, and are fed
/// through a [Codec].
#[derive(Debug, Clone)]
pub struct Client<F, L = ()> {
    port: F,
    codec: Codec<L>,
    chunk: [u8; READ_CHUNK_SIZE],
    needs_read: bool,
}

/// A client using an [std::io] port.
#[cfg(feature = "std")]
pub type ClientStd<F, L = ()> = Client<FromStd<F>, L>;

impl<F> Client<F, ()> {
    /// Create a new client that ignores corrupt packets.
    pub fn new(port: F) -> Self {
        Self::new_with(Codec::new(), port)
    }
}

#[cfg(feature = "std")]
impl<F> ClientStd<F, ()> {
    /// Create a new client using an [std::io] port.
    pub fn new_std(port: F) -> Self {
        Self::new(FromStd::new(port))
    }
}

impl<F, L> Client<F, L>
where
    L: ErrorListener,
{
    /// Create a new client with the provided codec.
    pub fn new_with(codec: Codec<L>, port: F) -> Self {
        Self {
            port,
            codec,
            chunk: [0; READ_CHUNK_SIZE],
            needs_read: true,
        }
    }

    /// Release the components used to create this client.
    pub fn free(self) -> (Codec<L>, F) {
        (self.codec, self.port)
    }

    /// Get the underlying codec.
    pub fn codec(&self) -> &Codec<L> {
        &self.codec
    }

    /// Get the underlying codec, mutably.
    ///
    /// Clearing or feeding it will confuse the client.
    pub fn codec_mut(&mut self) -> &mut Codec<L> {
        &mut self.codec
    }

    /// Get the underlying port.
    pub fn port(&self) -> &F {
        &self.port
    }

    /// Get the underlying port, mutably.
    ///
    /// Using this won't confuse the client, but it might cause you to miss
    /// responses if you are not careful.
    pub fn port_mut(&mut self) -> &mut F {
        &mut self.port
    }

    /// Attempt to read a response.
    ///
    /// This does at most one read from the port. After a response is
    /// returned, the next call first checks for another packet left
    /// over from the same read, without touching the port.
    pub fn read(&mut self) -> Result<Option<Response>, ClientError<F::Error>>
    where
        F: embedded_io::Read,
    {
        let res = if self.needs_read {
            let amt = self.port.read(&mut self.chunk)?;
            if amt == 0 {
                // end of file is an error
                return Err(ClientError::UnexpectedEof);
            }
            self.codec.parse(&self.chunk[..amt])
        } else {
            self.codec.parse(&[])
        };

        // we didn't find anything, so we need more data
        self.needs_read = res.is_none();
        Ok(res)
    }

    /// Read until a whole response arrives.
    pub fn read_response(&mut self) -> Result<Response, ClientError<F::Error>>
    where
        F: embedded_io::Read,
    {
        loop {
            if let Some(res) = self.read()? {
                return Ok(res);
            }
        }
    }

    /// Write a command to the port.
    pub fn write<I>(&mut self, command: &Command<I>) -> Result<(), ClientError<F::Error>>
    where
        F: embedded_io::Write,
        I: AsRef<[u8]>,
    {
        let mut ser = SerializerWrap::new(&mut self.port);
        command.frame(&mut ser).map_err(ClientError::from_command)?;
        self.port.flush()?;
        Ok(())
    }
}
