// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use crate::{
    error::ClientError,
    frame::{encode_response, read_response},
    mssim::{self, MssimCommand, MSSIM_RC_SUCCESS},
};
use log::debug;
use std::{
    collections::VecDeque,
    fmt,
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

/// A trait for a transport layer capable of sending and receiving full TPM
/// frames.
pub trait Transport: Send + fmt::Debug {
    /// Sends a complete command frame to the TPM.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` on I/O failure.
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), ClientError>;

    /// Receives a complete response frame from the TPM.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` on I/O failure or if the response is malformed.
    fn receive(&mut self) -> Result<Vec<u8>, ClientError>;
}

/// Raw TPM2 frames over a byte stream, e.g. a `TcpStream`.
#[derive(Debug)]
pub struct StreamTransport<S>(pub S);

impl<S: Read + Write + Send + fmt::Debug> Transport for StreamTransport<S> {
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), ClientError> {
        self.0.write_all(command_bytes)?;
        self.0.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, ClientError> {
        let (header, body) = read_response(&mut self.0)?;
        Ok(encode_response(header.tag, header.response_code, &body))
    }
}

/// The MSSIM simulator protocol over its command and platform sockets.
#[derive(Debug)]
pub struct MssimTransport {
    command: TcpStream,
    platform: TcpStream,
    locality: u8,
}

impl MssimTransport {
    /// Connects both channels and powers the simulator on.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if either channel cannot be connected or a
    /// power signal is refused.
    pub fn connect<A: ToSocketAddrs, B: ToSocketAddrs>(
        command_addr: A,
        platform_addr: B,
    ) -> Result<Self, ClientError> {
        let mut transport = Self {
            command: TcpStream::connect(command_addr)?,
            platform: TcpStream::connect(platform_addr)?,
            locality: 0,
        };
        transport.signal(MssimCommand::SignalPowerOn)?;
        transport.signal(MssimCommand::SignalNvOn)?;
        Ok(transport)
    }

    /// Sets the locality used for subsequent commands.
    pub fn set_locality(&mut self, locality: u8) {
        self.locality = locality;
    }

    /// Sends a signal on the platform channel and waits for its status.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MssimRc` if the simulator reports a failure.
    pub fn signal(&mut self, command: MssimCommand) -> Result<(), ClientError> {
        debug!("platform signal {command:?}");
        self.platform.write_all(&(command as u32).to_be_bytes())?;
        self.platform.flush()?;
        match mssim::read_platform_status(&mut self.platform)? {
            MSSIM_RC_SUCCESS => Ok(()),
            rc => Err(ClientError::MssimRc(rc)),
        }
    }

    /// Ends the session on both channels.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the session end cannot be written.
    pub fn close(mut self) -> Result<(), ClientError> {
        let end = (MssimCommand::SessionEnd as u32).to_be_bytes();
        self.command.write_all(&end)?;
        self.command.flush()?;
        self.platform.write_all(&end)?;
        self.platform.flush()?;
        Ok(())
    }
}

impl Transport for MssimTransport {
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), ClientError> {
        let frame = mssim::encode_request(
            MssimCommand::SendCommand as u32,
            self.locality,
            command_bytes,
        );
        self.command.write_all(&frame)?;
        self.command.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, ClientError> {
        match mssim::read_response(&mut self.command)? {
            (MSSIM_RC_SUCCESS, body) => Ok(body),
            (rc, _) => Err(ClientError::MssimRc(rc)),
        }
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    buffer: VecDeque<u8>,
    writer_dropped: bool,
    reader_dropped: bool,
}

#[derive(Debug, Default)]
struct Channel {
    state: Mutex<ChannelState>,
    cvar: Condvar,
}

impl Channel {
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One end of an in-memory, bidirectional byte pipe.
///
/// Reads block until the peer writes or is dropped. Dropping an end is seen
/// by the peer as end of stream.
#[derive(Debug)]
pub struct PipeTransport {
    incoming: Arc<Channel>,
    outgoing: Arc<Channel>,
}

impl PipeTransport {
    /// Creates two connected ends.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Channel::default());
        let b_to_a = Arc::new(Channel::default());
        (
            Self {
                incoming: Arc::clone(&b_to_a),
                outgoing: Arc::clone(&a_to_b),
            },
            Self {
                incoming: a_to_b,
                outgoing: b_to_a,
            },
        )
    }
}

impl Read for PipeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.incoming.lock();
        while !state.writer_dropped && state.buffer.is_empty() {
            state = self
                .incoming
                .cvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let bytes_to_read = buf.len().min(state.buffer.len());
        for (dst, byte) in buf.iter_mut().zip(state.buffer.drain(..bytes_to_read)) {
            *dst = byte;
        }
        Ok(bytes_to_read)
    }
}

impl Write for PipeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.outgoing.lock();
        if state.reader_dropped {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader dropped",
            ));
        }
        state.buffer.extend(buf);
        self.outgoing.cvar.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for PipeTransport {
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), ClientError> {
        self.write_all(command_bytes)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, ClientError> {
        let (header, body) = read_response(self)?;
        Ok(encode_response(header.tag, header.response_code, &body))
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        self.outgoing.lock().writer_dropped = true;
        self.outgoing.cvar.notify_all();
        self.incoming.lock().reader_dropped = true;
    }
}
