// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! TCP listeners and per-connection processing loops.
//!
//! Every accepted connection gets its own thread running [`run_connection`]
//! with a [`ConnectionService`]. The accept loop waits for readiness through a
//! `polling::Poller`, which a [`CancellationToken`] can wake up to close the
//! listening socket. Connection threads are detached and finish on their own.

use crate::{
    dispatch::process_command,
    error::{FrameError, ServerError},
    handler::TpmCommands,
    mssim::{self, MssimCommand, MSSIM_RC_SUCCESS},
};
use log::{debug, error, info, warn};
use polling::{Event, Events, Poller};
use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
    thread,
};

const LISTENER_KEY: usize = 0;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    pollers: Mutex<Vec<Weak<Poller>>>,
}

/// Cooperative shutdown signal shared by one or more listeners.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops every listener serving with this token. Established connections
    /// are not interrupted.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let pollers = self
            .inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for poller in pollers.iter().filter_map(Weak::upgrade) {
            if let Err(e) = poller.notify() {
                warn!("{e}");
            }
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, poller: &Arc<Poller>) {
        let mut pollers = self
            .inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pollers.retain(|p| p.strong_count() > 0);
        pollers.push(Arc::downgrade(poller));
    }
}

/// One protocol exchange on a connection.
pub trait ConnectionService: Send + Sync + 'static {
    /// Reads one unit of work from `stream`, processes it and writes the
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns a `FrameError` if the connection cannot continue.
    fn serve_one<S: Read + Write>(&self, stream: &mut S) -> Result<(), FrameError>;
}

/// Raw TPM2 frames, one command followed by one response.
#[derive(Debug)]
pub struct RawService<T: ?Sized> {
    commands: Arc<T>,
}

impl<T: TpmCommands + ?Sized> RawService<T> {
    #[must_use]
    pub fn new(commands: Arc<T>) -> Self {
        Self { commands }
    }
}

impl<T: TpmCommands + ?Sized + 'static> ConnectionService for RawService<T> {
    fn serve_one<S: Read + Write>(&self, stream: &mut S) -> Result<(), FrameError> {
        let response = process_command(stream, &*self.commands)?;
        stream.write_all(&response)?;
        stream.flush()?;
        Ok(())
    }
}

/// MSSIM command channel: TPM2 frames inside the simulator envelope.
#[derive(Debug)]
pub struct MssimCommandService<T: ?Sized> {
    commands: Arc<T>,
}

impl<T: TpmCommands + ?Sized> MssimCommandService<T> {
    #[must_use]
    pub fn new(commands: Arc<T>) -> Self {
        Self { commands }
    }
}

impl<T: TpmCommands + ?Sized + 'static> ConnectionService for MssimCommandService<T> {
    fn serve_one<S: Read + Write>(&self, stream: &mut S) -> Result<(), FrameError> {
        let request = mssim::read_request(stream)?;
        if request.is_session_end() {
            return Err(FrameError::Closed);
        }
        debug!(
            "MSSIM command {} at locality {}",
            request.command, request.locality
        );
        let response = process_command(&mut request.payload.as_slice(), &*self.commands)?;
        let frame = mssim::encode_response(MSSIM_RC_SUCCESS, &response);
        stream.write_all(&frame)?;
        stream.flush()?;
        Ok(())
    }
}

/// MSSIM platform channel. Every signal is acknowledged with success, and
/// `TPM_SESSION_END` closes the connection without a reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformService;

impl ConnectionService for PlatformService {
    fn serve_one<S: Read + Write>(&self, stream: &mut S) -> Result<(), FrameError> {
        let command = mssim::read_platform_command(stream)?;
        if command == MssimCommand::SessionEnd as u32 {
            return Err(FrameError::Closed);
        }
        debug!("platform command {command}");
        mssim::write_ack(stream)
    }
}

/// Serves exchanges on `stream` until one fails, and returns that failure.
pub fn run_connection<S: Read + Write, H: ConnectionService>(
    stream: &mut S,
    service: &H,
) -> FrameError {
    loop {
        if let Err(e) = service.serve_one(stream) {
            return e;
        }
    }
}

fn spawn_connection<H: ConnectionService>(stream: TcpStream, peer: SocketAddr, service: &Arc<H>) {
    debug!("connected from {peer}");
    let service = Arc::clone(service);
    let spawned = thread::Builder::new()
        .name(format!("swtpm-{peer}"))
        .spawn(move || {
            let mut stream = stream;
            if let Err(e) = stream.set_nonblocking(false) {
                warn!("{peer}: {e}");
                return;
            }
            match run_connection(&mut stream, &*service) {
                FrameError::Closed => debug!("{peer}: closed"),
                e => warn!("{peer}: {e}"),
            }
            info!("handling of {peer} finished");
        });
    if let Err(e) = spawned {
        error!("{peer}: {e}");
    }
}

/// A bound TCP listener.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Binds a listener at `address`, e.g. `"localhost:2321"`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub fn bind(address: &str) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(address).map_err(|e| ServerError::Bind(address.to_string(), e))?;
        Ok(Self { listener })
    }

    /// # Errors
    ///
    /// Returns an `io::Error` if the socket address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `token` is cancelled, handing each one to
    /// `service` on a thread of its own. The listening socket is closed when
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns a `ServerError` if readiness polling fails. Cancellation is a
    /// normal return.
    pub fn serve<H: ConnectionService>(
        self,
        service: &Arc<H>,
        token: &CancellationToken,
    ) -> Result<(), ServerError> {
        let listener = self.listener;
        let local = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let poller = Arc::new(Poller::new()?);
        // SAFETY: the listener is removed from the poller before it is dropped.
        unsafe { poller.add(&listener, Event::readable(LISTENER_KEY))? };
        token.register(&poller);

        info!("listening on {local}");
        let result = accept_loop(&listener, &poller, service, token);

        debug!("close listener for {local}");
        if let Err(e) = poller.delete(&listener) {
            warn!("{local}: {e}");
        }
        result
    }
}

fn accept_loop<H: ConnectionService>(
    listener: &TcpListener,
    poller: &Poller,
    service: &Arc<H>,
    token: &CancellationToken,
) -> Result<(), ServerError> {
    let mut events = Events::new();
    loop {
        if token.is_cancelled() {
            return Ok(());
        }
        events.clear();
        match poller.wait(&mut events, None) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
        if token.is_cancelled() {
            return Ok(());
        }

        loop {
            match listener.accept() {
                Ok((stream, peer)) => spawn_connection(stream, peer, service),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("accept: {e}");
                    break;
                }
            }
        }
        poller.modify(listener, Event::readable(LISTENER_KEY))?;
    }
}

/// Serves the MSSIM command and platform channels until `token` is
/// cancelled. A failure of either listener cancels `token` so that both stop.
///
/// # Errors
///
/// Returns the first `ServerError` raised by either listener.
pub fn serve_mssim<T: TpmCommands + ?Sized + 'static>(
    command: TcpServer,
    platform: TcpServer,
    commands: Arc<T>,
    token: &CancellationToken,
) -> Result<(), ServerError> {
    thread::scope(|s| {
        let platform_thread = s.spawn(|| {
            let result = platform.serve(&Arc::new(PlatformService), token);
            if result.is_err() {
                token.cancel();
            }
            result
        });
        let command_result = command.serve(&Arc::new(MssimCommandService::new(commands)), token);
        if command_result.is_err() {
            token.cancel();
        }
        let platform_result = platform_thread
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        command_result.and(platform_result)
    })
}
