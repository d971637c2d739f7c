//! Pipelined Client
//!
//! One connection, one reader thread, any number of submitting threads.
//!
//! ## Locking
//! - `writer`: held across "queue the continuation" + "write the frame",
//!   so wire order always equals queue order
//! - `state`: session (reassembly buffer + pending queue) and the closed
//!   flag, guarded together; never held while writing to the socket
//!
//! Lock order is always `writer` -> `state`. The reader thread only takes
//! `state`, so a writer blocked on a full socket cannot stall replies.
//!
//! ## Callbacks
//! User callbacks are not run under `state`. The continuation stored in
//! the session only forwards the result over a channel, and the reader
//! thread runs the callback after releasing the lock, so a callback may
//! issue further requests with `submit` or `send`.
//!
//! A callback must not block on a reply: only the reader thread can
//! deliver it. `query`, the command helpers and `PendingReply::wait`
//! fail with `BlockingInCallback` when called on the reader thread.
//!
//! ## Termination
//! The first fault that ends the connection (EOF, read error, desync,
//! oversized frame) is kept as the close reason. The request at the head
//! of the queue receives it, later requests see it from `submit`, and
//! `close_reason()` exposes it.

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::Connection;
use crate::config::Config;
use crate::error::{GibsonError, Result};
use crate::pipeline::{panic_message, Continuation};
use crate::protocol::{encode_request, Opcode, Value};
use crate::reassembly::Session;

/// Callback job run on the reader thread outside the state lock
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Connection state guarded by one lock
struct State {
    session: Session,

    /// Why the connection ended (None while open)
    closed: Option<Arc<GibsonError>>,
}

/// State shared between the client handle and its reader thread
struct Shared {
    state: Mutex<State>,

    /// Write half; holding it serializes request order
    writer: Mutex<Connection>,

    /// Handle used only to shut the socket down
    control: Connection,

    /// Set by `close()` so the reader logs the shutdown quietly
    closing: AtomicBool,

    jobs_tx: Sender<Job>,
    jobs_rx: Receiver<Job>,

    /// Reader thread, where callbacks run
    reader_id: OnceLock<ThreadId>,

    peer: String,
}

impl Shared {
    /// Tear the connection down and fail everything still pending
    ///
    /// The head of the queue receives `reason`; the rest see
    /// `ConnectionClosed`. `reason` is kept as the close reason.
    fn terminate(&self, reason: GibsonError) {
        if let Err(e) = self.control.shutdown() {
            tracing::debug!("Shutdown of {} failed: {}", self.peer, e);
        }

        let failed = {
            let mut state = self.state.lock();
            state.closed = Some(Arc::new(reason.duplicate()));
            let mut reason = Some(reason);
            state
                .session
                .fail_all(|| reason.take().unwrap_or(GibsonError::ConnectionClosed))
        };

        if failed > 0 {
            tracing::warn!("Failed {} pending requests on {}", failed, self.peer);
        }
        self.run_jobs();
    }

    fn on_reader_thread(&self) -> bool {
        self.reader_id.get() == Some(&thread::current().id())
    }

    /// Run queued callbacks, isolating any panic they raise
    fn run_jobs(&self) {
        for job in self.jobs_rx.try_iter() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                tracing::error!(
                    "Reply callback panicked on {}: {}",
                    self.peer,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// A pipelined connection to a Gibson server
pub struct Client {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: Config,
}

impl Client {
    /// Connect and start the reader thread
    pub fn connect(config: Config) -> Result<Self> {
        let conn = Connection::connect(&config)?;
        let read_half = conn.try_clone()?;
        let control = conn.try_clone()?;
        let peer = format!("{} ({})", config.address, conn.peer_addr());

        tracing::debug!("Connected to {}", peer);

        let (jobs_tx, jobs_rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                session: Session::new(&config),
                closed: None,
            }),
            writer: Mutex::new(conn),
            control,
            closing: AtomicBool::new(false),
            jobs_tx,
            jobs_rx,
            reader_id: OnceLock::new(),
            peer,
        });

        let reader_shared = Arc::clone(&shared);
        let buffer_size = config.read_buffer_size;
        let reader = thread::Builder::new()
            .name("gibson-reader".to_string())
            .spawn(move || read_loop(reader_shared, read_half, buffer_size))?;
        // Fresh cell, set exactly once before any callback can run
        let _ = shared.reader_id.set(reader.thread().id());

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
            config,
        })
    }

    /// Connect using a connection string and default settings
    pub fn open(connection_string: &str) -> Result<Self> {
        let config = Config::builder().connection_string(connection_string)?.build();
        Self::connect(config)
    }

    // =========================================================================
    // Request API
    // =========================================================================

    /// Send a request; `callback` receives the reply on the reader thread
    ///
    /// On error the request was not sent. If the connection died mid-write,
    /// `callback` may already have been called with `ConnectionClosed`.
    pub fn submit<S, F>(&self, opcode: Opcode, args: &[S], callback: F) -> Result<()>
    where
        S: AsRef<str>,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let jobs = self.shared.jobs_tx.clone();
        let continuation: Continuation = Box::new(move |result| {
            let _ = jobs.send(Box::new(move || callback(result)));
        });
        self.write_request(opcode, args, continuation)
    }

    /// Send a request without waiting for its reply
    pub fn send<S: AsRef<str>>(&self, opcode: Opcode, args: &[S]) -> Result<PendingReply> {
        let (tx, rx) = channel::bounded(1);
        let continuation: Continuation = Box::new(move |result| {
            // The caller may have timed out and dropped the receiver
            let _ = tx.send(result);
        });
        self.write_request(opcode, args, continuation)?;

        Ok(PendingReply {
            opcode,
            rx,
            timeout: reply_timeout(&self.config),
            reader: self.shared.reader_id.get().copied(),
        })
    }

    /// Send a request and block until its reply arrives
    ///
    /// Fails with `BlockingInCallback`, without sending, when called from a
    /// reply callback.
    pub fn query<S: AsRef<str>>(&self, opcode: Opcode, args: &[S]) -> Result<Value> {
        if self.shared.on_reader_thread() {
            return Err(GibsonError::BlockingInCallback);
        }
        self.send(opcode, args)?.wait()
    }

    /// Send a request by command name (case-insensitive)
    pub fn command<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<Value> {
        let opcode = Opcode::from_str(name)?;
        self.query(opcode, args)
    }

    fn write_request<S: AsRef<str>>(
        &self,
        opcode: Opcode,
        args: &[S],
        continuation: Continuation,
    ) -> Result<()> {
        let frame = encode_request(opcode, args);

        let mut writer = self.shared.writer.lock();
        {
            let mut state = self.shared.state.lock();
            if let Some(reason) = &state.closed {
                return Err(reason.duplicate());
            }
            state.session.enqueue(opcode, continuation)?;
        }

        if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
            tracing::warn!("Write of {} request to {} failed: {}", opcode, self.shared.peer, e);
            self.shared.state.lock().session.cancel_last();
            // Bytes may be half-written; the stream can't be trusted anymore
            if let Err(e) = self.shared.control.shutdown() {
                tracing::debug!("Shutdown of {} failed: {}", self.shared.peer, e);
            }
            return Err(e.into());
        }

        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// SET <ttl> <key> <value> (ttl 0 = never expires)
    pub fn set(&self, ttl: u32, key: &str, value: &str) -> Result<Value> {
        self.query(Opcode::Set, &[ttl.to_string().as_str(), key, value])
    }

    pub fn get(&self, key: &str) -> Result<Value> {
        self.query(Opcode::Get, &[key])
    }

    pub fn del(&self, key: &str) -> Result<Value> {
        self.query(Opcode::Del, &[key])
    }

    pub fn inc(&self, key: &str) -> Result<Value> {
        self.query(Opcode::Inc, &[key])
    }

    pub fn dec(&self, key: &str) -> Result<Value> {
        self.query(Opcode::Dec, &[key])
    }

    /// TTL <key> <seconds>
    pub fn ttl(&self, key: &str, seconds: u32) -> Result<Value> {
        self.query(Opcode::Ttl, &[key, seconds.to_string().as_str()])
    }

    /// LOCK <key> <seconds>
    pub fn lock(&self, key: &str, seconds: u32) -> Result<Value> {
        self.query(Opcode::Lock, &[key, seconds.to_string().as_str()])
    }

    pub fn unlock(&self, key: &str) -> Result<Value> {
        self.query(Opcode::Unlock, &[key])
    }

    /// MSET <prefix> <value>, returns the number of keys changed
    pub fn mset(&self, prefix: &str, value: &str) -> Result<Value> {
        self.query(Opcode::MSet, &[prefix, value])
    }

    /// MTTL <prefix> <seconds>
    pub fn mttl(&self, prefix: &str, seconds: u32) -> Result<Value> {
        self.query(Opcode::MTtl, &[prefix, seconds.to_string().as_str()])
    }

    pub fn mdel(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::MDel, &[prefix])
    }

    pub fn minc(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::MInc, &[prefix])
    }

    pub fn mdec(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::MDec, &[prefix])
    }

    /// MLOCK <prefix> <seconds>
    pub fn mlock(&self, prefix: &str, seconds: u32) -> Result<Value> {
        self.query(Opcode::MLock, &[prefix, seconds.to_string().as_str()])
    }

    pub fn munlock(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::MUnlock, &[prefix])
    }

    /// MGET <prefix>, returns a map
    pub fn mget(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::MGet, &[prefix])
    }

    pub fn keys(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::Keys, &[prefix])
    }

    pub fn count(&self, prefix: &str) -> Result<Value> {
        self.query(Opcode::Count, &[prefix])
    }

    /// META <key> <field>
    pub fn meta(&self, key: &str, field: &str) -> Result<Value> {
        self.query(Opcode::Meta, &[key, field])
    }

    pub fn stats(&self) -> Result<Value> {
        self.query::<&str>(Opcode::Stats, &[])
    }

    pub fn ping(&self) -> Result<Value> {
        self.query::<&str>(Opcode::Ping, &[])
    }

    /// Ask the server to close the connection
    pub fn end(&self) -> Result<()> {
        self.write_request::<&str>(Opcode::End, &[], Box::new(|_: Result<Value>| {}))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Requests still waiting for a reply
    pub fn pending(&self) -> usize {
        self.shared.state.lock().session.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed.is_some()
    }

    /// The fault that ended the connection
    ///
    /// `ConnectionClosed` after a hang-up or `close()`, the fatal error
    /// (for example `Desync`) otherwise. `None` while the connection is open.
    pub fn close_reason(&self) -> Option<Arc<GibsonError>> {
        self.shared.state.lock().closed.clone()
    }

    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shut the connection down and wait for the reader thread
    ///
    /// Pending requests fail with `ConnectionClosed`. Safe to call more
    /// than once, and from inside a reply callback.
    pub fn close(&self) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Closing connection to {}", self.shared.peer);

        if let Err(e) = self.shared.control.shutdown() {
            tracing::debug!("Shutdown of {} failed: {}", self.shared.peer, e);
        }

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Called from a callback; the reader exits on its own
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Reader thread for {} panicked", self.shared.peer);
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// A request in flight
///
/// Dropping it abandons the reply but leaves the request queued, so the
/// reply still lines up with it when it arrives.
pub struct PendingReply {
    opcode: Opcode,
    rx: Receiver<Result<Value>>,
    timeout: Option<Duration>,

    /// Reader thread of the owning client
    reader: Option<ThreadId>,
}

impl PendingReply {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Block until the reply arrives or the configured timeout expires
    pub fn wait(self) -> Result<Value> {
        self.check_thread()?;
        match self.timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => self.rx.recv().unwrap_or(Err(GibsonError::ConnectionClosed)),
        }
    }

    /// Block until the reply arrives or `timeout` expires
    pub fn wait_timeout(self, timeout: Duration) -> Result<Value> {
        self.check_thread()?;
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(GibsonError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(GibsonError::ConnectionClosed),
        }
    }

    /// The reply, if it has already arrived
    pub fn try_take(&self) -> Option<Result<Value>> {
        self.rx.try_recv().ok()
    }

    fn check_thread(&self) -> Result<()> {
        if self.reader == Some(thread::current().id()) {
            return Err(GibsonError::BlockingInCallback);
        }
        Ok(())
    }
}

fn reply_timeout(config: &Config) -> Option<Duration> {
    (config.reply_timeout_ms > 0).then(|| Duration::from_millis(config.reply_timeout_ms))
}

/// Reader thread: feed socket chunks into the session until the stream ends
fn read_loop(shared: Arc<Shared>, mut conn: Connection, buffer_size: usize) {
    let mut buf = vec![0u8; buffer_size];

    let reason = loop {
        let n = match conn.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("Connection to {} closed", shared.peer);
                break GibsonError::ConnectionClosed;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if shared.closing.load(Ordering::SeqCst) {
                    tracing::debug!("Connection to {} shut down: {}", shared.peer, e);
                    break GibsonError::ConnectionClosed;
                }
                tracing::warn!("Error reading from {}: {}", shared.peer, e);
                break GibsonError::Io(e);
            }
        };

        tracing::trace!("Received {} bytes from {}", n, shared.peer);

        let outcome = {
            let mut state = shared.state.lock();
            panic::catch_unwind(AssertUnwindSafe(|| state.session.on_bytes(&buf[..n])))
        };

        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!("Fatal protocol error on {}: {}", shared.peer, e);
                break e;
            }
            Err(payload) => {
                // Session state is consistent here; report and keep reading
                tracing::error!(
                    "Continuation panicked on {}: {}",
                    shared.peer,
                    panic_message(payload.as_ref())
                );
            }
        }

        shared.run_jobs();
    };

    shared.terminate(reason);
}
