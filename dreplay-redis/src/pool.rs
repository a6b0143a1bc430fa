//! Fixed-size pool of Redis connections.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dreplay_core::{Cancellation, ReplayBufferError, Result};
use log::debug;
use redis::{Client, Connection, RedisResult};
use std::{
    io, thread,
    time::{Duration, Instant},
};

/// Interval at which a waiting checkout looks at the cancellation handle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Connections are opened when the pool is created and closed when it is dropped.
///
/// Each slot travels through a bounded channel. A slot holding `None` lost its
/// connection after a failure and reconnects on its next checkout.
pub(crate) struct ConnectionPool {
    client: Client,
    connect_timeout: Duration,
    sender: Sender<Option<Connection>>,
    receiver: Receiver<Option<Connection>>,
}

impl ConnectionPool {
    pub(crate) fn open(
        client: Client,
        size: usize,
        connect_timeout: Duration,
        cancel: &Cancellation,
    ) -> RedisResult<Self> {
        let size = size.max(1);
        let (sender, receiver) = bounded(size);
        let pool = Self {
            client,
            connect_timeout,
            sender,
            receiver,
        };
        for _ in 0..size {
            let con = pool.connect(cancel)?;
            // Never full: the channel holds exactly `size` slots
            let _ = pool.sender.try_send(Some(con));
        }
        debug!("Opened {} Redis connections", size);
        Ok(pool)
    }

    /// Opens a connection within the connect timeout, or until `cancel` stops the wait.
    ///
    /// The client bounds the TCP connect but not the handshake that follows
    /// (`AUTH`, `SELECT`, `CLIENT SETINFO`), so the whole setup runs on a helper
    /// thread. A handshake the server never answers leaves that thread blocked
    /// until the server closes the socket; the caller is released either way.
    fn connect(&self, cancel: &Cancellation) -> RedisResult<Connection> {
        let (sender, receiver) = bounded(1);
        let client = self.client.clone();
        let timeout = self.connect_timeout;
        thread::Builder::new()
            .name("redis-connect".to_string())
            .spawn(move || {
                let _ = sender.send(client.get_connection_with_timeout(timeout));
            })?;

        let limit = Instant::now() + self.connect_timeout;
        let until = match cancel.deadline() {
            Some(deadline) => deadline.min(limit),
            None => limit,
        };
        loop {
            if cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "connect cancelled").into());
            }
            let now = Instant::now();
            if now >= until {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out").into());
            }
            match receiver.recv_timeout((until - now).min(POLL_INTERVAL)) {
                Ok(res) => return res,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(io::ErrorKind::Other, "connect thread died").into())
                }
            }
        }
    }

    /// Takes a slot, waiting until one is returned or `cancel` stops the wait.
    pub(crate) fn checkout(&self, cancel: &Cancellation) -> Result<PooledConnection<'_>> {
        loop {
            cancel.check()?;
            let wait = match cancel.remaining() {
                Some(remaining) => remaining.min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            match self.receiver.recv_timeout(wait) {
                Ok(slot) => return Ok(PooledConnection { pool: self, slot }),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReplayBufferError::StoreUnavailable(
                        "connection pool closed".to_string(),
                    ))
                }
            }
        }
    }
}

/// A slot checked out of [`ConnectionPool`], returned on drop.
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    slot: Option<Connection>,
}

impl PooledConnection<'_> {
    /// The connection of the slot, reconnecting if it was discarded.
    pub(crate) fn connection(&mut self, cancel: &Cancellation) -> RedisResult<&mut Connection> {
        let con = match self.slot.take() {
            Some(con) => con,
            None => {
                debug!("Reconnecting to Redis");
                self.pool.connect(cancel)?
            }
        };
        Ok(self.slot.insert(con))
    }

    /// Drops the connection, whose state is unknown after a failure.
    pub(crate) fn discard(&mut self) {
        self.slot = None;
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let _ = self.pool.sender.try_send(self.slot.take());
    }
}
