//! The response interceptor: a [`ResponseSink`] that wraps another one.
//!
//! An [`Interceptor`] records the first status set on it and the number of
//! body bytes accepted, and routes every call according to a [`Hook`] chosen
//! at construction:
//!
//! | Hook      | status / headers        | body bytes                        |
//! |-----------|-------------------------|-----------------------------------|
//! | `Forward` | passed through once     | passed through                    |
//! | `Mirror`  | passed through once     | passed through and copied aside   |
//! | `Hijack`  | held back               | copied aside only                 |
//!
//! Under `Hijack` nothing reaches the wrapped sink until [`Interceptor::release`]
//! hands the held-back response over, or the owner decides to discard it.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;

use crate::error::Error;
use crate::sink::{ResponseSink, Writer};

/// Write policy of an [`Interceptor`]. Fixed for the interceptor's lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hook {
    Forward,
    Mirror,
    Hijack,
}

/// What an interceptor observed: the latched status and the byte count.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// `None` until the handler sets a status or writes.
    pub status: Option<StatusCode>,
    pub bytes: u64,
}

/// The response a `Hijack` interceptor held back, as taken by [`Interceptor::seal`].
#[derive(Debug)]
pub struct Captured {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    /// Sends headers, then the latched status, then the body onto `sink`.
    ///
    /// Nothing is sent when the handler never set a status nor wrote.
    pub fn replay(&self, sink: &dyn ResponseSink) -> Result<(), Error> {
        let Some(status) = self.status else {
            return Ok(());
        };
        for (name, value) in &self.headers {
            sink.append_header(name.clone(), value.clone());
        }
        sink.set_status(status);
        if !self.body.is_empty() {
            sink.write(&self.body)?;
        }
        Ok(())
    }
}

pub struct Interceptor {
    inner: Writer,
    hook: Hook,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    status: Option<StatusCode>,
    bytes: u64,
    side: Option<BytesMut>,
    // Headers staged under `Hijack`; forwarded hooks pass them straight on.
    headers: HeaderMap,
    sealed: bool,
}

impl Interceptor {
    pub fn new(inner: Writer, hook: Hook) -> Self {
        let side = (hook != Hook::Forward).then(BytesMut::new);
        Self { inner, hook, state: Mutex::new(State { side, ..State::default() }) }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot { status: state.status, bytes: state.bytes }
    }

    /// Copy of the side buffer. `None` under `Forward`, or once sealed.
    pub fn side_buffer(&self) -> Option<Bytes> {
        let state = self.state.lock();
        state.side.as_ref().map(|b| Bytes::copy_from_slice(b))
    }

    /// Stops accepting writes and takes what was held back.
    ///
    /// After sealing, [`snapshot`](Self::snapshot) keeps returning the same
    /// value and every write fails with [`Error::Released`]. A second seal
    /// returns an empty capture with the same status.
    pub fn seal(&self) -> Captured {
        let mut state = self.state.lock();
        state.sealed = true;
        Captured {
            status: state.status,
            headers: std::mem::take(&mut state.headers),
            body: state.side.take().map(BytesMut::freeze).unwrap_or_default(),
        }
    }

    /// Seals the interceptor and replays the held-back response verbatim onto
    /// the wrapped sink. See [`Captured::replay`].
    pub fn release(&self) -> Result<Snapshot, Error> {
        self.seal().replay(&*self.inner)?;
        Ok(self.snapshot())
    }

    fn passes_through(&self) -> bool {
        self.hook != Hook::Hijack
    }
}

impl ResponseSink for Interceptor {
    fn set_status(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if state.status.is_some() || state.sealed {
            return;
        }
        state.status = Some(status);
        if self.passes_through() {
            self.inner.set_status(status);
        }
    }

    fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.sealed {
            return;
        }
        if self.passes_through() {
            self.inner.insert_header(name, value);
        } else if state.status.is_none() {
            state.headers.insert(name, value);
        }
    }

    fn append_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.state.lock();
        if state.sealed {
            return;
        }
        if self.passes_through() {
            self.inner.append_header(name, value);
        } else if state.status.is_none() {
            state.headers.append(name, value);
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut state = self.state.lock();
        if state.sealed {
            return Err(Error::Released);
        }
        if state.status.is_none() {
            state.status = Some(StatusCode::OK);
            if self.passes_through() {
                self.inner.set_status(StatusCode::OK);
            }
        }

        let n = match self.hook {
            Hook::Forward => self.inner.write(buf)?,
            Hook::Mirror => {
                let n = self.inner.write(buf)?;
                if let Some(side) = state.side.as_mut() {
                    side.extend_from_slice(&buf[..n]);
                }
                n
            }
            Hook::Hijack => {
                if let Some(side) = state.side.as_mut() {
                    side.extend_from_slice(buf);
                }
                buf.len()
            }
        };
        state.bytes += n as u64;
        Ok(n)
    }

    fn written(&self) -> bool {
        self.state.lock().status.is_some()
    }
}
