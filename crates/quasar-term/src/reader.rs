// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background stdin reader.
//
// A dedicated thread polls stdin and forwards raw byte chunks into the
// event loop's channel as `Incoming::Input`. The same channel carries the
// application's own messages (finished LaTeX compiles), so the loop wakes
// for either with a single `recv_timeout`.
//
// Shutdown: `poll()` with a short timeout, checking an `AtomicBool` stop
// flag between polls, so the thread never sits in a blocking `read()`.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use crate::event_loop::Incoming;

/// Bytes per `read()`. A keypress is a few bytes, a paste can be kilobytes.
const READ_BUF_SIZE: usize = 4096;

/// How often the thread checks the stop flag (milliseconds).
const POLL_TIMEOUT_MS: i32 = 50;

/// Background stdin reader thread.
///
/// Runs until [`stop`](Self::stop) is called, the `StdinReader` is dropped,
/// stdin hits EOF, or the receiving end of the channel goes away.
pub struct StdinReader {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StdinReader {
    /// Spawn the reader thread, forwarding chunks into `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<M: Send + 'static>(tx: Sender<Incoming<M>>) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || reader_loop(&tx, &stop_flag))?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Signal the thread to stop and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn reader_loop<M>(tx: &Sender<Incoming<M>>, stop: &AtomicBool) {
    use std::os::unix::io::AsRawFd;

    let stdin_fd = io::stdin().as_raw_fd();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd: stdin_fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS)
        };
        if ready <= 0 {
            continue;
        }

        let n = unsafe { libc::read(stdin_fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n <= 0 {
            break;
        }

        #[allow(clippy::cast_sign_loss)]
        let chunk = buf[..n as usize].to_vec();
        if tx.send(Incoming::Input(chunk)).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
fn reader_loop<M>(tx: &Sender<Incoming<M>>, stop: &AtomicBool) {
    use std::io::Read;

    let stdin = io::stdin();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        match stdin.lock().read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(Incoming::Input(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn spawn_and_stop() {
        let (tx, _rx) = mpsc::channel::<Incoming<()>>();
        let mut reader = StdinReader::spawn(tx).unwrap();
        reader.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let (tx, _rx) = mpsc::channel::<Incoming<()>>();
        let mut reader = StdinReader::spawn(tx).unwrap();
        reader.stop();
        reader.stop();
    }

    #[test]
    fn drop_stops_reader() {
        let (tx, _rx) = mpsc::channel::<Incoming<u32>>();
        let reader = StdinReader::spawn(tx).unwrap();
        drop(reader);
    }
}
