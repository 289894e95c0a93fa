use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::frame::{split_multiframe, Frame, FrameDecoder, SeqCounter};

/// External I/O errors (spec.md §7 regime 3): socket reads that return a
/// real error rather than "would block" are unrecoverable in the
/// emulator's model and abort.
#[derive(Debug, thiserror::Error)]
pub enum IoxError {
    #[error("IOX socket {path}: {source}")]
    Io { path: PathBuf, #[source] source: io::Error },
}

/// One Unix-domain-socket listener plus at-most-one connected client,
/// bridging a single peripheral instance to external processes (spec.md
/// §4.14). Accepts exactly one client; further connects are accepted and
/// immediately dropped rather than left to back up the listen backlog.
pub struct IoxServer {
    path: PathBuf,
    listener: UnixListener,
    client: Option<UnixStream>,
    decoder: FrameDecoder,
    seq: SeqCounter,
    out_buf: VecDeque<u8>,
}

impl IoxServer {
    /// Binds the listener at `path`, removing a stale socket file left
    /// behind by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, IoxError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|source| IoxError::Io { path: path.clone(), source })?;
        }
        let listener =
            UnixListener::bind(&path).map_err(|source| IoxError::Io { path: path.clone(), source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| IoxError::Io { path: path.clone(), source })?;
        Ok(Self {
            path,
            listener,
            client: None,
            decoder: FrameDecoder::new(),
            seq: SeqCounter::new(),
            out_buf: VecDeque::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Drives accept/read/write for one host-loop tick and returns every
    /// inbound frame that became complete. Never blocks.
    pub fn poll(&mut self) -> Result<Vec<Frame>, IoxError> {
        self.accept()?;
        let frames = self.read_available()?;
        self.flush()?;
        Ok(frames)
    }

    fn accept(&mut self) -> Result<(), IoxError> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if self.client.is_some() {
                        tracing::debug!(path = %self.path.display(), "IOX: rejecting second client");
                        drop(stream);
                        continue;
                    }
                    stream
                        .set_nonblocking(true)
                        .map_err(|source| IoxError::Io { path: self.path.clone(), source })?;
                    tracing::debug!(path = %self.path.display(), "IOX: client connected");
                    self.client = Some(stream);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(source) => return Err(IoxError::Io { path: self.path.clone(), source }),
            }
        }
    }

    fn read_available(&mut self) -> Result<Vec<Frame>, IoxError> {
        let Some(stream) = self.client.as_mut() else {
            return Ok(Vec::new());
        };
        let mut buf = [0u8; 4096];
        let mut frames = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!(path = %self.path.display(), "IOX: client disconnected");
                    self.client = None;
                    break;
                }
                Ok(n) => frames.extend(self.decoder.push(&buf[..n])),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(source) => return Err(IoxError::Io { path: self.path.clone(), source }),
            }
        }
        Ok(frames)
    }

    /// Queues a spontaneous outbound message, splitting into a multiframe
    /// sequence if `payload` exceeds 255 bytes, all sharing one
    /// auto-incremented `seq`.
    pub fn send(&mut self, cat: u8, id: u8, payload: &[u8]) {
        let seq = self.seq.next();
        self.queue(split_multiframe(seq, cat, id, payload));
    }

    /// Queues a reply to an inbound request, copying its `seq` byte
    /// unchanged rather than allocating a new one (spec.md §4.14).
    pub fn respond(&mut self, request_seq: u8, cat: u8, id: u8, payload: &[u8]) {
        self.queue(split_multiframe(request_seq, cat, id, payload));
    }

    fn queue(&mut self, frames: Vec<Frame>) {
        for f in frames {
            self.out_buf.extend(f.encode());
        }
    }

    fn flush(&mut self) -> Result<(), IoxError> {
        let Some(stream) = self.client.as_mut() else {
            // No client to drain to; outbound bytes are dropped, matching
            // "excess client data is dropped" / best-effort delivery when
            // nobody is listening.
            self.out_buf.clear();
            return Ok(());
        };
        while !self.out_buf.is_empty() {
            let contiguous = self.out_buf.make_contiguous();
            match stream.write(contiguous) {
                Ok(0) => break,
                Ok(n) => {
                    self.out_buf.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(source) => return Err(IoxError::Io { path: self.path.clone(), source }),
            }
        }
        Ok(())
    }
}

impl Drop for IoxServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream as ClientStream;
    use std::thread::sleep;
    use std::time::Duration;

    fn socket_path(tmp: &tempfile::TempDir, name: &str) -> PathBuf {
        tmp.path().join(name)
    }

    #[test]
    fn accepts_one_client_and_closes_further_connects() {
        let tmp = tempfile::tempdir().unwrap();
        let path = socket_path(&tmp, "a");
        let mut server = IoxServer::bind(&path).unwrap();

        let c1 = ClientStream::connect(&path).unwrap();
        sleep(Duration::from_millis(10));
        server.poll().unwrap();
        assert!(server.has_client());

        let mut c2 = ClientStream::connect(&path).unwrap();
        sleep(Duration::from_millis(10));
        server.poll().unwrap();
        // c2 was accepted then dropped; its peer will observe EOF.
        let mut buf = [0u8; 1];
        let n = c2.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
        drop(c1);
    }

    #[test]
    fn round_trips_a_frame_through_real_sockets() {
        let tmp = tempfile::tempdir().unwrap();
        let path = socket_path(&tmp, "b");
        let mut server = IoxServer::bind(&path).unwrap();
        let mut client = ClientStream::connect(&path).unwrap();
        client.set_nonblocking(true).unwrap();

        let frame = Frame { seq: 0x00, cat: 0x01, id: 0x01, payload: vec![1, 2, 3] };
        client.write_all(&frame.encode()).unwrap();

        let mut frames = Vec::new();
        for _ in 0..20 {
            frames.extend(server.poll().unwrap());
            if !frames.is_empty() {
                break;
            }
            sleep(Duration::from_millis(5));
        }
        assert_eq!(frames, vec![frame.clone()]);

        server.respond(frame.seq, 0x01, 0x01, &0u32.to_le_bytes());
        server.poll().unwrap();

        let mut buf = [0u8; 16];
        let mut n = 0;
        for _ in 0..20 {
            match client.read(&mut buf) {
                Ok(k) => {
                    n = k;
                    break;
                }
                Err(_) => sleep(Duration::from_millis(5)),
            }
        }
        assert_eq!(&buf[..n], &[0x00, 0x01, 0x01, 0x04, 0, 0, 0, 0]);
    }

    #[test]
    fn large_send_splits_across_frames_sharing_seq() {
        let tmp = tempfile::tempdir().unwrap();
        let path = socket_path(&tmp, "c");
        let mut server = IoxServer::bind(&path).unwrap();
        let mut client = ClientStream::connect(&path).unwrap();
        client.set_nonblocking(true).unwrap();
        sleep(Duration::from_millis(10));
        server.poll().unwrap();

        let data = vec![0x5au8; 300];
        server.send(0x01, 0x02, &data);
        server.poll().unwrap();

        let mut received = Vec::new();
        for _ in 0..40 {
            let mut buf = [0u8; 512];
            match client.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    received.extend_from_slice(&buf[..n]);
                    if received.len() >= 4 + 255 + 4 + 45 {
                        break;
                    }
                }
                Err(_) => sleep(Duration::from_millis(5)),
            }
        }

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&received);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].seq, frames[1].seq);
        let reassembled: Vec<u8> = frames.iter().flat_map(|f| f.payload.clone()).collect();
        assert_eq!(reassembled, data);
    }
}
