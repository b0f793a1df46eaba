//! In-process frame-preserving link.
//!
//! The codec is not self-delimiting on a raw byte stream: it relies on
//! the transport delivering each single write as a single read. TCP
//! honors that only demo-grade; this pipe makes it literal, which is
//! what the transfer tests and in-process demos want.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

/// Creates a connected pair of frame-preserving duplex links.
pub fn pipe() -> (FramePipe, FramePipe) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();
    (
        FramePipe {
            tx: left_tx,
            rx: right_rx,
            pending: None,
        },
        FramePipe {
            tx: right_tx,
            rx: left_rx,
            pending: None,
        },
    )
}

/// One end of an in-process duplex link. Every write surfaces as
/// exactly one read on the peer; dropping an end gives the peer EOF.
pub struct FramePipe {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Remainder of a message the reader's buffer could not hold.
    pending: Option<(Vec<u8>, usize)>,
}

impl AsyncRead for FramePipe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let (message, pos) = match self.pending.take() {
            Some(partial) => partial,
            None => match self.rx.poll_recv(cx) {
                Poll::Ready(Some(message)) => (message, 0),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            },
        };
        let n = buf.remaining().min(message.len() - pos);
        buf.put_slice(&message[pos..pos + n]);
        if pos + n < message.len() {
            self.pending = Some((message, pos + n));
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for FramePipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.tx.send(buf.to_vec()).is_err() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer closed",
            )));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_writes_keep_their_boundaries() {
        let (mut left, mut right) = pipe();
        left.write_all(b"first").await.unwrap();
        left.write_all(b"second!").await.unwrap();

        let mut buf = [0u8; 64];
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"second!");
    }

    #[tokio::test]
    async fn test_short_reads_resume_the_same_message() {
        let (mut left, mut right) = pipe();
        left.write_all(b"abcdef").await.unwrap();

        let mut buf = [0u8; 4];
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abcd");
        let n = right.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ef");
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_eof() {
        let (left, mut right) = pipe();
        drop(left);
        let mut buf = [0u8; 8];
        assert_eq!(right.read(&mut buf).await.unwrap(), 0);
    }
}
