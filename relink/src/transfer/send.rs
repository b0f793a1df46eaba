//! Send half of a transfer: HANDSHAKE, STREAM, FINALIZE.

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::Endpoint;
use crate::codec::{Flags, Frame};
use crate::config::{FINALIZE_TIMEOUT, HANDSHAKE_TIMEOUT, MAX_CHUNK_LEN};
use crate::error::{Error, Result};

impl<L: AsyncRead + AsyncWrite + Unpin> Endpoint<L> {
    /// Delivers `payload` to `dest` as chunks of at most `window`
    /// bytes, restarting the whole transfer on every recovered anomaly
    /// and giving up after `tolerance` restarts.
    ///
    /// A zero window, or an empty payload, degenerates to a ping: one
    /// START answered by one ACCEPT|DONE, no data on the wire.
    pub async fn send(
        &mut self,
        dest: u8,
        payload: &[u8],
        window: u16,
        tolerance: u16,
    ) -> Result<()> {
        if (window as usize) * MAX_CHUNK_LEN < payload.len() {
            return Err(Error::PayloadTooLarge);
        }
        let total = total_chunks(payload.len(), window);
        let query = Frame::start(dest, self.id, total, window).encode()?;
        let mut attempts: u16 = 0;

        'transfer: loop {
            if attempts > tolerance {
                return Err(Error::AttemptsExhausted);
            }
            attempts += 1;

            self.link.write_all(&query).await?;
            let raw = match self.read_raw(Some(HANDSHAKE_TIMEOUT)).await {
                Ok(raw) => raw,
                Err(Error::ReceiveTimeout) => {
                    debug!("timed out waiting for the handshake response");
                    continue 'transfer;
                }
                Err(e) => return Err(e),
            };
            let reply = match Frame::decode(&raw) {
                Ok(frame) if frame.valid => frame,
                _ => {
                    debug!("handshake response corrupt or invalid, restarting");
                    continue 'transfer;
                }
            };
            if reply.dest != self.id
                || reply.src != dest
                || reply.seq != total
                || reply.size != window
            {
                debug!("handshake response belongs to a different transfer, restarting");
                continue 'transfer;
            }
            if reply.flags.contains(Flags::IGNORE) {
                return Err(Error::PeerRefusing);
            }
            if !reply.flags.contains(Flags::ACCEPT) {
                debug!("handshake response did not accept, restarting");
                continue 'transfer;
            }

            if total == 0 {
                // Nothing to stream; the accept doubles as the terminal
                // response and must carry DONE.
                if reply.flags.contains(Flags::DONE) {
                    return Ok(());
                }
                continue 'transfer;
            }

            // Stream every chunk back to back. No chunk is acknowledged
            // individually, so a receiver that already knows the
            // transfer is doomed still watches the rest arrive.
            for (seq, chunk) in payload.chunks(window as usize).enumerate() {
                let frame = Frame::chunk(dest, self.id, seq as u16, chunk.to_vec()).encode()?;
                self.link.write_all(&frame).await?;
            }

            let raw = match self.read_raw(Some(FINALIZE_TIMEOUT)).await {
                Ok(raw) => raw,
                Err(Error::ReceiveTimeout) => {
                    warn!("DONE not received, assuming the transfer failed, restarting");
                    continue 'transfer;
                }
                Err(e) => return Err(e),
            };
            let reply = match Frame::decode(&raw) {
                Ok(frame) if frame.valid => frame,
                _ => continue 'transfer,
            };
            if reply.dest != self.id
                || reply.src != dest
                || reply.seq != total
                || reply.size != window
            {
                continue 'transfer;
            }
            if reply.flags.contains(Flags::FAILURE) {
                debug!("receiver reported failure, restarting");
                continue 'transfer;
            }
            if !reply.flags.contains(Flags::DONE) {
                // The checksum held, yet the flag is not the one the
                // protocol leaves room for here; the link has proven
                // itself unstable enough that only a restart is safe.
                continue 'transfer;
            }
            return Ok(());
        }
    }
}

/// Number of data frames a payload occupies under the given window.
fn total_chunks(len: usize, window: u16) -> u16 {
    if window == 0 {
        return 0;
    }
    len.div_ceil(window as usize) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_chunks() {
        assert_eq!(total_chunks(0, 0), 0);
        assert_eq!(total_chunks(0, 16), 0);
        assert_eq!(total_chunks(5, 1), 5);
        assert_eq!(total_chunks(5, 2), 3);
        assert_eq!(total_chunks(16, 16), 1);
        assert_eq!(total_chunks(17, 16), 2);
    }
}
