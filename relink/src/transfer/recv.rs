//! Receive half of a transfer: AWAIT_START, ACCEPT, COLLECT, DELIVER.

use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::Endpoint;
use crate::codec::{Flags, Frame};
use crate::config::COLLECT_TIMEOUT;
use crate::error::{Error, Result};

impl<L: AsyncRead + AsyncWrite + Unpin> Endpoint<L> {
    /// Receives one whole payload addressed to this endpoint, returning
    /// it together with the sender's id.
    ///
    /// `wait` bounds only the wait for a transfer to begin; `None`
    /// blocks until a START arrives. Once a transfer is underway every
    /// data frame gets its own fixed deadline, and a broken transfer
    /// quietly goes back to waiting for the sender's next START.
    pub async fn recv(&mut self, wait: Option<Duration>) -> Result<(Vec<u8>, u8)> {
        'await_start: loop {
            let raw = self.read_raw(wait).await?;
            let start = match Frame::decode(&raw) {
                Ok(frame) if frame.valid => frame,
                _ => {
                    warn!("received an invalid frame, waiting for another");
                    continue 'await_start;
                }
            };
            if start.dest != self.id {
                continue 'await_start;
            }
            if !start.flags.contains(Flags::START) {
                continue 'await_start;
            }
            let peer = start.src;
            let total = start.seq;
            let window = start.size;

            if total == 0 || window == 0 {
                // A ping carries no data; accept and finish in one frame.
                self.write_frame(&Frame::accept_done(peer, self.id, total, window))
                    .await?;
                return Ok((Vec::new(), peer));
            }

            self.write_frame(&Frame::accept(peer, self.id, total, window))
                .await?;

            // Chunks may arrive in any order; each lands in its slot by
            // index, and the transfer completes once every slot is full.
            let mut slots: Vec<Option<Vec<u8>>> = vec![None; total as usize];
            let mut filled: u16 = 0;
            while filled < total {
                let raw = match self.read_raw(Some(COLLECT_TIMEOUT)).await {
                    Ok(raw) => raw,
                    Err(Error::ReceiveTimeout) => {
                        warn!("missing data frames, reporting failure and awaiting a new START");
                        self.write_frame(&Frame::failure(peer, self.id, total, window))
                            .await?;
                        continue 'await_start;
                    }
                    Err(e) => return Err(e),
                };
                let chunk = match Frame::decode(&raw) {
                    Ok(frame) if frame.valid && frame.flags == Flags::EMPTY => frame,
                    _ => {
                        self.write_frame(&Frame::failure(peer, self.id, total, window))
                            .await?;
                        continue 'await_start;
                    }
                };
                if chunk.seq >= total {
                    // junk index that nonetheless survived the checksum
                    self.write_frame(&Frame::failure(peer, self.id, total, window))
                        .await?;
                    continue 'await_start;
                }
                let slot = &mut slots[chunk.seq as usize];
                if slot.is_some() {
                    // A slot delivered twice means a stale restart is
                    // interleaving with this one. Abandon quietly; the
                    // sender's deadline will bring a fresh START.
                    debug!("chunk {} delivered twice, awaiting a new START", chunk.seq);
                    continue 'await_start;
                }
                *slot = Some(chunk.data);
                filled += 1;
            }

            let mut data = Vec::new();
            for slot in slots {
                if let Some(chunk) = slot {
                    data.extend_from_slice(&chunk);
                }
            }
            self.write_frame(&Frame::done(peer, self.id, total, window))
                .await?;
            return Ok((data, peer));
        }
    }
}
