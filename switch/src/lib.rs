//! The forwarding switch.
//!
//! Every endpoint talks only to the switch, which routes frames by
//! destination id and deliberately degrades the link to exercise the
//! protocol. Per registered id there is exactly one receive loop and
//! one drainer; all queue state sits behind a single process-wide
//! lock, held only across queue operations, never across I/O.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use relink::{DRAIN_INTERVAL, Flags, Frame, MAX_FRAME_LEN};

/// How aggressively the switch degrades traffic. The default forwards
/// everything untouched, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profile {
    /// Percentage of frames discarded outright.
    pub drop_percent: u8,

    /// Percentage of surviving frames with the third-from-last byte
    /// zeroed, a mutation that parses fine and fails the checksum.
    pub corrupt_percent: u8,

    /// Shuffle each queue before popping, so a frame's delivery slot
    /// depends on everything else currently in flight to that id.
    pub jitter: bool,
}

/// Routing state for every registered endpoint.
#[derive(Default)]
struct Routes {
    /// Frames pending delivery, keyed by destination id. Queues are
    /// unbounded and survive their destination closing; frames to a
    /// dead id simply accumulate.
    queues: HashMap<u8, VecDeque<Vec<u8>>>,

    /// Ids whose drainer must exit on its next tick.
    closed: HashMap<u8, bool>,
}

/// The switch: a lookup-by-id frame forwarder with a degradation stage.
pub struct Switch {
    routes: Mutex<Routes>,
    profile: Profile,
}

enum Verdict {
    Forward,
    Corrupt,
    Drop,
}

impl Switch {
    pub fn new(profile: Profile) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(Routes::default()),
            profile,
        })
    }

    /// Accepts endpoint connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("accepted connection from {peer}");
            tokio::spawn(self.clone().handle_endpoint(stream));
        }
    }

    /// Receive loop for one endpoint: the registration byte first, then
    /// one frame per read until the link dies.
    async fn handle_endpoint(self: Arc<Self>, stream: TcpStream) {
        let (mut reader, writer) = stream.into_split();
        let mut id_buf = [0u8; 1];
        if let Err(e) = reader.read_exact(&mut id_buf).await {
            warn!("connection lost before registering: {e}");
            return;
        }
        let id = id_buf[0];
        info!("+ connection from <{}>", id as char);
        self.lock_routes().closed.insert(id, false);
        tokio::spawn(self.clone().drain(id, writer));

        self.clone().pump(&mut reader, id).await;

        info!("- connection from <{}>", id as char);
        self.lock_routes().closed.insert(id, true);
    }

    /// Forwards inbound frames to their destination queues.
    async fn pump(self: Arc<Self>, reader: &mut OwnedReadHalf, id: u8) {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    warn!("read from <{}> failed: {e}", id as char);
                    return;
                }
            };
            // Routing needs nothing but the destination id. Whether the
            // checksum holds is the endpoints' business; only a frame
            // that cannot be parsed at all is dropped here.
            match Frame::decode(&buf[..n]) {
                Ok(frame) => {
                    debug!(
                        "<{}> {} frame to <{}>",
                        id as char,
                        describe(&frame),
                        frame.dest as char
                    );
                    self.lock_routes()
                        .queues
                        .entry(frame.dest)
                        .or_default()
                        .push_back(buf[..n].to_vec());
                }
                Err(_) => debug!("<{}> sent an unparseable frame, dropped", id as char),
            }
        }
    }

    /// Drains one destination's queue at a fixed cadence, one frame per
    /// tick, applying the degradation profile on the way out.
    async fn drain(self: Arc<Self>, id: u8, mut writer: OwnedWriteHalf) {
        loop {
            tokio::time::sleep(DRAIN_INTERVAL).await;
            let popped = {
                let mut routes = self.lock_routes();
                if routes.closed.get(&id).copied().unwrap_or(false) {
                    routes.closed.insert(id, false);
                    return;
                }
                match routes.queues.get_mut(&id) {
                    Some(queue) if !queue.is_empty() => {
                        if self.profile.jitter {
                            queue.make_contiguous().shuffle(&mut rand::thread_rng());
                        }
                        queue.pop_front()
                    }
                    _ => None,
                }
            };
            let Some(mut frame) = popped else { continue };

            let verdict = {
                let mut rng = rand::thread_rng();
                if rng.gen_range(0..100u8) < self.profile.drop_percent {
                    Verdict::Drop
                } else if rng.gen_range(0..100u8) < self.profile.corrupt_percent {
                    Verdict::Corrupt
                } else {
                    Verdict::Forward
                }
            };
            match verdict {
                Verdict::Drop => {
                    info!("dropped a frame bound for <{}>", id as char);
                    continue;
                }
                Verdict::Corrupt => {
                    info!("flipped some bits bound for <{}>", id as char);
                    let at = frame.len() - 3;
                    frame[at] = 0;
                }
                Verdict::Forward => {}
            }
            if let Err(e) = writer.write_all(&frame).await {
                warn!("write to <{}> failed: {e}", id as char);
                return;
            }
        }
    }

    fn lock_routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frame kind for the forwarding log.
fn describe(frame: &Frame) -> &'static str {
    let flags = frame.flags;
    if flags == Flags::START {
        "START"
    } else if flags == Flags::ACCEPT {
        "ACCEPT"
    } else if flags == Flags::ACCEPT.union(Flags::DONE) {
        "ACCEPT|DONE"
    } else if flags == Flags::DONE {
        "DONE"
    } else if flags == Flags::FAILURE {
        "FAILURE"
    } else if flags == Flags::EMPTY {
        "data"
    } else {
        "odd"
    }
}
