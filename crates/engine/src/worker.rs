//! Background worker: one long-lived thread driving flushes and
//! compactions.
//!
//! The worker listens on two capacity-1 signal channels (senders use
//! `try_send`, so any number of pressure events while a wake-up is
//! pending collapse into one), plus a periodic tick and a stop channel.
//! It holds only a `Weak` reference to the engine's shared state: the
//! worker can never keep a dropped engine alive, and a failed upgrade is
//! its cue to exit.
//!
//! Lock discipline: each arm takes the engine mutex as a scoped guard
//! that is released on every path out of the arm, including errors.

use crossbeam_channel::{select, tick, Receiver};
use log::error;
use std::sync::Weak;
use std::time::Duration;

use crate::Shared;

pub(crate) fn run(
    engine: Weak<Shared>,
    flush_rx: Receiver<()>,
    compact_rx: Receiver<()>,
    stop_rx: Receiver<()>,
    tick_interval: Duration,
) {
    let ticker = tick(tick_interval);

    loop {
        select! {
            recv(flush_rx) -> msg => {
                if msg.is_err() {
                    return;
                }
                let Some(shared) = engine.upgrade() else { return };
                let mut st = shared.state.lock();
                if !st.closed && !st.mem.is_empty() {
                    if let Err(e) = shared.flush_locked(&mut st) {
                        error!("background flush failed: {}", e);
                    }
                }
            }
            recv(compact_rx) -> msg => {
                if msg.is_err() {
                    return;
                }
                let Some(shared) = engine.upgrade() else { return };
                let mut st = shared.state.lock();
                if !st.closed && st.tables.len() > 1 {
                    if let Err(e) = shared.compact_locked(&mut st) {
                        error!("background compaction failed: {}", e);
                    }
                }
            }
            recv(ticker) -> _ => {
                let Some(shared) = engine.upgrade() else { return };
                let mut st = shared.state.lock();
                if !st.closed && st.tables.len() >= shared.opts.compact_trigger {
                    if let Err(e) = shared.compact_locked(&mut st) {
                        error!("periodic compaction failed: {}", e);
                    }
                }
            }
            recv(stop_rx) -> _ => {
                return;
            }
        }
    }
}
