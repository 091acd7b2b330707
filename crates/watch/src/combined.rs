// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-in of the filesystem watcher and the feed poller for
//! `HOT_RELOAD_MODE=Both`.

use tokio::sync::{mpsc, oneshot};

use crate::WatcherHandle;

/// Forwards triggers from both `a` and `b` onto a single channel until
/// stopped. Consumes both handles.
pub struct CombinedWatcher;

impl CombinedWatcher {
    pub fn start(a: WatcherHandle, b: WatcherHandle) -> WatcherHandle {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let WatcherHandle {
                triggers: mut a_rx,
                shutdown: a_shutdown,
            } = a;
            let WatcherHandle {
                triggers: mut b_rx,
                shutdown: b_shutdown,
            } = b;
            let mut shutdown_rx = shutdown_rx;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    Some(trigger) = a_rx.recv() => {
                        if tx.send(trigger).await.is_err() {
                            break;
                        }
                    }
                    Some(trigger) = b_rx.recv() => {
                        if tx.send(trigger).await.is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }

            let _ = a_shutdown.send(());
            let _ = b_shutdown.send(());
        });

        WatcherHandle::new(rx, shutdown_tx)
    }
}
