use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task;

use crate::client::FetchOutcome;

/// Quiet period before a burst of keystrokes turns into one request.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(500);

/// Monotonically increasing request token for a single view. A response is
/// only applied if its token is still the newest one issued, so a slow
/// request that was superseded mid-flight can never clobber fresher data.
#[derive(Debug, Default)]
pub struct RequestSequence(AtomicU64);

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.0.load(Ordering::SeqCst) == token
    }
}

/// Waits for the next query, then keeps swallowing newer ones until the
/// channel has been quiet for `quiet`. Returns `None` once the channel is
/// closed and drained.
pub async fn next_query(rx: &mut mpsc::Receiver<String>, quiet: Duration) -> Option<String> {
    let mut latest = rx.recv().await?;
    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Ok(Some(newer)) => latest = newer,
            Ok(None) | Err(_) => return Some(latest),
        }
    }
}

/// Debounced fetch loop for one search box: coalesces keystrokes, fires
/// `fetch` for the settled query, and forwards only responses that are
/// still current. Superseded requests are left to finish and their results
/// dropped rather than cancelled.
pub async fn search_loop<F, Fut>(
    mut rx: mpsc::Receiver<String>,
    quiet: Duration,
    fetch: F,
    out: mpsc::Sender<(String, FetchOutcome)>,
) where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    let fetch = Arc::new(fetch);
    let seq = Arc::new(RequestSequence::new());
    let mut in_flight: Vec<task::JoinHandle<()>> = Vec::new();

    while let Some(query) = next_query(&mut rx, quiet).await {
        in_flight.retain(|h| !h.is_finished());
        let token = seq.begin();
        let fetch = fetch.clone();
        let seq = seq.clone();
        let out = out.clone();
        in_flight.push(task::spawn(async move {
            let outcome = fetch(query.clone()).await;
            if !seq.is_current(token) {
                return;
            }
            let _ = out.send((query, outcome)).await;
        }));
    }

    for handle in in_flight {
        let _ = handle.await;
    }
}
