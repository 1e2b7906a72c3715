//! Debounced autosave trigger.
//!
//! Every keystroke calls `touch`; the receiver sees exactly one tick once the
//! input has been quiet for `quiet`.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Clone)]
pub struct Debouncer {
  tx: mpsc::UnboundedSender<()>,
}

impl Debouncer {
  /// Start the debounce task. It ends when every `Debouncer` handle is dropped
  /// or the receiver goes away.
  pub fn spawn(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
    let (tx, input) = mpsc::unbounded_channel();
    let (fire, fired) = mpsc::unbounded_channel();
    tokio::spawn(run(quiet, input, fire));
    (Self { tx }, fired)
  }

  /// Restart the quiet period.
  pub fn touch(&self) {
    let _ = self.tx.send(());
  }
}

async fn run(quiet: Duration, mut input: mpsc::UnboundedReceiver<()>, fire: mpsc::UnboundedSender<()>) {
  while input.recv().await.is_some() {
    loop {
      match tokio::time::timeout(quiet, input.recv()).await {
        Ok(Some(())) => continue,
        // all handles gone: flush the pending edit and stop
        Ok(None) => {
          let _ = fire.send(());
          return;
        }
        Err(_) => break,
      }
    }
    debug!(target: "session", "Autosave quiet period elapsed");
    if fire.send(()).is_err() {
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const QUIET: Duration = Duration::from_millis(500);

  #[tokio::test(start_paused = true)]
  async fn burst_of_touches_fires_once() {
    let (d, mut fired) = Debouncer::spawn(QUIET);
    for _ in 0..10 {
      d.touch();
      tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(fired.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(fired.try_recv().is_ok());
    assert!(fired.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn separate_bursts_fire_separately() {
    let (d, mut fired) = Debouncer::spawn(QUIET);
    d.touch();
    tokio::time::sleep(Duration::from_millis(700)).await;
    d.touch();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(fired.recv().await.is_some());
    assert!(fired.recv().await.is_some());
    assert!(fired.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn no_touch_no_fire() {
    let (_d, mut fired) = Debouncer::spawn(QUIET);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(fired.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_handle_flushes_pending_edit() {
    let (d, mut fired) = Debouncer::spawn(QUIET);
    d.touch();
    tokio::task::yield_now().await;
    drop(d);
    assert!(fired.recv().await.is_some());
    assert!(fired.recv().await.is_none());
  }
}
