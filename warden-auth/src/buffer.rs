// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing of bursts of requests into a single run of an action.
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

type Action = Arc<dyn Fn() + Send + Sync>;

type Waiter = oneshot::Sender<()>;

/// Runs an action once after a burst of requests settled.
///
/// Every request restarts the window, the action runs when no further request arrived for the
/// duration of the window. All requests of a burst are completed by that single run, so at least
/// one run happens after the last request.
///
/// The background task is started on the current tokio runtime with the first request. Outside
/// of a runtime requests run the action directly.
#[derive(Clone)]
pub struct DebounceBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    window: Duration,
    action: Action,
    sender: OnceLock<mpsc::UnboundedSender<Waiter>>,
}

impl DebounceBuffer {
    pub fn new<F>(window: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                window,
                action: Arc::new(action),
                sender: OnceLock::new(),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Requests a run of the action.
    ///
    /// The request is registered immediately, the returned future resolves after the run which
    /// covers it. Dropping the future does not cancel the request.
    pub fn request(&self) -> impl Future<Output = ()> + use<> {
        let receiver = match Handle::try_current() {
            Ok(handle) => self.enqueue(&handle),
            Err(_) => None,
        };

        if receiver.is_none() {
            self.request_directly();
        }

        async move {
            if let Some(receiver) = receiver {
                let _ = receiver.await;
            }
        }
    }

    /// Runs the action right away, bypassing the window.
    pub fn request_directly(&self) {
        (self.inner.action)();
    }

    fn enqueue(&self, handle: &Handle) -> Option<oneshot::Receiver<()>> {
        let sender = self.inner.sender.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            handle.spawn(run(self.inner.window, self.inner.action.clone(), receiver));
            sender
        });

        let (waiter, receiver) = oneshot::channel();
        match sender.send(waiter) {
            Ok(()) => Some(receiver),
            Err(_) => {
                // The runtime the task was started on is gone.
                trace!("debounce task stopped, running directly");
                None
            }
        }
    }
}

async fn run(window: Duration, action: Action, mut requests: mpsc::UnboundedReceiver<Waiter>) {
    while let Some(first) = requests.recv().await {
        let mut waiters = vec![first];
        let deadline = sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                next = requests.recv() => match next {
                    Some(waiter) => {
                        waiters.push(waiter);
                        deadline.as_mut().reset(Instant::now() + window);
                    }
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }

        debug!(requests = waiters.len(), "running debounced action");
        action();
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl fmt::Debug for DebounceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceBuffer")
            .field("window", &self.inner.window)
            .field("started", &self.inner.sender.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_test::task::noop_context;

    use super::DebounceBuffer;

    fn counting(window: Duration) -> (DebounceBuffer, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let buffer = DebounceBuffer::new(window, {
            let runs = runs.clone();
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        (buffer, runs)
    }

    #[tokio::test]
    async fn bursts_are_coalesced() {
        let (buffer, runs) = counting(Duration::from_millis(20));

        let first = buffer.request();
        let second = buffer.request();
        let third = buffer.request();
        tokio::join!(first, second, third);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        buffer.request().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pending_inside_window() {
        let (buffer, runs) = counting(Duration::from_millis(20));

        let mut request = pin!(buffer.request());
        let mut cx = noop_context();
        assert!(request.as_mut().poll(&mut cx).is_pending());
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        request.await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_request_still_runs() {
        let (buffer, runs) = counting(Duration::from_millis(10));
        drop(buffer.request());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runs_directly_without_runtime() {
        let (buffer, runs) = counting(Duration::from_secs(60));
        let _ = buffer.request();
        buffer.request_directly();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
