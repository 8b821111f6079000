use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

use super::event::Event;
use super::sink::{EventSink, StdOutSink};

/// Fan-out hub between stage/invoker producers and telemetry sinks.
///
/// Producers hold a cloned [`flume::Sender`] from [`get_sender`](EventBus::get_sender)
/// and fire events without awaiting; a failed send is the producer's signal
/// that telemetry is gone, never a reason to fail the workflow.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    listener: Mutex<Option<Listener>>,
}

struct Listener {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            sender,
            receiver,
            listener: Mutex::new(None),
        }
    }

    /// Attach another sink while the bus is live.
    ///
    /// # Example
    /// ```no_run
    /// use followgraph::event_bus::{EventBus, ChannelSink};
    ///
    /// let bus = EventBus::default();
    /// bus.listen_for_events();
    ///
    /// let (tx, rx) = flume::unbounded();
    /// bus.add_sink(ChannelSink::new(tx));
    /// // Events now reach both stdout and the channel.
    /// ```
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Clone of the producer side of the channel.
    pub fn get_sender(&self) -> flume::Sender<Event> {
        self.sender.clone()
    }

    /// Spawn the background task that drains the channel into every sink.
    /// Idempotent: a second call while a listener is live does nothing.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.receiver.clone();
        let sinks = Arc::clone(&self.sinks);
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => {
                        let Ok(event) = recv else { break };
                        let mut sinks = sinks.lock().unwrap();
                        for sink in sinks.iter_mut() {
                            if let Err(e) = sink.handle(&event) {
                                warn!(error = %e, "event sink write failed");
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(Listener { shutdown, task });
    }

    /// Stop the listener and wait for it to drain.
    pub async fn stop_listener(&self) {
        let listener = self.listener.lock().expect("listener poisoned").take();
        if let Some(listener) = listener {
            let _ = listener.shutdown.send(());
            let _ = listener.task.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(listener) = guard.take() {
                let _ = listener.shutdown.send(());
                listener.task.abort();
            }
        }
    }
}
