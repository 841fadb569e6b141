// Autoplay unlock: wait for the first qualifying user input
//
// Playback environments commonly refuse sound until the user interacts. The
// host publishes raw input on an `InputBus`; a listener resolves once with the
// first accepted input and drops its single subscription with it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// User input that counts as a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    PointerMove,
    Click,
    Touch,
    Key,
}

impl InputKind {
    pub const ALL: [InputKind; 4] = [
        InputKind::PointerMove,
        InputKind::Click,
        InputKind::Touch,
        InputKind::Key,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::PointerMove => "move",
            InputKind::Click => "click",
            InputKind::Touch => "touch",
            InputKind::Key => "key",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown input: {}", s))
    }
}

const BUS_CAPACITY: usize = 64;

/// Fan-out of host input events
#[derive(Debug, Clone)]
pub struct InputBus {
    tx: broadcast::Sender<InputKind>,
}

impl Default for InputBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an input. Returns how many listeners saw it.
    pub fn emit(&self, kind: InputKind) -> usize {
        self.tx.send(kind).unwrap_or(0)
    }

    /// Register a listener. Inputs emitted from now on are visible to it.
    pub fn listen(&self) -> InputListener {
        InputListener {
            rx: self.tx.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct InputListener {
    rx: broadcast::Receiver<InputKind>,
}

impl InputListener {
    /// Wait for the first input in `accepted`. `None` if the bus went away.
    pub async fn first_of(mut self, accepted: &[InputKind]) -> Option<InputKind> {
        loop {
            match self.rx.recv().await {
                Ok(kind) if accepted.contains(&kind) => return Some(kind),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Input listener skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Armed one-shot; dropping it disarms
pub struct UnlockGuard {
    task: JoinHandle<()>,
}

impl UnlockGuard {
    pub fn disarm(&self) {
        self.task.abort();
    }

    /// Fired or disarmed
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for UnlockGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `on_input` exactly once, on the first accepted input.
///
/// Must be called from within a tokio runtime.
pub fn arm_unlock<F>(listener: InputListener, accepted: Vec<InputKind>, on_input: F) -> UnlockGuard
where
    F: FnOnce(InputKind) + Send + 'static,
{
    let task = tokio::spawn(async move {
        if let Some(kind) = listener.first_of(&accepted).await {
            tracing::debug!("Unlocking audio on {}", kind);
            on_input(kind);
        }
    });
    UnlockGuard { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_of_skips_other_inputs() {
        let bus = InputBus::new();
        let listener = bus.listen();

        bus.emit(InputKind::PointerMove);
        bus.emit(InputKind::Key);
        bus.emit(InputKind::Click);

        let kind = listener.first_of(&[InputKind::Key, InputKind::Click]).await;
        assert_eq!(kind, Some(InputKind::Key));
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_first_of_ends_when_bus_dropped() {
        let bus = InputBus::new();
        let listener = bus.listen();
        drop(bus);

        assert_eq!(listener.first_of(&InputKind::ALL).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_unlock_fires_once() {
        let bus = InputBus::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let guard = arm_unlock(bus.listen(), InputKind::ALL.to_vec(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.listener_count(), 1);

        bus.emit(InputKind::Touch);
        bus.emit(InputKind::Click);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(guard.is_finished());
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_prevents_firing() {
        let bus = InputBus::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let guard = arm_unlock(bus.listen(), vec![InputKind::Click], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        guard.disarm();
        tokio::time::sleep(Duration::from_millis(10)).await;

        bus.emit(InputKind::Click);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_parse_input_kind() {
        assert_eq!("move".parse::<InputKind>(), Ok(InputKind::PointerMove));
        assert_eq!("KEY".parse::<InputKind>(), Ok(InputKind::Key));
        assert!("wheel".parse::<InputKind>().is_err());
    }
}
