//! Per-class command queue and rate limiter.
//!
//! The bridge drops or delays requests when it receives more than it can
//! forward over its radio, roughly ten light commands or one group command
//! per second. Every state-mutating request is therefore routed through a
//! [`Lane`] for its [`DeviceClass`]: an unbounded FIFO whose dispatches are
//! spaced at least `1 / rate` apart.
//!
//! Each lane moves through `Idle -> Scheduled -> Dispatched -> Idle` (or back
//! to `Scheduled` while commands remain). The dispatch loop runs as a
//! background task that only exists while the lane is busy. Lanes never wait
//! on each other.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::config::BridgeOptions;
use crate::errors::Error;
use crate::runtime::{self, Instant, Spawner};
use crate::transport::{Request, Transport};

type Result<T> = std::result::Result<T, Error>;

/// The rate-limiting dimension of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceClass {
    Light,
    Group,
}

/// Runs once with the transport result of a dispatched command.
pub(crate) type Continuation = Box<dyn FnOnce(Result<Value>) + Send>;

/// One request waiting for its turn.
///
/// If the queue is shut down before dispatch, the command is dropped and its
/// continuation never runs.
pub(crate) struct Command {
    target: String,
    class: DeviceClass,
    request: Request,
    on_response: Continuation,
}

impl Command {
    pub(crate) fn new(
        target: impl Into<String>,
        class: DeviceClass,
        request: Request,
        on_response: Continuation,
    ) -> Self {
        Command {
            target: target.into(),
            class,
            request,
            on_response,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("target", &self.target)
            .field("class", &self.class)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Where a lane is in its dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LanePhase {
    /// Nothing queued and no dispatch loop running.
    Idle,
    /// Waiting for the rate interval before the next dispatch.
    Scheduled,
    /// A command is with the transport.
    Dispatched,
}

struct LaneState {
    pending: VecDeque<Command>,
    last_dispatch: Option<Instant>,
    phase: LanePhase,
    closed: bool,
}

struct Lane {
    class: DeviceClass,
    interval: Duration,
    request_timeout: Duration,
    transport: Arc<dyn Transport>,
    /// The runtime the queue was built on, for submissions from plain threads.
    spawner: Option<Spawner>,
    state: Mutex<LaneState>,
}

impl Lane {
    fn lock(&self) -> MutexGuard<'_, LaneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawner(&self) -> Option<Spawner> {
        Spawner::current().or_else(|| self.spawner.clone())
    }

    fn submit(self: &Arc<Self>, command: Command) -> Result<()> {
        let start = {
            let mut state = self.lock();
            if state.closed {
                debug!("dropping {} command for {}; queue closed", self.class, command.target);
                return Ok(());
            }
            let start = if state.phase == LanePhase::Idle {
                let Some(spawner) = self.spawner() else {
                    warn!(
                        "cannot dispatch {} command for {}: no async runtime",
                        self.class, command.target
                    );
                    return Err(Error::NoRuntime);
                };
                state.phase = LanePhase::Scheduled;
                Some(spawner)
            } else {
                None
            };
            trace!(
                "queued {} command for {} ({} ahead)",
                self.class,
                command.target,
                state.pending.len()
            );
            state.pending.push_back(command);
            start
        };

        if let Some(spawner) = start {
            spawner.spawn(Arc::clone(self).run());
        }
        Ok(())
    }

    async fn run(self: Arc<Self>) {
        loop {
            let wait = {
                let state = self.lock();
                if state.closed {
                    return;
                }
                match state.last_dispatch {
                    Some(last) => (last + self.interval).saturating_duration_since(Instant::now()),
                    None => Duration::ZERO,
                }
            };
            if !wait.is_zero() {
                runtime::sleep(wait).await;
            }

            let command = {
                let mut state = self.lock();
                if state.closed {
                    return;
                }
                let Some(command) = state.pending.pop_front() else {
                    state.phase = LanePhase::Idle;
                    return;
                };
                state.phase = LanePhase::Dispatched;
                state.last_dispatch = Some(Instant::now());
                command
            };

            let Command {
                target,
                request,
                on_response,
                ..
            } = command;
            debug!("dispatching {} command for {target}: {}", self.class, request.label());

            let path = request.path.clone();
            let result = runtime::timeout(self.request_timeout, self.transport.send(request))
                .await
                .unwrap_or_else(|_| Err(Error::timeout(&path)));
            on_response(result);

            let mut state = self.lock();
            if state.closed || state.pending.is_empty() {
                state.phase = LanePhase::Idle;
                return;
            }
            state.phase = LanePhase::Scheduled;
        }
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            debug!("abandoning {dropped} queued {} command(s)", self.class);
        }
    }
}

/// Rate-limited FIFO queues, one per [`DeviceClass`], owned by one bridge.
pub(crate) struct CommandQueue {
    lights: Arc<Lane>,
    groups: Arc<Lane>,
}

impl CommandQueue {
    pub fn new(transport: Arc<dyn Transport>, options: &BridgeOptions) -> Self {
        let spawner = Spawner::current();
        let lane = |class| {
            Arc::new(Lane {
                class,
                interval: options.interval(class),
                request_timeout: options.request_timeout,
                transport: Arc::clone(&transport),
                spawner: spawner.clone(),
                state: Mutex::new(LaneState {
                    pending: VecDeque::new(),
                    last_dispatch: None,
                    phase: LanePhase::Idle,
                    closed: false,
                }),
            })
        };
        CommandQueue {
            lights: lane(DeviceClass::Light),
            groups: lane(DeviceClass::Group),
        }
    }

    fn lane(&self, class: DeviceClass) -> &Arc<Lane> {
        match class {
            DeviceClass::Light => &self.lights,
            DeviceClass::Group => &self.groups,
        }
    }

    /// Append a command to its class's FIFO without waiting.
    ///
    /// Fails with [`Error::NoRuntime`] when the lane is idle and there is no
    /// runtime to start its dispatch loop on.
    pub fn submit(&self, command: Command) -> Result<()> {
        self.lane(command.class).submit(command)
    }

    /// Commands waiting for dispatch, not counting one in flight.
    pub fn pending(&self, class: DeviceClass) -> usize {
        self.lane(class).lock().pending.len()
    }

    #[cfg(test)]
    pub fn phase(&self, class: DeviceClass) -> LanePhase {
        self.lane(class).lock().phase
    }

    /// Stop dispatching and drop everything still queued.
    pub fn close(&self) {
        self.lights.close();
        self.groups.close();
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use futures::channel::oneshot;
    use serde_json::json;

    fn queue(transport: Arc<MockTransport>) -> CommandQueue {
        CommandQueue::new(transport, &BridgeOptions::default())
    }

    fn command(class: DeviceClass, name: &str) -> (Command, oneshot::Receiver<Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        let request = Request::put(format!("/{name}"), json!({"on": true}));
        let on_response: Continuation = Box::new(move |result| {
            let _ = tx.send(result);
        });
        (Command::new(name, class, request, on_response), rx)
    }

    fn offsets(transport: &MockTransport, start: Instant) -> Vec<Duration> {
        transport
            .sent()
            .iter()
            .map(|(at, _)| at.saturating_duration_since(start))
            .collect()
    }

    fn assert_near(actual: Duration, expected: Duration) {
        let delta = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            delta <= Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_spaced_by_rate() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));
        let start = Instant::now();

        let receivers: Vec<_> = (0..5)
            .map(|i| {
                let (cmd, rx) = command(DeviceClass::Light, &format!("l{i}"));
                queue.submit(cmd).unwrap();
                rx
            })
            .collect();
        for rx in receivers {
            rx.await.unwrap().unwrap();
        }

        let times = offsets(&transport, start);
        assert_eq!(times.len(), 5);
        for (i, t) in times.into_iter().enumerate() {
            assert_near(t, Duration::from_millis(100 * i as u64));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_classes_are_independent() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));
        let start = Instant::now();

        let (g1, g1_rx) = command(DeviceClass::Group, "g1");
        let (g2, g2_rx) = command(DeviceClass::Group, "g2");
        let (l1, l1_rx) = command(DeviceClass::Light, "l1");
        queue.submit(g1).unwrap();
        queue.submit(g2).unwrap();
        queue.submit(l1).unwrap();

        l1_rx.await.unwrap().unwrap();
        g1_rx.await.unwrap().unwrap();
        g2_rx.await.unwrap().unwrap();

        let sent = transport.sent();
        let at = |path: &str| {
            sent.iter()
                .find(|(_, r)| r.path == path)
                .map(|(t, _)| t.saturating_duration_since(start))
                .unwrap()
        };
        assert_near(at("/g1"), Duration::ZERO);
        assert_near(at("/l1"), Duration::ZERO);
        assert_near(at("/g2"), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_within_class() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));

        let mut receivers = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let (cmd, rx) = command(DeviceClass::Light, name);
            queue.submit(cmd).unwrap();
            receivers.push(rx);
        }
        for rx in receivers {
            rx.await.unwrap().unwrap();
        }

        let paths: Vec<_> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c", "/d"]);
        assert_eq!(queue.phase(DeviceClass::Light), LanePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_lane_waits_out_remaining_interval() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));
        let start = Instant::now();

        let (first, rx) = command(DeviceClass::Group, "first");
        queue.submit(first).unwrap();
        rx.await.unwrap().unwrap();

        runtime::sleep(Duration::from_millis(300)).await;
        let (second, rx) = command(DeviceClass::Group, "second");
        queue.submit(second).unwrap();
        rx.await.unwrap().unwrap();

        let times = offsets(&transport, start);
        assert_near(times[1], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_reaches_continuation() {
        let transport = MockTransport::replying(|_| Err(Error::transport("send", "refused")));
        let queue = queue(transport);

        let (cmd, rx) = command(DeviceClass::Light, "x");
        queue.submit(cmd).unwrap();
        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transport_times_out() {
        let transport = MockTransport::new(|_| futures::future::pending::<Result<Value>>());
        let queue = CommandQueue::new(
            transport,
            &BridgeOptions::default().request_timeout(Duration::from_millis(200)),
        );

        let (cmd, rx) = command(DeviceClass::Light, "slow");
        queue.submit(cmd).unwrap();
        assert!(matches!(rx.await.unwrap(), Err(Error::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_abandons_queued_commands() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));

        let (first, first_rx) = command(DeviceClass::Group, "first");
        let (second, second_rx) = command(DeviceClass::Group, "second");
        queue.submit(first).unwrap();
        queue.submit(second).unwrap();

        first_rx.await.unwrap().unwrap();
        assert_eq!(queue.pending(DeviceClass::Group), 1);
        queue.close();

        assert!(second_rx.await.is_err());
        assert_eq!(transport.requests().len(), 1);

        let (late, late_rx) = command(DeviceClass::Light, "late");
        queue.submit(late).unwrap();
        assert!(late_rx.await.is_err());
    }

    #[test]
    fn test_submit_without_runtime_fails() {
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = queue(Arc::clone(&transport));

        let (cmd, rx) = command(DeviceClass::Light, "orphan");
        assert_eq!(queue.submit(cmd).unwrap_err(), Error::NoRuntime);
        assert_eq!(queue.phase(DeviceClass::Light), LanePhase::Idle);
        assert_eq!(queue.pending(DeviceClass::Light), 0);
        assert!(futures::executor::block_on(rx).is_err());
    }

    #[test]
    fn test_plain_thread_uses_construction_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let transport = MockTransport::replying(|_| Ok(json!([])));
        let queue = rt.block_on(async { queue(Arc::clone(&transport)) });

        let (cmd, rx) = command(DeviceClass::Group, "from-thread");
        std::thread::scope(|s| {
            s.spawn(|| queue.submit(cmd).unwrap());
        });
        rt.block_on(async { rx.await.unwrap().unwrap() });
        assert_eq!(transport.requests()[0].path, "/from-thread");
    }
}
