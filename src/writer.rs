//! Turning device state into queued bridge commands.
//!
//! A write snapshots the fields it is about to send, queues one command for
//! the device's class and, when the reply arrives, reconciles the device
//! against that snapshot. The caller gets a [`Pending`] that resolves exactly
//! once.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use log::{debug, warn};
use serde_json::Value;

use crate::device::Device;
use crate::directory::{Directory, lock};
use crate::errors::Error;
use crate::field::{Field, FieldSet};
use crate::group::{Group, membership_body};
use crate::queue::{Command, CommandQueue, Continuation, DeviceClass};
use crate::response::{ReplyItem, WriteReply, first_error, parse_items, success_value};
use crate::state::DeviceState;
use crate::transport::Request;

type Result<T> = std::result::Result<T, Error>;

/// The eventual result of a queued command.
///
/// The command is already queued when a `Pending` is handed out; dropping it
/// does not cancel anything, the outcome is simply not observed. If the
/// bridge is shut down before the command is dispatched it resolves to
/// [`Error::Abandoned`].
#[derive(Debug)]
pub struct Pending<T> {
    inner: PendingInner<T>,
}

#[derive(Debug)]
enum PendingInner<T> {
    Ready(Option<Result<T>>),
    Waiting(oneshot::Receiver<Result<T>>),
}

impl<T> Pending<T> {
    pub(crate) fn ready(result: Result<T>) -> Self {
        Pending {
            inner: PendingInner::Ready(Some(result)),
        }
    }

    pub(crate) fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Pending {
                inner: PendingInner::Waiting(rx),
            },
        )
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            PendingInner::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(Error::Abandoned))),
            PendingInner::Waiting(rx) => rx
                .poll_unpin(cx)
                .map(|received| received.unwrap_or(Err(Error::Abandoned))),
        }
    }
}

/// Which fields a write carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Only the dirty fields.
    Diff,
    /// Every settable field.
    Full,
    /// One field, dirty or not.
    Field(Field),
}

fn describe<D: Device>(device: &D) -> String {
    format!("{} {}", D::CLASS, device.id())
}

/// Queue a state write for `entry`.
///
/// An empty write resolves immediately with the unchanged device and never
/// reaches the queue.
pub(crate) fn submit_write<D: Device>(
    queue: &CommandQueue,
    prefix: &str,
    entry: Arc<Mutex<D>>,
    mode: WriteMode,
) -> Result<Pending<D>> {
    let (snapshot, request, target) = {
        let device = lock(&entry);
        let state: &DeviceState = device.state();
        let snapshot = match mode {
            WriteMode::Diff => state.snapshot_dirty(),
            WriteMode::Full => state.snapshot_all(),
            WriteMode::Field(field) => state.snapshot(FieldSet::from(field)),
        };
        if snapshot.is_empty() {
            return Ok(Pending::ready(Ok(device.clone())));
        }
        let body = snapshot.payload().to_value()?;
        let path = format!("{prefix}{}", device.state_path());
        (snapshot, Request::put(path, body), describe(&*device))
    };

    let (tx, pending) = Pending::channel();
    let label = target.clone();
    let on_response: Continuation = Box::new(move |result: Result<Value>| {
        let outcome = result
            .and_then(|value| WriteReply::parse(&value, snapshot.fields()))
            .and_then(|reply| {
                let mut device = lock(&entry);
                let applied = device.state_mut().apply_write_result(&snapshot, &reply);
                debug!("{label}: bridge confirmed {} field(s)", applied.len());
                if reply.is_complete() {
                    return Ok(device.clone());
                }
                for (field, err) in reply.rejected() {
                    warn!("{label}: bridge rejected {field}: {}", err.description);
                }
                Err(Error::rejected(&label, reply.into_errors()))
            });
        let _ = tx.send(outcome);
    });

    queue.submit(Command::new(target, D::CLASS, request, on_response))?;
    Ok(pending)
}

/// Queue a group creation. The bridge allocates the id.
pub(crate) fn submit_create_group(
    queue: &CommandQueue,
    prefix: &str,
    directory: Arc<Directory>,
    name: &str,
    light_ids: BTreeSet<u32>,
    hold_updates: bool,
) -> Result<Pending<Group>> {
    let request = Request::post(format!("{prefix}/groups"), membership_body(name, &light_ids));
    let target = format!("new group {name:?}");
    let name = name.to_string();
    let (tx, pending) = Pending::channel();

    let on_response: Continuation = Box::new(move |result: Result<Value>| {
        let outcome = result.and_then(|value| {
            let items = parse_items(&value)?;
            if let Some(err) = first_error(&items) {
                return Err(Error::Api(err.clone()));
            }
            let id = success_value(&items, "id")
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|id| id.parse::<u32>().ok())
                .ok_or_else(|| Error::UnexpectedResponse(format!("no group id in {value}")))?;

            let mut group = Group::new(id, &name, light_ids);
            group.state_mut().set_hold_updates(hold_updates);
            debug!("created group {id} ({name})");
            directory.groups().insert(group.clone());
            Ok(group)
        });
        let _ = tx.send(outcome);
    });

    queue.submit(Command::new(target, DeviceClass::Group, request, on_response))?;
    Ok(pending)
}

/// Queue a rename and membership change for an existing group.
///
/// Whatever the bridge confirms is applied even if another part of the
/// request failed.
pub(crate) fn submit_update_group(
    queue: &CommandQueue,
    prefix: &str,
    entry: Arc<Mutex<Group>>,
    name: &str,
    light_ids: BTreeSet<u32>,
) -> Result<Pending<Group>> {
    let (target, path) = {
        let group = lock(&entry);
        (describe(&*group), format!("{prefix}{}", group.resource_path()))
    };
    let request = Request::put(path, membership_body(name, &light_ids));
    let name = name.to_string();
    let (tx, pending) = Pending::channel();

    let on_response: Continuation = Box::new(move |result: Result<Value>| {
        let outcome = result.and_then(|value| {
            let items = parse_items(&value)?;
            let mut group = lock(&entry);
            for item in &items {
                let ReplyItem::Success(map) = item else {
                    continue;
                };
                for address in map.keys() {
                    if address.ends_with("/name") {
                        group.set_name(&name);
                    } else if address.ends_with("/lights") {
                        group.set_light_ids(light_ids.clone());
                    }
                }
            }
            match first_error(&items) {
                Some(err) => Err(Error::Api(err.clone())),
                None => Ok(group.clone()),
            }
        });
        let _ = tx.send(outcome);
    });

    queue.submit(Command::new(target, DeviceClass::Group, request, on_response))?;
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_pending() {
        let value = Pending::ready(Ok(7)).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_dropped_sender_is_abandoned() {
        let (tx, pending) = Pending::<u32>::channel();
        drop(tx);
        assert_eq!(pending.await.unwrap_err(), Error::Abandoned);
    }

    #[tokio::test]
    async fn test_sent_result_is_delivered() {
        let (tx, pending) = Pending::channel();
        tx.send(Ok("done")).unwrap();
        assert_eq!(pending.await.unwrap(), "done");
    }
}
