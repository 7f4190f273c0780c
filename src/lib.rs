//! # hue_bridge_rs
//!
//! An async Rust client for Philips Hue bridges and their REST/JSON API.
//!
//! The crate keeps an in-memory mirror of a bridge's lights and groups. Callers
//! change state locally and the client sends only what changed, queued so that
//! bursts of changes never exceed what the bridge can forward: about ten light
//! commands and one group command per second.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hue_bridge_rs::Bridge;
//!
//! async fn evening() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = Bridge::connect("192.168.1.20", "my-credential");
//!     bridge.read().await?;
//!
//!     let desk = bridge.lookup_light("Desk")?;
//!     desk.set_on(true)?;
//!     desk.set_brightness(180)?;
//!     desk.set_color_temperature(400)?;
//!
//!     // One request carrying on, bri and ct.
//!     let light = desk.write()?.await?;
//!     println!("{} is now at {}", light.name(), light.state().brightness().value());
//!     Ok(())
//! }
//! ```
//!
//! ## How writes work
//!
//! - Every settable field of a light or group has a dirty bit. Setting a
//!   field to a value other than the one the bridge last confirmed marks it
//!   dirty; numeric input is clamped to the field's range, never rejected.
//! - [`Handle::write`] sends the dirty fields, [`Handle::write_all`] sends
//!   all of them. With `hold_updates` turned off, each setter sends its own
//!   field right away.
//! - Writes go through a per-bridge, per-[`DeviceClass`] FIFO that spaces
//!   dispatches by the configured rate. Nothing is ever dropped for being
//!   over budget; it just waits longer.
//! - When the reply arrives, accepted fields are confirmed and rejected ones
//!   stay dirty for the next write. A field changed again while its write was
//!   in flight stays dirty too.
//! - Reads bypass the queue and always win: they overwrite local edits.
//!
//! ## Features
//!
//! - **Directory**: look lights and groups up by id or exact name
//! - **Groups**: create and update groups through the same queue
//! - **Pairing**: obtain a credential with [`Bridge::register`]
//! - **Discovery**: cloud lookup and SSDP with [`Discovery`]
//! - **Schedules**: one-shot [`Schedule`]s stored on the bridge
//! - **Persistence**: [`Bridge::save`] and [`Bridge::restore`]
//! - **Diagnostics**: a bounded [`MessageHistory`] of every exchange
//!
//! ## Runtime Selection
//!
//! The queue needs a timer and a way to spawn its dispatch loop. Select your
//! runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! hue-bridge-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! hue-bridge-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! With async-std or smol, bring your own [`Transport`].
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//! - `http` (default): [`HttpTransport`] built on reqwest; requires tokio

mod bridge;
mod config;
mod device;
mod directory;
mod discovery;
mod errors;
mod field;
mod group;
mod handle;
mod history;
mod light;
mod payload;
mod queue;
mod response;
pub mod runtime;
mod schedule;
mod state;
mod transport;
mod types;
mod writer;

// Re-export public API
pub use bridge::Bridge;
pub use config::{BridgeConfig, BridgeOptions};
pub use device::Device;
pub use directory::{Directory, Lookup, Registry};
pub use discovery::{CLOUD_DISCOVERY_URL, DiscoveredBridge, Discovery, StopHandle};
pub use errors::Error;
pub use field::{Field, FieldSet, FieldValue};
pub use group::Group;
pub use handle::{GroupHandle, Handle, LightHandle};
pub use history::{FailedRequest, HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use light::Light;
pub use payload::Payload;
pub use queue::DeviceClass;
pub use response::{ApiError, WriteReply};
pub use schedule::{Schedule, ScheduleCommand};
pub use state::{DeviceState, Settings, StateSnapshot};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{Method, Request, Transport};
pub use types::{
    Alert, Brightness, ColorMode, ColorTemperature, Hue, Saturation, TransitionTime, Xy,
};
pub use writer::Pending;
