//! CLI application for controlling Hue lights through a bridge.
//!
//! Run with: cargo run --example hue_cli -- --help

use clap::{Parser, Subcommand, ValueEnum};
use hue_bridge_rs::{
    Bridge, CLOUD_DISCOVERY_URL, Device, Discovery, Error, Handle, HttpTransport, Lookup,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hue-cli")]
#[command(about = "Control Hue lights from the command line", long_about = None)]
struct Cli {
    /// Address of the bridge (not required for discover)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Credential obtained with `register`
    #[arg(short, long, global = true, env = "HUE_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Light,
    Group,
}

#[derive(Subcommand)]
enum Commands {
    /// Find bridges via the cloud lookup and SSDP
    Discover {
        /// Local search timeout in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Obtain a credential; press the bridge's link button first
    Register {
        /// Application and device name, e.g. "hue-cli#laptop"
        #[arg(short, long, default_value = "hue-cli#cli")]
        devicetype: String,
    },

    /// List lights and groups
    List,

    /// Change a light or group
    Set {
        #[arg(value_enum)]
        target: Target,

        /// Id or exact name
        device: String,

        /// Turn on
        #[arg(long, conflicts_with = "off")]
        on: bool,

        /// Turn off
        #[arg(long)]
        off: bool,

        /// Brightness (0-255)
        #[arg(long)]
        bri: Option<i64>,

        /// Hue (0-65535)
        #[arg(long)]
        hue: Option<i64>,

        /// Saturation (0-255)
        #[arg(long)]
        sat: Option<i64>,

        /// Color temperature in mireds (154-500)
        #[arg(long)]
        ct: Option<i64>,
    },
}

struct Changes {
    on: Option<bool>,
    bri: Option<i64>,
    hue: Option<i64>,
    sat: Option<i64>,
    ct: Option<i64>,
}

async fn apply<D: Device>(handle: Handle<D>, changes: Changes) -> Result<(), Error> {
    if let Some(on) = changes.on {
        handle.set_on(on)?;
    }
    if let Some(bri) = changes.bri {
        handle.set_brightness(bri)?;
    }
    if let Some(hue) = changes.hue {
        handle.set_hue(hue)?;
    }
    if let Some(sat) = changes.sat {
        handle.set_saturation(sat)?;
    }
    if let Some(ct) = changes.ct {
        handle.set_color_temperature(ct)?;
    }

    let device = handle.write()?.await?;
    println!("{} updated", device.name());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Discover { timeout } => {
            println!("Looking for bridges (timeout: {}s)...", timeout);

            let cloud = HttpTransport::new(CLOUD_DISCOVERY_URL);
            let bridges = Discovery::new(Duration::from_secs(timeout))
                .run(&cloud)
                .await?;
            if bridges.is_empty() {
                println!("No bridges found.");
            } else {
                println!("\nFound {} bridge(s):", bridges.len());
                for bridge in bridges {
                    println!(
                        "  Host: {:21}  Id: {}",
                        bridge.host,
                        bridge.id.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Register { devicetype } => {
            let host = cli.host.ok_or("Bridge address is required. Use --host <HOST>")?;
            let transport = HttpTransport::new(&host);
            println!("Press the link button on the bridge at {}...", host);

            for _ in 0..30 {
                match Bridge::register(&transport, &devicetype).await {
                    Ok(username) => {
                        println!("Registered. Credential: {}", username);
                        return Ok(());
                    }
                    Err(Error::Api(e)) if e.is_link_button_not_pressed() => {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            eprintln!("Link button was not pressed in time.");
        }

        command => {
            let host = cli.host.ok_or("Bridge address is required. Use --host <HOST>")?;
            let user = cli.user.ok_or("Credential is required. Use --user or HUE_USER")?;
            let bridge = Bridge::connect(&host, &user);
            bridge.read().await?;

            match command {
                Commands::Discover { .. } | Commands::Register { .. } => unreachable!(),

                Commands::List => {
                    println!(
                        "{} ({})",
                        bridge.name().unwrap_or_default(),
                        bridge.firmware_version().unwrap_or_default()
                    );
                    println!("\nLights:");
                    for handle in bridge.lights() {
                        let light = handle.get()?;
                        let state = light.state();
                        println!(
                            "  {:>3}  {:24} {:3}  bri {:3}  {}",
                            light.id(),
                            light.name(),
                            if state.on() { "on" } else { "off" },
                            state.brightness().value(),
                            match light.reachable() {
                                Some(false) => "unreachable",
                                _ => "",
                            }
                        );
                    }
                    println!("\nGroups:");
                    for handle in bridge.groups() {
                        let group = handle.get()?;
                        let members: Vec<String> =
                            group.light_ids().iter().map(u32::to_string).collect();
                        println!(
                            "  {:>3}  {:24} lights {}",
                            group.id(),
                            group.name(),
                            members.join(",")
                        );
                    }
                }

                Commands::Set {
                    target,
                    device,
                    on,
                    off,
                    bri,
                    hue,
                    sat,
                    ct,
                } => {
                    let changes = Changes {
                        on: if on { Some(true) } else if off { Some(false) } else { None },
                        bri,
                        hue,
                        sat,
                        ct,
                    };
                    let lookup: Lookup = match device.parse::<u32>() {
                        Ok(id) => id.into(),
                        Err(_) => device.as_str().into(),
                    };
                    match target {
                        Target::Light => apply(bridge.lookup_light(lookup)?, changes).await?,
                        Target::Group => apply(bridge.lookup_group(lookup)?, changes).await?,
                    }
                }
            }
        }
    }

    Ok(())
}
