//! Download everything a unit holds.
//!
//! Connects to a receiver, prints its profile, then lists waypoints,
//! routes and tracks. Categories the unit does not support are skipped.
//!
//! # Requirements
//!
//! - A Garmin-protocol receiver on a serial cable, set to "GARMIN" interface
//!   mode
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p navlink --example download
//! ```

use std::time::Duration;

use navlink::garmin::GarminBuilder;
use navlink::{Error, NavDevice};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting on {}...", serial_port);

    let mut gps = GarminBuilder::new()
        .serial_port(serial_port)
        .read_timeout(Duration::from_secs(2))
        .build()
        .await?;

    let profile = gps.profile();
    println!(
        "Connected: {} (product {}, software {:.2})",
        profile.description(),
        profile.product_id(),
        f64::from(profile.software_version()) / 100.0
    );
    let protocols: Vec<String> = profile
        .capabilities()
        .iter()
        .map(|c| c.protocol.to_string())
        .collect();
    println!("Protocols: {} ({:?})\n", protocols.join(" "), profile.source());

    match gps.list_waypoints().await {
        Ok(waypoints) => {
            println!("{} waypoints", waypoints.len());
            for w in &waypoints {
                println!(
                    "  {:<10} {:>10.5} {:>11.5}  {}",
                    w.ident,
                    w.position.lat_degrees(),
                    w.position.lon_degrees(),
                    w.comment.as_deref().unwrap_or("")
                );
            }
        }
        Err(Error::UnsupportedCategory(_)) => println!("No waypoint support"),
        Err(e) => return Err(e.into()),
    }

    match gps.list_routes().await {
        Ok(routes) => {
            println!("\n{} routes", routes.len());
            for r in &routes {
                let name = r
                    .header
                    .ident
                    .clone()
                    .or_else(|| r.header.number.map(|n| format!("#{n}")))
                    .unwrap_or_default();
                println!("  {:<20} {} waypoints", name, r.waypoints.len());
            }
        }
        Err(Error::UnsupportedCategory(_)) => println!("\nNo route support"),
        Err(e) => return Err(e.into()),
    }

    match gps.list_tracks().await {
        Ok(tracks) => {
            println!("\n{} tracks", tracks.len());
            for t in &tracks {
                let name = t
                    .header
                    .as_ref()
                    .and_then(|h| h.ident.clone())
                    .unwrap_or_else(|| "(track log)".into());
                println!("  {:<20} {} points", name, t.points.len());
            }
        }
        Err(Error::UnsupportedCategory(_)) => println!("\nNo track support"),
        Err(e) => return Err(e.into()),
    }

    gps.close().await?;
    Ok(())
}
