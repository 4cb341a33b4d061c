//! Monitor live position fixes.
//!
//! Starts the PVT stream and prints each fix and satellite report for 60
//! seconds, then stops the stream.
//!
//! # Requirements
//!
//! - A receiver that supports PVT output (A800), with sky view
//! - Serial port path adjusted for your system
//!
//! # Usage
//!
//! ```sh
//! cargo run -p navlink --example pvt_monitor
//! ```

use std::time::Duration;

use navlink::{FixType, PvtEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting on {}...", serial_port);
    let mut gps = navlink::connect(serial_port).await?;
    println!("Connected: {}\n", gps.profile().description());

    gps.start_pvt().await?;
    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        let event = match tokio::time::timeout(remaining, gps.next_pvt()).await {
            Ok(event) => event?,
            // monitoring period elapsed
            Err(_) => break,
        };
        let elapsed = start.elapsed();
        let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

        match event {
            PvtEvent::Fix(pvt) if pvt.fix_type() == FixType::Unusable => {
                println!("{} No fix", timestamp);
            }
            PvtEvent::Fix(pvt) => {
                println!(
                    "{} {:?} {:.5} {:.5} alt {:.1} m  epe {:.1} m  {}",
                    timestamp,
                    pvt.fix_type(),
                    pvt.position.lat_degrees(),
                    pvt.position.lon_degrees(),
                    pvt.msl_altitude(),
                    pvt.epe,
                    pvt.datetime().map(|t| t.to_rfc3339()).unwrap_or_default()
                );
            }
            PvtEvent::Satellites(sats) => {
                let tracked: Vec<String> = sats
                    .iter()
                    .filter(|s| s.svid != 0xFF)
                    .map(|s| format!("{}:{}", s.svid, s.snr / 100))
                    .collect();
                println!("{} Satellites  {}", timestamp, tracked.join(" "));
            }
        }
    }

    gps.stop_pvt().await?;
    gps.close().await?;
    println!("\nMonitoring complete.");
    Ok(())
}
