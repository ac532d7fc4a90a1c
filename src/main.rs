//! Demo CLI: scan for the arm, connect to the nearest peripheral, reset it
//! to its origin pose, and disconnect.

use std::sync::Arc;

use anyhow::{Result, bail};
use log::info;

use dolphin_arm_link::{
    ArmLink, BluestTransport, DeliveryMode, DispatchOutcome, LinkConfig, MotionIntent,
    PeripheralDescriptor,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "arm-link.json".to_string());
    let config = LinkConfig::load(&config_path).await;

    let transport = Arc::new(BluestTransport::new(&config.ble).await?);
    let link = ArmLink::new(transport, &config);

    println!("Scanning for {}s...", config.scan_duration_secs);
    link.start_discovery()?;
    let mut discovery = link.watch_discovery();
    let snapshot = discovery.wait_for(|s| !s.searching).await?.clone();

    if snapshot.peripherals.is_empty() {
        bail!("no arm found");
    }
    for p in &snapshot.peripherals {
        println!(
            "  {}  {}  {}",
            p.id,
            p.name.as_deref().unwrap_or("(unnamed)"),
            format_distance(p),
        );
    }

    let nearest = snapshot
        .peripherals
        .iter()
        .min_by(|a, b| sort_key(a).total_cmp(&sort_key(b)))
        .expect("list is non-empty");
    println!("Connecting to {}...", nearest.id);
    link.connect(nearest).await?;

    match link
        .enqueue(&MotionIntent::Reset, DeliveryMode::Acknowledged)?
        .await?
    {
        DispatchOutcome::Sent => info!("Arm reset to origin"),
        DispatchOutcome::Failed(e) => return Err(e.into()),
    }

    link.disconnect().await;
    println!("Done.");
    Ok(())
}

fn format_distance(p: &PeripheralDescriptor) -> String {
    if p.distance_m < 0.0 {
        "? m".to_string()
    } else {
        format!("{:.2} m", p.distance_m)
    }
}

// Peripherals with no usable distance estimate sort last.
fn sort_key(p: &PeripheralDescriptor) -> f64 {
    if p.distance_m < 0.0 {
        f64::INFINITY
    } else {
        p.distance_m
    }
}
