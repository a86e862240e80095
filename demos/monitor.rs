//! Demo: Monitor inputs, outputs and partition states and print changes.

use satel_integra::{AlarmController, ClientConfig, SatelClient, SatelEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::builder()
        .host("192.168.0.100")
        .monitored_zones(1..=16)
        .monitored_outputs([1, 2, 3])
        .build();

    let client = SatelClient::new(config);
    client.connect().await?;
    let mut events = client.subscribe();

    let keep_alive = client.clone();
    tokio::spawn(async move { keep_alive.keep_alive().await });
    let monitor = client.clone();
    tokio::spawn(async move { monitor.monitor_status().await });

    println!("Listening for panel events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(SatelEvent::ZonesUpdated(inputs)) => {
                        for (input, violated) in inputs {
                            println!("Input {input}: {}", if violated { "violated" } else { "normal" });
                        }
                    }
                    Ok(SatelEvent::OutputsUpdated(outputs)) => {
                        for (output, active) in outputs {
                            println!("Output {output}: {}", if active { "on" } else { "off" });
                        }
                    }
                    Ok(SatelEvent::AlarmStatus) => {
                        let status = client.status().await;
                        println!("Partition states: {:?}", status.partition_states);
                    }
                    Ok(event) => {
                        println!("Event: {:?}", event);
                    }
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    client.close().await;
    Ok(())
}
