//! Command-line interface for qr-alarm.
//!
//! This binary provides a CLI for configuring the alarm and driving the
//! ringing session via the daemon's HTTP API.

use std::env;

use anyhow::{Context, Result, bail};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use qr_alarm::api_client::{
    self, DEFAULT_BASE_URL,
    types::{ScanResponse, ScheduleRequest},
};
use qr_alarm::session::ScanSubmit;

fn usage() {
    eprintln!("Usage: qr-alarm-cli <command> [argument]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status            Show the alarm and the ringing session");
    eprintln!("  schedule HH:MM    Ring at the next HH:MM (local time)");
    eprintln!("  cancel            Cancel the pending alarm");
    eprintln!("  sound PATH        Set the alarm sound");
    eprintln!("  enroll PAYLOAD    Enroll the QR payload that stops the alarm");
    eprintln!("  scan PAYLOAD      Submit a scanned payload while ringing");
    eprintln!("  stop              Stop ringing");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QRALARM_API_URL   API base URL (default: {DEFAULT_BASE_URL})");
}

#[tokio::main]
async fn main() -> Result<()> {
    qr_alarm::tracing::init_stderr_warnings();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let argument = args.get(2).map(String::as_str);
    let client = make_client();

    match (command, argument) {
        ("status", None) => cmd_status(&client).await?,
        ("schedule", Some(time_of_day)) => cmd_schedule(&client, time_of_day).await?,
        ("cancel", None) => {
            client.cancel().await?;
            println!("Alarm cancelled");
        }
        ("sound", Some(path)) => {
            let path = std::path::absolute(path)
                .with_context(|| format!("cannot resolve {path}"))?;
            let alarm = client.set_sound(&path.to_string_lossy()).await?;
            println!("Sound: {}", alarm.audio_source.unwrap_or_default());
        }
        ("enroll", Some(payload)) => {
            client.enroll(payload).await?;
            println!("Code enrolled");
        }
        ("scan", Some(payload)) => cmd_scan(&client, payload).await?,
        ("stop", None) => {
            let response = client.stop().await?;
            println!("{}", if response.stopped { "Stopped" } else { "Not ringing" });
        }
        _ => {
            eprintln!("Unknown command or wrong arguments: {}", args[1..].join(" "));
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Build an API client, honoring QRALARM_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("QRALARM_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

fn show(at: Option<OffsetDateTime>) -> String {
    at.and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".to_string())
}

/// Print the alarm record and the session state.
async fn cmd_status(client: &api_client::Client) -> Result<()> {
    let alarm = client.get_alarm().await?;
    let session = client.get_session().await?;

    println!("Enabled:   {}", alarm.enabled);
    println!("Trigger:   {}", show(alarm.trigger_time));
    println!("Next wake: {}", show(alarm.next_wake));
    println!(
        "Sound:     {}",
        alarm.audio_source.as_deref().unwrap_or("(default)")
    );
    println!(
        "Code:      {}",
        if alarm.secret_enrolled { "enrolled" } else { "none" }
    );
    println!("PIN:       {}", if alarm.pin_set { "set" } else { "none" });

    if session.ringing {
        println!("Session:   RINGING since {}", show(session.since));
        println!("Auto-stop: {}", show(session.auto_stop_at));
        if let Some(indication) = session.indication {
            println!("Last scan: {indication:?}");
        }
    } else {
        match session.last_stop {
            Some(reason) => println!("Session:   idle (last stop: {reason:?})"),
            None => println!("Session:   idle"),
        }
    }

    Ok(())
}

async fn cmd_schedule(client: &api_client::Client, time_of_day: &str) -> Result<()> {
    let request = ScheduleRequest {
        time_of_day: Some(time_of_day.to_string()),
        ..Default::default()
    };
    let response = client.schedule(&request).await?;
    println!("Alarm set for {}", show(Some(response.trigger_time)));
    Ok(())
}

async fn cmd_scan(client: &api_client::Client, payload: &str) -> Result<()> {
    let ScanResponse { result } = client.scan(payload).await?;
    match result {
        ScanSubmit::Accepted => println!("Scan submitted; run `status` to see the outcome"),
        ScanSubmit::Busy => bail!("another scan is still being checked, try again"),
        ScanSubmit::NotRinging => bail!("the alarm is not ringing"),
    }
    Ok(())
}
