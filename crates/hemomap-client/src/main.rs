//! # hemomap
//!
//! CLI client for the hemomap server: the submitting/browsing side of the
//! protocol. `submit` encrypts the donor's password with the shared seed and
//! posts an update; `map` fetches the public sheet projection and filters it
//! through the compatibility matcher; `compat` prints the table entry for
//! one blood type.

use std::collections::HashMap;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use tracing_subscriber::EnvFilter;

use hemomap_shared::matcher::filter_markers;
use hemomap_shared::wire::{MapData, SubmitRequest, SubmitResponse};
use hemomap_shared::{cipher, BloodType, GeoPoint, SecretKey};
use hemomap_store::schema;

/// Exit codes beyond success/failure, so scripts can tell a rejected
/// password apart from an unknown username.
const EXIT_FORBIDDEN: u8 = 2;
const EXIT_NOT_FOUND: u8 = 3;

#[derive(Parser)]
#[command(name = "hemomap", version, about = "Donation-coordination client")]
struct Cli {
    /// Server base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt the password and submit an availability/location update.
    Submit {
        username: String,
        password: String,

        /// Flag a blood type as needed (repeatable).
        #[arg(long = "need", value_name = "TYPE")]
        need: Vec<BloodType>,

        /// Clear a blood type's needed flag (repeatable).
        #[arg(long = "clear", value_name = "TYPE")]
        clear: Vec<BloodType>,

        /// New coordinates as "lat,lng".
        #[arg(long)]
        location: Option<GeoPoint>,

        /// Pre-shared cipher seed; must match the server's.
        #[arg(long, env = "CRYPT_SEED", hide_env_values = true)]
        seed: String,
    },

    /// Fetch map data and print the markers, filtered by donor blood types.
    Map {
        /// Donor blood type to filter by (repeatable; empty shows all).
        #[arg(long = "blood-type", value_name = "TYPE")]
        blood_types: Vec<BloodType>,
    },

    /// Print the compatibility table entry for a blood type.
    Compat { blood_type: BloodType },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Submit {
            username,
            password,
            need,
            clear,
            location,
            seed,
        } => submit(&cli.server, username, &password, &need, &clear, location, &seed).await,
        Command::Map { blood_types } => map(&cli.server, &blood_types).await,
        Command::Compat { blood_type } => {
            compat(blood_type);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn submit(
    server: &str,
    username: String,
    password: &str,
    need: &[BloodType],
    clear: &[BloodType],
    location: Option<GeoPoint>,
    seed: &str,
) -> anyhow::Result<ExitCode> {
    let key = SecretKey::derive(seed)?;

    let request = SubmitRequest {
        username,
        secret: cipher::encrypt(password, &key),
        availability: build_availability(need, clear),
        location,
    };

    let response = reqwest::Client::new()
        .post(format!("{server}/api/submit"))
        .json(&request)
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => {
            let body: SubmitResponse = response.json().await?;
            println!("Update accepted: {}", body.result);
            Ok(ExitCode::SUCCESS)
        }
        StatusCode::FORBIDDEN => {
            eprintln!("Wrong password for {}", request.username);
            Ok(ExitCode::from(EXIT_FORBIDDEN))
        }
        StatusCode::NOT_FOUND => {
            eprintln!("No record for username {}", request.username);
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
        status => anyhow::bail!("Server returned {status}"),
    }
}

/// Merge `--need` and `--clear` into the per-type overwrite map. A type
/// named by both is cleared: the explicit clear wins.
fn build_availability(need: &[BloodType], clear: &[BloodType]) -> HashMap<BloodType, bool> {
    let mut availability = HashMap::new();
    for &blood_type in need {
        availability.insert(blood_type, true);
    }
    for &blood_type in clear {
        availability.insert(blood_type, false);
    }
    availability
}

async fn map(server: &str, blood_types: &[BloodType]) -> anyhow::Result<ExitCode> {
    let data: MapData = reqwest::Client::new()
        .get(format!("{server}/api/mapdata"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let markers = data
        .rows
        .iter()
        .map(|row| schema::public_row_to_marker(row))
        .collect::<Result<Vec<_>, _>>()?;

    let markers = filter_markers(markers, blood_types);
    if markers.is_empty() {
        println!("No matching donation sites.");
        return Ok(ExitCode::SUCCESS);
    }

    for marker in &markers {
        let needed: Vec<&str> = marker.needed.iter().map(|t| t.as_str()).collect();
        let updated = marker
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<24} needs: {:<24} updated: {:<26} {}",
            marker.position.to_string(),
            needed.join(" "),
            updated,
            marker.link
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn compat(blood_type: BloodType) {
    let donate: Vec<&str> = blood_type.donate_to().iter().map(|t| t.as_str()).collect();
    let receive: Vec<&str> = blood_type
        .receive_from()
        .iter()
        .map(|t| t.as_str())
        .collect();
    println!("{blood_type} can donate to:   {}", donate.join(" "));
    println!("{blood_type} can receive from: {}", receive.join(" "));
}
