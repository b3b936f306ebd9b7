//! `ptzclick` command-line surface.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::camera::port::{AbsoluteMove, CameraPort};
use crate::camera::session::CameraSession;
use crate::commands::click::{ClickController, ClickOutcome, SettledCallback};
use crate::models::config::AppConfig;
use crate::models::orientation::PixelPoint;

/// Point a PTZ camera at a pixel of its last snapshot.
#[derive(Debug, Parser)]
#[command(author, version, about = "Click-to-point control for ONVIF PTZ cameras")]
pub struct Args {
    /// Path to config.json. Defaults to the per-user config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current normalized orientation as JSON.
    Status,
    /// List the camera's media profiles.
    Profiles,
    /// Download the current snapshot.
    Snapshot {
        /// Output file; defaults to `snapshotPath` from the config.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Point the camera at pixel (x, y) of a `width`x`height` snapshot.
    Click {
        x: f64,
        y: f64,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Use this profile token instead of the first one.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Issue an absolute move in normalized units.
    Move {
        #[arg(long, allow_hyphen_values = true)]
        pan: f64,
        #[arg(long, allow_hyphen_values = true)]
        tilt: f64,
        #[arg(long)]
        zoom: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRow<'a> {
    token: &'a str,
    name: &'a str,
    active: bool,
}

pub async fn execute(args: Args) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let mut session = CameraSession::new(config.camera.clone())?;
    session.connect().await?;

    match args.command {
        Command::Status => {
            let orientation = session.current_orientation().await?;
            println!("{}", serde_json::to_string_pretty(&orientation)?);
        }
        Command::Profiles => {
            let active = session.active_profile().map(|profile| profile.token.clone());
            let rows: Vec<ProfileRow<'_>> = session
                .profiles()
                .iter()
                .map(|profile| ProfileRow {
                    token: &profile.token,
                    name: &profile.name,
                    active: active.as_deref() == Some(profile.token.as_str()),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Snapshot { output } => {
            let path = output.unwrap_or_else(|| config.snapshot_path.clone());
            let saved = session.save_snapshot(&path).await?;
            println!("{}", saved.display());
        }
        Command::Move { pan, tilt, zoom } => {
            session
                .move_absolute(AbsoluteMove {
                    pan,
                    tilt,
                    zoom,
                    speed: config.targeting.speed,
                })
                .await?;
        }
        Command::Click {
            x,
            y,
            width,
            height,
            profile,
        } => {
            if let Some(token) = profile {
                session.select_profile(&token)?;
            }
            return click(session, &config, PixelPoint::new(x, y), width, height).await;
        }
    }

    session.disconnect();
    Ok(())
}

async fn click(
    session: CameraSession,
    config: &AppConfig,
    point: PixelPoint,
    width: u32,
    height: u32,
) -> Result<(), Box<dyn Error>> {
    let session = Arc::new(session);
    let (settled_tx, mut settled_rx) = tokio::sync::mpsc::unbounded_channel::<ClickOutcome>();
    let callback: SettledCallback = Arc::new(move |outcome: &ClickOutcome| {
        settled_tx.send(outcome.clone()).ok();
    });

    let controller = ClickController::new(Arc::clone(&session), config.targeting)
        .with_auto_refresh(config.auto_refresh_after_click)
        .on_settled(callback);

    let outcome = controller.handle_click(point, width, height).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    controller.wait_idle().await;
    drop(controller);

    if config.auto_refresh_after_click {
        if let Some(settled) = settled_rx.recv().await {
            let saved = session.save_snapshot(&config.snapshot_path).await?;
            log::info!(
                "click: id={} refreshed snapshot {}",
                settled.request_id,
                saved.display()
            );
        }
    }

    match Arc::try_unwrap(session) {
        Ok(mut session) => session.disconnect(),
        Err(_) => log::warn!("click: session still shared, skipping disconnect"),
    }
    Ok(())
}
