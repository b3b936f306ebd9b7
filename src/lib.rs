pub mod algorithm;
pub mod camera;
pub mod commands;
pub mod models;
pub mod telemetry;

use clap::Parser;

use commands::cli::{execute, Args};

pub use algorithm::targeting::{plan_target, target_pixel, TargetPlan, TargetingError};
pub use camera::port::{AbsoluteMove, CameraError, CameraPort};
pub use camera::session::CameraSession;
pub use commands::click::{ClickController, ClickPhase, ControllerError};

pub fn run() {
    telemetry::logger::init();
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(execute(args)) {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
