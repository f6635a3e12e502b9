//! Command handlers and the shared per-invocation context.

pub mod config_cmd;
pub mod end;
pub mod fetch;
pub mod list;
pub mod raw;
pub mod util;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use flightlog_core::LogTransfer;
use flightlog_link::{Link, SimulatedVehicle, UdpLink};

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

/// Logs served by `--simulate`; log n holds n times this many bytes.
const SIM_LOG_COUNT: u16 = 5;
const SIM_LOG_UNIT: usize = 4096;

/// An open link plus a running log transfer service.
pub struct Context {
    pub transfer: LogTransfer,
    pub timeout: Duration,
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub yes: bool,
    udp: Option<Arc<UdpLink>>,
    cancel: CancellationToken,
}

impl Context {
    /// Open the link (UDP or simulated) and start the transfer service.
    ///
    /// Over UDP without a configured remote, waits for the vehicle to be
    /// heard first so the start-up flush has somewhere to go.
    pub async fn open(global: &GlobalOpts, resolved: Resolved) -> Result<Self, CliError> {
        let cancel = CancellationToken::new();

        let (link, udp): (Arc<dyn Link>, Option<Arc<UdpLink>>) = if global.simulate {
            info!(vehicle = %resolved.transfer.target, "using simulated vehicle");
            let vehicle = SimulatedVehicle::with_sample_logs(
                resolved.transfer.target,
                SIM_LOG_COUNT,
                SIM_LOG_UNIT,
            );
            (Arc::new(vehicle), None)
        } else {
            let udp = Arc::new(UdpLink::bind(resolved.link.clone(), cancel.clone()).await?);
            if udp.remote().is_none() {
                info!(bind = %udp.local_addr(), "waiting for a vehicle");
                tokio::time::timeout(resolved.timeout, udp.wait_for_remote())
                    .await
                    .map_err(|_| CliError::NoVehicle {
                        bind: udp.local_addr().to_string(),
                        seconds: resolved.timeout.as_secs(),
                    })??;
            }
            let link: Arc<dyn Link> = udp.clone();
            (link, Some(udp))
        };

        let transfer = LogTransfer::start(resolved.transfer, link)?;
        debug!(profile = %resolved.profile_name, "log transfer ready");

        Ok(Self {
            transfer,
            timeout: resolved.timeout,
            output: resolved.output,
            color: output::should_color(resolved.color),
            quiet: global.quiet,
            yes: global.yes,
            udp,
            cancel,
        })
    }

    /// Stop the transfer service, then the link.
    pub async fn close(self) {
        self.transfer.shutdown().await;
        if let Some(udp) = self.udp {
            udp.shutdown();
        }
        self.cancel.cancel();
    }
}

/// Route a log command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::List(args) => list::handle(args, ctx).await,
        Command::Fetch(args) => fetch::handle(args, ctx).await,
        Command::Watch(args) => watch::handle(args, ctx).await,
        Command::Raw(args) => raw::handle(args, ctx),
        Command::End => end::handle(ctx).await,
        // Handled in main before any link is opened.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
