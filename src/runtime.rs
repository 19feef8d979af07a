// Process shell: connect, run the transmit loop, relay backbone commands,
// shut down on Ctrl-C / SIGTERM

use tracing::{debug, info, warn};
use zenoh::sample::Sample;

// local imports
use crate::actuator::{Actuator, CommandHandle};
use crate::backbone::ZenohBackbone;
use crate::config::{Args, SHUTDOWN_TIMEOUT};
use crate::messages::BackboneCommand;

/// Stage one backbone sample; bad payloads are dropped
fn relay(handle: &CommandHandle, sample: &Sample) {
    let payload = sample.payload().to_bytes();
    match serde_json::from_slice::<BackboneCommand>(&payload) {
        Ok(cmd) => {
            debug!("Received command: {:?}", &cmd);
            if let Err(e) = cmd.apply(handle) {
                warn!("Rejected command {:?}: {}", cmd, e);
            }
        }
        Err(e) => {
            warn!("Failed to parse command: {}", e);
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let geometry = args.geometry()?;
    let mut actuator = Actuator::new(ZenohBackbone::new(args.topic.clone()), args.players, geometry);
    actuator.set_loop_frequency(args.frequency)?;

    let target = actuator
        .connect(
            &args.backbone_address,
            args.backbone_port,
            &args.address,
            args.port,
        )
        .await?;
    info!("Connected to simulator at {}", target);

    let subscriber = match actuator.backbone().subscribe().await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            actuator.disconnect().await;
            return Err(e.into());
        }
    };

    actuator.start()?;
    info!(
        "Actuator started: {}Hz loop, {} robots per team",
        args.frequency, args.players
    );

    let handle = actuator.handle();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            sample = subscriber.recv_async() => match sample {
                Ok(sample) => relay(&handle, &sample),
                Err(e) => {
                    warn!("Backbone subscriber closed: {}", e);
                    break;
                }
            },
        }
    }

    actuator.shutdown(SHUTDOWN_TIMEOUT).await;
    Ok(())
}
