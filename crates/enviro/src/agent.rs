//! Startup sequence and run loop of the agent process.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use enviro_core::sensors::iio::{IioGas, IioLight, IioWeather};
use enviro_core::sensors::pms5003::Pms5003;
use enviro_core::sensors::ParticulateSensor;
use enviro_core::system::{HostnameProbe, ThermalZone};
use enviro_core::{AgentConfig, CoreError, DiscoveryRegistry, SamplingLoop, SensorSuite};
use enviro_mqtt::{MqttSession, TlsMode};

use crate::display::LogDisplay;
use crate::error::CliError;

/// Connect, probe, register and sample until interrupted.
pub async fn run(agent: &AgentConfig) -> Result<(), CliError> {
    log_banner(agent);

    let sensors = open_sensors(agent)?;

    let session = MqttSession::connect(&agent.transport)
        .await
        .map_err(|source| CliError::ConnectionFailed {
            broker: format!("{}:{}", agent.transport.host, agent.transport.port),
            source,
        })?;

    let result = run_session(&session, agent, sensors).await;
    session.shutdown().await;
    result
}

async fn run_session(
    session: &MqttSession,
    agent: &AgentConfig,
    sensors: SensorSuite,
) -> Result<(), CliError> {
    let mut sampler = SamplingLoop::new(
        session,
        agent,
        sensors,
        Box::new(LogDisplay::default()),
        Box::new(HostnameProbe),
    );

    let particulate = sampler.probe_particulate()?;
    if agent.has_pms && !particulate {
        info!("continuing without particulate readings");
    }

    let registry = DiscoveryRegistry::new(session, agent.discovery_prefix.clone());
    let registrations = registry
        .register_channels(&agent.device, &agent.state_topic, particulate)
        .await?;
    let failed = registrations.iter().filter(|r| !r.is_delivered()).count();
    if failed > 0 {
        warn!(failed, "some discovery configs were not acknowledged");
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    sampler.run(&cancel).await;
    Ok(())
}

/// Build every adapter and read the primary ones once, so a missing
/// driver aborts startup instead of failing every cycle.
fn open_sensors(agent: &AgentConfig) -> Result<SensorSuite, CoreError> {
    let particulate: Option<Box<dyn ParticulateSensor>> = if agent.has_pms {
        let port = &agent.particulate;
        Some(Box::new(Pms5003::open(
            &port.port,
            port.reset_gpio.clone(),
            port.timeout,
        )?))
    } else {
        None
    };

    let mut suite = SensorSuite {
        weather: Box::new(IioWeather::new(&agent.sensors.weather)),
        gas: Box::new(IioGas::new(&agent.sensors.gas)),
        light: Box::new(IioLight::new(&agent.sensors.light)),
        cpu: Box::new(ThermalZone::new(&agent.sensors.cpu_thermal)),
        particulate,
    };
    suite.read_primary()?;
    Ok(suite)
}

async fn cancel_on_signal(cancel: CancellationToken) {
    shutdown_signal().await;
    info!("shutdown signal received, stopping after the current cycle");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}

fn log_banner(agent: &AgentConfig) {
    let transport = &agent.transport;
    let tls = match &transport.tls {
        TlsMode::Disabled => "off".to_owned(),
        TlsMode::NativeRoots => "native roots".to_owned(),
        TlsMode::CustomCa(path) => format!("ca {}", path.display()),
    };
    let username = transport
        .credentials
        .as_ref()
        .map_or("-", |c| c.username.as_str());

    info!(
        broker = %transport.host,
        port = transport.port,
        client_id = %transport.client_id,
        topic = %agent.state_topic,
        tls = %tls,
        username,
        interval_secs = agent.read_interval.as_secs(),
        "enviro agent starting"
    );
    info!(
        identifier = agent.device.identifier(),
        name = %agent.device.name,
        model = %agent.device.model,
        manufacturer = %agent.device.manufacturer,
        sw_version = %agent.device.sw_version,
        serial = %agent.serial,
        has_pms = agent.has_pms,
        "device"
    );
}
