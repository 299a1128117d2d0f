// ── Sampling loop ──
//
// One cycle: read every adapter, convert, publish the snapshot, refresh
// the status display. Any cycle fault is logged at the cycle boundary and
// the interval sleep still happens. Cancellation only interrupts the
// sleep; a running cycle always completes.

use std::time::Duration;

use enviro_mqtt::Publish;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::convert::readings_from_raw;
use crate::display::{StatusDisplay, StatusScreen};
use crate::error::CoreError;
use crate::model::{ParticulateReading, SensorReadings};
use crate::publisher::TelemetryPublisher;
use crate::sensors::{SensorError, SensorSuite};
use crate::system::NetworkProbe;

/// Periodic sample → publish → display driver.
///
/// Owns the adapters and borrows the broker session; the process entry
/// point keeps the session to shut it down once the loop returns.
pub struct SamplingLoop<'a, P> {
    transport: &'a P,
    sensors: SensorSuite,
    publisher: TelemetryPublisher,
    display: Box<dyn StatusDisplay>,
    network: Box<dyn NetworkProbe>,
    serial: String,
    broker: String,
    interval: Duration,
    compensation_factor: f64,
}

impl<'a, P: Publish> SamplingLoop<'a, P> {
    pub fn new(
        transport: &'a P,
        config: &AgentConfig,
        sensors: SensorSuite,
        display: Box<dyn StatusDisplay>,
        network: Box<dyn NetworkProbe>,
    ) -> Self {
        Self {
            transport,
            sensors,
            publisher: TelemetryPublisher::new(&config.state_topic),
            display,
            network,
            serial: config.serial.clone(),
            broker: config.broker().to_owned(),
            interval: config.read_interval,
            compensation_factor: config.compensation_factor,
        }
    }

    pub fn has_particulate(&self) -> bool {
        self.sensors.has_particulate()
    }

    /// One-time startup read of the particulate sensor.
    ///
    /// A silent serial line disables the adapter for the rest of the
    /// process and returns `Ok(false)`. Any other fault is a startup fault.
    pub fn probe_particulate(&mut self) -> Result<bool, CoreError> {
        if !self.sensors.has_particulate() {
            return Ok(false);
        }

        match self.read_particulate() {
            Ok(reading) => {
                info!(?reading, "particulate sensor online");
                Ok(true)
            }
            Err(e) if e.is_serial_timeout() => {
                warn!(error = %e, "particulate sensor silent, disabling it");
                self.sensors.particulate = None;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the particulate sensor, retrying once after a reset when the
    /// read times out. A second timeout is returned to the caller.
    fn read_particulate(&mut self) -> Result<Option<ParticulateReading>, SensorError> {
        let Some(pms) = self.sensors.particulate.as_mut() else {
            return Ok(None);
        };

        match pms.read() {
            Ok(reading) => Ok(Some(reading)),
            Err(e) if e.is_read_timeout() => {
                warn!(error = %e, "particulate read timed out, resetting sensor");
                pms.reset()?;
                pms.read().map(Some)
            }
            Err(e) => Err(e),
        }
    }

    /// Read and convert every active adapter.
    pub fn sample(&mut self) -> Result<SensorReadings, CoreError> {
        let raw = self.sensors.read_primary()?;
        debug!(?raw, "primary adapters read");
        let readings = readings_from_raw(&raw, self.compensation_factor, &self.serial);
        let particulates = self.read_particulate()?;
        Ok(readings.with_particulates(particulates))
    }

    /// Sample, publish and refresh the display once.
    pub async fn run_cycle(&mut self) -> Result<SensorReadings, CoreError> {
        let readings = self.sample()?;
        info!(
            readings = %readings.to_json().unwrap_or_default(),
            "sampled"
        );
        self.publisher.publish(self.transport, &readings).await?;
        self.refresh_display();
        Ok(readings)
    }

    fn refresh_display(&mut self) {
        let connected = self.network.is_connected();
        let screen = StatusScreen::render(&self.serial, connected, &self.broker);
        if let Err(e) = self.display.show(&screen) {
            warn!(error = %e, "status display update failed");
        }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Sensor reads block the calling worker (a particulate read can take
    /// two serial timeouts plus the reset pulse). Run this on the
    /// multi-threaded runtime so the broker session task keeps polling.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        info!(
            topic = self.publisher.topic(),
            interval_secs = self.interval.as_secs(),
            particulate = self.has_particulate(),
            "sampling loop started"
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "cycle failed");
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("sampling loop stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{GasSample, WeatherSample};
    use crate::sensors::ParticulateSensor;
    use crate::testing::{
        FixedCpu, FixedGas, FixedLight, FixedNetwork, FixedWeather, ParticulateCalls,
        RecordingDisplay, RecordingTransport, ScriptedParticulate, Step,
    };

    const PM: ParticulateReading = ParticulateReading {
        pm1: 3,
        pm25: 5,
        pm10: 8,
    };

    fn config() -> AgentConfig {
        let mut config = AgentConfig {
            state_topic: "enviro".into(),
            read_interval: Duration::from_secs(5),
            serial: "00000000a1b2c3d4".into(),
            ..AgentConfig::default()
        };
        config.transport.host = "test".into();
        config
    }

    fn suite(particulate: Option<Box<dyn ParticulateSensor>>) -> SensorSuite {
        SensorSuite {
            weather: Box::new(FixedWeather(WeatherSample {
                temperature: 22.0,
                pressure: 1013.257,
                humidity: 45.9,
            })),
            gas: Box::new(FixedGas(GasSample {
                oxidising: 20_999.0,
                reducing: 300_500.0,
                nh3: 80_100.0,
            })),
            light: Box::new(FixedLight(120.8)),
            cpu: Box::new(FixedCpu(32.0)),
            particulate,
        }
    }

    fn scripted(
        script: Vec<Step>,
    ) -> (Option<Box<dyn ParticulateSensor>>, Arc<Mutex<ParticulateCalls>>) {
        let (pms, calls) = ScriptedParticulate::new(script);
        (Some(Box::new(pms)), calls)
    }

    fn sampler<'a>(
        transport: &'a RecordingTransport,
        particulate: Option<Box<dyn ParticulateSensor>>,
        display: RecordingDisplay,
    ) -> SamplingLoop<'a, RecordingTransport> {
        SamplingLoop::new(
            transport,
            &config(),
            suite(particulate),
            Box::new(display),
            Box::new(FixedNetwork(true)),
        )
    }

    #[test]
    fn compensates_and_truncates() {
        let transport = RecordingTransport::default();
        let mut sampler = sampler(&transport, None, RecordingDisplay::default());

        let readings = sampler.sample().unwrap();
        // 22.0 - (32.0 - 22.0) / 2.25 = 17.56
        assert_eq!(readings.temperature, 17);
        assert_eq!(readings.pressure, 101_320);
        assert_eq!(readings.humidity, 45);
        assert_eq!(readings.oxidised, 20);
        assert_eq!(readings.reduced, 300);
        assert_eq!(readings.nh3, 80);
        assert_eq!(readings.lux, 120);
        assert_eq!(readings.particulates, None);
        assert_eq!(readings.serial, "00000000a1b2c3d4");
    }

    #[tokio::test]
    async fn cycle_publishes_one_snapshot_without_particulates() {
        let transport = RecordingTransport::default();
        let mut sampler = sampler(&transport, None, RecordingDisplay::default());

        sampler.run_cycle().await.unwrap();

        let sent = transport.published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "enviro");
        assert!(!sent[0].retain);

        let body: serde_json::Value = serde_json::from_slice(&sent[0].payload).unwrap();
        let object = body.as_object().unwrap();
        for key in SensorReadings::REQUIRED_CHANNELS {
            assert!(object.contains_key(key), "missing {key}");
        }
        for key in SensorReadings::PARTICULATE_CHANNELS {
            assert!(!object.contains_key(key), "unexpected {key}");
        }
        assert_eq!(object.len(), 8);
        assert_eq!(body["serial"], "00000000a1b2c3d4");
        assert!(transport.acked().is_empty());
    }

    #[tokio::test]
    async fn cycle_refreshes_display_after_publish() {
        let transport = RecordingTransport::default();
        let display = RecordingDisplay::default();
        let frames = Arc::clone(&display.frames);
        let mut sampler = sampler(&transport, None, display);

        sampler.run_cycle().await.unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].message,
            "00000000a1b2c3d4\nWi-Fi: connected\nmqtt-broker: test"
        );
    }

    #[tokio::test]
    async fn display_failure_does_not_fail_cycle() {
        let transport = RecordingTransport::default();
        let display = RecordingDisplay {
            fail: true,
            ..RecordingDisplay::default()
        };
        let mut sampler = sampler(&transport, None, display);

        assert!(sampler.run_cycle().await.is_ok());
        assert_eq!(transport.published().len(), 1);
    }

    #[test]
    fn particulate_values_are_merged() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::Reading(PM)]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        let readings = sampler.sample().unwrap();
        assert_eq!(readings.particulates, Some(PM));
        let json: serde_json::Value = serde_json::from_str(&readings.to_json().unwrap()).unwrap();
        assert_eq!(json["pm25"], 5);
        assert_eq!(calls.lock().unwrap().resets, 0);
    }

    #[test]
    fn read_timeout_gets_one_reset_and_retry() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::ReadTimeout, Step::Reading(PM)]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        let readings = sampler.sample().unwrap();
        assert_eq!(readings.particulates, Some(PM));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.reads, 2);
        assert_eq!(calls.resets, 1);
    }

    #[test]
    fn second_read_timeout_propagates() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::ReadTimeout]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        let err = sampler.sample().unwrap_err();
        assert!(matches!(err, CoreError::Sensor(ref e) if e.is_read_timeout()));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.reads, 2);
        assert_eq!(calls.resets, 1);
    }

    #[test]
    fn other_particulate_faults_are_not_retried() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::Frame]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        assert!(sampler.sample().is_err());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.reads, 1);
        assert_eq!(calls.resets, 0);
    }

    #[tokio::test]
    async fn silent_probe_disables_particulate_for_good() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::SerialTimeout]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        assert!(!sampler.probe_particulate().unwrap());
        assert!(!sampler.has_particulate());

        for _ in 0..3 {
            let readings = sampler.run_cycle().await.unwrap();
            assert_eq!(readings.particulates, None);
        }
        assert_eq!(calls.lock().unwrap().reads, 1);
        let body = transport.published()[2].payload_str().into_owned();
        assert!(!body.contains("pm1"));
    }

    #[test]
    fn probe_with_working_sensor_keeps_it() {
        let transport = RecordingTransport::default();
        let (pms, _calls) = scripted(vec![Step::Reading(PM)]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        assert!(sampler.probe_particulate().unwrap());
        assert!(sampler.has_particulate());
    }

    #[test]
    fn probe_with_broken_frames_is_fatal() {
        let transport = RecordingTransport::default();
        let (pms, _calls) = scripted(vec![Step::Frame]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());

        assert!(matches!(
            sampler.probe_particulate(),
            Err(CoreError::Sensor(SensorError::Frame { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_keep_sleeping_and_retrying() {
        let transport = RecordingTransport::failing();
        let display = RecordingDisplay::default();
        let frames = Arc::clone(&display.frames);
        let mut sampler = sampler(&transport, None, display);
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                // Cycles at t=0, 5, 10; cancelled during the third sleep.
                tokio::time::sleep(Duration::from_secs(12)).await;
                cancel.cancel();
            }
        };
        let started = tokio::time::Instant::now();
        tokio::join!(sampler.run(&cancel), stopper);

        assert!(started.elapsed() >= Duration::from_secs(12));
        assert!(started.elapsed() < Duration::from_secs(15));
        // Still alive and still publishing on every cycle.
        assert_eq!(transport.attempts(), 3);
        assert!(transport.published().is_empty());
        // Publish failed every time, so the display never refreshed.
        assert!(frames.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_counts_one_publish_per_interval() {
        let transport = RecordingTransport::default();
        let (pms, calls) = scripted(vec![Step::ReadTimeout]);
        let mut sampler = sampler(&transport, pms, RecordingDisplay::default());
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(11)).await;
                cancel.cancel();
            }
        };
        tokio::join!(sampler.run(&cancel), stopper);

        // Every cycle fails on the particulate retry, nothing is published,
        // and each cycle still resets exactly once.
        assert_eq!(transport.attempts(), 0);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.resets, 3);
        assert_eq!(calls.reads, 6);
    }

    #[tokio::test]
    async fn cancelled_token_stops_after_current_cycle() {
        let transport = RecordingTransport::default();
        let mut sampler = sampler(&transport, None, RecordingDisplay::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        sampler.run(&cancel).await;
        assert_eq!(transport.published().len(), 1);
    }
}
