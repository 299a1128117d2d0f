// In-memory doubles shared by the unit tests.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use enviro_mqtt::{Message, Publish};

use crate::display::{StatusDisplay, StatusScreen};
use crate::error::CoreError;
use crate::model::{GasSample, ParticulateReading, WeatherSample};
use crate::sensors::{
    CpuTemperature, GasSensor, LightSensor, ParticulateSensor, SensorError, WeatherSensor,
};
use crate::system::NetworkProbe;

/// Records every publish; optionally refuses all of them.
///
/// `attempts` counts state publishes whether or not they were refused.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    attempts: Mutex<usize>,
    published: Mutex<Vec<Message>>,
    acked: Mutex<Vec<Message>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn published(&self) -> Vec<Message> {
        self.published.lock().unwrap().clone()
    }

    pub fn acked(&self) -> Vec<Message> {
        self.acked.lock().unwrap().clone()
    }
}

impl Publish for RecordingTransport {
    fn publish(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), enviro_mqtt::Error>> + Send {
        async move {
            *self.attempts.lock().unwrap() += 1;
            if self.fail {
                return Err(enviro_mqtt::Error::SessionClosed);
            }
            self.published.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn publish_acked(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), enviro_mqtt::Error>> + Send {
        async move {
            if self.fail {
                return Err(enviro_mqtt::Error::SessionClosed);
            }
            self.acked.lock().unwrap().push(message);
            Ok(())
        }
    }
}

// ── Sensors ──────────────────────────────────────────────────────

pub struct FixedWeather(pub WeatherSample);

impl WeatherSensor for FixedWeather {
    fn read(&mut self) -> Result<WeatherSample, SensorError> {
        Ok(self.0)
    }
}

pub struct FixedGas(pub GasSample);

impl GasSensor for FixedGas {
    fn read(&mut self) -> Result<GasSample, SensorError> {
        Ok(self.0)
    }
}

pub struct FixedLight(pub f64);

impl LightSensor for FixedLight {
    fn lux(&mut self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

pub struct FixedCpu(pub f64);

impl CpuTemperature for FixedCpu {
    fn celsius(&mut self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

/// Call counters of a [`ScriptedParticulate`], readable after the
/// adapter has been boxed away.
#[derive(Debug, Default)]
pub struct ParticulateCalls {
    pub reads: usize,
    pub resets: usize,
}

/// One scripted outcome of a particulate read.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Reading(ParticulateReading),
    ReadTimeout,
    SerialTimeout,
    Frame,
}

impl Step {
    fn outcome(self) -> Result<ParticulateReading, SensorError> {
        const SENSOR: &str = "pms5003";
        match self {
            Self::Reading(reading) => Ok(reading),
            Self::ReadTimeout => Err(SensorError::ReadTimeout { sensor: SENSOR }),
            Self::SerialTimeout => Err(SensorError::SerialTimeout {
                sensor: SENSOR,
                timeout_ms: 5000,
            }),
            Self::Frame => Err(SensorError::Frame {
                sensor: SENSOR,
                reason: "checksum".into(),
            }),
        }
    }
}

/// Replays a fixed list of read outcomes, then repeats the last one.
pub struct ScriptedParticulate {
    script: VecDeque<Step>,
    calls: Arc<Mutex<ParticulateCalls>>,
}

impl ScriptedParticulate {
    pub fn new(script: Vec<Step>) -> (Self, Arc<Mutex<ParticulateCalls>>) {
        let calls = Arc::new(Mutex::new(ParticulateCalls::default()));
        (
            Self {
                script: script.into(),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl ParticulateSensor for ScriptedParticulate {
    fn read(&mut self) -> Result<ParticulateReading, SensorError> {
        self.calls.lock().unwrap().reads += 1;
        let next = if self.script.len() > 1 {
            self.script.pop_front()
        } else {
            self.script.front().copied()
        };
        next.map_or(Step::ReadTimeout.outcome(), Step::outcome)
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        self.calls.lock().unwrap().resets += 1;
        Ok(())
    }
}

// ── Display / network ────────────────────────────────────────────

/// Keeps every frame it was asked to show.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub frames: Arc<Mutex<Vec<StatusScreen>>>,
    pub fail: bool,
}

impl StatusDisplay for RecordingDisplay {
    fn show(&mut self, screen: &StatusScreen) -> Result<(), CoreError> {
        if self.fail {
            return Err(CoreError::Display {
                message: "panel not responding".into(),
            });
        }
        self.frames.lock().unwrap().push(screen.clone());
        Ok(())
    }
}

pub struct FixedNetwork(pub bool);

impl NetworkProbe for FixedNetwork {
    fn is_connected(&mut self) -> bool {
        self.0
    }
}
