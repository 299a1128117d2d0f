// Connection options for the broker session.
//
// Everything needed to build a `rumqttc::MqttOptions`: broker address,
// client id, credentials, TLS and timing. Built by the config layer and
// handed to `MqttSession::connect`.

use std::path::PathBuf;
use std::time::Duration;

use rumqttc::{MqttOptions, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// TLS mode for the broker connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain TCP.
    #[default]
    Disabled,
    /// TLS using the platform's native root certificates.
    NativeRoots,
    /// TLS trusting a custom CA certificate (PEM file).
    CustomCa(PathBuf),
}

/// Username/password pair sent in CONNECT.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Shared transport configuration for building the MQTT client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    /// How long to wait for CONNACK at startup.
    pub connect_timeout: Duration,
    /// How long an acknowledged publish waits for PUBACK.
    pub ack_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            client_id: "enviro".into(),
            host: "localhost".into(),
            port: 1883,
            tls: TlsMode::Disabled,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build the `rumqttc` options from this config.
    pub fn mqtt_options(&self) -> Result<MqttOptions, Error> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);

        if let Some(ref creds) = self.credentials {
            options.set_credentials(&creds.username, creds.password.expose_secret());
        }

        match &self.tls {
            TlsMode::Disabled => {}
            TlsMode::NativeRoots => {
                options.set_transport(Transport::tls_with_default_config());
            }
            TlsMode::CustomCa(path) => {
                let ca = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                options.set_transport(Transport::tls(ca, None, None));
            }
        }

        Ok(options)
    }
}
