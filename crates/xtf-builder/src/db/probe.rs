use std::time::Duration;

use k8s_openapi::api::core::v1::Probe;

use crate::builder::pod::probe::{Error, ProbeBuilder};

/// Health check settings of a database container.
///
/// The liveness and readiness checks run a shell command inside the container, the startup
/// check only waits for the database port to accept connections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeSettings {
    pub initial_delay: Duration,
    pub port: String,
    pub timeout: Duration,
    pub readiness_initial_delay: Duration,
    pub readiness_command: String,
    pub liveness_command: String,
    pub period: Duration,
    pub failure_threshold: i32,
}

impl ProbeSettings {
    pub fn liveness_probe(&self) -> Result<Probe, Error> {
        ProbeBuilder::default()
            .with_shell_action_helper(&self.liveness_command)
            .with_period(self.period)
            .with_initial_delay(self.initial_delay)
            .with_timeout(self.timeout)
            .with_failure_threshold(self.failure_threshold)
            .build()
    }

    pub fn readiness_probe(&self) -> Result<Probe, Error> {
        ProbeBuilder::default()
            .with_shell_action_helper(&self.readiness_command)
            .with_period(self.period)
            .with_initial_delay(self.readiness_initial_delay)
            .with_timeout(self.timeout)
            .with_failure_threshold(self.failure_threshold)
            .build()
    }

    pub fn startup_probe(&self) -> Result<Probe, Error> {
        ProbeBuilder::default()
            .with_tcp_socket_action_helper(&self.port)
            .with_period(self.period)
            .with_timeout(self.timeout)
            .with_failure_threshold(self.failure_threshold)
            .build()
    }
}
