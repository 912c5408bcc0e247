use std::{num::TryFromIntError, time::Duration};

use k8s_openapi::{
    api::core::v1::{ExecAction, Probe, TCPSocketAction},
    apimachinery::pkg::util::intstr::IntOrString,
};
use snafu::{ResultExt, Snafu};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("probe {field} is too long (got {duration:?}, maximum allowed is {max}s)", max = i32::MAX))]
    DurationTooLong {
        source: TryFromIntError,
        field: &'static str,
        duration: Duration,
    },
}

/// A builder for [`Probe`] objects.
///
/// An action has to be chosen first, followed by the period, after which thresholds and
/// delays can be tuned.
#[derive(Debug)]
pub struct ProbeBuilder<Action, Period> {
    action: Action,
    period: Period,

    success_threshold: i32,
    failure_threshold: i32,
    timeout: Duration,
    initial_delay: Duration,
}

impl Default for ProbeBuilder<(), ()> {
    fn default() -> Self {
        Self {
            action: (),
            period: (),
            // The following values match the Kubernetes default
            success_threshold: 1,
            failure_threshold: 3,
            timeout: Duration::from_secs(1),
            initial_delay: Duration::from_secs(0),
        }
    }
}

#[derive(Debug)]
pub enum ProbeAction {
    Exec(ExecAction),
    TcpSocket(TCPSocketAction),
}

impl<Period> ProbeBuilder<(), Period> {
    /// This probe action executes the specified command
    pub fn with_exec_action_helper(
        self,
        command: impl IntoIterator<Item = impl Into<String>>,
    ) -> ProbeBuilder<ProbeAction, Period> {
        self.with_action(ProbeAction::Exec(ExecAction {
            command: Some(command.into_iter().map(Into::into).collect()),
        }))
    }

    /// Runs `command` through `/bin/sh -c`, so that environment variables in it get expanded.
    pub fn with_shell_action_helper(
        self,
        command: impl Into<String>,
    ) -> ProbeBuilder<ProbeAction, Period> {
        self.with_exec_action_helper(["/bin/sh".to_string(), "-c".to_string(), command.into()])
    }

    /// This probe action opens a TCP connection to the specified port.
    pub fn with_tcp_socket_action_helper(
        self,
        port: impl Into<String>,
    ) -> ProbeBuilder<ProbeAction, Period> {
        let port = port.into();
        // Numeric ports are sent as numbers, everything else is treated as a named port
        let port = port
            .parse::<i32>()
            .map_or(IntOrString::String(port), IntOrString::Int);
        self.with_action(ProbeAction::TcpSocket(TCPSocketAction {
            port,
            ..TCPSocketAction::default()
        }))
    }

    pub fn with_action(self, action: ProbeAction) -> ProbeBuilder<ProbeAction, Period> {
        let Self {
            action: (),
            period,
            success_threshold,
            failure_threshold,
            timeout,
            initial_delay,
        } = self;

        ProbeBuilder {
            action,
            period,
            success_threshold,
            failure_threshold,
            timeout,
            initial_delay,
        }
    }
}

impl ProbeBuilder<ProbeAction, ()> {
    /// The period/interval in which the probe should be executed.
    pub fn with_period(self, period: Duration) -> ProbeBuilder<ProbeAction, Duration> {
        let Self {
            action,
            period: (),
            success_threshold,
            failure_threshold,
            timeout,
            initial_delay,
        } = self;

        ProbeBuilder {
            action,
            period,
            success_threshold,
            failure_threshold,
            timeout,
            initial_delay,
        }
    }
}

impl ProbeBuilder<ProbeAction, Duration> {
    /// How often the probe must succeed before being considered successful.
    pub fn with_success_threshold(mut self, success_threshold: i32) -> Self {
        self.success_threshold = success_threshold;
        self
    }

    /// How often the probe must fail before being considered failed.
    pub fn with_failure_threshold(mut self, failure_threshold: i32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn build(self) -> Result<Probe, Error> {
        let mut probe = Probe {
            failure_threshold: Some(self.failure_threshold),
            initial_delay_seconds: Some(seconds("initial delay", self.initial_delay)?),
            period_seconds: Some(seconds("period", self.period)?),
            success_threshold: Some(self.success_threshold),
            timeout_seconds: Some(seconds("timeout", self.timeout)?),
            ..Probe::default()
        };

        match self.action {
            ProbeAction::Exec(exec_action) => probe.exec = Some(exec_action),
            ProbeAction::TcpSocket(tcp_socket_action) => probe.tcp_socket = Some(tcp_socket_action),
        }

        Ok(probe)
    }
}

fn seconds(field: &'static str, duration: Duration) -> Result<i32, Error> {
    duration
        .as_secs()
        .try_into()
        .context(DurationTooLongSnafu { field, duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_builder() {
        let probe = ProbeBuilder::default()
            .with_exec_action_helper(["sleep", "1"])
            .with_period(Duration::from_secs(5))
            .with_failure_threshold(7)
            .build()
            .expect("durations fit");

        assert_eq!(
            probe,
            Probe {
                exec: Some(ExecAction {
                    command: Some(vec!["sleep".to_owned(), "1".to_owned()])
                }),
                failure_threshold: Some(7),
                initial_delay_seconds: Some(0),
                period_seconds: Some(5),
                success_threshold: Some(1),
                timeout_seconds: Some(1),
                ..Probe::default()
            }
        );
    }

    #[test]
    fn test_shell_action() {
        let probe = ProbeBuilder::default()
            .with_shell_action_helper("psql -c 'SELECT 1'")
            .with_period(Duration::from_secs(10))
            .build()
            .expect("durations fit");

        assert_eq!(
            probe.exec.and_then(|exec| exec.command),
            Some(vec![
                "/bin/sh".to_owned(),
                "-c".to_owned(),
                "psql -c 'SELECT 1'".to_owned()
            ])
        );
    }

    #[test]
    fn test_tcp_socket_ports() {
        let numeric = ProbeBuilder::default()
            .with_tcp_socket_action_helper("5432")
            .with_period(Duration::from_secs(10))
            .build()
            .expect("durations fit");
        let named = ProbeBuilder::default()
            .with_tcp_socket_action_helper("postgresql")
            .with_period(Duration::from_secs(10))
            .build()
            .expect("durations fit");

        assert_eq!(
            numeric.tcp_socket.map(|tcp| tcp.port),
            Some(IntOrString::Int(5432))
        );
        assert_eq!(
            named.tcp_socket.map(|tcp| tcp.port),
            Some(IntOrString::String("postgresql".to_owned()))
        );
    }

    #[test]
    fn test_duration_too_long() {
        let err = ProbeBuilder::default()
            .with_exec_action_helper(["true"])
            .with_period(Duration::from_secs(10))
            .with_initial_delay(Duration::from_secs(u64::MAX))
            .build()
            .expect_err("initial delay does not fit");

        assert!(matches!(
            err,
            Error::DurationTooLong {
                field: "initial delay",
                ..
            }
        ));
    }
}
