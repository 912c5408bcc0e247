//! Descriptors of database containers used as auxiliary services in test deployments.
//!
//! A descriptor only computes configuration values (image, port, environment, arguments,
//! probes and connection strings). Turning those into Kubernetes resources is done by the
//! functions in [`deployment`].
use std::{collections::BTreeMap, sync::Arc};

use educe::Educe;

use crate::{
    config::merge::{Merge, merge},
    image::{self, ImageResolver},
};

pub mod deployment;
pub mod official_postgresql;
pub mod postgresql;
pub mod probe;
pub mod redhat_postgresql;

pub use official_postgresql::{OfficialPostgresql, OfficialPostgresqlBuilder};
pub use probe::ProbeSettings;
pub use redhat_postgresql::{RedHatPostgresql, RedHatPostgresqlBuilder};

pub const DEFAULT_USERNAME: &str = "testuser";
pub const DEFAULT_PASSWORD: &str = "testpwd";
pub const DEFAULT_DB_NAME: &str = "testdb";

/// A deferred value, evaluated whenever the descriptor is asked for it.
pub type ValueSupplier = Arc<dyn Fn() -> String + Send + Sync>;

/// A reference to a persistent volume claim backing the database data directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentVolumeClaim {
    /// Name of the pod volume
    pub name: String,
    /// Name of the claim the volume binds
    pub claim_name: String,
}

impl PersistentVolumeClaim {
    pub fn new(name: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claim_name: claim_name.into(),
        }
    }
}

/// The settings every database descriptor shares, resolved against the image defaults.
#[derive(Clone, Educe)]
#[educe(Debug)]
pub struct DatabaseDescriptor {
    symbolic_name: String,
    data_dir: String,
    pvc: Option<PersistentVolumeClaim>,
    username: String,
    #[educe(Debug(ignore))]
    password: String,
    db_name: String,
    configure_environment: bool,
    with_liveness_probe: bool,
    with_readiness_probe: bool,
    with_startup_probe: bool,
    #[educe(Debug(ignore))]
    deployment_config_name: Option<ValueSupplier>,
    #[educe(Debug(ignore))]
    env_var_prefix: Option<ValueSupplier>,
}

impl DatabaseDescriptor {
    fn resolve(overrides: DatabaseFragment, defaults: &DatabaseFragment) -> Self {
        let DatabaseFragment {
            symbolic_name,
            data_dir,
            pvc,
            username,
            password,
            db_name,
            configure_environment,
            with_liveness_probe,
            with_readiness_probe,
            with_startup_probe,
            deployment_config_name,
            env_var_prefix,
        } = merge(overrides, defaults);

        Self {
            symbolic_name: symbolic_name.unwrap_or_default(),
            data_dir: data_dir.unwrap_or_default(),
            pvc,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
            db_name: db_name.unwrap_or_default(),
            configure_environment: configure_environment.unwrap_or(true),
            with_liveness_probe: with_liveness_probe.unwrap_or_default(),
            with_readiness_probe: with_readiness_probe.unwrap_or_default(),
            with_startup_probe: with_startup_probe.unwrap_or_default(),
            deployment_config_name,
            env_var_prefix,
        }
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    pub fn pvc(&self) -> Option<&PersistentVolumeClaim> {
        self.pvc.as_ref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn configure_environment(&self) -> bool {
        self.configure_environment
    }

    pub fn with_liveness_probe(&self) -> bool {
        self.with_liveness_probe
    }

    pub fn with_readiness_probe(&self) -> bool {
        self.with_readiness_probe
    }

    pub fn with_startup_probe(&self) -> bool {
        self.with_startup_probe
    }

    /// Name of the deployment (and service) running the database.
    ///
    /// Unless a provider was configured, this is the symbolic name turned into a DNS label:
    /// lower-cased, with `_` replaced by `-`.
    pub fn deployment_config_name(&self) -> String {
        self.deployment_config_name.as_ref().map_or_else(
            || self.symbolic_name.to_lowercase().replace('_', "-"),
            |supplier| supplier(),
        )
    }

    /// Prefix of the environment variables handed to applications using the database.
    pub fn env_var_prefix(&self) -> String {
        self.env_var_prefix
            .as_ref()
            .map_or_else(|| self.symbolic_name.clone(), |supplier| supplier())
    }
}

/// The caller overrides of a [`DatabaseDescriptor`], every field may be missing.
#[derive(Clone, Default, Educe)]
#[educe(Debug)]
pub(crate) struct DatabaseFragment {
    pub symbolic_name: Option<String>,
    pub data_dir: Option<String>,
    pub pvc: Option<PersistentVolumeClaim>,
    pub username: Option<String>,
    #[educe(Debug(ignore))]
    pub password: Option<String>,
    pub db_name: Option<String>,
    pub configure_environment: Option<bool>,
    pub with_liveness_probe: Option<bool>,
    pub with_readiness_probe: Option<bool>,
    pub with_startup_probe: Option<bool>,
    #[educe(Debug(ignore))]
    pub deployment_config_name: Option<ValueSupplier>,
    #[educe(Debug(ignore))]
    pub env_var_prefix: Option<ValueSupplier>,
}

impl DatabaseFragment {
    /// Image specific defaults, together with the defaults shared by all databases.
    pub fn defaults(symbolic_name: &str, data_dir: &str) -> Self {
        Self {
            symbolic_name: Some(symbolic_name.to_string()),
            data_dir: Some(data_dir.to_string()),
            username: Some(DEFAULT_USERNAME.to_string()),
            password: Some(DEFAULT_PASSWORD.to_string()),
            db_name: Some(DEFAULT_DB_NAME.to_string()),
            configure_environment: Some(true),
            with_liveness_probe: Some(false),
            with_readiness_probe: Some(false),
            with_startup_probe: Some(false),
            ..Self::default()
        }
    }
}

impl Merge for DatabaseFragment {
    // The PVC and the value suppliers have no defaults
    fn merge(&mut self, defaults: &Self) {
        self.symbolic_name.merge(&defaults.symbolic_name);
        self.data_dir.merge(&defaults.data_dir);
        self.username.merge(&defaults.username);
        self.password.merge(&defaults.password);
        self.db_name.merge(&defaults.db_name);
        self.configure_environment
            .merge(&defaults.configure_environment);
        self.with_liveness_probe.merge(&defaults.with_liveness_probe);
        self.with_readiness_probe
            .merge(&defaults.with_readiness_probe);
        self.with_startup_probe.merge(&defaults.with_startup_probe);
    }
}

/// The capabilities every database descriptor provides.
pub trait Database {
    fn descriptor(&self) -> &DatabaseDescriptor;

    /// The image reference the database container runs.
    fn image_name(&self, images: &dyn ImageResolver) -> Result<String, image::Error>;

    fn port(&self) -> u16;

    /// Name of the database port in containers and services, must be a valid IANA service
    /// name (at most 15 characters, no `_`).
    fn port_name(&self) -> &str;

    /// Environment variables passed to the database container.
    fn image_variables(&self) -> BTreeMap<String, String>;

    /// Arguments passed to the database container.
    fn image_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn service_account(&self) -> Option<&str> {
        None
    }

    /// Health check settings, `None` if the image can't be probed.
    fn probe_settings(&self) -> Option<ProbeSettings> {
        None
    }
}

/// A [`Database`] that can be reached through JDBC.
pub trait SqlDatabase: Database {
    /// A pattern with three `%s` placeholders: host, port and database name.
    fn jdbc_connection_string_pattern(&self) -> &str;

    /// The JDBC URL of the database, reached through its deployment's service.
    fn jdbc_connection_string(&self) -> String {
        let descriptor = self.descriptor();
        fill_pattern(
            self.jdbc_connection_string_pattern(),
            &[
                descriptor.deployment_config_name(),
                self.port().to_string(),
                descriptor.db_name().to_string(),
            ],
        )
    }
}

/// Replaces the `%s` placeholders of `pattern` with `values`, in order.
///
/// Placeholders without a value are kept as they are, superfluous values are ignored.
pub fn fill_pattern(pattern: &str, values: &[String]) -> String {
    let mut values = values.iter();
    let mut parts = pattern.split("%s");
    let mut filled = parts.next().unwrap_or_default().to_string();
    for part in parts {
        filled.push_str(values.next().map_or("%s", String::as_str));
        filled.push_str(part);
    }
    filled
}

/// Shared fluent setters of the database descriptor builders.
///
/// Expects the builder to keep its [`DatabaseFragment`] in a field named `database`.
macro_rules! database_builder_methods {
    () => {
        /// Falls back to the image default when empty.
        pub fn symbolic_name(&mut self, symbolic_name: impl Into<String>) -> &mut Self {
            self.database.symbolic_name = $crate::config::merge::non_empty(symbolic_name);
            self
        }

        /// Falls back to the image default when empty.
        pub fn data_dir(&mut self, data_dir: impl Into<String>) -> &mut Self {
            self.database.data_dir = $crate::config::merge::non_empty(data_dir);
            self
        }

        pub fn pvc(&mut self, pvc: $crate::db::PersistentVolumeClaim) -> &mut Self {
            self.database.pvc = Some(pvc);
            self
        }

        pub fn username(&mut self, username: impl Into<String>) -> &mut Self {
            self.database.username = $crate::config::merge::non_empty(username);
            self
        }

        pub fn password(&mut self, password: impl Into<String>) -> &mut Self {
            self.database.password = $crate::config::merge::non_empty(password);
            self
        }

        pub fn db_name(&mut self, db_name: impl Into<String>) -> &mut Self {
            self.database.db_name = $crate::config::merge::non_empty(db_name);
            self
        }

        pub fn configure_environment(&mut self, configure_environment: bool) -> &mut Self {
            self.database.configure_environment = Some(configure_environment);
            self
        }

        pub fn with_liveness_probe(&mut self, with_liveness_probe: bool) -> &mut Self {
            self.database.with_liveness_probe = Some(with_liveness_probe);
            self
        }

        pub fn with_readiness_probe(&mut self, with_readiness_probe: bool) -> &mut Self {
            self.database.with_readiness_probe = Some(with_readiness_probe);
            self
        }

        pub fn with_startup_probe(&mut self, with_startup_probe: bool) -> &mut Self {
            self.database.with_startup_probe = Some(with_startup_probe);
            self
        }

        pub fn deployment_config_name(
            &mut self,
            supplier: impl Fn() -> String + Send + Sync + 'static,
        ) -> &mut Self {
            self.database.deployment_config_name = Some(::std::sync::Arc::new(supplier));
            self
        }

        pub fn env_var_prefix(
            &mut self,
            supplier: impl Fn() -> String + Send + Sync + 'static,
        ) -> &mut Self {
            self.database.env_var_prefix = Some(::std::sync::Arc::new(supplier));
            self
        }
    };
}

pub(crate) use database_builder_methods;
