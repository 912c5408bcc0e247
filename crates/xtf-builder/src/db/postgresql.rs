//! Settings shared by the PostgreSQL image variants.
use std::{collections::BTreeMap, time::Duration};

use crate::{
    config::merge::{Merge, merge},
    db::ProbeSettings,
};

pub const IMAGE_NAME: &str = "postgresql";
pub const PORT: u16 = 5432;
pub const DEFAULT_SYMBOLIC_NAME: &str = "POSTGRESQL";
pub const JDBC_CONNECTION_STRING_PATTERN: &str = "jdbc:postgresql://%s:%s/%s";

/// Timeout of `pg_ctl`, raised from 60s to give the server a chance to set passwords and
/// start on a loaded cluster, see <https://github.com/sclorg/postgresql-container/issues/297>.
pub const PGCTLTIMEOUT_ENV_VAR: &str = "PGCTLTIMEOUT";
pub const PGCTLTIMEOUT: &str = "300";

/// The PostgreSQL container image families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum ImageVariant {
    /// The community image, configured through `POSTGRES_*` variables and `-c` arguments
    #[strum(to_string = "OfficialPostgreSQL")]
    Official,
    /// The Red Hat image, configured through `POSTGRESQL_*` variables only
    #[strum(to_string = "RedHatPostgreSQL")]
    RedHat,
}

/// The command run by the liveness and readiness checks.
///
/// It references the admin user and default database through the container's own
/// environment, so the variable names have to match the ones the image is configured with.
pub fn health_check_command(user_env_var: &str, database_env_var: &str) -> String {
    format!("psql -h 127.0.0.1 -U ${user_env_var} -q -d ${database_env_var} -c 'SELECT 1'")
}

pub fn probe_settings(user_env_var: &str, database_env_var: &str) -> ProbeSettings {
    let command = health_check_command(user_env_var, database_env_var);
    ProbeSettings {
        initial_delay: Duration::from_secs(300),
        port: PORT.to_string(),
        timeout: Duration::from_secs(5),
        readiness_initial_delay: Duration::from_secs(5),
        readiness_command: command.clone(),
        liveness_command: command,
        period: Duration::from_secs(10),
        failure_threshold: 10,
    }
}

/// Image specific overrides of a PostgreSQL descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PostgresqlFragment {
    pub user_env_var: Option<String>,
    pub database_env_var: Option<String>,
    pub vars: Option<BTreeMap<String, String>>,
    pub args: Option<Vec<String>>,
}

impl Merge for PostgresqlFragment {
    fn merge(&mut self, defaults: &Self) {
        self.user_env_var.merge(&defaults.user_env_var);
        self.database_env_var.merge(&defaults.database_env_var);
        self.vars.merge(&defaults.vars);
        self.args.merge(&defaults.args);
    }
}

/// The resolved image specific settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PostgresqlSettings {
    pub user_env_var: String,
    pub database_env_var: String,
    pub vars: BTreeMap<String, String>,
    pub args: Vec<String>,
}

impl PostgresqlSettings {
    pub fn resolve(overrides: PostgresqlFragment, defaults: &PostgresqlFragment) -> Self {
        let PostgresqlFragment {
            user_env_var,
            database_env_var,
            vars,
            args,
        } = merge(overrides, defaults);

        Self {
            user_env_var: user_env_var.unwrap_or_default(),
            database_env_var: database_env_var.unwrap_or_default(),
            vars: vars.unwrap_or_default(),
            args: args.unwrap_or_default(),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        probe_settings(&self.user_env_var, &self.database_env_var)
    }
}

/// Fluent setters of the settings every PostgreSQL variant supports.
///
/// Expects the builder to keep its [`PostgresqlFragment`] in a field named `postgresql`.
macro_rules! postgresql_builder_methods {
    () => {
        /// Name of the variable holding the admin user, as referenced by the health checks.
        pub fn user_env_var(&mut self, user_env_var: impl Into<String>) -> &mut Self {
            self.postgresql.user_env_var = $crate::config::merge::non_empty(user_env_var);
            self
        }

        /// Name of the variable holding the default database, as referenced by the health
        /// checks.
        pub fn database_env_var(&mut self, database_env_var: impl Into<String>) -> &mut Self {
            self.postgresql.database_env_var = $crate::config::merge::non_empty(database_env_var);
            self
        }

        /// Replaces the default variables of the image.
        pub fn vars(
            &mut self,
            vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        ) -> &mut Self {
            self.postgresql.vars = Some(
                vars.into_iter()
                    .map(|(name, value)| (name.into(), value.into()))
                    .collect(),
            );
            self
        }

        /// Replaces the default arguments of the image.
        pub fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
            self.postgresql.args = Some(args.into_iter().map(Into::into).collect());
            self
        }
    };
}

pub(crate) use postgresql_builder_methods;
