//! The Red Hat PostgreSQL image, see <https://github.com/sclorg/postgresql-container>.
use std::{collections::BTreeMap, fmt};

use tracing::debug;

use crate::{
    db::{
        Database, DatabaseDescriptor, DatabaseFragment, ProbeSettings, SqlDatabase,
        database_builder_methods,
        postgresql::{
            self, DEFAULT_SYMBOLIC_NAME, ImageVariant, PGCTLTIMEOUT, PGCTLTIMEOUT_ENV_VAR,
            PostgresqlFragment, PostgresqlSettings, postgresql_builder_methods,
        },
    },
    image::{self, ImageResolver},
};

pub const DATA_DIR: &str = "/var/lib/pgsql/data";

pub const USER_ENV_VAR: &str = "POSTGRESQL_USER";
pub const PASSWORD_ENV_VAR: &str = "POSTGRESQL_PASSWORD";
pub const DATABASE_ENV_VAR: &str = "POSTGRESQL_DATABASE";

/// Server tuning, the image takes it from the environment instead of `-c` arguments.
pub fn tuning_vars() -> BTreeMap<String, String> {
    [
        ("POSTGRESQL_MAX_CONNECTIONS", "100"),
        ("POSTGRESQL_SHARED_BUFFERS", "16MB"),
        ("POSTGRESQL_MAX_PREPARED_TRANSACTIONS", "90"),
        (PGCTLTIMEOUT_ENV_VAR, PGCTLTIMEOUT),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

/// A PostgreSQL database running the Red Hat image.
///
/// Built with [`RedHatPostgresqlBuilder`].
#[derive(Clone, Debug)]
pub struct RedHatPostgresql {
    database: DatabaseDescriptor,
    settings: PostgresqlSettings,
}

impl RedHatPostgresql {
    pub fn builder() -> RedHatPostgresqlBuilder {
        RedHatPostgresqlBuilder::new()
    }

    pub fn user_env_var(&self) -> &str {
        &self.settings.user_env_var
    }

    pub fn database_env_var(&self) -> &str {
        &self.settings.database_env_var
    }
}

impl fmt::Display for RedHatPostgresql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ImageVariant::RedHat)
    }
}

impl Database for RedHatPostgresql {
    fn descriptor(&self) -> &DatabaseDescriptor {
        &self.database
    }

    fn image_name(&self, images: &dyn ImageResolver) -> Result<String, image::Error> {
        images.resolve(postgresql::IMAGE_NAME)
    }

    fn port(&self) -> u16 {
        postgresql::PORT
    }

    fn port_name(&self) -> &str {
        postgresql::IMAGE_NAME
    }

    /// The credentials and the configured variables, followed by the tuning variables.
    ///
    /// The tuning variables are always set last, configured values for them are dropped.
    fn image_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::from([
            (USER_ENV_VAR.to_string(), self.database.username().to_string()),
            (
                PASSWORD_ENV_VAR.to_string(),
                self.database.password().to_string(),
            ),
            (
                DATABASE_ENV_VAR.to_string(),
                self.database.db_name().to_string(),
            ),
        ]);
        vars.extend(self.settings.vars.clone());
        vars.extend(tuning_vars());
        vars
    }

    fn image_args(&self) -> Vec<String> {
        self.settings.args.clone()
    }

    fn probe_settings(&self) -> Option<ProbeSettings> {
        Some(self.settings.probe_settings())
    }
}

impl SqlDatabase for RedHatPostgresql {
    fn jdbc_connection_string_pattern(&self) -> &str {
        postgresql::JDBC_CONNECTION_STRING_PATTERN
    }
}

/// A builder to build [`RedHatPostgresql`] descriptors.
///
/// Every setting is optional; unset or empty values fall back to the image defaults when
/// [`Self::build`] is called.
#[derive(Clone, Debug, Default)]
pub struct RedHatPostgresqlBuilder {
    database: DatabaseFragment,
    postgresql: PostgresqlFragment,
}

impl RedHatPostgresqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    database_builder_methods!();
    postgresql_builder_methods!();

    pub fn build(&self) -> RedHatPostgresql {
        let database = DatabaseDescriptor::resolve(
            self.database.clone(),
            &DatabaseFragment::defaults(DEFAULT_SYMBOLIC_NAME, DATA_DIR),
        );
        let settings = PostgresqlSettings::resolve(
            self.postgresql.clone(),
            &PostgresqlFragment {
                user_env_var: Some(USER_ENV_VAR.to_string()),
                database_env_var: Some(DATABASE_ENV_VAR.to_string()),
                vars: Some(tuning_vars()),
                args: None,
            },
        );

        debug!(
            symbolic_name = database.symbolic_name(),
            data_dir = database.data_dir(),
            "built {} descriptor",
            ImageVariant::RedHat
        );

        RedHatPostgresql { database, settings }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let postgresql = RedHatPostgresqlBuilder::new().build();
        let descriptor = postgresql.descriptor();

        assert_eq!(descriptor.symbolic_name(), "POSTGRESQL");
        assert_eq!(descriptor.data_dir(), "/var/lib/pgsql/data");
        assert_eq!(postgresql.port(), 5432);
        assert_eq!(postgresql.to_string(), "RedHatPostgreSQL");
        assert_eq!(postgresql.service_account(), None);
        assert!(postgresql.image_args().is_empty());
        assert_eq!(
            postgresql.jdbc_connection_string_pattern(),
            "jdbc:postgresql://%s:%s/%s"
        );
    }

    #[rstest]
    #[case::unset(None, "/var/lib/pgsql/data")]
    #[case::empty(Some(""), "/var/lib/pgsql/data")]
    #[case::custom(Some("/data"), "/data")]
    fn data_dir_falls_back(#[case] data_dir: Option<&str>, #[case] expected: &str) {
        let mut builder = RedHatPostgresqlBuilder::new();
        if let Some(data_dir) = data_dir {
            builder.data_dir(data_dir);
        }
        assert_eq!(builder.build().descriptor().data_dir(), expected);
    }

    #[test]
    fn image_variables() {
        let postgresql = RedHatPostgresqlBuilder::new()
            .username("u")
            .password("p")
            .db_name("d")
            .build();

        assert_eq!(
            postgresql.image_variables(),
            vars(&[
                ("POSTGRESQL_USER", "u"),
                ("POSTGRESQL_PASSWORD", "p"),
                ("POSTGRESQL_DATABASE", "d"),
                ("POSTGRESQL_MAX_CONNECTIONS", "100"),
                ("POSTGRESQL_SHARED_BUFFERS", "16MB"),
                ("POSTGRESQL_MAX_PREPARED_TRANSACTIONS", "90"),
                ("PGCTLTIMEOUT", "300"),
            ])
        );
    }

    #[test]
    fn tuning_vars_cannot_be_overridden() {
        let postgresql = RedHatPostgresqlBuilder::new()
            .vars([
                ("POSTGRESQL_MAX_CONNECTIONS", "500"),
                ("PGCTLTIMEOUT", "60"),
                ("POSTGRESQL_USER", "admin"),
                ("TZ", "UTC"),
            ])
            .username("u")
            .build();
        let vars = postgresql.image_variables();

        assert_eq!(
            vars.get("POSTGRESQL_MAX_CONNECTIONS").map(String::as_str),
            Some("100")
        );
        assert_eq!(vars.get("PGCTLTIMEOUT").map(String::as_str), Some("300"));
        assert_eq!(
            vars.get("POSTGRESQL_SHARED_BUFFERS").map(String::as_str),
            Some("16MB")
        );
        assert_eq!(vars.get("POSTGRESQL_USER").map(String::as_str), Some("admin"));
        assert_eq!(vars.get("TZ").map(String::as_str), Some("UTC"));
    }

    #[test]
    fn args_override() {
        let postgresql = RedHatPostgresqlBuilder::new()
            .args(["run-postgresql"])
            .build();
        assert_eq!(postgresql.image_args(), ["run-postgresql"]);
    }

    #[test]
    fn probe_commands() {
        let probe_settings = RedHatPostgresqlBuilder::new()
            .build()
            .probe_settings()
            .expect("probes are supported");

        assert_eq!(
            probe_settings.liveness_command,
            "psql -h 127.0.0.1 -U $POSTGRESQL_USER -q -d $POSTGRESQL_DATABASE -c 'SELECT 1'"
        );

        let probe_settings = RedHatPostgresqlBuilder::new()
            .database_env_var("POSTGRESQL_ADMIN_DATABASE")
            .build()
            .probe_settings()
            .expect("probes are supported");
        assert!(
            probe_settings
                .liveness_command
                .contains("-d $POSTGRESQL_ADMIN_DATABASE")
        );
    }
}
