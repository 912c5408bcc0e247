//! The community PostgreSQL image, see <https://hub.docker.com/_/postgres>.
use std::{collections::BTreeMap, fmt};

use tracing::debug;

use crate::{
    config::merge::{Merge, merge, non_empty},
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

pub const DATA_DIR: &str = "/var/lib/postgresql/data";
/// Kept in a subdirectory, the mount point of a fresh volume may already contain files.
pub const PGDATA_DIR: &str = "/var/lib/postgresql/data/pgdata";
pub const PGDATA_ENV_VAR: &str = "PGDATA";

pub const USER_ENV_VAR: &str = "POSTGRES_USER";
pub const PASSWORD_ENV_VAR: &str = "POSTGRES_PASSWORD";
pub const DATABASE_ENV_VAR: &str = "POSTGRES_DB";

pub fn default_vars() -> BTreeMap<String, String> {
    [(PGCTLTIMEOUT_ENV_VAR.to_string(), PGCTLTIMEOUT.to_string())].into()
}

pub fn default_args() -> Vec<String> {
    [
        "-c",
        "shared_buffers=16MB",
        "-c",
        "max_connections=100",
        "-c",
        "max_prepared_transactions=90",
    ]
    .map(String::from)
    .to_vec()
}

/// A PostgreSQL database running the community image.
///
/// Built with [`OfficialPostgresqlBuilder`].
#[derive(Clone, Debug)]
pub struct OfficialPostgresql {
    database: DatabaseDescriptor,
    settings: PostgresqlSettings,
    service_account: Option<String>,
    pg_data: String,
}

impl OfficialPostgresql {
    pub fn builder() -> OfficialPostgresqlBuilder {
        OfficialPostgresqlBuilder::new()
    }

    /// Location of the database cluster inside the data directory.
    pub fn pg_data(&self) -> &str {
        &self.pg_data
    }

    pub fn user_env_var(&self) -> &str {
        &self.settings.user_env_var
    }

    pub fn database_env_var(&self) -> &str {
        &self.settings.database_env_var
    }
}

impl fmt::Display for OfficialPostgresql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ImageVariant::Official)
    }
}

impl Database for OfficialPostgresql {
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

    /// The credentials and `PGDATA`, with the configured variables merged over them.
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
            (PGDATA_ENV_VAR.to_string(), self.pg_data.clone()),
        ]);
        vars.extend(self.settings.vars.clone());
        vars
    }

    fn image_args(&self) -> Vec<String> {
        self.settings.args.clone()
    }

    fn service_account(&self) -> Option<&str> {
        self.service_account.as_deref()
    }

    fn probe_settings(&self) -> Option<ProbeSettings> {
        Some(self.settings.probe_settings())
    }
}

impl SqlDatabase for OfficialPostgresql {
    fn jdbc_connection_string_pattern(&self) -> &str {
        postgresql::JDBC_CONNECTION_STRING_PATTERN
    }
}

#[derive(Clone, Debug, Default)]
struct OfficialFragment {
    service_account: Option<String>,
    pg_data: Option<String>,
}

impl Merge for OfficialFragment {
    fn merge(&mut self, defaults: &Self) {
        self.service_account.merge(&defaults.service_account);
        self.pg_data.merge(&defaults.pg_data);
    }
}

/// A builder to build [`OfficialPostgresql`] descriptors.
///
/// Every setting is optional; unset or empty values fall back to the image defaults when
/// [`Self::build`] is called.
#[derive(Clone, Debug, Default)]
pub struct OfficialPostgresqlBuilder {
    database: DatabaseFragment,
    postgresql: PostgresqlFragment,
    official: OfficialFragment,
}

impl OfficialPostgresqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    database_builder_methods!();
    postgresql_builder_methods!();

    /// The service account the database pod runs as.
    pub fn service_account(&mut self, service_account: impl Into<String>) -> &mut Self {
        self.official.service_account = Some(service_account.into());
        self
    }

    /// Falls back to [`PGDATA_DIR`] when empty.
    pub fn pg_data(&mut self, pg_data: impl Into<String>) -> &mut Self {
        self.official.pg_data = non_empty(pg_data);
        self
    }

    pub fn build(&self) -> OfficialPostgresql {
        let database = DatabaseDescriptor::resolve(
            self.database.clone(),
            &DatabaseFragment::defaults(DEFAULT_SYMBOLIC_NAME, DATA_DIR),
        );
        let settings = PostgresqlSettings::resolve(
            self.postgresql.clone(),
            &PostgresqlFragment {
                user_env_var: Some(USER_ENV_VAR.to_string()),
                database_env_var: Some(DATABASE_ENV_VAR.to_string()),
                vars: Some(default_vars()),
                args: Some(default_args()),
            },
        );
        let OfficialFragment {
            service_account,
            pg_data,
        } = merge(
            self.official.clone(),
            &OfficialFragment {
                service_account: None,
                pg_data: Some(PGDATA_DIR.to_string()),
            },
        );

        debug!(
            symbolic_name = database.symbolic_name(),
            data_dir = database.data_dir(),
            "built {} descriptor",
            ImageVariant::Official
        );

        OfficialPostgresql {
            database,
            settings,
            service_account,
            pg_data: pg_data.unwrap_or_default(),
        }
    }
}
