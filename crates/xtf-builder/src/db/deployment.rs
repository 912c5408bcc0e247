//! Assembly of database descriptors into the Kubernetes resources running them.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        Container, PersistentVolumeClaimVolumeSource, PodSpec, Service, ServicePort, ServiceSpec,
        Volume,
    },
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use snafu::{ResultExt, Snafu};
use tracing::{instrument, warn};

use crate::{
    builder::pod::{container::ContainerBuilder, probe},
    db::{Database, SqlDatabase},
    image::{self, ImageResolver},
};

/// Label selecting the pods of a database deployment.
pub const NAME_LABEL: &str = "name";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve the image of {database}"))]
    ResolveImage {
        source: image::Error,
        database: String,
    },

    #[snafu(display("failed to build the {kind} probe of {database}"))]
    BuildProbe {
        source: probe::Error,
        kind: &'static str,
        database: String,
    },
}

/// Builds the container running `db`.
///
/// The probes enabled on the descriptor are only added if the database provides probe
/// settings.
#[instrument(skip_all, fields(database = %db.descriptor().symbolic_name()))]
pub fn build_container<D: Database + ?Sized>(db: &D, images: &dyn ImageResolver) -> Result<Container> {
    let descriptor = db.descriptor();
    let database = descriptor.symbolic_name().to_string();
    let name = descriptor.deployment_config_name();

    let image = db
        .image_name(images)
        .context(ResolveImageSnafu { database: &database })?;

    let mut container_builder = ContainerBuilder::new(&name);
    container_builder
        .image(image)
        .add_container_port(db.port_name(), db.port().into())
        .add_env_vars(db.image_variables());

    let args = db.image_args();
    if !args.is_empty() {
        container_builder.args(args);
    }

    if let Some(pvc) = descriptor.pvc() {
        container_builder.add_volume_mount(&pvc.name, descriptor.data_dir());
    }

    match db.probe_settings() {
        Some(probe_settings) => {
            if descriptor.with_liveness_probe() {
                container_builder.liveness_probe(probe_settings.liveness_probe().context(
                    BuildProbeSnafu {
                        kind: "liveness",
                        database: &database,
                    },
                )?);
            }
            if descriptor.with_readiness_probe() {
                container_builder.readiness_probe(probe_settings.readiness_probe().context(
                    BuildProbeSnafu {
                        kind: "readiness",
                        database: &database,
                    },
                )?);
            }
            if descriptor.with_startup_probe() {
                container_builder.startup_probe(probe_settings.startup_probe().context(
                    BuildProbeSnafu {
                        kind: "startup",
                        database: &database,
                    },
                )?);
            }
        }
        None if descriptor.with_liveness_probe()
            || descriptor.with_readiness_probe()
            || descriptor.with_startup_probe() =>
        {
            warn!("probes were requested, but the database has no probe settings");
        }
        None => {}
    }

    Ok(container_builder.build())
}

/// The pod running `db`: its container, the data volume and the service account, if any.
pub fn build_pod_spec<D: Database + ?Sized>(db: &D, images: &dyn ImageResolver) -> Result<PodSpec> {
    let volumes = build_volumes(db);

    Ok(PodSpec {
        containers: vec![build_container(db, images)?],
        volumes: (!volumes.is_empty()).then_some(volumes),
        service_account_name: db.service_account().map(str::to_string),
        ..PodSpec::default()
    })
}

/// The volumes backing the data directory of `db`, empty without a PVC.
pub fn build_volumes<D: Database + ?Sized>(db: &D) -> Vec<Volume> {
    db.descriptor()
        .pvc()
        .map(|pvc| Volume {
            name: pvc.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc.claim_name.clone(),
                ..PersistentVolumeClaimVolumeSource::default()
            }),
            ..Volume::default()
        })
        .into_iter()
        .collect()
}

/// The service exposing `db` under its deployment config name.
pub fn build_service<D: Database + ?Sized>(db: &D) -> Service {
    let name = db.descriptor().deployment_config_name();
    let selector = BTreeMap::from([(NAME_LABEL.to_string(), name.clone())]);

    Service {
        metadata: ObjectMeta {
            name: Some(name),
            labels: Some(selector.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                name: Some(db.port_name().to_string()),
                port: db.port().into(),
                target_port: Some(IntOrString::Int(db.port().into())),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// The environment an application needs to connect to `db`, keyed by the descriptor's
/// env var prefix.
///
/// Empty if the descriptor was built with `configure_environment` disabled.
pub fn application_env_vars<D: SqlDatabase + ?Sized>(db: &D) -> BTreeMap<String, String> {
    let descriptor = db.descriptor();
    if !descriptor.configure_environment() {
        return BTreeMap::new();
    }

    let prefix = descriptor.env_var_prefix();
    [
        ("SERVICE_HOST", descriptor.deployment_config_name()),
        ("SERVICE_PORT", db.port().to_string()),
        ("USERNAME", descriptor.username().to_string()),
        ("PASSWORD", descriptor.password().to_string()),
        ("DATABASE", descriptor.db_name().to_string()),
        ("URL", db.jdbc_connection_string()),
    ]
    .into_iter()
    .map(|(suffix, value)| (format!("{prefix}_{suffix}"), value))
    .collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::EnvVar;

    use super::*;
    use crate::{
        db::{OfficialPostgresqlBuilder, PersistentVolumeClaim, RedHatPostgresqlBuilder},
        image::ImageRegistry,
    };

    fn images() -> ImageRegistry {
        ImageRegistry::new().with_image("postgresql", "quay.io/sclorg/postgresql-15-c9s")
    }

    fn env(container: &Container) -> Vec<(&str, &str)> {
        container
            .env
            .iter()
            .flatten()
            .map(|EnvVar { name, value, .. }| (name.as_str(), value.as_deref().unwrap_or("")))
            .collect()
    }

    #[test]
    fn container_without_probes_or_pvc() {
        let postgresql = RedHatPostgresqlBuilder::new()
            .username("u")
            .password("p")
            .db_name("d")
            .build();
        let container = build_container(&postgresql, &images()).expect("image is configured");

        assert_eq!(container.name, "postgresql");
        assert_eq!(
            container.image.as_deref(),
            Some("quay.io/sclorg/postgresql-15-c9s")
        );
        assert_eq!(
            container
                .ports
                .as_ref()
                .map(|ports| (ports[0].name.as_deref(), ports[0].container_port)),
            Some((Some("postgresql"), 5432))
        );
        // Sorted by name
        assert_eq!(
            env(&container),
            [
                ("PGCTLTIMEOUT", "300"),
                ("POSTGRESQL_DATABASE", "d"),
                ("POSTGRESQL_MAX_CONNECTIONS", "100"),
                ("POSTGRESQL_MAX_PREPARED_TRANSACTIONS", "90"),
                ("POSTGRESQL_PASSWORD", "p"),
                ("POSTGRESQL_SHARED_BUFFERS", "16MB"),
                ("POSTGRESQL_USER", "u"),
            ]
        );
        assert_eq!(container.args, None);
        assert_eq!(container.volume_mounts, None);
        assert_eq!(container.liveness_probe, None);
        assert_eq!(container.readiness_probe, None);
        assert_eq!(container.startup_probe, None);
        assert!(build_volumes(&postgresql).is_empty());
    }

    #[test]
    fn container_with_probes_and_pvc() {
        let postgresql = OfficialPostgresqlBuilder::new()
            .pvc(PersistentVolumeClaim::new("postgresql-data", "pg-claim"))
            .with_liveness_probe(true)
            .with_readiness_probe(true)
            .with_startup_probe(true)
            .build();
        let container = build_container(&postgresql, &images()).expect("image is configured");

        assert_eq!(container.args.as_ref().map(Vec::len), Some(6));
        assert!(
            matches!(container.volume_mounts.as_deref(), Some([mount]) if mount.name == "postgresql-data" && mount.mount_path == "/var/lib/postgresql/data")
        );
        assert_eq!(
            container
                .liveness_probe
                .as_ref()
                .and_then(|probe| probe.initial_delay_seconds),
            Some(300)
        );
        assert!(
            container
                .readiness_probe
                .as_ref()
                .is_some_and(|probe| probe.exec.is_some())
        );
        assert!(
            container
                .startup_probe
                .as_ref()
                .is_some_and(|probe| probe.tcp_socket.is_some())
        );

        let volumes = build_volumes(&postgresql);
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "postgresql-data");
        assert_eq!(
            volumes[0]
                .persistent_volume_claim
                .as_ref()
                .map(|pvc| pvc.claim_name.as_str()),
            Some("pg-claim")
        );
    }

    #[test]
    fn container_requires_image() {
        let postgresql = OfficialPostgresqlBuilder::new().build();
        let err = build_container(&postgresql, &ImageRegistry::new()).expect_err("no image");

        assert!(matches!(err, Error::ResolveImage { .. }));
        assert_eq!(err.to_string(), "failed to resolve the image of POSTGRESQL");
    }

    #[test]
    fn service() {
        let postgresql = OfficialPostgresqlBuilder::new()
            .deployment_config_name(|| "app-db".to_string())
            .build();
        let service = build_service(&postgresql);
        let spec = service.spec.expect("spec is set");

        assert_eq!(service.metadata.name.as_deref(), Some("app-db"));
        assert_eq!(
            spec.selector,
            Some(BTreeMap::from([("name".to_string(), "app-db".to_string())]))
        );
        assert_eq!(spec.ports.map(|ports| ports[0].port), Some(5432));
    }

    #[test]
    fn kubernetes_names_from_symbolic_name() {
        let postgresql = OfficialPostgresqlBuilder::new()
            .symbolic_name("ORDERS_DATABASE")
            .build();
        let container = build_container(&postgresql, &images()).expect("image is configured");
        let service = build_service(&postgresql);
        let spec = service.spec.expect("spec is set");

        assert_eq!(container.name, "orders-database");
        assert_eq!(
            container
                .ports
                .as_ref()
                .and_then(|ports| ports[0].name.as_deref()),
            Some("postgresql")
        );
        assert_eq!(service.metadata.name.as_deref(), Some("orders-database"));
        assert_eq!(
            spec.selector,
            Some(BTreeMap::from([(
                "name".to_string(),
                "orders-database".to_string()
            )]))
        );
        assert_eq!(
            spec.ports.and_then(|ports| ports[0].name.clone()),
            Some("postgresql".to_string())
        );
    }

    #[test]
    fn pod_spec_with_service_account() {
        let postgresql = OfficialPostgresqlBuilder::new()
            .pvc(PersistentVolumeClaim::new("postgresql-data", "pg-claim"))
            .service_account("anyuid")
            .build();
        let pod_spec = build_pod_spec(&postgresql, &images()).expect("image is configured");

        assert_eq!(pod_spec.service_account_name.as_deref(), Some("anyuid"));
        assert_eq!(pod_spec.containers.len(), 1);
        assert_eq!(pod_spec.containers[0].name, "postgresql");
        assert_eq!(pod_spec.volumes.map(|volumes| volumes.len()), Some(1));
    }

    #[test]
    fn pod_spec_without_service_account() {
        let postgresql = RedHatPostgresqlBuilder::new().build();
        let pod_spec = build_pod_spec(&postgresql, &images()).expect("image is configured");

        assert_eq!(pod_spec.service_account_name, None);
        assert_eq!(pod_spec.volumes, None);
    }

    #[test]
    fn application_environment() {
        let postgresql = RedHatPostgresqlBuilder::new()
            .username("u")
            .password("p")
            .db_name("d")
            .env_var_prefix(|| "DB".to_string())
            .build();

        assert_eq!(
            application_env_vars(&postgresql),
            BTreeMap::from(
                [
                    ("DB_SERVICE_HOST", "postgresql"),
                    ("DB_SERVICE_PORT", "5432"),
                    ("DB_USERNAME", "u"),
                    ("DB_PASSWORD", "p"),
                    ("DB_DATABASE", "d"),
                    ("DB_URL", "jdbc:postgresql://postgresql:5432/d"),
                ]
                .map(|(name, value)| (name.to_string(), value.to_string()))
            )
        );
    }

    #[test]
    fn application_environment_disabled() {
        let postgresql = OfficialPostgresqlBuilder::new()
            .configure_environment(false)
            .build();
        assert!(application_env_vars(&postgresql).is_empty());
    }
}
