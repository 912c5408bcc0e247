use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, Probe, VolumeMount};

/// A builder to build [`Container`] objects.
#[derive(Clone, Debug, Default)]
pub struct ContainerBuilder {
    args: Option<Vec<String>>,
    container_ports: Option<Vec<ContainerPort>>,
    env: Option<Vec<EnvVar>>,
    image: Option<String>,
    name: String,
    volume_mounts: Option<Vec<VolumeMount>>,
    readiness_probe: Option<Probe>,
    liveness_probe: Option<Probe>,
    startup_probe: Option<Probe>,
}

impl ContainerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ContainerBuilder {
            name: name.into(),
            ..ContainerBuilder::default()
        }
    }

    pub fn image(&mut self, image: impl Into<String>) -> &mut Self {
        self.image = Some(image.into());
        self
    }

    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.get_or_insert_with(Vec::new).push(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            ..EnvVar::default()
        });
        self
    }

    pub fn add_env_vars(
        &mut self,
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> &mut Self {
        for (name, value) in env_vars {
            self.add_env_var(name, value);
        }
        self
    }

    pub fn args(&mut self, args: Vec<String>) -> &mut Self {
        self.args = Some(args);
        self
    }

    /// The port name is lower-cased, Kubernetes only accepts lowercase port names.
    pub fn add_container_port(&mut self, name: impl Into<String>, port: i32) -> &mut Self {
        self.container_ports
            .get_or_insert_with(Vec::new)
            .push(ContainerPort {
                name: Some(name.into().to_lowercase()),
                container_port: port,
                protocol: Some("TCP".to_string()),
                ..ContainerPort::default()
            });
        self
    }

    pub fn add_volume_mount(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> &mut Self {
        self.volume_mounts
            .get_or_insert_with(Vec::new)
            .push(VolumeMount {
                name: name.into(),
                mount_path: path.into(),
                ..VolumeMount::default()
            });
        self
    }

    pub fn readiness_probe(&mut self, probe: Probe) -> &mut Self {
        self.readiness_probe = Some(probe);
        self
    }

    pub fn liveness_probe(&mut self, probe: Probe) -> &mut Self {
        self.liveness_probe = Some(probe);
        self
    }

    pub fn startup_probe(&mut self, probe: Probe) -> &mut Self {
        self.startup_probe = Some(probe);
        self
    }

    pub fn build(&self) -> Container {
        Container {
            args: self.args.clone(),
            env: self.env.clone(),
            image: self.image.clone(),
            name: self.name.clone(),
            ports: self.container_ports.clone(),
            volume_mounts: self.volume_mounts.clone(),
            readiness_probe: self.readiness_probe.clone(),
            liveness_probe: self.liveness_probe.clone(),
            startup_probe: self.startup_probe.clone(),
            ..Container::default()
        }
    }
}
