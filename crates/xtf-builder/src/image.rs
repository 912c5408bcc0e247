//! Resolution of logical image names (such as `postgresql`) to concrete image references.
//!
//! Test suites usually configure the images they run against through the environment, e.g.
//! `XTF_POSTGRESQL_IMAGE=registry.redhat.io/rhel9/postgresql-15:latest`, or through a YAML
//! file:
//!
//! ```yaml
//! images:
//!   postgresql: registry.redhat.io/rhel9/postgresql-15:latest
//! ```
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

pub const ENV_VAR_PREFIX: &str = "XTF_";
pub const ENV_VAR_SUFFIX: &str = "_IMAGE";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no image configured for {name:?}"))]
    UnknownImage { name: String },

    #[snafu(display("failed to read image config file {path:?}"))]
    ReadConfigFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse image config"))]
    ParseConfig { source: serde_yaml::Error },
}

/// Maps a logical image name to the image reference a container should run.
pub trait ImageResolver {
    fn resolve(&self, name: &str) -> Result<String>;
}

/// An [`ImageResolver`] backed by a static name to image mapping.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ImageRegistry {
    #[serde(default)]
    images: BTreeMap<String, String>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, name: impl Into<String>, image: impl Into<String>) -> Self {
        self.images.insert(name.into(), image.into());
        self
    }

    /// Reads all `XTF_<NAME>_IMAGE` variables of the current process.
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars_os())
    }

    /// Picks up every `XTF_<NAME>_IMAGE` pair, registering it under the lower-cased `<NAME>`.
    /// Other variables, empty values and pairs that are not valid unicode are ignored.
    pub fn from_env_vars(
        vars: impl IntoIterator<Item = (impl Into<OsString>, impl Into<OsString>)>,
    ) -> Self {
        let images = vars
            .into_iter()
            .filter_map(|(key, image)| {
                let key = key.into().into_string().ok()?;
                let image = image.into().into_string().ok()?;
                let name = key
                    .strip_prefix(ENV_VAR_PREFIX)?
                    .strip_suffix(ENV_VAR_SUFFIX)?;
                (!name.is_empty() && !image.is_empty()).then(|| (name.to_lowercase(), image))
            })
            .collect();

        Self { images }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context(ParseConfigSnafu)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).context(ReadConfigFileSnafu { path })?;
        Self::from_yaml_str(&contents)
    }

    /// Adds all images of `other`, replacing already registered names.
    pub fn extend(&mut self, other: Self) -> &mut Self {
        self.images.extend(other.images);
        self
    }

    pub fn images(&self) -> &BTreeMap<String, String> {
        &self.images
    }
}

impl ImageResolver for ImageRegistry {
    fn resolve(&self, name: &str) -> Result<String> {
        let image = self
            .images
            .get(name)
            .cloned()
            .context(UnknownImageSnafu { name })?;
        debug!(image_name = name, image = %image, "resolved image");
        Ok(image)
    }
}
