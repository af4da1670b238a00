use std::path::{
    Path,
    PathBuf,
};

use directories::ProjectDirs;
use robot8::TimingProfile;
use serde::{
    Deserialize,
    Serialize,
};

use crate::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing_profile: TimingProfile,
}

impl Config {
    /// Loads the configuration from `path`, or from the default location if
    /// no path is given. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = path {
            return Self::from_path(path);
        }

        match default_path() {
            Some(path) if path.exists() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        tracing::debug!(path = %path.as_ref().display(), "Loading config from file");
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }
}

fn default_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "robot8", "robot8")?;
    Some(project_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use robot8::TimingProfile;

    use crate::config::Config;

    #[test]
    fn parses_timing_profile() {
        let config: Config = toml::from_str(r#"timing_profile = "test""#).unwrap();
        assert_eq!(config.timing_profile, TimingProfile::Test);
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timing_profile, TimingProfile::Real);
    }

    #[test]
    fn rejects_unknown_profile() {
        assert!(toml::from_str::<Config>(r#"timing_profile = "fast""#).is_err());
    }
}
