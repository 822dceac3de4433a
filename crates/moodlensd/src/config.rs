use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9000;
const DEFAULT_INTRA_THREADS: usize = 2;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Optional TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    model_dir: Option<PathBuf>,
    cascade_path: Option<PathBuf>,
    emotion_model_path: Option<PathBuf>,
    intra_threads: Option<usize>,
    max_upload_bytes: Option<usize>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Listen address (default: 0.0.0.0).
    pub host: String,
    /// Listen port (default: 9000).
    pub port: u16,
    /// Directory containing the cascade XML and the ONNX model.
    pub model_dir: PathBuf,
    /// Explicit cascade path; overrides `model_dir`.
    pub cascade_path: Option<PathBuf>,
    /// Explicit FER+ model path; overrides `model_dir`.
    pub emotion_model_path: Option<PathBuf>,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the optional TOML file named by
    /// `MOODLENS_CONFIG`, then apply `MOODLENS_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match std::env::var("MOODLENS_CONFIG") {
            Ok(path) => FileConfig::read(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = env("MOODLENS_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(moodlens_core::default_model_dir);

        Self {
            host: env("MOODLENS_HOST")
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env_parse(&env, "MOODLENS_PORT")
                .or(file.port)
                .unwrap_or(DEFAULT_PORT),
            model_dir,
            cascade_path: env("MOODLENS_CASCADE_PATH")
                .map(PathBuf::from)
                .or(file.cascade_path),
            emotion_model_path: env("MOODLENS_EMOTION_MODEL_PATH")
                .map(PathBuf::from)
                .or(file.emotion_model_path),
            intra_threads: env_parse(&env, "MOODLENS_INTRA_THREADS")
                .or(file.intra_threads)
                .unwrap_or(DEFAULT_INTRA_THREADS),
            max_upload_bytes: env_parse(&env, "MOODLENS_MAX_UPLOAD_BYTES")
                .or(file.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    /// Path to the Haar cascade XML.
    pub fn cascade_path(&self) -> String {
        self.cascade_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(moodlens_core::CASCADE_FILE))
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the FER+ ONNX model.
    pub fn emotion_model_path(&self) -> String {
        self.emotion_model_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(moodlens_core::FERPLUS_MODEL_FILE))
            .to_string_lossy()
            .into_owned()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an environment value, ignoring unparsable input.
fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::resolve(FileConfig::default(), env_from(&[("MOODLENS_MODEL_DIR", "/m")]));
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert_eq!(cfg.intra_threads, 2);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.cascade_path(), "/m/haarcascade_frontalface_default.xml");
        assert_eq!(cfg.emotion_model_path(), "/m/emotion-ferplus-8.onnx");
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 8100
            host = "127.0.0.1"
            model_dir = "/from-file"
            "#,
        )
        .unwrap();
        let cfg = Config::resolve(file, env_from(&[("MOODLENS_PORT", "9100")]));
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.model_dir, PathBuf::from("/from-file"));
    }

    #[test]
    fn test_explicit_artifact_paths() {
        let cfg = Config::resolve(
            FileConfig::default(),
            env_from(&[
                ("MOODLENS_CASCADE_PATH", "/opt/cv/face.xml"),
                ("MOODLENS_EMOTION_MODEL_PATH", "/opt/onnx/fer.onnx"),
            ]),
        );
        assert_eq!(cfg.cascade_path(), "/opt/cv/face.xml");
        assert_eq!(cfg.emotion_model_path(), "/opt/onnx/fer.onnx");
    }

    #[test]
    fn test_unparsable_env_falls_back() {
        let cfg = Config::resolve(
            FileConfig::default(),
            env_from(&[("MOODLENS_PORT", "http"), ("MOODLENS_INTRA_THREADS", "-3")]),
        );
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.intra_threads, 2);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 1").is_err());
    }
}
