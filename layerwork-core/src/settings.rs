use crate::strategy::FailurePolicy;

/// Knobs of an image's processing machinery.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Threads running jobs. 0 lets rayon pick, one per CPU.
    pub worker_threads: usize,
    /// Default for applicators that don't choose their own.
    pub failure_policy: FailurePolicy,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn missing_fields_default() {
        let settings: Settings = toml::from_str("worker_threads = 2").unwrap();
        assert_eq!(
            settings,
            Settings {
                worker_threads: 2,
                failure_policy: FailurePolicy::Continue,
            }
        );
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }
    #[test]
    fn policy_is_snake_case() {
        let settings: Settings = toml::from_str("failure_policy = \"cancel\"").unwrap();
        assert_eq!(settings.failure_policy, FailurePolicy::Cancel);
        assert!(toml::from_str::<Settings>("failure_policy = \"Cancel\"").is_err());

        let written = toml::to_string(&Settings::default()).unwrap();
        assert!(written.contains("failure_policy = \"continue\""));
    }
}
