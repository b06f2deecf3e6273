const DOCUMENTATION: &str = r#"# Layerwork settings. You may edit this file, but be aware that formatting and comments will not
# be preserved, and all keys and values are case sensitive.

# log_level: one of "off", "error", "warn", "info", "debug", "trace".
# [processing]
# worker_threads: threads running queued jobs. 0 picks one per CPU.
# failure_policy: what a batch does when one of its visits fails.
#   "continue" keeps going and reports the failure, "cancel" rolls the whole batch back.

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub log_level: String,
    pub processing: layerwork_core::settings::Settings,
}
impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            log_level: "debug".to_owned(),
            processing: layerwork_core::settings::Settings::default(),
        }
    }
}

pub struct Settings {
    failed_to_load: bool,
    pub file: SettingsFile,
}
impl Settings {
    const FILENAME: &'static str = "settings.toml";
    /// Shared global settings, saved and loaded from user preferences.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_SETTINGS: std::sync::OnceLock<Settings> = std::sync::OnceLock::new();

        GLOBAL_SETTINGS.get_or_init(|| {
            let mut dir = preferences_dir();
            match dir.as_mut() {
                None => Self::no_path(),
                Some(dir) => {
                    dir.push(Self::FILENAME);
                    Self::load_or_default(dir)
                }
            }
        })
    }
    #[must_use]
    pub fn no_path() -> Self {
        Self {
            failed_to_load: true,
            file: SettingsFile::default(),
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        let file: anyhow::Result<SettingsFile> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let file : SettingsFile = toml::from_str(&string)?;

            Ok(file)
        };

        match file {
            Ok(file) => Self {
                failed_to_load: false,
                file,
            },
            Err(_) => Self::no_path(),
        }
    }
    /// Return true if loading user's settings failed.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    /// The configured log level, `Debug` if it doesn't parse.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        self.file.log_level.parse().unwrap_or(log::LevelFilter::Debug)
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        // Ignore errors (could already exist). Any real errors will be emitted by file access below.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let mut string = toml::ser::to_string_pretty(&self.file)?;
        string = DOCUMENTATION.to_owned() + &string;
        std::fs::write(preferences, string)?;
        Ok(())
    }
}
