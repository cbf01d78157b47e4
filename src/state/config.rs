//! Configuration management

use crate::bookmark::JsonBookmarkStore;
use crate::library::SortKey;
use crate::sequencer::{SequencerOptions, DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE};
use crate::speech::Backend;
use crate::{ReaderError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reader configuration
///
/// Persistent settings for narration, bookmarks and the library view,
/// stored as INI.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.dfreader.cfg unless overridden)
    path: PathBuf,
}

impl Config {
    /// Load configuration from ~/.dfreader.cfg, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific file, creating it if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| ReaderError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| ReaderError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Configuration with defaults only, never written to disk
    pub fn in_memory() -> Self {
        Self {
            ini: Self::default_config(),
            path: PathBuf::new(),
        }
    }

    /// Save configuration to disk
    ///
    /// In-memory configurations have no file and are not written.
    pub fn save(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            debug!("In-memory config, not saving");
            return Ok(());
        }
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| ReaderError::Config(format!("Failed to save config: {}", e)))
    }

    /// Default config file path (~/.dfreader.cfg)
    fn config_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".dfreader.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("backend", "auto")
            .set("chunk_size", DEFAULT_CHUNK_SIZE.to_string())
            .set("chunk_delay_ms", DEFAULT_CHUNK_DELAY.as_millis().to_string())
            .set("rate", "1.0");

        ini.with_section(Some("reader"));

        ini.with_section(Some("library"))
            .set("catalog", "catalog.json")
            .set("sort", "title");

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    // Reader-specific configuration getters

    /// Which speech backend to use
    pub fn backend(&self) -> Backend {
        let raw = self.get_string("speech", "backend", "auto");
        raw.parse().unwrap_or_else(|e| {
            warn!("{}; using auto", e);
            Backend::Auto
        })
    }

    /// Tokens per utterance (at least 1)
    pub fn chunk_size(&self) -> usize {
        let size = self.get_int("speech", "chunk_size", DEFAULT_CHUNK_SIZE as i64);
        usize::try_from(size).ok().filter(|&s| s >= 1).unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Pause between utterances
    pub fn chunk_delay(&self) -> Duration {
        let ms = self.get_int(
            "speech",
            "chunk_delay_ms",
            DEFAULT_CHUNK_DELAY.as_millis() as i64,
        );
        u64::try_from(ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CHUNK_DELAY)
    }

    /// Speech rate multiplier, 1.0 is normal
    pub fn rate(&self) -> f32 {
        let rate = self.get_float("speech", "rate", 1.0);
        if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        }
    }

    /// Speech volume (0-100)
    pub fn volume(&self) -> Option<u8> {
        self.get_int("speech", "volume", -1)
            .try_into()
            .ok()
            .filter(|&v| v <= 100)
    }

    /// Voice index for the speech backend
    pub fn voice_idx(&self) -> Option<usize> {
        self.get_int("speech", "voice_idx", -1).try_into().ok()
    }

    /// Sequencer parameters assembled from the [speech] section
    pub fn sequencer_options(&self) -> SequencerOptions {
        SequencerOptions {
            chunk_size: self.chunk_size(),
            chunk_delay: self.chunk_delay(),
            rate: self.rate(),
            voice: self.voice_idx(),
        }
    }

    /// Where the bookmark is kept
    ///
    /// None when neither a configured path nor a home directory exists.
    pub fn bookmark_path(&self) -> Option<PathBuf> {
        match self.ini.get_from(Some("reader"), "bookmark_file") {
            Some(path) if !path.trim().is_empty() => Some(PathBuf::from(path.trim())),
            _ => JsonBookmarkStore::default_path(),
        }
    }

    /// Library catalog file
    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(self.get_string("library", "catalog", "catalog.json"))
    }

    /// Default sort order for the library listing
    pub fn default_sort(&self) -> SortKey {
        self.get_string("library", "sort", "title")
            .parse()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::in_memory();
        assert_eq!(config.chunk_size(), 40);
        assert_eq!(config.chunk_delay(), Duration::from_millis(30));
        assert_eq!(config.rate(), 1.0);
        assert_eq!(config.volume(), None);
        assert_eq!(config.voice_idx(), None);
        assert_eq!(config.backend(), Backend::Auto);
        assert_eq!(config.default_sort(), SortKey::Title);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let mut config = Config::in_memory();
        config.set("speech", "chunk_size", "0");
        config.set("speech", "chunk_delay_ms", "-5");
        config.set("speech", "rate", "fast");
        config.set("speech", "volume", "300");
        config.set("speech", "backend", "festival");

        assert_eq!(config.chunk_size(), 40);
        assert_eq!(config.chunk_delay(), Duration::from_millis(30));
        assert_eq!(config.rate(), 1.0);
        assert_eq!(config.volume(), None);
        assert_eq!(config.backend(), Backend::Auto);
    }

    #[test]
    fn test_sequencer_options() {
        let mut config = Config::in_memory();
        config.set("speech", "chunk_size", "25");
        config.set("speech", "rate", "1.25");
        config.set("speech", "voice_idx", "2");

        let options = config.sequencer_options();
        assert_eq!(options.chunk_size, 25);
        assert_eq!(options.rate, 1.25);
        assert_eq!(options.voice, Some(2));
    }

    #[test]
    fn test_bookmark_path_override() {
        let mut config = Config::in_memory();
        config.set("reader", "bookmark_file", "/tmp/bm.json");
        assert_eq!(config.bookmark_path(), Some(PathBuf::from("/tmp/bm.json")));
    }
}
