use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exec::PipelineSettings;
use crate::terminal::Color;

/// Defaults compiled into the binary.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Effective configuration ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub history_length: usize,
    #[serde(default)]
    pub show_session_id: bool,
    /// Empty means history is not persisted.
    #[serde(default)]
    pub history_file: String,
    #[serde(default)]
    pub start_info: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub link_capacity: usize,
    #[serde(default)]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub null_device: String,
    #[serde(default)]
    pub error_color: Color,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct CommandsConfig {
    #[serde(default)]
    pub group_prefix: String,
    /// Built-in command names the host skips when registering.
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default)]
    pub level: String,
    /// Log file; `~` is expanded. Empty disables logging.
    #[serde(default)]
    pub file: String,
}

impl LoggingConfig {
    /// Parsed level; anything unrecognised falls back to `info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            link_capacity: config.link_capacity.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            error_color: config.error_color,
        }
    }
}

// ── User overlay: every field optional, lists merge ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    session: SessionOverlay,
    #[serde(default)]
    pipeline: PipelineOverlay,
    #[serde(default)]
    commands: CommandsOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SessionOverlay {
    prompt: Option<String>,
    history_length: Option<usize>,
    show_session_id: Option<bool>,
    history_file: Option<String>,
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    start_info: Vec<String>,
    #[serde(default)]
    remove_start_info: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineOverlay {
    link_capacity: Option<usize>,
    poll_interval_ms: Option<u64>,
    null_device: Option<String>,
    error_color: Option<Color>,
}

#[derive(Debug, Deserialize, Default)]
struct CommandsOverlay {
    group_prefix: Option<String>,
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    disabled: Vec<String>,
    #[serde(default)]
    remove_disabled: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    level: Option<String>,
    file: Option<String>,
}

// ── Merging ──

/// Fold a user list into `base`: with `replace` the user list wins outright,
/// otherwise `remove` entries are dropped and new `add` entries appended once.
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl Config {
    /// The compiled-in defaults alone.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Defaults with `~/.config/pipeshell/config.toml` merged on top, when
    /// that file exists. Scalars in the user file override; lists extend
    /// unless the section sets `replace = true`; `remove_<field>` drops
    /// default entries. A file that fails to parse is reported and ignored.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/pipeshell/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("pipeshell: config parse error: {e}");
                None
            }
        }
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        // Session
        let s = overlay.session;
        set(&mut self.session.prompt, s.prompt);
        set(&mut self.session.history_length, s.history_length);
        set(&mut self.session.show_session_id, s.show_session_id);
        set(&mut self.session.history_file, s.history_file);
        merge_list(
            &mut self.session.start_info,
            s.start_info,
            &s.remove_start_info,
            s.replace,
        );

        // Pipeline: scalar overrides
        let p = overlay.pipeline;
        set(&mut self.pipeline.link_capacity, p.link_capacity);
        set(&mut self.pipeline.poll_interval_ms, p.poll_interval_ms);
        set(&mut self.pipeline.null_device, p.null_device);
        set(&mut self.pipeline.error_color, p.error_color);

        // Commands
        let c = overlay.commands;
        set(&mut self.commands.group_prefix, c.group_prefix);
        merge_list(
            &mut self.commands.disabled,
            c.disabled,
            &c.remove_disabled,
            c.replace,
        );

        // Logging
        let l = overlay.logging;
        set(&mut self.logging.level, l.level);
        set(&mut self.logging.file, l.file);
    }

    /// Render the merged configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Whether a built-in command should be left out.
    pub fn is_disabled(&self, command: &str) -> bool {
        self.commands
            .disabled
            .iter()
            .any(|d| d.eq_ignore_ascii_case(command))
    }

    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::default_config();
        assert_eq!(config.session.prompt, "> ");
        assert_eq!(config.session.history_length, 20);
        assert!(config.session.show_session_id);
        assert!(config.session.history_file.is_empty());
        assert!(config.session.start_info.is_empty());
        assert_eq!(config.pipeline.link_capacity, 10240);
        assert_eq!(config.pipeline.null_device, "null");
        assert_eq!(config.pipeline.error_color, Color::Red);
        assert_eq!(config.commands.group_prefix, "sys");
        assert!(config.commands.disabled.is_empty());
    }

    #[test]
    fn default_logging() {
        let config = Config::default_config();
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
        assert!(config.logging.file.ends_with("pipeshell.log"));
    }

    #[test]
    fn pipeline_settings_from_config() {
        let config = Config::default_config();
        let settings = PipelineSettings::from(&config.pipeline);
        assert_eq!(settings.link_capacity, 10240);
        assert_eq!(settings.poll_interval, Duration::from_millis(20));
    }

    // ── Overlays ──

    #[test]
    fn overlay_scalars_override() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [session]
            prompt = "$ "
            history_length = 5

            [pipeline]
            error_color = "yellow"
        "#,
        );
        assert_eq!(config.session.prompt, "$ ");
        assert_eq!(config.session.history_length, 5);
        assert_eq!(config.pipeline.error_color, Color::Yellow);
        // untouched scalars keep their defaults
        assert!(config.session.show_session_id);
        assert_eq!(config.pipeline.link_capacity, 10240);
    }

    #[test]
    fn overlay_extends_disabled_list() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [commands]
            disabled = ["throw", "sleep"]
        "#,
        );
        assert!(config.is_disabled("THROW"));
        assert!(config.is_disabled("sleep"));
        assert!(!config.is_disabled("echo"));
    }

    #[test]
    fn overlay_remove_and_add() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [session]
            start_info = ["Welcome.", "Type help."]
        "#,
        );
        config.apply_overlay_str(
            r#"
            [session]
            remove_start_info = ["Welcome."]
            start_info = ["Bye."]
        "#,
        );
        assert_eq!(config.session.start_info, vec!["Type help.", "Bye."]);
    }

    #[test]
    fn overlay_replace_list() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [commands]
            disabled = ["cls"]
        "#,
        );
        config.apply_overlay_str(
            r#"
            [commands]
            replace = true
            disabled = ["exit"]
        "#,
        );
        assert_eq!(config.commands.disabled, vec!["exit"]);
    }

    #[test]
    fn overlay_no_duplicates() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [commands]
            disabled = ["cls", "cls"]
        "#,
        );
        assert_eq!(config.commands.disabled, vec!["cls"]);
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let mut config = Config::default_config();
        config.apply_overlay_str("");
        assert_eq!(config.session.prompt, "> ");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn bad_level_falls_back_to_info() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [logging]
            level = "chatty"
        "#,
        );
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn dump_round_trips() {
        let config = Config::default_config();
        let text = config.to_toml().unwrap();
        let reparsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(reparsed.session.prompt, config.session.prompt);
        assert_eq!(reparsed.pipeline.error_color, config.pipeline.error_color);
    }
}
