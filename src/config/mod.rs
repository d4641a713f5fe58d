//! Server configuration: listening port, static file directory and the
//! table of commands that may be triggered over HTTP.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.xml";
pub const DEFAULT_PORT: u16 = 7070;
// Kept verbatim; existing deployments rely on this exact string.
pub const DEFAULT_PREFIX: &str = "nohump ";
pub const DEFAULT_SUFFIX: &str = " &";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration XML: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

/// A named shell invocation exposed over HTTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: String,
    pub run: String,
    pub allow_args: bool,
}

impl Command {
    pub fn new(id: impl Into<String>, run: impl Into<String>, allow_args: bool) -> Self {
        Self {
            id: id.into(),
            run: run.into(),
            allow_args,
        }
    }
}

/// Configured commands plus the prefix/suffix wrapped around every invocation.
///
/// Built once at startup and only read afterwards, so it can be shared
/// between request handlers without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    prefix: String,
    suffix: String,
    commands: HashMap<String, Command>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            commands: HashMap::new(),
        }
    }
}

impl CommandTable {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            commands: HashMap::new(),
        }
    }

    /// Add a command; an existing command with the same id is replaced.
    pub fn insert(&mut self, command: Command) {
        self.commands.insert(command.id.clone(), command);
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.insert(command);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Command> {
        self.commands.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.commands.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Build the full shell line: `prefix + run + (" " + arg)* + suffix`.
    /// Arguments are dropped unless the command allows them.
    pub fn invocation<S: AsRef<str>>(&self, command: &Command, args: &[S]) -> String {
        let mut line =
            String::with_capacity(self.prefix.len() + command.run.len() + self.suffix.len());
        line.push_str(&self.prefix);
        line.push_str(&command.run);
        if command.allow_args {
            for arg in args {
                line.push(' ');
                line.push_str(arg.as_ref());
            }
        }
        line.push_str(&self.suffix);
        line
    }
}

/// Everything the command server needs to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Static file directory, relative to the working directory. Empty means
    /// the working directory itself.
    pub base_dir: String,
    pub table: CommandTable,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_dir: String::new(),
            table: CommandTable::default(),
        }
    }
}

/// Raw document shape; every field optional so validation can report
/// problems individually instead of rejecting the whole file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    port: Option<String>,
    dir: Option<String>,
    commands: Option<RawCommands>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCommands {
    #[serde(rename = "@prefix")]
    prefix: Option<String>,
    #[serde(rename = "@suffix")]
    suffix: Option<String>,
    #[serde(rename = "command", default)]
    entries: Vec<RawCommand>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCommand {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@run")]
    run: Option<String>,
    #[serde(rename = "@args")]
    args: Option<String>,
}

impl ServerConfig {
    /// Load configuration from an XML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&xml)
    }

    /// Load configuration, falling back to defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("{}", e);
                log::info!("Failed to load configuration, using default");
                Self::default()
            }
        }
    }

    /// Parse configuration from an XML document.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = quick_xml::de::from_str(xml)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConfig) -> Self {
        let mut config = Self::default();

        if let Some(port) = raw.port {
            match port.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(e) => log::warn!(
                    "Invalid port '{}' ({}), using default {}",
                    port, e, DEFAULT_PORT
                ),
            }
        }

        if let Some(dir) = raw.dir {
            config.base_dir = dir.trim().to_string();
        }

        if let Some(commands) = raw.commands {
            let mut table = CommandTable::new(
                commands.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
                commands.suffix.unwrap_or_else(|| DEFAULT_SUFFIX.to_string()),
            );

            for (index, entry) in commands.entries.into_iter().enumerate() {
                let (id, run) = match (entry.id, entry.run) {
                    (Some(id), Some(run)) => (id, run),
                    _ => {
                        log::warn!("Command #{} is missing 'id' or 'run', skipping", index + 1);
                        continue;
                    }
                };
                let allow_args = parse_allow_args(&id, entry.args.as_deref());
                if table.contains(&id) {
                    log::warn!("Command '{}' defined more than once, keeping the last one", id);
                }
                table.insert(Command::new(id, run, allow_args));
            }

            config.table = table;
        }

        log::debug!(
            "Configuration loaded: port={}, dir={:?}, {} command(s)",
            config.port,
            config.base_dir,
            config.table.len()
        );

        config
    }
}

fn parse_allow_args(id: &str, value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => false,
        Some(v) if v.eq_ignore_ascii_case("true") => true,
        Some(v) if v.eq_ignore_ascii_case("false") => false,
        Some(v) => {
            log::warn!("Command '{}' has unrecognized args value '{}', arguments disabled", id, v);
            false
        }
    }
}
