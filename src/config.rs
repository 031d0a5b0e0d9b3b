use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pixboard", about = "Share photos, discuss them, like what you see")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub scraper: ScraperConfig,
    pub tags: Vec<TagSeed>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: u32,
    pub post_body_max_len: usize,
    pub comment_max_len: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    /// Only `<meta content="...">` values starting with this prefix count as the photo.
    pub image_prefix: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// A tag declared in the config file, upserted by slug at startup.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TagSeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "pixboard_session".to_string(),
            session_hours: 720,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 3,
            post_body_max_len: 2000,
            comment_max_len: 150,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            image_prefix: "https://live.staticflickr.com/".to_string(),
            timeout_secs: 10,
            user_agent: concat!("pixboard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("pixboard.db"));
        }
        if config.feed.page_size == 0 {
            anyhow::bail!("feed.page_size must be at least 1");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pixboard")
        })
    }

    /// Resolved database path; `load` always fills it in.
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("pixboard.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(data_dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(data_dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "pixboard_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.feed.page_size, 3);
        assert_eq!(config.feed.comment_max_len, 150);
        assert_eq!(config.scraper.image_prefix, "https://live.staticflickr.com/");
        assert!(config.database.path.is_none());
        assert!(config.tags.is_empty());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(std::path::Path::new("/tmp/test-pixboard"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-pixboard"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_pixboard() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".pixboard"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("pixboard.db"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            ..cli_for(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_reads_toml_file_with_tags() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[feed]
page_size = 5

[[tags]]
name = "Landscape"
slug = "landscape"
order = 2

[[tags]]
name = "Street"
slug = "street"
icon = "icons/street.svg"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_for(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.feed.page_size, 5);
        // untouched keys in a partially-specified section keep their defaults
        assert_eq!(config.feed.comment_max_len, 150);
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[0].order, Some(2));
        assert_eq!(config.tags[1].icon.as_deref(), Some("icons/street.svg"));
        assert_eq!(config.tags[1].order, None);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[feed]\npage_size = 0\n").unwrap();
        let cli = Cli {
            config: Some(config_path),
            ..cli_for(tmp.path())
        };
        assert!(Config::load(&cli).is_err());
    }
}
