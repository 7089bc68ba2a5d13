//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::data::encoding::TextEncoding;
use crate::data::filter::DEFAULT_RANK_RADIUS;
use crate::data::loader::LoadOptions;

/// How repeated values for one filter field are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FilterMode {
    /// At most one value per field (equality)
    Single,
    /// Any number of values per field (membership)
    #[default]
    Multi,
}

/// Cutoff finder server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "cutoff-finder", version, about)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "CUTOFF_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Cutoff table to serve (.csv, .tsv, .json or .parquet)
    #[arg(
        long,
        env = "CUTOFF_DATA_PATH",
        default_value = "Structured_MHTCET_Cutoffs_with_validation.csv"
    )]
    pub data_path: PathBuf,

    /// Character encoding of delimited data files
    #[arg(long, env = "CUTOFF_ENCODING", default_value = "latin1", value_enum)]
    pub encoding: TextEncoding,

    /// Field delimiter of delimited data files
    #[arg(long, env = "CUTOFF_DELIMITER", default_value = ",")]
    pub delimiter: char,

    /// Half-width of the rank window when a request does not give one
    #[arg(long, env = "CUTOFF_RANK_RADIUS", default_value_t = DEFAULT_RANK_RADIUS)]
    pub rank_radius: i64,

    /// Whether a filter field accepts one value or many
    #[arg(long, env = "CUTOFF_FILTER_MODE", default_value = "multi", value_enum)]
    pub filter_mode: FilterMode,

    /// Page size used when a page is requested without a size
    #[arg(long, env = "CUTOFF_PAGE_SIZE", default_value = "50")]
    pub default_page_size: usize,

    /// Exit at startup if the dataset cannot be loaded, instead of serving degraded
    #[arg(long, env = "CUTOFF_REQUIRE_DATA")]
    pub require_data: bool,

    /// Enable permissive CORS
    #[arg(long, env = "CUTOFF_CORS_ENABLED", default_value = "true", action = ArgAction::Set)]
    pub cors_enabled: bool,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, env = "CUTOFF_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            data_path: PathBuf::from("Structured_MHTCET_Cutoffs_with_validation.csv"),
            encoding: TextEncoding::Latin1,
            delimiter: ',',
            rank_radius: DEFAULT_RANK_RADIUS,
            filter_mode: FilterMode::Multi,
            default_page_size: 50,
            require_data: false,
            cors_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Loader options derived from the encoding and delimiter flags.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            encoding: self.encoding,
            delimiter: u8::try_from(self.delimiter).unwrap_or(b','),
        }
    }

    /// Validate configuration at startup
    pub fn validate(&self) -> Result<(), String> {
        if !self.delimiter.is_ascii() {
            return Err(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ));
        }
        if self.rank_radius < 0 {
            return Err(format!("rank radius cannot be negative ({})", self.rank_radius));
        }
        if self.default_page_size == 0 {
            return Err("default page size must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let config = Config::try_parse_from([
            "cutoff-finder",
            "--data-path",
            "cutoffs.parquet",
            "--encoding",
            "utf-8",
            "--filter-mode",
            "single",
            "--cors-enabled",
            "false",
            "--rank-radius",
            "250",
        ])
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("cutoffs.parquet"));
        assert_eq!(config.encoding, TextEncoding::Utf8);
        assert_eq!(config.filter_mode, FilterMode::Single);
        assert!(!config.cors_enabled);
        assert_eq!(config.rank_radius, 250);
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        let config = Config {
            delimiter: '¦',
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn tab_delimiter_reaches_loader() {
        let config = Config {
            delimiter: '\t',
            ..Config::default()
        };
        assert_eq!(config.load_options().delimiter, b'\t');
    }
}
