//! Configuration handling for bgp-resume.
//!
//! Values come from the shared YAML config file, then environment variables,
//! and finally command-line flags (applied by the caller).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// bgp-resume configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// ASN used as the community tag
    pub asn: Option<u32>,
    /// Prefix to announce, e.g. `2001:db8::/48`
    pub prefix: Option<String>,
    /// Next hop for the announced prefix
    pub next_hop: Option<String>,
    /// Path to the resume file
    pub resume: Option<PathBuf>,
    /// Allow UPDATE messages up to 65535 bytes (RFC 8654)
    pub extended_messages: bool,
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    resume: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    asn: Option<u32>,
    prefix: Option<String>,
    next_hop: Option<String>,
    resume: Option<PathBuf>,
    extended_messages: Option<bool>,
}

impl ResumeConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            ),
        }

        config.apply_environment_overrides();

        info!(
            "Final configuration: asn={:?}, prefix={:?}, next_hop={:?}, resume={:?}, extended_messages={}",
            config.asn, config.prefix, config.next_hop, config.resume, config.extended_messages
        );

        Ok(config)
    }

    /// Apply configuration from the root config structure
    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(service) = root_config.services.and_then(|s| s.resume) else {
            return;
        };

        if service.asn.is_some() {
            self.asn = service.asn;
        }
        if service.prefix.is_some() {
            self.prefix = service.prefix;
        }
        if service.next_hop.is_some() {
            self.next_hop = service.next_hop;
        }
        if service.resume.is_some() {
            self.resume = service.resume;
        }
        if let Some(extended) = service.extended_messages {
            self.extended_messages = extended;
        }
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(asn) = lookup("BGP_RESUME_ASN") {
            match asn.parse::<u32>() {
                Ok(asn) => {
                    self.asn = Some(asn);
                    info!("ASN overridden by environment: {}", asn);
                }
                Err(_) => warn!("Ignoring BGP_RESUME_ASN={:?}: not a 32-bit ASN", asn),
            }
        }

        if let Some(prefix) = lookup("BGP_RESUME_PREFIX") {
            info!("Prefix overridden by environment: {}", prefix);
            self.prefix = Some(prefix);
        }

        if let Some(next_hop) = lookup("BGP_RESUME_NEXT_HOP") {
            info!("Next hop overridden by environment: {}", next_hop);
            self.next_hop = Some(next_hop);
        }

        if let Some(resume) = lookup("BGP_RESUME_FILE") {
            info!("Resume file overridden by environment: {}", resume);
            self.resume = Some(PathBuf::from(resume));
        }
    }
}
