//! CLI configuration: wallet settings from an optional file plus `ZINC_*`
//! environment variables, and default locations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use zinc_core::address::Network;
use zinc_wallet::WalletConfig;

/// Prefix of environment overrides, e.g. `ZINC_NETWORK=testnet` or
/// `ZINC_FEES__DEFAULT_FEE_RATE_PER_KB=5000`.
pub const ENV_PREFIX: &str = "ZINC";

/// Default config file: `<config dir>/zinc/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("zinc").join("config.toml"))
}

/// Default wallet file: `<data dir>/zinc/<network>/wallet.dat`.
pub fn default_wallet_path(network: Network) -> Result<PathBuf> {
    let data = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data.join("zinc").join(network.name()).join("wallet.dat"))
}

/// Load the wallet config. A missing file is not an error; an explicitly
/// named one must exist.
pub fn load_wallet_config(path: Option<&Path>, network: Option<Network>) -> Result<WalletConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => builder = builder.add_source(File::from(p).required(true)),
        None => {
            if let Some(p) = default_config_path() {
                builder = builder.add_source(File::from(p).required(false));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: WalletConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    if let Some(network) = network {
        cfg.network = network;
    }
    cfg.validate().context("Invalid configuration")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zinc.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "network = \"testnet\"\nreceive_gap_limit = 30\n\n[fees]\ndust_threshold = 1000").unwrap();

        let cfg = load_wallet_config(Some(&path), None).unwrap();
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.receive_gap_limit, 30);
        assert_eq!(cfg.fees.dust_threshold, 1000);
        assert_eq!(cfg.change_gap_limit, 10);
    }

    #[test]
    fn network_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zinc.toml");
        std::fs::write(&path, "network = \"testnet\"\n").unwrap();
        let cfg = load_wallet_config(Some(&path), Some(Network::Mainnet)).unwrap();
        assert_eq!(cfg.network, Network::Mainnet);
    }

    #[test]
    fn invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zinc.toml");
        std::fs::write(&path, "receive_gap_limit = 0\n").unwrap();
        assert!(load_wallet_config(Some(&path), None).is_err());
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_wallet_config(Some(&dir.path().join("missing.toml")), None).is_err());
    }

    #[test]
    fn wallet_path_is_per_network() {
        if let Ok(p) = default_wallet_path(Network::Testnet) {
            assert!(p.ends_with("zinc/testnet/wallet.dat"));
        }
    }
}
