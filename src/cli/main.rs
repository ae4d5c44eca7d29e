//! `fla` - command line front end for the license activation client.
//!
//! Builds configuration, logging, the option store and one shared
//! [`LicenseManager`], then runs a single subcommand:
//!
//! - `fla activate <KEY> [--base64]`
//! - `fla deactivate`
//! - `fla sync`
//! - `fla status`
//! - `fla check-update [--force]`
//! - `fla plugin-info`
//! - `fla upgrade-complete`
//! - `fla reset`

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use fla::config::FlaConfig;
use fla::license::mask_license_key;
use fla::logging::init_logging;
use fla::site::SiteIdentity;
use fla::{store, LicenseError, LicenseManager, LicenseResult, UpdateChecker};

/// fla - plugin license activation client
#[derive(Parser, Debug)]
#[command(name = "fla")]
#[command(about = "Activate plugin licenses and check for signed updates", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// activate a license key for this site
    Activate {
        /// the license key
        key: String,
        /// the key is base64 encoded
        #[arg(long)]
        base64: bool,
    },

    /// release this site's install
    Deactivate,

    /// deactivate and activate again with the stored key
    Sync,

    /// show the activation state
    Status,

    /// look for a newer compatible release
    CheckUpdate {
        /// ignore cached update data
        #[arg(long)]
        force: bool,
    },

    /// print plugin details for the latest release
    PluginInfo,

    /// drop cached update data after a plugin update
    UpgradeComplete,

    /// remove all stored license data
    Reset,
}

fn decode_key(key: &str, base64: bool) -> LicenseResult<String> {
    if !base64 {
        return Ok(key.trim().to_string());
    }
    let bytes = B64
        .decode(key.trim())
        .map_err(|e| LicenseError::InvalidArgument(format!("license key is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map(|k| k.trim().to_string())
        .map_err(|e| LicenseError::InvalidArgument(format!("license key is not utf-8: {e}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> LicenseResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, config: FlaConfig) -> LicenseResult<bool> {
    let site = SiteIdentity::from_config(&config.site)?;
    let store = store::from_config(&config.storage, &site)?;
    let manager = Arc::new(LicenseManager::new(&config, store)?);
    let updates = UpdateChecker::new(manager.clone(), &config);

    match command {
        Command::Activate { key, base64 } => {
            let key = decode_key(&key, base64)?;
            if key.is_empty() {
                eprintln!("No license key given.");
                return Ok(false);
            }
            let activated = manager.activate(&key).await?;
            if activated {
                println!("License activated.");
            } else {
                println!("The licensing service did not create an install.");
            }
            Ok(activated)
        }
        Command::Deactivate => {
            let deactivated = manager.deactivate().await?;
            if deactivated {
                println!("License deactivated.");
            } else {
                println!("Nothing to deactivate for this site.");
            }
            Ok(deactivated)
        }
        Command::Sync => {
            let synced = manager.sync().await?;
            if synced {
                println!("License synced.");
            } else {
                println!("No activated license to sync.");
            }
            Ok(synced)
        }
        Command::Status => {
            let activated = manager.is_activated().await;
            println!("site:      {}", site.url());
            println!("uid:       {}", site.uid());
            println!("activated: {}", activated);
            println!("key:       {}", mask_license_key(&manager.get_license_key().await));
            println!("plan:      {}", manager.get_plan_name().await);
            if let Some(record) = manager.record().await? {
                println!("install:   {}", record.install_id);
                println!("since:     {}", record.created_at.to_rfc3339());
            }
            Ok(true)
        }
        Command::CheckUpdate { force } => {
            if force {
                updates.get_update_data(true).await?;
            }
            match updates.check_for_update().await {
                Some(offer) => {
                    print_json(&offer)?;
                    Ok(true)
                }
                None => {
                    println!("No update available.");
                    Ok(false)
                }
            }
        }
        Command::PluginInfo => {
            match updates
                .plugin_information("plugin_information", &config.plugin.slug)
                .await
            {
                Some(info) => {
                    print_json(&info)?;
                    Ok(true)
                }
                None => {
                    println!("No plugin information available.");
                    Ok(false)
                }
            }
        }
        Command::UpgradeComplete => updates.on_upgrade_complete("update", "plugin").await,
        Command::Reset => {
            manager.delete_all_data().await?;
            updates.on_upgrade_complete("update", "plugin").await?;
            println!("Stored license data removed.");
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match FlaConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config.logging);

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
