//! Diagnostic commands.

use clap::Args;
use console::{style, Emoji};
use oubliette_core::config::{Config, HardwareBackend, StoreBackend};
use oubliette_core::paths;
use oubliette_keystore::{ItemDescriptor, Keystore, SecureHardware, SoftwareHardware};

static CHECK: Emoji = Emoji("✓", "+");
static CROSS: Emoji = Emoji("✗", "x");
static WARN: Emoji = Emoji("⚠", "!");

/// Service used by the round-trip probe.
const PROBE_SERVICE: &str = "oubliette-doctor";

/// Doctor command arguments.
#[derive(Args)]
pub struct DoctorArgs {
    /// Also run a hardware-protected add/read/delete round trip
    #[arg(long)]
    pub full: bool,
}

/// Run the doctor command.
pub async fn run(args: DoctorArgs, config: &Config) -> anyhow::Result<()> {
    println!("Oubliette Doctor\n");

    let mut errors = 0;
    let mut warnings = 0;

    // Check directories
    println!("Checking directories...");

    match paths::base_dir() {
        Ok(dir) => {
            if dir.exists() {
                println!("  {} Base directory exists: {:?}", style(CHECK).green(), dir);
            } else {
                println!("  {} Base directory missing: {:?}", style(WARN).yellow(), dir);
                println!("    Run 'oubliette config init' to create it");
                warnings += 1;
            }
        }
        Err(e) => {
            println!("  {} Failed to determine base directory: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check config
    println!("\nChecking configuration...");

    match config.validate() {
        Ok(_) => println!("  {} Configuration valid", style(CHECK).green()),
        Err(e) => {
            println!("  {} Configuration invalid: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check backends
    println!("\nChecking backends...");

    match config.store.backend {
        StoreBackend::Memory => {
            println!(
                "  {} Memory store selected; items are lost on exit",
                style(WARN).yellow()
            );
            warnings += 1;
        }
        backend => println!("  {} Store backend: {:?}", style(CHECK).green(), backend),
    }

    match config.hardware.backend {
        HardwareBackend::Memory => {
            println!(
                "  {} Memory key facility selected; hardware-protected items become unreadable on exit",
                style(WARN).yellow()
            );
            warnings += 1;
        }
        HardwareBackend::Software => {
            let dir = match &config.hardware.key_dir {
                Some(dir) => Ok(dir.clone()),
                None => paths::keys_dir(),
            };
            match dir.map(SoftwareHardware::open) {
                Ok(Ok(facility)) => {
                    println!("  {} Software key facility opened", style(CHECK).green());
                    if !facility.is_hardware_backed() {
                        println!(
                            "  {} Keys are software-emulated, not hardware-resident",
                            style(WARN).yellow()
                        );
                        warnings += 1;
                    }
                }
                Ok(Err(e)) => {
                    println!("  {} Key facility error: {}", style(CROSS).red(), e);
                    errors += 1;
                }
                Err(e) => {
                    println!("  {} Failed to determine key directory: {}", style(CROSS).red(), e);
                    errors += 1;
                }
            }
        }
    }

    if args.full {
        println!("\nRunning round trip...");
        match round_trip(config).await {
            Ok(()) => println!("  {} Add, read, exists and delete succeeded", style(CHECK).green()),
            Err(e) => {
                println!("  {} Round trip failed: {}", style(CROSS).red(), e);
                errors += 1;
            }
        }
    }

    // Summary
    println!();
    if errors == 0 && warnings == 0 {
        println!("{} All checks passed!", style(CHECK).green());
    } else if errors == 0 {
        println!("{} {} warning(s)", style(WARN).yellow(), warnings);
    } else {
        println!(
            "{} {} error(s), {} warning(s)",
            style(CROSS).red(),
            errors,
            warnings
        );
        anyhow::bail!("Doctor found {} error(s)", errors);
    }

    Ok(())
}

/// Store, read back, and remove a throwaway hardware-protected item.
async fn round_trip(config: &Config) -> anyhow::Result<()> {
    let keystore = Keystore::from_config(config)?;
    let probe = ItemDescriptor::new("probe")?
        .with_service(PROBE_SERVICE)
        .with_hardware_protection(true);

    keystore.add(probe.clone(), "doctor".into()).await?;
    let value = keystore.read(probe.clone()).await?;
    let exists = keystore.exists(probe.clone()).await?;
    keystore.delete(probe).await?;
    keystore.shutdown();

    match value {
        Some(v) if v.expose_secret() == b"doctor" && exists => Ok(()),
        Some(_) => anyhow::bail!("read back a different value"),
        None => anyhow::bail!("probe item vanished before it was read"),
    }
}
