//! Item commands: `oubliette add|read|delete|exists`.

use anyhow::Context;
use base64::Engine as _;
use clap::Args;
use oubliette_core::{Accessibility, Config, SecretBytes};
use oubliette_keystore::{ItemDescriptor, Keystore, KeystoreError};

/// Arguments naming one item.
#[derive(Args, Debug, Clone)]
pub struct ItemArgs {
    /// Item alias
    pub alias: String,

    /// Service namespace (omit for the default namespace)
    #[arg(short, long)]
    pub service: Option<String>,
}

impl ItemArgs {
    fn descriptor(&self) -> anyhow::Result<ItemDescriptor> {
        let mut descriptor = ItemDescriptor::new(self.alias.clone()).map_err(engine_error)?;
        if let Some(service) = &self.service {
            descriptor = descriptor.with_service(service.clone());
        }
        Ok(descriptor)
    }
}

/// `oubliette add` arguments.
#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    pub item: ItemArgs,

    /// Encrypt under a hardware-resident key before storing
    #[arg(long)]
    pub hardware: bool,

    /// Release policy for a new item (ignored when updating)
    #[arg(long)]
    pub accessibility: Option<Accessibility>,

    /// Request the stronger data-protection container where supported
    #[arg(long)]
    pub data_protection: bool,

    /// Secret value (if omitted, prompts for hidden input)
    #[arg(long)]
    pub value: Option<String>,

    /// Treat the value as base64-encoded bytes
    #[arg(long)]
    pub base64: bool,
}

/// `oubliette read` arguments.
#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub item: ItemArgs,

    /// The item was stored with hardware protection
    #[arg(long)]
    pub hardware: bool,

    /// Text for the platform authentication prompt
    #[arg(long)]
    pub prompt: Option<String>,

    /// Print the value base64-encoded
    #[arg(long)]
    pub base64: bool,
}

fn engine_error(err: KeystoreError) -> anyhow::Error {
    anyhow::anyhow!("{err} [{}]", err.code())
}

fn open(config: &Config) -> anyhow::Result<Keystore> {
    Keystore::from_config(config)
        .map_err(engine_error)
        .context("Failed to open keystore")
}

/// Run `oubliette add`.
pub async fn add(args: AddArgs, config: &Config) -> anyhow::Result<()> {
    let descriptor = args
        .item
        .descriptor()?
        .with_hardware_protection(args.hardware)
        .with_data_protection(args.data_protection)
        .with_accessibility(
            args.accessibility
                .unwrap_or(config.keystore.default_accessibility),
        );

    let raw = match args.value {
        Some(v) => v,
        None => {
            let prompt = format!("Enter value for '{}': ", args.item.alias);
            rpassword::prompt_password(prompt)
                .map_err(|e| anyhow::anyhow!("Failed to read secret: {}", e))?
        }
    };
    let value = if args.base64 {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .context("Value is not valid base64")?;
        SecretBytes::new(decoded)
    } else {
        SecretBytes::from(raw.as_str())
    };
    drop(SecretBytes::new(raw));

    if value.is_empty() {
        anyhow::bail!("Secret value must not be empty");
    }

    let keystore = open(config)?;
    keystore.add(descriptor, value).await.map_err(engine_error)?;
    keystore.shutdown();

    println!("Secret '{}' stored.", args.item.alias);
    Ok(())
}

/// Run `oubliette read`.
pub async fn read(args: ReadArgs, config: &Config) -> anyhow::Result<()> {
    let mut descriptor = args
        .item
        .descriptor()?
        .with_hardware_protection(args.hardware);
    if let Some(prompt) = args.prompt {
        descriptor = descriptor.with_auth_prompt(prompt);
    }

    let keystore = open(config)?;
    let value = keystore.read(descriptor).await.map_err(engine_error)?;
    keystore.shutdown();

    let Some(value) = value else {
        anyhow::bail!("No secret stored under '{}'", args.item.alias);
    };
    if args.base64 {
        println!(
            "{}",
            base64::engine::general_purpose::STANDARD.encode(value.expose_secret())
        );
    } else {
        let text = std::str::from_utf8(value.expose_secret())
            .context("Value is not UTF-8 text; use --base64")?;
        println!("{text}");
    }
    Ok(())
}

/// Run `oubliette delete`.
pub async fn delete(args: ItemArgs, config: &Config) -> anyhow::Result<()> {
    let keystore = open(config)?;
    keystore
        .delete(args.descriptor()?)
        .await
        .map_err(engine_error)?;
    keystore.shutdown();

    println!("Secret '{}' deleted.", args.alias);
    Ok(())
}

/// Run `oubliette exists`.
pub async fn exists(args: ItemArgs, config: &Config) -> anyhow::Result<()> {
    let keystore = open(config)?;
    let found = keystore
        .exists(args.descriptor()?)
        .await
        .map_err(engine_error)?;
    keystore.shutdown();

    println!("{found}");
    Ok(())
}
