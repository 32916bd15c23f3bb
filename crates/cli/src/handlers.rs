//! Command handlers for r2kit CLI

use crate::Credentials;
use anyhow::{anyhow, Context as _, Result};
use futures::{Stream, StreamExt};
use r2kit_core::{
    get_config_path, load_config, load_config_from, save_config_to, ClientFactory, ConfigFile,
    LoggingConfig, ObjectStore, PresignedMethod, R2Options, SharedClient,
};
use std::path::Path;
use tabled::{Table, Tabled};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

/// Logical client name used for every CLI call
const CLIENT_NAME: &str = "cli";

/// Load the configuration file and apply command-line overrides
pub fn load(path: Option<&Path>, overrides: &Credentials) -> Result<ConfigFile> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let options = &mut config.cloudflare_r2;
    if let Some(account_id) = &overrides.account_id {
        options.account_id = account_id.clone();
    }
    if let Some(api_token) = &overrides.api_token {
        options.api_token = api_token.clone();
    }
    if let Some(access_key_id) = &overrides.access_key_id {
        options.access_key_id = access_key_id.clone();
    }
    if let Some(secret_access_key) = &overrides.secret_access_key {
        options.secret_access_key = secret_access_key.clone();
    }

    Ok(config)
}

/// Handle config init: write a configuration file from flags and environment
pub fn handle_init(
    path: Option<&Path>,
    credentials: &Credentials,
    bucket: Option<&str>,
    force: bool,
) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };

    if path.exists() && !force {
        return Err(anyhow!(
            "Configuration already exists: {}\n\
             Use --force to overwrite it.",
            path.display()
        ));
    }

    let config = ConfigFile {
        cloudflare_r2: R2Options {
            account_id: credentials.account_id.clone().unwrap_or_default(),
            api_token: credentials.api_token.clone().unwrap_or_default(),
            access_key_id: credentials.access_key_id.clone().unwrap_or_default(),
            secret_access_key: credentials.secret_access_key.clone().unwrap_or_default(),
            default_bucket: bucket.map(str::to_string),
            ..R2Options::default()
        },
        logging: Some(LoggingConfig::default()),
    };

    save_config_to(&config, &path)?;
    println!("  ✅ Configuration written to {}", path.display());

    if let Err(e) = config.cloudflare_r2.validate() {
        println!("  ⚠️  {}", e);
        println!("  Edit the file or pass the missing values before running other commands.");
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: Option<&LoggingConfig>) {
    let level = logging.map(|l| l.level.as_str()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logging.map(|l| l.format.as_str()) {
        Some("compact") => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Warning: Failed to install log subscriber: {}", e);
    }
}

/// Everything a command needs: the loaded configuration and a client factory
pub struct Context {
    config: ConfigFile,
    factory: ClientFactory,
    bucket: Option<String>,
}

impl Context {
    pub fn new(config: ConfigFile, bucket: Option<String>) -> Result<Self> {
        let factory = ClientFactory::new(config.cloudflare_r2.clone())?;
        Ok(Self { config, factory, bucket })
    }

    fn client(&self) -> Result<SharedClient> {
        Ok(self.factory.get_client(CLIENT_NAME)?)
    }

    /// `--bucket`, else `default_bucket` from the configuration
    fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .or(self.config.cloudflare_r2.default_bucket.as_deref())
            .ok_or_else(|| {
                anyhow!(
                    "No bucket given.\n\
                     Pass --bucket or set 'default_bucket' in your configuration."
                )
            })
    }
}

/// Handle upload command
pub async fn handle_upload(ctx: &Context, file: &Path, key: &str, content_type: Option<&str>) -> Result<()> {
    if !file.exists() {
        return Err(anyhow!("File not found: {}", file.display()));
    }

    let bucket = ctx.bucket()?;
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // Detect content type
    let content_type = content_type
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(file).first_or_octet_stream().to_string());

    println!("Uploading {} -> {}/{}...", file.display(), bucket, key);
    println!("  Size: {}", format_bytes(body.len() as u64));
    println!("  Content type: {}", content_type);

    let url = ctx
        .client()?
        .upload_object(bucket, key, body.into(), &content_type)
        .await?;

    println!("  ✅ Upload complete");
    println!("  {}", url);

    Ok(())
}

/// Handle download command
pub async fn handle_download(ctx: &Context, key: &str, dest: &Path) -> Result<()> {
    let bucket = ctx.bucket()?;

    println!("Downloading {}/{} -> {}...", bucket, key, dest.display());

    let download = ctx.client()?.download_object(bucket, key).await?;
    let written = save_stream(download.stream, dest).await?;

    println!("  ✅ Download complete ({})", format_bytes(written));

    Ok(())
}

/// Write a body stream to `dest` through a `.part` sibling, renamed once
/// complete. A failed transfer leaves no partial file behind.
async fn save_stream<S, B>(mut stream: S, dest: &Path) -> Result<u64>
where
    S: Stream<Item = r2kit_core::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut part_name = dest.file_name().unwrap_or_default().to_os_string();
    part_name.push(".part");
    let part = dest.with_file_name(part_name);

    let mut file = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("Failed to create {}", part.display()))?;

    let copied: Result<u64> = async {
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(chunk.as_ref()).await?;
            written += chunk.as_ref().len() as u64;
        }
        file.flush().await?;
        Ok::<u64, anyhow::Error>(written)
    }
    .await;
    drop(file);

    match copied {
        Ok(written) => {
            tokio::fs::rename(&part, dest)
                .await
                .with_context(|| format!("Failed to move download to {}", dest.display()))?;
            Ok(written)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(e)
        }
    }
}

/// Handle delete command
pub async fn handle_delete(ctx: &Context, key: &str) -> Result<()> {
    let bucket = ctx.bucket()?;

    println!("Deleting {}/{}...", bucket, key);
    ctx.client()?.delete_object(bucket, key).await?;
    println!("  ✅ Object deleted");

    Ok(())
}

/// Handle ls command
pub async fn handle_ls(ctx: &Context, prefix: Option<&str>) -> Result<()> {
    let bucket = ctx.bucket()?;

    match prefix {
        Some(prefix) => println!("Listing {} (prefix: {})...", bucket, prefix),
        None => println!("Listing {}...", bucket),
    }

    let objects = ctx.client()?.list_objects(bucket, prefix).await?;

    if objects.is_empty() {
        println!("  No objects found");
    } else {
        #[derive(Tabled)]
        struct ObjectRow {
            key: String,
            size: String,
            #[tabled(rename = "content type")]
            content_type: String,
            modified: String,
        }

        let rows: Vec<ObjectRow> = objects
            .iter()
            .map(|o| ObjectRow {
                key: o.key.clone(),
                size: format_bytes(o.size),
                content_type: o.content_type().unwrap_or("-").to_string(),
                modified: o.last_modified.as_deref().map(format_date).unwrap_or_default(),
            })
            .collect();

        println!();
        println!("{}", Table::new(rows));
        println!("  {} object(s)", objects.len());
    }

    Ok(())
}

/// Handle stat command
pub async fn handle_stat(ctx: &Context, key: &str) -> Result<()> {
    let bucket = ctx.bucket()?;
    let metadata = ctx.client()?.object_metadata(bucket, key).await?;

    println!("Object '{}/{}':", bucket, metadata.key);
    println!("  Size: {}", format_bytes(metadata.size));
    println!("  Content type: {}", metadata.content_type.as_deref().unwrap_or("-"));
    println!("  ETag: {}", metadata.etag.as_deref().unwrap_or("-"));
    println!("  Last modified: {}", metadata.last_modified.as_deref().unwrap_or("-"));

    let mut custom: Vec<_> = metadata.custom.iter().collect();
    custom.sort();
    for (name, value) in custom {
        println!("  {}: {}", name, value);
    }

    Ok(())
}

/// Handle cp and mv commands
pub async fn handle_copy(
    ctx: &Context,
    src: &str,
    dst: &str,
    dest_bucket: Option<&str>,
    remove_source: bool,
) -> Result<()> {
    let bucket = ctx.bucket()?;
    let dest_bucket = dest_bucket.unwrap_or(bucket);
    let client = ctx.client()?;

    if remove_source {
        println!("Moving {}/{} -> {}/{}...", bucket, src, dest_bucket, dst);
        client.move_object(bucket, src, dest_bucket, dst).await?;
        println!("  ✅ Object moved");
    } else {
        println!("Copying {}/{} -> {}/{}...", bucket, src, dest_bucket, dst);
        client.copy_object(bucket, src, dest_bucket, dst).await?;
        println!("  ✅ Object copied");
    }

    Ok(())
}

/// Handle presign command
pub async fn handle_presign(
    ctx: &Context,
    key: &str,
    method: &str,
    content_type: Option<&str>,
    output: &str,
) -> Result<()> {
    let method: PresignedMethod = method.parse().map_err(|e: String| anyhow!(e))?;
    let bucket = ctx.bucket()?;

    let presigned = ctx.client()?.presign(method, bucket, key, content_type).await?;
    let expires_in = presigned.expires_in.as_secs();

    match output {
        "json" => {
            println!(
                "{}",
                serde_json::json!({
                    "method": presigned.method.as_str(),
                    "bucket": bucket,
                    "key": key,
                    "url": presigned.url,
                    "expires_in": expires_in,
                    "expires_at": chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64)
                })
            );
        }
        _ => {
            println!("Presigned {} URL for {}/{}:", presigned.method, bucket, key);
            println!();
            println!("  {}", presigned.url);
            println!();
            println!("  Expires in: {}s", expires_in);
        }
    }

    Ok(())
}

/// Handle buckets commands
pub async fn handle_buckets(
    ctx: &Context,
    action: &str,
    name: Option<&str>,
    location: Option<&str>,
) -> Result<()> {
    let client = ctx.client()?;

    match action {
        "list" => {
            println!("Listing R2 buckets...");
            println!();

            let buckets = client.list_buckets().await?;

            if buckets.is_empty() {
                println!("  No buckets found");
            } else {
                #[derive(Tabled)]
                struct BucketRow {
                    name: String,
                    location: String,
                    created: String,
                }

                let rows: Vec<BucketRow> = buckets
                    .iter()
                    .map(|b| BucketRow {
                        name: b.name.clone(),
                        location: b.location.clone().unwrap_or_else(|| "-".to_string()),
                        created: b.creation_date.as_deref().map(format_date).unwrap_or_default(),
                    })
                    .collect();

                println!("{}", Table::new(rows));
            }

            if let Some(default_bucket) = &ctx.config.cloudflare_r2.default_bucket {
                println!();
                println!("Default bucket: {}", default_bucket);
            }

            Ok(())
        }
        "create" => {
            let bucket_name = name.ok_or_else(|| anyhow!("Bucket name required"))?;

            println!("Creating bucket '{}'...", bucket_name);

            let bucket = client.create_bucket(bucket_name, location).await?;

            println!("  ✅ Bucket created: {}", bucket.name);
            if let Some(location) = &bucket.location {
                println!("  Location: {}", location);
            }

            Ok(())
        }
        "delete" => {
            let bucket_name = name.ok_or_else(|| anyhow!("Bucket name required"))?;

            // Prevent accidental deletion of default bucket
            if ctx.config.cloudflare_r2.default_bucket.as_deref() == Some(bucket_name) {
                return Err(anyhow!(
                    "Cannot delete default bucket '{}'.\n\
                     Change the default bucket in your configuration first.",
                    bucket_name
                ));
            }

            println!("⚠️  Warning: you are about to delete bucket '{}'", bucket_name);
            println!("  This action is IRREVERSIBLE!");

            client.delete_bucket(bucket_name).await?;

            println!("  ✅ Bucket deleted: {}", bucket_name);

            Ok(())
        }
        "info" => {
            let bucket_name = name.ok_or_else(|| anyhow!("Bucket name required"))?;

            let bucket = client.bucket_info(bucket_name).await?;

            println!("Bucket '{}':", bucket.name);
            println!("  Location: {}", bucket.location.as_deref().unwrap_or("-"));
            println!(
                "  Created: {}",
                bucket.creation_date.as_deref().map(format_date).unwrap_or_default()
            );

            Ok(())
        }
        _ => Err(anyhow!(
            "Unknown action: {}\nAvailable actions: list, create, delete, info",
            action
        )),
    }
}

/// Handle config commands
pub async fn handle_config(ctx: &Context, action: &str) -> Result<()> {
    let options = &ctx.config.cloudflare_r2;

    match action {
        "show" => {
            println!("Current configuration:");
            println!();
            println!("Cloudflare R2:");
            println!("  API base URI: {}", options.api_base_uri);
            println!("  Account ID: {}", mask(&options.account_id));
            println!("  API token: {}", mask(&options.api_token));
            println!("  Access key ID: {}", mask(&options.access_key_id));
            println!("  Secret access key: {}", mask(&options.secret_access_key));
            println!("  S3 endpoint: {}", options.s3_endpoint());
            println!("  Presigned URL expiry: {}s", options.presigned_url_expiry().as_secs());
            println!("  Timeout: {}s", options.timeout);
            println!(
                "  Default bucket: {}",
                options.default_bucket.as_deref().unwrap_or("(none)")
            );

            if let Some(logging) = &ctx.config.logging {
                println!();
                println!("Logging:");
                println!("  Level: {}", logging.level);
                println!("  Format: {}", logging.format);
            }

            Ok(())
        }
        "validate" => {
            println!("Validating configuration...");

            options.validate()?;
            println!("  ✅ Valid configuration format");

            println!("  Testing R2 connection...");
            let buckets = ctx.client()?.list_buckets().await?;
            println!("  ✅ R2 connection successful ({} bucket(s) visible)", buckets.len());

            Ok(())
        }
        _ => Err(anyhow!(
            "Unknown action: {}\nAvailable actions: show, validate",
            action
        )),
    }
}

/// Show only the first 4 characters of a secret
fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else if secret.chars().count() > 8 {
        format!("{}...", secret.chars().take(4).collect::<String>())
    } else {
        "****".to_string()
    }
}

/// Format ISO date string to readable format
fn format_date(iso_date: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(iso_date) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => iso_date.to_string(),
    }
}

/// Format bytes to human-readable size
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
