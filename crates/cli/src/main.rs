use anyhow::Result;
use clap::Parser;
use color_eyre::config::HookBuilder;
use std::path::PathBuf;

mod handlers;

/// r2kit - Command-line client for Cloudflare R2
#[derive(Parser, Debug)]
#[command(name = "r2kit")]
#[command(version)]
#[command(about = "Manage Cloudflare R2 buckets and objects from your terminal", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/r2kit/config.toml)
    #[arg(long, global = true, env = "R2KIT_CONFIG")]
    config: Option<PathBuf>,

    /// Bucket to operate on (defaults to `default_bucket` from the configuration)
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    #[command(flatten)]
    credentials: Credentials,

    /// Command to run
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values from the configuration file
#[derive(clap::Args, Debug, Default)]
struct Credentials {
    /// Cloudflare account ID
    #[arg(long, global = true, env = "R2_ACCOUNT_ID", hide_env_values = true)]
    account_id: Option<String>,

    /// API token used for object and bucket calls
    #[arg(long, global = true, env = "R2_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Access key ID used for presigning
    #[arg(long, global = true, env = "R2_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Secret access key used for presigning
    #[arg(long, global = true, env = "R2_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Destination key
        key: String,
        /// Content type (guessed from the file name when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download an object to a local file
    Download {
        /// Object key
        key: String,
        /// Local destination
        dest: PathBuf,
    },
    /// Delete an object
    Delete {
        /// Object key
        key: String,
    },
    /// List objects
    Ls {
        /// Only list keys starting with this prefix
        prefix: Option<String>,
    },
    /// Show object metadata
    Stat {
        /// Object key
        key: String,
    },
    /// Copy an object
    Cp {
        /// Source key
        src: String,
        /// Destination key
        dst: String,
        /// Destination bucket (defaults to the source bucket)
        #[arg(long)]
        dest_bucket: Option<String>,
    },
    /// Move an object (copy, then delete the source)
    Mv {
        /// Source key
        src: String,
        /// Destination key
        dst: String,
        /// Destination bucket (defaults to the source bucket)
        #[arg(long)]
        dest_bucket: Option<String>,
    },
    /// Generate a presigned URL
    Presign {
        /// Object key
        key: String,
        /// HTTP method the URL is valid for (get, put, delete)
        #[arg(short, long, default_value = "get")]
        method: String,
        /// Content type the PUT must carry
        #[arg(long)]
        content_type: Option<String>,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Manage buckets
    Buckets {
        #[command(subcommand)]
        action: BucketAction,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum BucketAction {
    /// List buckets
    List,
    /// Create a bucket
    Create {
        name: String,
        /// Location hint (apac, eeur, enam, weur, wnam)
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Delete a bucket
    Delete { name: String },
    /// Show bucket information
    Info { name: String },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file from the given credentials
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration with secrets masked
    Show,
    /// Validate the configuration and test the connection
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        // Init runs before any configuration exists
        Commands::Config { action: ConfigAction::Init { force } } => {
            handlers::init_tracing(None);
            handlers::handle_init(cli.config.as_deref(), &cli.credentials, cli.bucket.as_deref(), force)
        }
        command => {
            let config = handlers::load(cli.config.as_deref(), &cli.credentials)?;
            handlers::init_tracing(config.logging.as_ref());

            let ctx = handlers::Context::new(config, cli.bucket)?;
            run(&ctx, command).await
        }
    }
}

async fn run(ctx: &handlers::Context, command: Commands) -> Result<()> {
    match command {
        Commands::Upload { file, key, content_type } => {
            handlers::handle_upload(ctx, &file, &key, content_type.as_deref()).await
        }
        Commands::Download { key, dest } => handlers::handle_download(ctx, &key, &dest).await,
        Commands::Delete { key } => handlers::handle_delete(ctx, &key).await,
        Commands::Ls { prefix } => handlers::handle_ls(ctx, prefix.as_deref()).await,
        Commands::Stat { key } => handlers::handle_stat(ctx, &key).await,
        Commands::Cp { src, dst, dest_bucket } => {
            handlers::handle_copy(ctx, &src, &dst, dest_bucket.as_deref(), false).await
        }
        Commands::Mv { src, dst, dest_bucket } => {
            handlers::handle_copy(ctx, &src, &dst, dest_bucket.as_deref(), true).await
        }
        Commands::Presign { key, method, content_type, output } => {
            handlers::handle_presign(ctx, &key, &method, content_type.as_deref(), &output).await
        }
        Commands::Buckets { action } => {
            let (action_str, name, location) = match action {
                BucketAction::List => ("list", None, None),
                BucketAction::Create { name, location } => ("create", Some(name), location),
                BucketAction::Delete { name } => ("delete", Some(name), None),
                BucketAction::Info { name } => ("info", Some(name), None),
            };
            handlers::handle_buckets(ctx, action_str, name.as_deref(), location.as_deref()).await
        }
        Commands::Config { action } => {
            let action_str = match action {
                ConfigAction::Init { .. } => "init",
                ConfigAction::Show => "show",
                ConfigAction::Validate => "validate",
            };
            handlers::handle_config(ctx, action_str).await
        }
    }
}
