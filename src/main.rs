//! # AWSCONNCTL CLI
//!
//! Command-line host for the connection form engine. Drives the same
//! flows the embedded settings panel offers (load, save, test, rotate)
//! against a running admin server.
//!
//! ## Usage
//!
//! ```bash
//! # Show an existing connection as the form would load it
//! awsconnctl --server https://ci.example.com show --project _Root --connection awsConnection:prod
//!
//! # Test the stored credentials
//! awsconnctl --server https://ci.example.com test --project _Root --connection awsConnection:prod
//!
//! # Rename a connection
//! awsconnctl --server https://ci.example.com save --project _Root --connection awsConnection:prod \
//!     --display-name "Prod deployer"
//!
//! # Rotate the stored access keys
//! awsconnctl --server https://ci.example.com rotate --project _Root --connection awsConnection:prod
//! ```
//!
//! Secret values cannot be entered here: client-side encryption is a host
//! capability of the web UI. Saving an existing connection keeps the
//! stored secret untouched.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use aws_connection_manager::credentials::CredentialsPanel;
use aws_connection_manager::fields::{seed_form_values, FieldName, FieldValue};
use aws_connection_manager::form::{ConnectionForm, RotationOutcome, SubmitOutcome};
use aws_connection_manager::host::{EncryptError, HttpTransport, SecretEncryptor, Transport};
use aws_connection_manager::regions::region_options;
use aws_connection_manager::scrape::fetch_connection_config;
use aws_connection_manager::{ConnectionConfig, Mode, OptionItem};

/// AWS connection settings from the command line
#[derive(Parser)]
#[command(name = "awsconnctl")]
#[command(
    about = "Manage a build server's AWS credential connections",
    long_about = None,
    after_help = "\
Examples:
  awsconnctl --server https://ci.example.com show --project _Root --connection awsConnection:prod
  awsconnctl --server https://ci.example.com test --project _Root --connection awsConnection:prod
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Admin server base URL
    #[arg(short, long, global = true, default_value = "http://localhost:8111")]
    server: String,

    /// Page embedding the connection record (relative to the server)
    #[arg(long, global = true, default_value = "/admin/editAwsConnection.html")]
    connection_page: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a connection and print it as the form would see it
    Show {
        /// Project the connection belongs to
        #[arg(short, long)]
        project: String,

        /// Connection id
        #[arg(short, long)]
        connection: String,
    },

    /// Test a connection's credentials without persisting anything
    Test {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        connection: String,
    },

    /// Update an existing connection's non-secret fields
    Save {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        connection: String,

        /// New display name
        #[arg(long)]
        display_name: Option<String>,

        /// New region key (also rederives the STS endpoint)
        #[arg(long)]
        region: Option<String>,

        /// New IAM role ARN
        #[arg(long)]
        role_arn: Option<String>,

        /// New IAM session name
        #[arg(long)]
        session_name: Option<String>,
    },

    /// Rotate a connection's access keys
    Rotate {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        connection: String,
    },
}

/// The CLI has no public-key encryption capability; flows that would
/// encrypt a new secret fail with a pointer at the web UI instead.
struct NoHostEncryption;

impl SecretEncryptor for NoHostEncryption {
    fn encrypt(&self, _plaintext: &str, _public_key: &str) -> Result<String, EncryptError> {
        Err(EncryptError::new(
            "secret encryption is only available in the web UI host",
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "awsconnctl=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let transport = Arc::new(HttpTransport::new(cli.server.clone()));

    match cli.command {
        Commands::Show {
            project,
            connection,
        } => {
            let config =
                load_connection(&*transport, &cli.connection_page, &project, &connection).await?;
            print_connection(&config);
            Ok(())
        }
        Commands::Test {
            project,
            connection,
        } => {
            let config =
                load_connection(&*transport, &cli.connection_page, &project, &connection).await?;
            let form = ConnectionForm::new(
                config,
                Mode::Default,
                transport,
                Arc::new(NoHostEncryption),
            );

            let outcome = form
                .test_connection()
                .await
                .context("Test request failed")?;
            println!("{}", outcome.message);
            if !outcome.success {
                bail!("Connection test failed");
            }
            Ok(())
        }
        Commands::Save {
            project,
            connection,
            display_name,
            region,
            role_arn,
            session_name,
        } => {
            let config =
                load_connection(&*transport, &cli.connection_page, &project, &connection).await?;
            let regions = region_options(&config.all_regions);
            let mut form = ConnectionForm::new(
                config,
                Mode::Default,
                transport,
                Arc::new(NoHostEncryption),
            );

            if let Some(name) = display_name {
                form.display_name_changed(&name)
                    .await
                    .context("Display name update failed")?;
            }
            if let Some(key) = region {
                let option = regions
                    .iter()
                    .find(|option| option.key == key)
                    .cloned()
                    .unwrap_or_else(|| OptionItem::new(key.clone(), key.clone()));
                form.select_region(option);
            }
            if let Some(arn) = role_arn {
                form.set_value(FieldName::IamRoleArn, Some(FieldValue::Text(arn)));
            }
            if let Some(name) = session_name {
                form.set_value(FieldName::IamRoleSessionName, Some(FieldValue::Text(name)));
            }

            match form.submit().await.context("Save request failed")? {
                SubmitOutcome::Saved { connection_id, .. } => {
                    println!("Saved {connection_id}");
                    Ok(())
                }
                SubmitOutcome::Invalid(errors) => {
                    for (field, message) in &errors {
                        eprintln!("{field}: {message}");
                    }
                    bail!("The server rejected {} field(s)", errors.len());
                }
            }
        }
        Commands::Rotate {
            project,
            connection,
        } => {
            let config =
                load_connection(&*transport, &cli.connection_page, &project, &connection).await?;
            let mut form = ConnectionForm::new(
                config,
                Mode::Default,
                transport,
                Arc::new(NoHostEncryption),
            );

            match form.rotate_keys().await.context("Rotation request failed")? {
                RotationOutcome::Rotated => {
                    println!("Keys have been rotated");
                    println!("New access key id: {}", form.config().access_key_id);
                    Ok(())
                }
                RotationOutcome::Failed { message } => bail!("{message}"),
            }
        }
    }
}

async fn load_connection(
    transport: &dyn Transport,
    page_url: &str,
    project: &str,
    connection: &str,
) -> Result<ConnectionConfig> {
    fetch_connection_config(transport, page_url, project, connection)
        .await
        .with_context(|| format!("Could not load connection {connection} in project {project}"))
}

fn print_connection(config: &ConnectionConfig) {
    println!("Connection:     {}", config.connection_id);
    println!("Project:        {}", config.project_id);
    println!("Display name:   {}", config.display_name);
    println!("Type:           {}", config.credentials_type);
    println!("Region:         {}", config.region);
    if !config.access_key_id.is_empty() {
        println!("Access key id:  {}", config.access_key_id);
    }
    if !config.iam_role_arn.is_empty() {
        println!("IAM role ARN:   {}", config.iam_role_arn);
    }

    let values = seed_form_values(config, None);
    match CredentialsPanel::resolve(config, &values) {
        CredentialsPanel::AccessKeys { rotation_available } => {
            println!("Panel:          access keys (rotation {})",
                if rotation_available { "available" } else { "unavailable" });
        }
        CredentialsPanel::IamRole { external_id_visible } => {
            println!("Panel:          IAM role (external id {})",
                if external_id_visible { "shown" } else { "hidden" });
        }
        CredentialsPanel::DefaultProvider { chain_enabled, .. } => {
            println!("Panel:          default provider chain (server {})",
                if chain_enabled { "enabled" } else { "disabled" });
        }
        CredentialsPanel::Hidden => println!("Panel:          none (unrecognized type)"),
    }
}
