// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line driver for the SCEP validation client: lets an operator (or a
//! CA's scripting hook) validate a request and send notifications by hand.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{warn, Level};

use http_client::{BaseApiClient, HttpsToHttpRewriter};
use scep_validation::auth::{
    AuthProvider, ClientCredentials, ClientCredentialsProvider, StaticTokenProvider,
    DEFAULT_AUTHORITY,
};
use scep_validation::locator::{
    FixedServiceLocator, GraphServiceLocator, ServiceLocator, DEFAULT_GRAPH_URL,
};
use scep_validation::scep_actions::SERVICE_NAME;
use scep_validation::telemetry::TracingTelemetry;
use scep_validation::{IntuneServiceClient, ValidationClient, ValidationConfig, ValidationError};

/// The service rejects longer failure descriptions.
pub const MAX_ERROR_DESCRIPTION_CHARS: usize = 255;

#[derive(Debug, Parser)]
#[command(
    name = "scepvalidate",
    version,
    author,
    about = "Validate SCEP requests against the device-management service, and report issuance outcomes.",
    long_about = "scepvalidate asks the device-management service whether a SCEP certificate request was approved, and sends the success / failure notifications a CA owes the service after acting on it. Credentials can be given as flags or through SCEP_VALIDATION_* environment variables."
)]
pub struct Arguments {
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress non-error output and set the log level to WARN."
    )]
    pub quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase verbosity level, can be used multiple times."
    )]
    pub verbose: u8,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

impl Arguments {
    pub fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    #[arg(
        long,
        env = "SCEP_VALIDATION_TENANT",
        help = "Directory tenant to authenticate against, e.g. contoso.onmicrosoft.com."
    )]
    pub tenant: Option<String>,

    #[arg(
        long,
        env = "SCEP_VALIDATION_CLIENT_ID",
        help = "Application (client) id registered for the CA."
    )]
    pub client_id: Option<String>,

    #[arg(
        long,
        env = "SCEP_VALIDATION_CLIENT_SECRET",
        hide_env_values = true,
        conflicts_with = "access_token",
        help = "Client secret for --client-id."
    )]
    pub client_secret: Option<String>,

    #[arg(
        long,
        env = "SCEP_VALIDATION_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Use this bearer token instead of acquiring one. Requires --service-url."
    )]
    pub access_token: Option<String>,

    #[arg(
        long,
        env = "SCEP_VALIDATION_SERVICE_URL",
        help = "Base URL of the validation service. Skips service discovery."
    )]
    pub service_url: Option<String>,

    #[arg(long, env = "SCEP_VALIDATION_AUTHORITY", default_value = DEFAULT_AUTHORITY)]
    pub authority: String,

    #[arg(long, env = "SCEP_VALIDATION_GRAPH_URL", default_value = DEFAULT_GRAPH_URL)]
    pub graph_url: String,

    #[arg(
        long,
        env = "SCEP_VALIDATION_PROVIDER",
        default_value = concat!("scepvalidate/", env!("CARGO_PKG_VERSION")),
        help = "Name and version of the calling CA, sent as callerInfo."
    )]
    pub provider_name: String,

    #[arg(
        long,
        env = "SCEP_VALIDATION_API_VERSION",
        help = "Override the protocol version sent to the service."
    )]
    pub api_version: Option<String>,

    #[arg(
        long,
        default_value = "30s",
        value_parser = humantime::parse_duration,
        help = "Timeout for each attempt, e.g. 10s or 1m."
    )]
    pub timeout: Duration,

    #[arg(long, default_value_t = 2, help = "Retries after a transient failure.")]
    pub max_retries: usize,

    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Run requests over http:// instead of https://, for local test servers."
    )]
    pub use_http: bool,
}

impl ConnectionArgs {
    pub fn build_client(&self) -> Result<ValidationClient> {
        let mut config = ValidationConfig::new(&self.provider_name)?;
        if let Some(api_version) = &self.api_version {
            config = config.with_service_version(api_version)?;
        }

        let mut api_client = BaseApiClient::new(&self.provider_name);
        if self.use_http {
            api_client = HttpsToHttpRewriter::inject(api_client);
        }

        let auth: Arc<dyn AuthProvider + Send + Sync> = match (
            &self.access_token,
            &self.tenant,
            &self.client_id,
            &self.client_secret,
        ) {
            (Some(token), _, _, _) => {
                if self.service_url.is_none() {
                    anyhow::bail!("--service-url is required with --access-token, since one token can't also be used for discovery.");
                }
                Arc::new(StaticTokenProvider::new(token))
            }
            (None, Some(tenant), Some(client_id), Some(client_secret)) => {
                Arc::new(ClientCredentialsProvider::new(
                    api_client.clone(),
                    ClientCredentials {
                        authority: self.authority.clone(),
                        tenant: tenant.clone(),
                        client_id: client_id.clone(),
                        client_secret: client_secret.clone(),
                    },
                ))
            }
            _ => anyhow::bail!(
                "either --access-token, or all of --tenant, --client-id and --client-secret, are required."
            ),
        };

        let locator: Arc<dyn ServiceLocator + Send + Sync> = match &self.service_url {
            Some(url) => Arc::new(FixedServiceLocator::new().with_service(SERVICE_NAME, url)),
            None => Arc::new(GraphServiceLocator::new(
                api_client.clone(),
                auth.clone(),
                &self.graph_url,
            )),
        };

        let service = IntuneServiceClient::new(api_client, auth, locator)
            .with_timeout(self.timeout)
            .with_max_retries(self.max_retries);

        Ok(ValidationClient::new(config, Arc::new(service))
            .with_telemetry(Arc::new(TracingTelemetry)))
    }
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct CsrArgs {
    #[arg(long, value_name = "BASE64", help = "Base64 PKCS#10 request.")]
    pub csr: Option<String>,

    #[arg(
        long,
        value_name = "PATH",
        help = "File holding the request, PEM or bare base64."
    )]
    pub csr_file: Option<PathBuf>,
}

impl CsrArgs {
    fn load(&self) -> Result<String> {
        match (&self.csr, &self.csr_file) {
            (Some(csr), _) => Ok(csr.trim().to_owned()),
            (None, Some(path)) => read_csr(path),
            (None, None) => anyhow::bail!("--csr or --csr-file is required."),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask whether a certificate may be issued for a request
    Validate {
        #[arg(long)]
        transaction_id: String,
        #[command(flatten)]
        csr: CsrArgs,
    },
    /// Report that a certificate was issued
    NotifySuccess {
        #[arg(long)]
        transaction_id: String,
        #[command(flatten)]
        csr: CsrArgs,
        #[arg(long)]
        thumbprint: String,
        #[arg(long)]
        serial_number: String,
        #[arg(long, help = "ISO 8601 UTC, e.g. 2030-01-01T00:00:00.000Z")]
        expiration: String,
        #[arg(long)]
        issuing_authority: String,
    },
    /// Report that no certificate was issued
    NotifyFailure {
        #[arg(long)]
        transaction_id: String,
        #[command(flatten)]
        csr: CsrArgs,
        #[arg(
            long,
            allow_hyphen_values = true,
            value_parser = parse_h_result,
            help = "The CA's error code, decimal or 0x-prefixed hex."
        )]
        h_result: i64,
        #[arg(long, help = "Truncated to 255 characters.")]
        description: String,
    },
}

/// A command with its inputs loaded, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Validate {
        transaction_id: String,
        csr: String,
    },
    NotifySuccess {
        transaction_id: String,
        csr: String,
        thumbprint: String,
        serial_number: String,
        expiration: String,
        issuing_authority: String,
    },
    NotifyFailure {
        transaction_id: String,
        csr: String,
        h_result: i64,
        description: String,
    },
}

impl Command {
    pub fn resolve(&self) -> Result<Action> {
        Ok(match self {
            Command::Validate {
                transaction_id,
                csr,
            } => Action::Validate {
                transaction_id: transaction_id.clone(),
                csr: csr.load()?,
            },
            Command::NotifySuccess {
                transaction_id,
                csr,
                thumbprint,
                serial_number,
                expiration,
                issuing_authority,
            } => Action::NotifySuccess {
                transaction_id: transaction_id.clone(),
                csr: csr.load()?,
                thumbprint: thumbprint.clone(),
                serial_number: serial_number.clone(),
                expiration: expiration.clone(),
                issuing_authority: issuing_authority.clone(),
            },
            Command::NotifyFailure {
                transaction_id,
                csr,
                h_result,
                description,
            } => Action::NotifyFailure {
                transaction_id: transaction_id.clone(),
                csr: csr.load()?,
                h_result: *h_result,
                description: truncate_description(description),
            },
        })
    }
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Validate { .. } => "validate",
            Action::NotifySuccess { .. } => "notify-success",
            Action::NotifyFailure { .. } => "notify-failure",
        }
    }

    pub fn transaction_id(&self) -> &str {
        match self {
            Action::Validate { transaction_id, .. }
            | Action::NotifySuccess { transaction_id, .. }
            | Action::NotifyFailure { transaction_id, .. } => transaction_id,
        }
    }

    pub async fn run(&self, client: &ValidationClient) -> Result<(), ValidationError> {
        match self {
            Action::Validate {
                transaction_id,
                csr,
            } => client.validate_request(transaction_id, csr).await,
            Action::NotifySuccess {
                transaction_id,
                csr,
                thumbprint,
                serial_number,
                expiration,
                issuing_authority,
            } => {
                client
                    .send_success_notification(
                        transaction_id,
                        csr,
                        thumbprint,
                        serial_number,
                        expiration,
                        issuing_authority,
                    )
                    .await
            }
            Action::NotifyFailure {
                transaction_id,
                csr,
                h_result,
                description,
            } => {
                client
                    .send_failure_notification(transaction_id, csr, *h_result, description)
                    .await
            }
        }
    }
}

/// Process exit code for the outcome of an action.
pub fn exit_code(result: &Result<(), ValidationError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(ValidationError::ServiceOutcome(_)) => 1,
        Err(ValidationError::InvalidArgument { .. }) => 2,
        Err(ValidationError::Service(_)) => 3,
    }
}

/// Accepts `-2147024891`, `2147942405` or `0x80070005`. Hex is read as a
/// 32-bit HRESULT, so `0x80070005` is negative like the CA would report it.
pub fn parse_h_result(s: &str) -> Result<i64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let bits = u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex {s:?}: {e}"))?;
        Ok(i64::from(bits as i32))
    } else {
        s.parse().map_err(|e| format!("invalid number {s:?}: {e}"))
    }
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_ERROR_DESCRIPTION_CHARS {
        return description.to_owned();
    }
    warn!("error description truncated to {MAX_ERROR_DESCRIPTION_CHARS} characters");
    description
        .chars()
        .take(MAX_ERROR_DESCRIPTION_CHARS)
        .collect()
}

/// Reads a request from a file: the body of a PEM block if there is one,
/// otherwise the whole file, with whitespace removed either way.
pub fn read_csr(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading certificate request from {path:?}"))?;

    let body: String = if text.contains("-----BEGIN") {
        text.lines()
            .skip_while(|line| !line.starts_with("-----BEGIN"))
            .skip(1)
            .take_while(|line| !line.starts_with("-----END"))
            .collect()
    } else {
        text
    };

    let csr: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if csr.is_empty() {
        anyhow::bail!("no certificate request found in {path:?}");
    }
    Ok(csr)
}
