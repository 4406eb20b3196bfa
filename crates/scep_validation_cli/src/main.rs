// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{CommandFactory, FromArgMatches};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use scep_validation_cli::{exit_code, Arguments};

#[tokio::main]
async fn main() -> ! {
    let cmd = Arguments::command();
    let after_help = format!(
        "{}Examples:{}
# validate a request against a known service endpoint
scepvalidate --access-token \"$TOKEN\" --service-url https://fef.example.com/ScepRequestValidationFEService \\
    validate --transaction-id 1a2b3c --csr-file request.pem

# report a failed issuance, discovering the service through Graph
SCEP_VALIDATION_CLIENT_SECRET=... scepvalidate --tenant contoso.onmicrosoft.com --client-id $APP_ID \\
    notify-failure --transaction-id 1a2b3c --csr-file request.pem --h-result 0x80070005 --description 'access denied'

Exit status is 0 on success, 1 if the service declined, 2 for bad arguments or configuration, 3 if the service couldn't be reached.
",
        cmd.get_styles().get_header().render(),
        cmd.get_styles().get_header().render_reset()
    );
    let mut cmd = cmd.after_help(after_help);
    cmd.build();

    let mut matches = cmd.get_matches();
    let args = match Arguments::from_arg_matches_mut(&mut matches) {
        Ok(args) => args,
        Err(e) => {
            let e = e.format(&mut Arguments::command());
            e.exit();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let client = match args.connection.build_client() {
        Ok(client) => client,
        Err(err) => {
            error!("{err:#}");
            std::process::exit(2);
        }
    };

    let action = match args.command.resolve() {
        Ok(action) => action,
        Err(err) => {
            error!("{err:#}");
            std::process::exit(2);
        }
    };

    let result = action.run(&client).await;
    match &result {
        Ok(()) => info!("{} {}: Success", action.name(), action.transaction_id()),
        Err(err) => error!("{} {}: {err}", action.name(), action.transaction_id()),
    }
    std::process::exit(exit_code(&result));
}
