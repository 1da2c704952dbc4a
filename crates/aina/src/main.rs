// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aina - multi-tenant WhatsApp and Messenger messaging platform.
//!
//! This is the binary entry point: `aina serve` runs the gateway, the
//! `tenant` and `ledger` subcommands are operator tools working directly on
//! the configured database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use aina_core::{Credits, TenantStatus};
use clap::{Parser, Subcommand};

/// Aina - multi-tenant messaging with prepaid credits.
#[derive(Parser, Debug)]
#[command(name = "aina", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and webhook worker.
    Serve,
    /// Manage tenants.
    Tenant {
        #[command(subcommand)]
        action: TenantCommands,
    },
    /// Inspect and adjust credit ledgers.
    Ledger {
        #[command(subcommand)]
        action: LedgerCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Create a tenant.
    Create {
        /// Tenant id (slug).
        id: String,
        /// Display name.
        #[arg(long)]
        name: String,
        #[arg(long)]
        plan: Option<String>,
        /// WhatsApp Cloud API phone number id that receives for this tenant.
        #[arg(long)]
        whatsapp_phone_number_id: Option<String>,
        /// WhatsApp Cloud API access token.
        #[arg(long)]
        whatsapp_access_token: Option<String>,
        /// Facebook page id that receives Messenger traffic for this tenant.
        #[arg(long)]
        messenger_page_id: Option<String>,
        /// Page access token for the Messenger Send API.
        #[arg(long)]
        messenger_page_token: Option<String>,
        /// Create the tenant ACTIVE instead of PENDING_VERIFICATION.
        #[arg(long)]
        active: bool,
    },
    /// Set a tenant's status (ACTIVE, SUSPENDED, PENDING_VERIFICATION).
    Status {
        id: String,
        status: TenantStatus,
    },
    /// List tenants.
    List,
}

#[derive(Subcommand, Debug)]
enum LedgerCommands {
    /// Show a tenant's balance.
    Balance { tenant: String },
    /// Credit (positive) or debit (negative) a tenant, e.g. `acme -2.50 "reversal"`.
    Adjust {
        tenant: String,
        #[arg(allow_hyphen_values = true)]
        amount: Credits,
        reason: String,
    },
    /// Compare the cached balance with the ledger sum.
    Verify { tenant: String },
    /// Show the most recent ledger entries.
    Entries {
        tenant: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match aina_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            aina_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    serve::init_tracing(&config.server.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Tenant { action }) => match action {
            TenantCommands::Create {
                id,
                name,
                plan,
                whatsapp_phone_number_id,
                whatsapp_access_token,
                messenger_page_id,
                messenger_page_token,
                active,
            } => {
                let new = aina_engine::NewTenant {
                    id: id.into(),
                    name,
                    plan,
                    status: if active {
                        TenantStatus::Active
                    } else {
                        TenantStatus::PendingVerification
                    },
                    credentials: aina_core::ProviderCredentials {
                        whatsapp_phone_number_id,
                        whatsapp_access_token,
                        messenger_page_id,
                        messenger_page_token,
                    },
                };
                admin::create_tenant(&config, new).await
            }
            TenantCommands::Status { id, status } => admin::set_status(&config, &id, status).await,
            TenantCommands::List => admin::list_tenants(&config).await,
        },
        Some(Commands::Ledger { action }) => match action {
            LedgerCommands::Balance { tenant } => admin::balance(&config, &tenant).await,
            LedgerCommands::Adjust {
                tenant,
                amount,
                reason,
            } => admin::adjust(&config, &tenant, amount, &reason).await,
            LedgerCommands::Verify { tenant } => admin::verify(&config, &tenant).await,
            LedgerCommands::Entries { tenant, limit } => {
                admin::entries(&config, &tenant, limit).await
            }
        },
        None => {
            println!("aina: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
