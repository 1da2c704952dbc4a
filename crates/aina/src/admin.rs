// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aina tenant` and `aina ledger` command implementations.
//!
//! Operator commands open the configured database directly and act as a
//! platform admin named `cli`. They go through the same engine services as
//! the HTTP API, so balance changes are ledgered and audited identically.

use std::sync::Arc;

use aina_config::model::AinaConfig;
use aina_core::{AinaError, AuthContext, Credits, SystemClock, TenantId, TenantStatus};
use aina_engine::{Engine, NewTenant, ProviderRegistry};
use aina_storage::SqliteStorage;
use serde::Serialize;

/// Actor recorded on ledger entries created from the command line.
const CLI_ACTOR: &str = "cli";

fn operator() -> AuthContext {
    AuthContext::admin(TenantId::from("platform"), CLI_ACTOR)
}

async fn open_engine(config: &AinaConfig) -> Result<Engine, AinaError> {
    let db = SqliteStorage::new(config.storage.clone()).initialize().await?;
    Ok(Engine::new(
        config,
        db,
        ProviderRegistry::new(),
        Arc::new(SystemClock),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AinaError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AinaError::Internal(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub async fn create_tenant(config: &AinaConfig, new: NewTenant) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let tenant = engine.admin.create_tenant(&operator(), new).await?;
    println!("created tenant {} ({})", tenant.id, tenant.status);
    Ok(())
}

pub async fn set_status(
    config: &AinaConfig,
    tenant: &str,
    status: TenantStatus,
) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    engine
        .admin
        .set_status(&operator(), &TenantId::from(tenant), status)
        .await?;
    println!("tenant {tenant} is now {status}");
    Ok(())
}

pub async fn list_tenants(config: &AinaConfig) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let tenants = engine.admin.list_tenants(&operator()).await?;
    if tenants.is_empty() {
        println!("no tenants");
    }
    for tenant in tenants {
        println!(
            "{:<24} {:<22} {:>12}  {}",
            tenant.id, tenant.status, tenant.balance, tenant.name
        );
    }
    Ok(())
}

pub async fn balance(config: &AinaConfig, tenant: &str) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let balance = engine.ledger.balance(&TenantId::from(tenant)).await?;
    println!("{balance}");
    Ok(())
}

pub async fn adjust(
    config: &AinaConfig,
    tenant: &str,
    amount: Credits,
    reason: &str,
) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let entry = engine
        .admin
        .adjust_balance(&operator(), &TenantId::from(tenant), amount, reason)
        .await?;
    println!(
        "entry {} applied: {} -> balance {}",
        entry.id, entry.amount, entry.balance_after
    );
    Ok(())
}

pub async fn verify(config: &AinaConfig, tenant: &str) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let report = engine
        .admin
        .verify(&operator(), &TenantId::from(tenant))
        .await?;
    print_json(&report)?;
    if !report.consistent {
        return Err(AinaError::Internal(format!(
            "ledger for {tenant} is inconsistent: cached {} vs computed {}",
            report.cached, report.computed
        )));
    }
    Ok(())
}

pub async fn entries(config: &AinaConfig, tenant: &str, limit: usize) -> Result<(), AinaError> {
    let engine = open_engine(config).await?;
    let entries = engine
        .ledger
        .entries(&TenantId::from(tenant), limit.max(1))
        .await?;
    print_json(&entries)
}
