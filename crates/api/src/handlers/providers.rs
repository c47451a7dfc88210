use axum::{extract::Query, Json};
use providers::{
    AccessProviderDescriptor, AccessUsage, ApplyDnsProviderDescriptor, DeployProviderDescriptor,
    ProviderRegistry,
};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult};

#[derive(Debug, Default, Deserialize)]
pub struct ProviderQuery {
    /// `apply`, `deploy` or `all`; absent lists every access provider.
    pub usage: Option<String>,
}

/// The provider catalog, as the editor's pickers need it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCatalog {
    pub accesses: Vec<&'static AccessProviderDescriptor>,
    pub apply_dns: &'static [ApplyDnsProviderDescriptor],
    pub deploy: &'static [DeployProviderDescriptor],
}

pub async fn list(Query(query): Query<ProviderQuery>) -> ApiResult<Json<ProviderCatalog>> {
    let registry = ProviderRegistry::global();
    let accesses = match query.usage.as_deref().filter(|u| !u.is_empty()) {
        Some(usage) => {
            let usage: AccessUsage = usage.parse().map_err(ApiError::BadRequest)?;
            registry.list_by_usage(usage)
        }
        None => registry.access_providers().iter().collect(),
    };
    Ok(Json(ProviderCatalog {
        accesses,
        apply_dns: registry.apply_dns_providers(),
        deploy: registry.deploy_providers(),
    }))
}
