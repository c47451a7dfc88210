//! Access credentials: one typed payload per [`AccessProvider`].
//!
//! Stored records arrive as an [`AccessRecord`] whose tag and payload are
//! still raw. [`validate_access`] (or [`AccessRecord::validate`]) checks the
//! payload against the provider's schema and decodes it into the closed
//! [`AccessConfig`] sum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Reason, ValidationError, ValidationErrors};
use crate::registry::{AccessProvider, AccessUsage, ProviderRegistry};
use crate::schema::{check_fields, check_value, FieldKind};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeHttpReqAccessConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliyunAccessConfig {
    pub access_key_id: String,
    pub access_key_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAccessConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAccessConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Key pair named `accessKeyId` / `secretAccessKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyIdConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Key pair named `accessKey` / `secretKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyConfig {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareAccessConfig {
    pub dns_api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_api_token: Option<String>,
}

/// OAuth-style client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoDaddyAccessConfig {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuaweiCloudAccessConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesAccessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalAccessConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameDotComAccessConfig {
    pub username: String,
    pub api_token: String,
}

/// A single API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerDnsAccessConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshAccessConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_passphrase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TencentCloudAccessConfig {
    pub secret_id: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UCloudAccessConfig {
    pub private_key: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAccessConfig {
    pub url: String,
}

// ---------------------------------------------------------------------------
// AccessConfig
// ---------------------------------------------------------------------------

/// A validated access payload, tagged by its provider.
///
/// Serializes adjacently tagged: `{"provider": "aws", "config": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "config")]
pub enum AccessConfig {
    #[serde(rename = "acmehttpreq")]
    AcmeHttpReq(AcmeHttpReqAccessConfig),
    #[serde(rename = "aliyun")]
    Aliyun(AliyunAccessConfig),
    #[serde(rename = "aws")]
    Aws(AwsAccessConfig),
    #[serde(rename = "azure")]
    Azure(AzureAccessConfig),
    #[serde(rename = "baiducloud")]
    BaiduCloud(AccessKeyIdConfig),
    #[serde(rename = "byteplus")]
    BytePlus(AccessKeyConfig),
    #[serde(rename = "cloudflare")]
    Cloudflare(CloudflareAccessConfig),
    #[serde(rename = "dogecloud")]
    DogeCloud(AccessKeyConfig),
    #[serde(rename = "edgio")]
    Edgio(ClientCredentialsConfig),
    #[serde(rename = "godaddy")]
    GoDaddy(GoDaddyAccessConfig),
    #[serde(rename = "huaweicloud")]
    HuaweiCloud(HuaweiCloudAccessConfig),
    #[serde(rename = "k8s")]
    Kubernetes(KubernetesAccessConfig),
    #[serde(rename = "local")]
    Local(LocalAccessConfig),
    #[serde(rename = "namedotcom")]
    NameDotCom(NameDotComAccessConfig),
    #[serde(rename = "namesilo")]
    NameSilo(ApiKeyConfig),
    #[serde(rename = "ns1")]
    Ns1(ApiKeyConfig),
    #[serde(rename = "powerdns")]
    PowerDns(PowerDnsAccessConfig),
    #[serde(rename = "qiniu")]
    Qiniu(AccessKeyConfig),
    #[serde(rename = "ssh")]
    Ssh(SshAccessConfig),
    #[serde(rename = "tencentcloud")]
    TencentCloud(TencentCloudAccessConfig),
    #[serde(rename = "ucloud")]
    UCloud(UCloudAccessConfig),
    #[serde(rename = "volcengine")]
    VolcEngine(AccessKeyIdConfig),
    #[serde(rename = "webhook")]
    Webhook(WebhookAccessConfig),
}

impl AccessConfig {
    pub fn provider(&self) -> AccessProvider {
        match self {
            Self::AcmeHttpReq(_) => AccessProvider::AcmeHttpReq,
            Self::Aliyun(_) => AccessProvider::Aliyun,
            Self::Aws(_) => AccessProvider::Aws,
            Self::Azure(_) => AccessProvider::Azure,
            Self::BaiduCloud(_) => AccessProvider::BaiduCloud,
            Self::BytePlus(_) => AccessProvider::BytePlus,
            Self::Cloudflare(_) => AccessProvider::Cloudflare,
            Self::DogeCloud(_) => AccessProvider::DogeCloud,
            Self::Edgio(_) => AccessProvider::Edgio,
            Self::GoDaddy(_) => AccessProvider::GoDaddy,
            Self::HuaweiCloud(_) => AccessProvider::HuaweiCloud,
            Self::Kubernetes(_) => AccessProvider::Kubernetes,
            Self::Local(_) => AccessProvider::Local,
            Self::NameDotCom(_) => AccessProvider::NameDotCom,
            Self::NameSilo(_) => AccessProvider::NameSilo,
            Self::Ns1(_) => AccessProvider::Ns1,
            Self::PowerDns(_) => AccessProvider::PowerDns,
            Self::Qiniu(_) => AccessProvider::Qiniu,
            Self::Ssh(_) => AccessProvider::Ssh,
            Self::TencentCloud(_) => AccessProvider::TencentCloud,
            Self::UCloud(_) => AccessProvider::UCloud,
            Self::VolcEngine(_) => AccessProvider::VolcEngine,
            Self::Webhook(_) => AccessProvider::Webhook,
        }
    }

    /// Decode a raw payload for `provider` without schema checks.
    pub fn from_parts(provider: AccessProvider, config: &Value) -> Result<Self, serde_json::Error> {
        use serde_json::from_value as decode;

        let config = match config {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        Ok(match provider {
            AccessProvider::AcmeHttpReq => Self::AcmeHttpReq(decode(config)?),
            AccessProvider::Aliyun => Self::Aliyun(decode(config)?),
            AccessProvider::Aws => Self::Aws(decode(config)?),
            AccessProvider::Azure => Self::Azure(decode(config)?),
            AccessProvider::BaiduCloud => Self::BaiduCloud(decode(config)?),
            AccessProvider::BytePlus => Self::BytePlus(decode(config)?),
            AccessProvider::Cloudflare => Self::Cloudflare(decode(config)?),
            AccessProvider::DogeCloud => Self::DogeCloud(decode(config)?),
            AccessProvider::Edgio => Self::Edgio(decode(config)?),
            AccessProvider::GoDaddy => Self::GoDaddy(decode(config)?),
            AccessProvider::HuaweiCloud => Self::HuaweiCloud(decode(config)?),
            AccessProvider::Kubernetes => Self::Kubernetes(decode(config)?),
            AccessProvider::Local => Self::Local(decode(config)?),
            AccessProvider::NameDotCom => Self::NameDotCom(decode(config)?),
            AccessProvider::NameSilo => Self::NameSilo(decode(config)?),
            AccessProvider::Ns1 => Self::Ns1(decode(config)?),
            AccessProvider::PowerDns => Self::PowerDns(decode(config)?),
            AccessProvider::Qiniu => Self::Qiniu(decode(config)?),
            AccessProvider::Ssh => Self::Ssh(decode(config)?),
            AccessProvider::TencentCloud => Self::TencentCloud(decode(config)?),
            AccessProvider::UCloud => Self::UCloud(decode(config)?),
            AccessProvider::VolcEngine => Self::VolcEngine(decode(config)?),
            AccessProvider::Webhook => Self::Webhook(decode(config)?),
        })
    }

    /// The payload alone, as it is stored in a record's `config` column.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("config")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An access record as stored: tag, payload and usage still unchecked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub config: Value,
    pub usage: String,
}

/// An access record whose payload passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub id: Uuid,
    pub name: String,
    pub config: AccessConfig,
    pub usage: AccessUsage,
}

impl Access {
    pub fn provider(&self) -> AccessProvider {
        self.config.provider()
    }
}

impl AccessRecord {
    /// Validate name, usage and payload together, collecting every problem.
    pub fn validate(&self) -> Result<Access, ValidationErrors> {
        let mut errors = Vec::new();

        if let Err(reason) = check_value(
            &Value::String(self.name.clone()),
            &FieldKind::Text { min: 1, max: 64 },
        ) {
            errors.push(ValidationError::new("name", reason));
        }

        let usage = match self.usage.parse::<AccessUsage>() {
            Ok(usage) => Some(usage),
            Err(_) => {
                errors.push(ValidationError::new(
                    "usage",
                    Reason::NotOneOf {
                        allowed: vec!["apply".into(), "deploy".into(), "all".into()],
                    },
                ));
                None
            }
        };

        let config = match validate_access(&self.provider, &self.config) {
            Ok(config) => Some(config),
            Err(e) => {
                errors.extend(e);
                None
            }
        };

        if let (Some(usage), Some(config)) = (usage, &config) {
            let capability = ProviderRegistry::global().access(config.provider()).usage;
            if !capability.permits(usage) {
                errors.push(ValidationError::invalid(
                    "usage",
                    format!("provider '{}' only supports '{}'", config.provider(), capability),
                ));
            }
        }

        match (usage, config) {
            (Some(usage), Some(config)) if errors.is_empty() => Ok(Access {
                id: self.id,
                name: self.name.clone(),
                config,
                usage,
            }),
            _ => Err(ValidationErrors(errors)),
        }
    }
}

/// Validate a raw payload against `provider`'s schema and decode it.
///
/// An unknown tag is itself a validation error on `provider`.
pub fn validate_access(provider: &str, config: &Value) -> Result<AccessConfig, ValidationErrors> {
    let descriptor = ProviderRegistry::global()
        .describe(provider)
        .map_err(|_| ValidationErrors(vec![ValidationError::new("provider", Reason::UnknownProvider)]))?;

    let mut errors = check_fields(config, descriptor.fields);
    errors.extend(cross_field_rules(descriptor.provider, config));
    if !errors.is_empty() {
        tracing::debug!(provider, count = errors.len(), "access payload rejected");
        return Err(ValidationErrors(errors));
    }

    AccessConfig::from_parts(descriptor.provider, config)
        .map_err(|e| ValidationErrors(vec![ValidationError::invalid("config", e.to_string())]))
}

fn cross_field_rules(provider: AccessProvider, config: &Value) -> Vec<ValidationError> {
    let filled = |key: &str| {
        config
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };

    match provider {
        AccessProvider::Ssh if !filled("password") && !filled("key") => vec![
            ValidationError::invalid("password", "either a password or a private key is required"),
            ValidationError::invalid("key", "either a password or a private key is required"),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// One representative, fully populated payload per provider.
    fn sample(provider: AccessProvider) -> Value {
        match provider {
            AccessProvider::AcmeHttpReq => json!({ "endpoint": "https://acme.example.com/present", "mode": "RAW", "username": "u", "password": "p" }),
            AccessProvider::Aliyun => json!({ "accessKeyId": "id", "accessKeySecret": "secret" }),
            AccessProvider::Aws => json!({ "accessKeyId": "id", "secretAccessKey": "secret", "region": "us-east-1", "hostedZoneId": "Z1" }),
            AccessProvider::Azure => json!({ "tenantId": "t", "clientId": "c", "clientSecret": "s", "environment": "public" }),
            AccessProvider::BaiduCloud | AccessProvider::VolcEngine => json!({ "accessKeyId": "id", "secretAccessKey": "secret" }),
            AccessProvider::BytePlus | AccessProvider::DogeCloud | AccessProvider::Qiniu => json!({ "accessKey": "ak", "secretKey": "sk" }),
            AccessProvider::Cloudflare => json!({ "dnsApiToken": "token", "zoneApiToken": "zone" }),
            AccessProvider::Edgio => json!({ "clientId": "c", "clientSecret": "s" }),
            AccessProvider::GoDaddy => json!({ "apiKey": "k", "apiSecret": "s" }),
            AccessProvider::HuaweiCloud => json!({ "accessKeyId": "id", "secretAccessKey": "secret", "region": "cn-north-4" }),
            AccessProvider::Kubernetes => json!({ "kubeConfig": "apiVersion: v1\nkind: Config\nclusters: []\n" }),
            AccessProvider::Local => json!({}),
            AccessProvider::NameDotCom => json!({ "username": "u", "apiToken": "t" }),
            AccessProvider::NameSilo | AccessProvider::Ns1 => json!({ "apiKey": "k" }),
            AccessProvider::PowerDns => json!({ "apiUrl": "https://pdns.example.com", "apiKey": "k" }),
            AccessProvider::Ssh => json!({ "host": "10.0.0.1", "port": 22, "username": "root", "password": "pw", "key": "-----BEGIN-----", "keyPassphrase": "pp" }),
            AccessProvider::TencentCloud => json!({ "secretId": "id", "secretKey": "key" }),
            AccessProvider::UCloud => json!({ "privateKey": "pk", "publicKey": "pub", "projectId": "org-1" }),
            AccessProvider::Webhook => json!({ "url": "https://hooks.example.com/deploy" }),
        }
    }

    #[test]
    fn every_provider_round_trips_losslessly() {
        for provider in AccessProvider::ALL {
            let payload = sample(provider);
            let config = validate_access(provider.as_str(), &payload)
                .unwrap_or_else(|e| panic!("{provider}: {e}"));
            assert_eq!(config.provider(), provider);

            let encoded = serde_json::to_string(&config).unwrap();
            let decoded: AccessConfig = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, config, "{provider}");
            assert_eq!(config.to_payload().unwrap(), payload, "{provider}");
        }
    }

    #[test]
    fn removing_any_required_field_fails() {
        let registry = ProviderRegistry::global();
        for provider in AccessProvider::ALL {
            let descriptor = registry.access(provider);
            for spec in descriptor.fields.iter().filter(|f| {
                matches!(f.presence, crate::schema::Presence::Required)
            }) {
                let mut payload = sample(provider);
                payload.as_object_mut().unwrap().remove(spec.name);
                let errors = validate_access(provider.as_str(), &payload).unwrap_err();
                assert_eq!(
                    errors.field(spec.name).map(|e| &e.reason),
                    Some(&Reason::Missing),
                    "{provider}.{}",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn empty_key_violates_minimum_length() {
        let errors = validate_access("byteplus", &json!({ "accessKey": "", "secretKey": "s" })).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.field("accessKey").unwrap().reason, Reason::TooShort { min: 1 });
    }

    #[test]
    fn unknown_provider_is_a_validation_error() {
        let errors = validate_access("fax", &json!({})).unwrap_err();
        assert_eq!(errors.field("provider").unwrap().reason, Reason::UnknownProvider);
    }

    #[test]
    fn ssh_needs_password_or_key() {
        let errors = validate_access("ssh", &json!({ "host": "h", "port": 22, "username": "u" })).unwrap_err();
        assert!(errors.field("password").is_some());
        assert!(errors.field("key").is_some());

        let ok = validate_access("ssh", &json!({ "host": "h", "port": 22, "username": "u", "key": "PEM" }));
        assert!(ok.is_ok());
    }

    #[test]
    fn ssh_port_is_bounded() {
        let errors = validate_access("ssh", &json!({ "host": "h", "port": 70000, "username": "u", "password": "p" })).unwrap_err();
        assert_eq!(errors.field("port").unwrap().reason, Reason::OutOfRange { min: 1, max: 65535 });
    }

    #[test]
    fn kubeconfig_is_optional_but_must_parse() {
        assert!(validate_access("k8s", &json!({})).is_ok());
        assert!(validate_access("k8s", &json!({ "kubeConfig": "" })).is_ok());
        let errors = validate_access("k8s", &json!({ "kubeConfig": "clusters: [" })).unwrap_err();
        assert!(errors.field("kubeConfig").is_some());
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let config = validate_access("webhook", &json!({ "url": "https://x.example", "legacy": true })).unwrap();
        assert_eq!(config.to_payload().unwrap(), json!({ "url": "https://x.example" }));
    }

    #[test]
    fn record_usage_must_fit_provider_capability() {
        let record = AccessRecord {
            id: Uuid::new_v4(),
            name: "cf".into(),
            provider: "cloudflare".into(),
            config: json!({ "dnsApiToken": "t" }),
            usage: "deploy".into(),
        };
        let errors = record.validate().unwrap_err();
        assert!(errors.field("usage").is_some());

        let record = AccessRecord { usage: "apply".into(), ..record };
        let access = record.validate().unwrap();
        assert_eq!(access.provider(), AccessProvider::Cloudflare);
        assert_eq!(access.usage, AccessUsage::Apply);
    }
}
