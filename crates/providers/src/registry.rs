//! The provider catalog.
//!
//! Three closed enumerations make up the catalog:
//! - [`AccessProvider`]: credential shapes an access record can hold.
//! - [`ApplyDnsProvider`]: DNS APIs able to solve a DNS-01 challenge.
//! - [`DeployProvider`]: targets a certificate can be deployed to.
//!
//! Every apply/deploy provider is bound to exactly one access provider; the
//! part of its tag before the first `-` is always that access provider's tag.
//! [`ProviderRegistry::global`] builds the lookup tables once per process.
//!
//! NOTICE: keep each list in ASCII order of its tags.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderKind, UnknownProviderError};
use crate::schema::{
    FieldKind, FieldSpec, BLOB, COMMAND, IDENT, KEY, OPT_KEY, PATH, PORT,
};

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

/// What an access credential may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessUsage {
    /// Solving DNS-01 challenges while applying for a certificate.
    Apply,
    /// Hosting or deploying issued certificates.
    Deploy,
    /// Both of the above.
    All,
}

impl AccessUsage {
    /// Whether a credential classified as `self` may serve `need`.
    pub fn permits(self, need: AccessUsage) -> bool {
        self == AccessUsage::All || self == need
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Deploy => "deploy",
            Self::All => "all",
        }
    }
}

impl fmt::Display for AccessUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessUsage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Self::Apply),
            "deploy" => Ok(Self::Deploy),
            "all" => Ok(Self::All),
            other => Err(format!("unknown access usage: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessProvider {
    #[serde(rename = "acmehttpreq")]
    AcmeHttpReq,
    #[serde(rename = "aliyun")]
    Aliyun,
    #[serde(rename = "aws")]
    Aws,
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "baiducloud")]
    BaiduCloud,
    #[serde(rename = "byteplus")]
    BytePlus,
    #[serde(rename = "cloudflare")]
    Cloudflare,
    #[serde(rename = "dogecloud")]
    DogeCloud,
    #[serde(rename = "edgio")]
    Edgio,
    #[serde(rename = "godaddy")]
    GoDaddy,
    #[serde(rename = "huaweicloud")]
    HuaweiCloud,
    #[serde(rename = "k8s")]
    Kubernetes,
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "namedotcom")]
    NameDotCom,
    #[serde(rename = "namesilo")]
    NameSilo,
    #[serde(rename = "ns1")]
    Ns1,
    #[serde(rename = "powerdns")]
    PowerDns,
    #[serde(rename = "qiniu")]
    Qiniu,
    #[serde(rename = "ssh")]
    Ssh,
    #[serde(rename = "tencentcloud")]
    TencentCloud,
    #[serde(rename = "ucloud")]
    UCloud,
    #[serde(rename = "volcengine")]
    VolcEngine,
    #[serde(rename = "webhook")]
    Webhook,
}

impl AccessProvider {
    pub const ALL: [AccessProvider; 23] = [
        Self::AcmeHttpReq,
        Self::Aliyun,
        Self::Aws,
        Self::Azure,
        Self::BaiduCloud,
        Self::BytePlus,
        Self::Cloudflare,
        Self::DogeCloud,
        Self::Edgio,
        Self::GoDaddy,
        Self::HuaweiCloud,
        Self::Kubernetes,
        Self::Local,
        Self::NameDotCom,
        Self::NameSilo,
        Self::Ns1,
        Self::PowerDns,
        Self::Qiniu,
        Self::Ssh,
        Self::TencentCloud,
        Self::UCloud,
        Self::VolcEngine,
        Self::Webhook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcmeHttpReq => "acmehttpreq",
            Self::Aliyun => "aliyun",
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::BaiduCloud => "baiducloud",
            Self::BytePlus => "byteplus",
            Self::Cloudflare => "cloudflare",
            Self::DogeCloud => "dogecloud",
            Self::Edgio => "edgio",
            Self::GoDaddy => "godaddy",
            Self::HuaweiCloud => "huaweicloud",
            Self::Kubernetes => "k8s",
            Self::Local => "local",
            Self::NameDotCom => "namedotcom",
            Self::NameSilo => "namesilo",
            Self::Ns1 => "ns1",
            Self::PowerDns => "powerdns",
            Self::Qiniu => "qiniu",
            Self::Ssh => "ssh",
            Self::TencentCloud => "tencentcloud",
            Self::UCloud => "ucloud",
            Self::VolcEngine => "volcengine",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for AccessProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessProvider {
    type Err = UnknownProviderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProviderError::new(ProviderKind::Access, s))
    }
}

// ---------------------------------------------------------------------------
// ApplyDnsProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyDnsProvider {
    #[serde(rename = "acmehttpreq")]
    AcmeHttpReq,
    #[serde(rename = "aliyun-dns")]
    AliyunDns,
    #[serde(rename = "aws-route53")]
    AwsRoute53,
    #[serde(rename = "azure-dns")]
    AzureDns,
    #[serde(rename = "cloudflare")]
    Cloudflare,
    #[serde(rename = "godaddy")]
    GoDaddy,
    #[serde(rename = "huaweicloud-dns")]
    HuaweiCloudDns,
    #[serde(rename = "namedotcom")]
    NameDotCom,
    #[serde(rename = "namesilo")]
    NameSilo,
    #[serde(rename = "ns1")]
    Ns1,
    #[serde(rename = "powerdns")]
    PowerDns,
    #[serde(rename = "tencentcloud-dns")]
    TencentCloudDns,
    #[serde(rename = "volcengine-dns")]
    VolcEngineDns,
}

impl ApplyDnsProvider {
    pub const ALL: [ApplyDnsProvider; 13] = [
        Self::AcmeHttpReq,
        Self::AliyunDns,
        Self::AwsRoute53,
        Self::AzureDns,
        Self::Cloudflare,
        Self::GoDaddy,
        Self::HuaweiCloudDns,
        Self::NameDotCom,
        Self::NameSilo,
        Self::Ns1,
        Self::PowerDns,
        Self::TencentCloudDns,
        Self::VolcEngineDns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcmeHttpReq => "acmehttpreq",
            Self::AliyunDns => "aliyun-dns",
            Self::AwsRoute53 => "aws-route53",
            Self::AzureDns => "azure-dns",
            Self::Cloudflare => "cloudflare",
            Self::GoDaddy => "godaddy",
            Self::HuaweiCloudDns => "huaweicloud-dns",
            Self::NameDotCom => "namedotcom",
            Self::NameSilo => "namesilo",
            Self::Ns1 => "ns1",
            Self::PowerDns => "powerdns",
            Self::TencentCloudDns => "tencentcloud-dns",
            Self::VolcEngineDns => "volcengine-dns",
        }
    }

    /// Tags older workflows stored before the `-dns` suffixes existed.
    fn from_legacy(tag: &str) -> Option<Self> {
        match tag {
            "aliyun" => Some(Self::AliyunDns),
            "aws" => Some(Self::AwsRoute53),
            "huaweicloud" => Some(Self::HuaweiCloudDns),
            "tencentcloud" => Some(Self::TencentCloudDns),
            "volcengine" => Some(Self::VolcEngineDns),
            _ => None,
        }
    }
}

impl fmt::Display for ApplyDnsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DeployProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployProvider {
    #[serde(rename = "aliyun-alb")]
    AliyunAlb,
    #[serde(rename = "aliyun-cdn")]
    AliyunCdn,
    #[serde(rename = "aliyun-clb")]
    AliyunClb,
    #[serde(rename = "aliyun-dcdn")]
    AliyunDcdn,
    #[serde(rename = "aliyun-live")]
    AliyunLive,
    #[serde(rename = "aliyun-nlb")]
    AliyunNlb,
    #[serde(rename = "aliyun-oss")]
    AliyunOss,
    #[serde(rename = "baiducloud-cdn")]
    BaiduCloudCdn,
    #[serde(rename = "byteplus-cdn")]
    BytePlusCdn,
    #[serde(rename = "dogecloud-cdn")]
    DogeCloudCdn,
    #[serde(rename = "edgio-applications")]
    EdgioApplications,
    #[serde(rename = "huaweicloud-cdn")]
    HuaweiCloudCdn,
    #[serde(rename = "huaweicloud-elb")]
    HuaweiCloudElb,
    #[serde(rename = "k8s-secret")]
    KubernetesSecret,
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "qiniu-cdn")]
    QiniuCdn,
    #[serde(rename = "ssh")]
    Ssh,
    #[serde(rename = "tencentcloud-cdn")]
    TencentCloudCdn,
    #[serde(rename = "tencentcloud-clb")]
    TencentCloudClb,
    #[serde(rename = "tencentcloud-cos")]
    TencentCloudCos,
    #[serde(rename = "tencentcloud-css")]
    TencentCloudCss,
    #[serde(rename = "tencentcloud-ecdn")]
    TencentCloudEcdn,
    #[serde(rename = "tencentcloud-eo")]
    TencentCloudEo,
    #[serde(rename = "ucloud-ucdn")]
    UCloudUcdn,
    #[serde(rename = "ucloud-us3")]
    UCloudUs3,
    #[serde(rename = "volcengine-cdn")]
    VolcEngineCdn,
    #[serde(rename = "volcengine-clb")]
    VolcEngineClb,
    #[serde(rename = "volcengine-dcdn")]
    VolcEngineDcdn,
    #[serde(rename = "volcengine-live")]
    VolcEngineLive,
    #[serde(rename = "volcengine-tos")]
    VolcEngineTos,
    #[serde(rename = "webhook")]
    Webhook,
}

impl DeployProvider {
    pub const ALL: [DeployProvider; 31] = [
        Self::AliyunAlb,
        Self::AliyunCdn,
        Self::AliyunClb,
        Self::AliyunDcdn,
        Self::AliyunLive,
        Self::AliyunNlb,
        Self::AliyunOss,
        Self::BaiduCloudCdn,
        Self::BytePlusCdn,
        Self::DogeCloudCdn,
        Self::EdgioApplications,
        Self::HuaweiCloudCdn,
        Self::HuaweiCloudElb,
        Self::KubernetesSecret,
        Self::Local,
        Self::QiniuCdn,
        Self::Ssh,
        Self::TencentCloudCdn,
        Self::TencentCloudClb,
        Self::TencentCloudCos,
        Self::TencentCloudCss,
        Self::TencentCloudEcdn,
        Self::TencentCloudEo,
        Self::UCloudUcdn,
        Self::UCloudUs3,
        Self::VolcEngineCdn,
        Self::VolcEngineClb,
        Self::VolcEngineDcdn,
        Self::VolcEngineLive,
        Self::VolcEngineTos,
        Self::Webhook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AliyunAlb => "aliyun-alb",
            Self::AliyunCdn => "aliyun-cdn",
            Self::AliyunClb => "aliyun-clb",
            Self::AliyunDcdn => "aliyun-dcdn",
            Self::AliyunLive => "aliyun-live",
            Self::AliyunNlb => "aliyun-nlb",
            Self::AliyunOss => "aliyun-oss",
            Self::BaiduCloudCdn => "baiducloud-cdn",
            Self::BytePlusCdn => "byteplus-cdn",
            Self::DogeCloudCdn => "dogecloud-cdn",
            Self::EdgioApplications => "edgio-applications",
            Self::HuaweiCloudCdn => "huaweicloud-cdn",
            Self::HuaweiCloudElb => "huaweicloud-elb",
            Self::KubernetesSecret => "k8s-secret",
            Self::Local => "local",
            Self::QiniuCdn => "qiniu-cdn",
            Self::Ssh => "ssh",
            Self::TencentCloudCdn => "tencentcloud-cdn",
            Self::TencentCloudClb => "tencentcloud-clb",
            Self::TencentCloudCos => "tencentcloud-cos",
            Self::TencentCloudCss => "tencentcloud-css",
            Self::TencentCloudEcdn => "tencentcloud-ecdn",
            Self::TencentCloudEo => "tencentcloud-eo",
            Self::UCloudUcdn => "ucloud-ucdn",
            Self::UCloudUs3 => "ucloud-us3",
            Self::VolcEngineCdn => "volcengine-cdn",
            Self::VolcEngineClb => "volcengine-clb",
            Self::VolcEngineDcdn => "volcengine-dcdn",
            Self::VolcEngineLive => "volcengine-live",
            Self::VolcEngineTos => "volcengine-tos",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for DeployProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessProviderDescriptor {
    pub provider: AccessProvider,
    /// Display name.
    pub name: &'static str,
    pub icon: &'static str,
    pub usage: AccessUsage,
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDnsProviderDescriptor {
    pub provider: ApplyDnsProvider,
    pub name: &'static str,
    pub access_provider: AccessProvider,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployProviderDescriptor {
    pub provider: DeployProvider,
    pub name: &'static str,
    pub access_provider: AccessProvider,
    /// Schema of the deploy node's `providerConfig`.
    pub fields: &'static [FieldSpec],
}

// ---------------------------------------------------------------------------
// Access schemas
// ---------------------------------------------------------------------------

const ACME_HTTP_REQ_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("endpoint", FieldKind::Url),
    FieldSpec::optional("mode", FieldKind::OneOf { allowed: &["", "RAW"] }),
    FieldSpec::optional("username", OPT_KEY),
    FieldSpec::optional("password", OPT_KEY),
];

const ALIYUN_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("accessKeyId", KEY),
    FieldSpec::required("accessKeySecret", KEY),
];

const AWS_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("accessKeyId", KEY),
    FieldSpec::required("secretAccessKey", KEY),
    FieldSpec::optional("region", OPT_KEY),
    FieldSpec::optional("hostedZoneId", OPT_KEY),
];

const AZURE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("tenantId", KEY),
    FieldSpec::required("clientId", KEY),
    FieldSpec::required("clientSecret", KEY),
    FieldSpec::optional(
        "environment",
        FieldKind::OneOf { allowed: &["public", "usgovernment", "china"] },
    ),
];

const ACCESS_KEY_ID_SECRET_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("accessKeyId", KEY),
    FieldSpec::required("secretAccessKey", KEY),
];

const ACCESS_KEY_SECRET_KEY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("accessKey", KEY),
    FieldSpec::required("secretKey", KEY),
];

const CLOUDFLARE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("dnsApiToken", KEY),
    FieldSpec::optional("zoneApiToken", OPT_KEY),
];

const EDGIO_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("clientId", KEY),
    FieldSpec::required("clientSecret", KEY),
];

const GODADDY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("apiKey", KEY),
    FieldSpec::required("apiSecret", KEY),
];

const HUAWEICLOUD_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("accessKeyId", KEY),
    FieldSpec::required("secretAccessKey", KEY),
    FieldSpec::optional("region", OPT_KEY),
];

const KUBERNETES_FIELDS: &[FieldSpec] =
    &[FieldSpec::optional("kubeConfig", FieldKind::Yaml { max: 20480 })];

const NAMEDOTCOM_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("username", KEY),
    FieldSpec::required("apiToken", KEY),
];

const API_KEY_FIELDS: &[FieldSpec] = &[FieldSpec::required("apiKey", KEY)];

const POWERDNS_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("apiUrl", FieldKind::Url),
    FieldSpec::required("apiKey", KEY),
];

const SSH_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("host", FieldKind::Text { min: 1, max: 256 }),
    FieldSpec::required("port", PORT),
    FieldSpec::required("username", KEY),
    FieldSpec::optional("password", OPT_KEY),
    FieldSpec::optional("key", BLOB),
    FieldSpec::optional("keyPassphrase", BLOB),
];

const TENCENTCLOUD_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("secretId", KEY),
    FieldSpec::required("secretKey", KEY),
];

const UCLOUD_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("privateKey", KEY),
    FieldSpec::required("publicKey", KEY),
    FieldSpec::optional("projectId", OPT_KEY),
];

const WEBHOOK_FIELDS: &[FieldSpec] = &[FieldSpec::required("url", FieldKind::Url)];

fn access_descriptor(provider: AccessProvider) -> AccessProviderDescriptor {
    use AccessProvider as P;
    use AccessUsage::{All, Apply, Deploy};

    let (name, usage, fields): (&'static str, AccessUsage, &'static [FieldSpec]) = match provider {
        P::AcmeHttpReq => ("HTTP Request (ACME Proxy)", Apply, ACME_HTTP_REQ_FIELDS),
        P::Aliyun => ("Alibaba Cloud", All, ALIYUN_FIELDS),
        P::Aws => ("AWS", Apply, AWS_FIELDS),
        P::Azure => ("Azure", Apply, AZURE_FIELDS),
        P::BaiduCloud => ("Baidu AI Cloud", Deploy, ACCESS_KEY_ID_SECRET_FIELDS),
        P::BytePlus => ("BytePlus", Deploy, ACCESS_KEY_SECRET_KEY_FIELDS),
        P::Cloudflare => ("Cloudflare", Apply, CLOUDFLARE_FIELDS),
        P::DogeCloud => ("DogeCloud", Deploy, ACCESS_KEY_SECRET_KEY_FIELDS),
        P::Edgio => ("Edgio", Deploy, EDGIO_FIELDS),
        P::GoDaddy => ("GoDaddy", Apply, GODADDY_FIELDS),
        P::HuaweiCloud => ("Huawei Cloud", All, HUAWEICLOUD_FIELDS),
        P::Kubernetes => ("Kubernetes", Deploy, KUBERNETES_FIELDS),
        P::Local => ("Local", Deploy, &[]),
        P::NameDotCom => ("Name.com", Apply, NAMEDOTCOM_FIELDS),
        P::NameSilo => ("NameSilo", Apply, API_KEY_FIELDS),
        P::Ns1 => ("NS1", Apply, API_KEY_FIELDS),
        P::PowerDns => ("PowerDNS", Apply, POWERDNS_FIELDS),
        P::Qiniu => ("Qiniu Cloud", Deploy, ACCESS_KEY_SECRET_KEY_FIELDS),
        P::Ssh => ("SSH", Deploy, SSH_FIELDS),
        P::TencentCloud => ("Tencent Cloud", All, TENCENTCLOUD_FIELDS),
        P::UCloud => ("UCloud", Deploy, UCLOUD_FIELDS),
        P::VolcEngine => ("Volcengine", All, ACCESS_KEY_ID_SECRET_FIELDS),
        P::Webhook => ("Webhook", Deploy, WEBHOOK_FIELDS),
    };

    AccessProviderDescriptor {
        provider,
        name,
        icon: icon_path(provider),
        usage,
        fields,
    }
}

fn icon_path(provider: AccessProvider) -> &'static str {
    match provider {
        AccessProvider::AcmeHttpReq => "/imgs/providers/acmehttpreq.svg",
        AccessProvider::Aliyun => "/imgs/providers/aliyun.svg",
        AccessProvider::Aws => "/imgs/providers/aws.svg",
        AccessProvider::Azure => "/imgs/providers/azure.svg",
        AccessProvider::BaiduCloud => "/imgs/providers/baiducloud.svg",
        AccessProvider::BytePlus => "/imgs/providers/byteplus.svg",
        AccessProvider::Cloudflare => "/imgs/providers/cloudflare.svg",
        AccessProvider::DogeCloud => "/imgs/providers/dogecloud.png",
        AccessProvider::Edgio => "/imgs/providers/edgio.svg",
        AccessProvider::GoDaddy => "/imgs/providers/godaddy.svg",
        AccessProvider::HuaweiCloud => "/imgs/providers/huaweicloud.svg",
        AccessProvider::Kubernetes => "/imgs/providers/kubernetes.svg",
        AccessProvider::Local => "/imgs/providers/local.svg",
        AccessProvider::NameDotCom => "/imgs/providers/namecom.svg",
        AccessProvider::NameSilo => "/imgs/providers/namesilo.svg",
        AccessProvider::Ns1 => "/imgs/providers/ns1.svg",
        AccessProvider::PowerDns => "/imgs/providers/powerdns.svg",
        AccessProvider::Qiniu => "/imgs/providers/qiniu.svg",
        AccessProvider::Ssh => "/imgs/providers/ssh.svg",
        AccessProvider::TencentCloud => "/imgs/providers/tencentcloud.svg",
        AccessProvider::UCloud => "/imgs/providers/ucloud.svg",
        AccessProvider::VolcEngine => "/imgs/providers/volcengine.svg",
        AccessProvider::Webhook => "/imgs/providers/webhook.svg",
    }
}

fn apply_dns_descriptor(provider: ApplyDnsProvider) -> ApplyDnsProviderDescriptor {
    use AccessProvider as A;
    use ApplyDnsProvider as P;

    let (name, access_provider) = match provider {
        P::AcmeHttpReq => ("HTTP Request (ACME Proxy)", A::AcmeHttpReq),
        P::AliyunDns => ("Alibaba Cloud - DNS", A::Aliyun),
        P::AwsRoute53 => ("AWS - Route53", A::Aws),
        P::AzureDns => ("Azure - DNS", A::Azure),
        P::Cloudflare => ("Cloudflare", A::Cloudflare),
        P::GoDaddy => ("GoDaddy", A::GoDaddy),
        P::HuaweiCloudDns => ("Huawei Cloud - DNS", A::HuaweiCloud),
        P::NameDotCom => ("Name.com", A::NameDotCom),
        P::NameSilo => ("NameSilo", A::NameSilo),
        P::Ns1 => ("NS1", A::Ns1),
        P::PowerDns => ("PowerDNS", A::PowerDns),
        P::TencentCloudDns => ("Tencent Cloud - DNS", A::TencentCloud),
        P::VolcEngineDns => ("Volcengine - DNS", A::VolcEngine),
    };

    ApplyDnsProviderDescriptor { provider, name, access_provider }
}

// ---------------------------------------------------------------------------
// Deploy schemas
// ---------------------------------------------------------------------------

const DOMAIN_FIELDS: &[FieldSpec] = &[FieldSpec::required("domain", IDENT)];

const REGION_DOMAIN_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("region", IDENT),
    FieldSpec::required("domain", IDENT),
];

const REGION_BUCKET_DOMAIN_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("region", IDENT),
    FieldSpec::required("bucket", IDENT),
    FieldSpec::required("domain", IDENT),
];

const LB_RESOURCE_TYPES: FieldKind = FieldKind::OneOf { allowed: &["loadbalancer", "listener"] };

const ALIYUN_ALB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("resourceType", LB_RESOURCE_TYPES),
    FieldSpec::required("region", IDENT),
    FieldSpec::required_when("loadbalancerId", IDENT, "resourceType", &["loadbalancer"]),
    FieldSpec::required_when("listenerId", IDENT, "resourceType", &["listener"]),
    FieldSpec::optional("domain", FieldKind::Text { min: 0, max: 256 }),
];

const ALIYUN_CLB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("resourceType", LB_RESOURCE_TYPES),
    FieldSpec::required("region", IDENT),
    FieldSpec::required("loadbalancerId", IDENT),
    FieldSpec::required_when("listenerPort", PORT, "resourceType", &["listener"]),
];

const ALIYUN_NLB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("resourceType", LB_RESOURCE_TYPES),
    FieldSpec::required("region", IDENT),
    FieldSpec::required_when("loadbalancerId", IDENT, "resourceType", &["loadbalancer"]),
    FieldSpec::required_when("listenerId", IDENT, "resourceType", &["listener"]),
];

const ALIYUN_OSS_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("endpoint", IDENT),
    FieldSpec::required("bucket", IDENT),
    FieldSpec::required("domain", IDENT),
];

const EDGIO_APPLICATIONS_FIELDS: &[FieldSpec] = &[FieldSpec::required("environmentId", IDENT)];

const HUAWEICLOUD_ELB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(
        "resourceType",
        FieldKind::OneOf { allowed: &["certificate", "loadbalancer", "listener"] },
    ),
    FieldSpec::required("region", IDENT),
    FieldSpec::required_when("certificateId", IDENT, "resourceType", &["certificate"]),
    FieldSpec::required_when("loadbalancerId", IDENT, "resourceType", &["loadbalancer"]),
    FieldSpec::required_when("listenerId", IDENT, "resourceType", &["listener"]),
];

const KUBERNETES_SECRET_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("namespace", IDENT),
    FieldSpec::required("secretName", IDENT),
    FieldSpec::required("secretType", IDENT),
    FieldSpec::required("secretDataKeyForCrt", IDENT),
    FieldSpec::required("secretDataKeyForKey", IDENT),
];

const FORMATS: FieldKind = FieldKind::OneOf { allowed: &["PEM", "PFX", "JKS"] };

const LOCAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("format", FORMATS),
    FieldSpec::required("certPath", PATH),
    FieldSpec::required_when("keyPath", PATH, "format", &["PEM"]),
    FieldSpec::required_when("pfxPassword", KEY, "format", &["PFX"]),
    FieldSpec::required_when("jksAlias", KEY, "format", &["JKS"]),
    FieldSpec::required_when("jksKeypass", KEY, "format", &["JKS"]),
    FieldSpec::required_when("jksStorepass", KEY, "format", &["JKS"]),
    FieldSpec::optional(
        "shellEnv",
        FieldKind::OneOf { allowed: &["", "sh", "cmd", "powershell"] },
    ),
    FieldSpec::optional("preCommand", COMMAND),
    FieldSpec::optional("postCommand", COMMAND),
];

const SSH_DEPLOY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("format", FORMATS),
    FieldSpec::required("certPath", PATH),
    FieldSpec::required_when("keyPath", PATH, "format", &["PEM"]),
    FieldSpec::required_when("pfxPassword", KEY, "format", &["PFX"]),
    FieldSpec::required_when("jksAlias", KEY, "format", &["JKS"]),
    FieldSpec::required_when("jksKeypass", KEY, "format", &["JKS"]),
    FieldSpec::required_when("jksStorepass", KEY, "format", &["JKS"]),
    FieldSpec::optional("preCommand", COMMAND),
    FieldSpec::optional("postCommand", COMMAND),
];

const TENCENTCLOUD_CLB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(
        "resourceType",
        FieldKind::OneOf { allowed: &["ssl-deploy", "loadbalancer", "listener", "ruledomain"] },
    ),
    FieldSpec::required("region", IDENT),
    FieldSpec::required("loadbalancerId", IDENT),
    FieldSpec::required_when("listenerId", IDENT, "resourceType", &["listener", "ruledomain"]),
    FieldSpec::required_when("domain", IDENT, "resourceType", &["ssl-deploy", "ruledomain"]),
];

const TENCENTCLOUD_EO_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("zoneId", IDENT),
    FieldSpec::required("domain", IDENT),
];

const UCLOUD_UCDN_FIELDS: &[FieldSpec] = &[FieldSpec::required("domainId", IDENT)];

const VOLCENGINE_CLB_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("resourceType", FieldKind::OneOf { allowed: &["listener"] }),
    FieldSpec::required("region", IDENT),
    FieldSpec::required("listenerId", IDENT),
];

fn deploy_descriptor(provider: DeployProvider) -> DeployProviderDescriptor {
    use AccessProvider as A;
    use DeployProvider as P;

    let (name, access_provider, fields): (&'static str, AccessProvider, &'static [FieldSpec]) =
        match provider {
            P::AliyunAlb => ("Alibaba Cloud - ALB", A::Aliyun, ALIYUN_ALB_FIELDS),
            P::AliyunCdn => ("Alibaba Cloud - CDN", A::Aliyun, DOMAIN_FIELDS),
            P::AliyunClb => ("Alibaba Cloud - CLB", A::Aliyun, ALIYUN_CLB_FIELDS),
            P::AliyunDcdn => ("Alibaba Cloud - DCDN", A::Aliyun, DOMAIN_FIELDS),
            P::AliyunLive => ("Alibaba Cloud - Live", A::Aliyun, REGION_DOMAIN_FIELDS),
            P::AliyunNlb => ("Alibaba Cloud - NLB", A::Aliyun, ALIYUN_NLB_FIELDS),
            P::AliyunOss => ("Alibaba Cloud - OSS", A::Aliyun, ALIYUN_OSS_FIELDS),
            P::BaiduCloudCdn => ("Baidu AI Cloud - CDN", A::BaiduCloud, DOMAIN_FIELDS),
            P::BytePlusCdn => ("BytePlus - CDN", A::BytePlus, DOMAIN_FIELDS),
            P::DogeCloudCdn => ("DogeCloud - CDN", A::DogeCloud, DOMAIN_FIELDS),
            P::EdgioApplications => {
                ("Edgio - Applications", A::Edgio, EDGIO_APPLICATIONS_FIELDS)
            }
            P::HuaweiCloudCdn => ("Huawei Cloud - CDN", A::HuaweiCloud, REGION_DOMAIN_FIELDS),
            P::HuaweiCloudElb => ("Huawei Cloud - ELB", A::HuaweiCloud, HUAWEICLOUD_ELB_FIELDS),
            P::KubernetesSecret => ("Kubernetes - Secret", A::Kubernetes, KUBERNETES_SECRET_FIELDS),
            P::Local => ("Local", A::Local, LOCAL_FIELDS),
            P::QiniuCdn => ("Qiniu Cloud - CDN", A::Qiniu, DOMAIN_FIELDS),
            P::Ssh => ("SSH", A::Ssh, SSH_DEPLOY_FIELDS),
            P::TencentCloudCdn => ("Tencent Cloud - CDN", A::TencentCloud, DOMAIN_FIELDS),
            P::TencentCloudClb => ("Tencent Cloud - CLB", A::TencentCloud, TENCENTCLOUD_CLB_FIELDS),
            P::TencentCloudCos => {
                ("Tencent Cloud - COS", A::TencentCloud, REGION_BUCKET_DOMAIN_FIELDS)
            }
            P::TencentCloudCss => ("Tencent Cloud - CSS", A::TencentCloud, DOMAIN_FIELDS),
            P::TencentCloudEcdn => ("Tencent Cloud - ECDN", A::TencentCloud, DOMAIN_FIELDS),
            P::TencentCloudEo => ("Tencent Cloud - EdgeOne", A::TencentCloud, TENCENTCLOUD_EO_FIELDS),
            P::UCloudUcdn => ("UCloud - UCDN", A::UCloud, UCLOUD_UCDN_FIELDS),
            P::UCloudUs3 => ("UCloud - US3", A::UCloud, REGION_BUCKET_DOMAIN_FIELDS),
            P::VolcEngineCdn => ("Volcengine - CDN", A::VolcEngine, DOMAIN_FIELDS),
            P::VolcEngineClb => ("Volcengine - CLB", A::VolcEngine, VOLCENGINE_CLB_FIELDS),
            P::VolcEngineDcdn => ("Volcengine - DCDN", A::VolcEngine, DOMAIN_FIELDS),
            P::VolcEngineLive => ("Volcengine - Live", A::VolcEngine, DOMAIN_FIELDS),
            P::VolcEngineTos => ("Volcengine - TOS", A::VolcEngine, REGION_BUCKET_DOMAIN_FIELDS),
            P::Webhook => ("Webhook", A::Webhook, &[]),
        };

    DeployProviderDescriptor { provider, name, access_provider, fields }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Read-only catalog of every known provider.
#[derive(Debug)]
pub struct ProviderRegistry {
    access: Vec<AccessProviderDescriptor>,
    apply_dns: Vec<ApplyDnsProviderDescriptor>,
    deploy: Vec<DeployProviderDescriptor>,
}

impl ProviderRegistry {
    /// The process-wide registry, built on first use.
    pub fn global() -> &'static ProviderRegistry {
        static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    fn builtin() -> Self {
        Self {
            access: AccessProvider::ALL.into_iter().map(access_descriptor).collect(),
            apply_dns: ApplyDnsProvider::ALL.into_iter().map(apply_dns_descriptor).collect(),
            deploy: DeployProvider::ALL.into_iter().map(deploy_descriptor).collect(),
        }
    }

    /// Describe an access provider by its tag.
    pub fn describe(&self, tag: &str) -> Result<&AccessProviderDescriptor, UnknownProviderError> {
        self.access
            .iter()
            .find(|d| d.provider.as_str() == tag)
            .ok_or_else(|| UnknownProviderError::new(ProviderKind::Access, tag))
    }

    /// Describe an already-parsed access provider.
    pub fn access(&self, provider: AccessProvider) -> &AccessProviderDescriptor {
        // Built from `AccessProvider::ALL`, so declaration order is index order.
        &self.access[provider as usize]
    }

    /// Access providers whose capability covers `usage`, in catalog order.
    pub fn list_by_usage(&self, usage: AccessUsage) -> Vec<&AccessProviderDescriptor> {
        self.access.iter().filter(|d| d.usage.permits(usage)).collect()
    }

    pub fn access_providers(&self) -> &[AccessProviderDescriptor] {
        &self.access
    }

    pub fn apply_dns_providers(&self) -> &[ApplyDnsProviderDescriptor] {
        &self.apply_dns
    }

    pub fn deploy_providers(&self) -> &[DeployProviderDescriptor] {
        &self.deploy
    }

    /// Resolve an apply-DNS tag, honouring legacy aliases.
    pub fn apply_dns(&self, tag: &str) -> Result<&ApplyDnsProviderDescriptor, UnknownProviderError> {
        let provider = ApplyDnsProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == tag)
            .or_else(|| ApplyDnsProvider::from_legacy(tag))
            .ok_or_else(|| UnknownProviderError::new(ProviderKind::ApplyDns, tag))?;
        Ok(&self.apply_dns[provider as usize])
    }

    /// Resolve a deploy tag.
    ///
    /// A bare access-provider tag is accepted as an alias when that access
    /// provider has exactly one deploy target (`byteplus` → `byteplus-cdn`).
    pub fn deploy(&self, tag: &str) -> Result<&DeployProviderDescriptor, UnknownProviderError> {
        if let Some(d) = self.deploy.iter().find(|d| d.provider.as_str() == tag) {
            return Ok(d);
        }

        let unknown = || UnknownProviderError::new(ProviderKind::Deploy, tag);
        let access: AccessProvider = tag.parse().map_err(|_| unknown())?;
        let mut targets = self.deploy_targets(access);
        match (targets.next(), targets.next()) {
            (Some(only), None) => Ok(only),
            _ => Err(unknown()),
        }
    }

    /// Deploy targets reachable with credentials of `access`.
    pub fn deploy_targets(
        &self,
        access: AccessProvider,
    ) -> impl Iterator<Item = &DeployProviderDescriptor> {
        self.deploy.iter().filter(move |d| d.access_provider == access)
    }
}
