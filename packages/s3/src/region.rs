//! Known S3 regions and their endpoints.
//!
//! A region code that is not listed here is a configuration error: the
//! deployer refuses to build a client for it, so no request is ever sent to
//! a made-up endpoint.

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// An S3 region the deployer can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Region {
    #[strum(serialize = "us-east-1")]
    UsEast1,
    #[strum(serialize = "us-east-2")]
    UsEast2,
    #[strum(serialize = "us-west-1")]
    UsWest1,
    #[strum(serialize = "us-west-2")]
    UsWest2,
    #[strum(serialize = "us-gov-east-1")]
    UsGovEast1,
    #[strum(serialize = "us-gov-west-1")]
    UsGovWest1,
    #[strum(serialize = "af-south-1")]
    AfSouth1,
    #[strum(serialize = "ap-east-1")]
    ApEast1,
    #[strum(serialize = "ap-south-1")]
    ApSouth1,
    #[strum(serialize = "ap-south-2")]
    ApSouth2,
    #[strum(serialize = "ap-southeast-1")]
    ApSoutheast1,
    #[strum(serialize = "ap-southeast-2")]
    ApSoutheast2,
    #[strum(serialize = "ap-southeast-3")]
    ApSoutheast3,
    #[strum(serialize = "ap-southeast-4")]
    ApSoutheast4,
    #[strum(serialize = "ap-northeast-1")]
    ApNortheast1,
    #[strum(serialize = "ap-northeast-2")]
    ApNortheast2,
    #[strum(serialize = "ap-northeast-3")]
    ApNortheast3,
    #[strum(serialize = "ca-central-1")]
    CaCentral1,
    #[strum(serialize = "ca-west-1")]
    CaWest1,
    #[strum(serialize = "cn-north-1")]
    CnNorth1,
    #[strum(serialize = "cn-northwest-1")]
    CnNorthwest1,
    #[strum(serialize = "eu-central-1")]
    EuCentral1,
    #[strum(serialize = "eu-central-2")]
    EuCentral2,
    #[strum(serialize = "eu-west-1")]
    EuWest1,
    #[strum(serialize = "eu-west-2")]
    EuWest2,
    #[strum(serialize = "eu-west-3")]
    EuWest3,
    #[strum(serialize = "eu-north-1")]
    EuNorth1,
    #[strum(serialize = "eu-south-1")]
    EuSouth1,
    #[strum(serialize = "eu-south-2")]
    EuSouth2,
    #[strum(serialize = "il-central-1")]
    IlCentral1,
    #[strum(serialize = "me-central-1")]
    MeCentral1,
    #[strum(serialize = "me-south-1")]
    MeSouth1,
    #[strum(serialize = "sa-east-1")]
    SaEast1,
}

impl Region {
    /// Parses a region code such as `"eu-west-1"` (case-insensitive,
    /// surrounding whitespace ignored).
    #[must_use]
    pub fn resolve(code: &str) -> Option<Self> {
        code.trim().parse().ok()
    }

    /// Returns the canonical region code.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// Returns the regional S3 endpoint URL.
    #[must_use]
    pub fn endpoint(self) -> String {
        let code = self.code();
        if matches!(self, Self::CnNorth1 | Self::CnNorthwest1) {
            format!("https://s3.{code}.amazonaws.com.cn")
        } else {
            format!("https://s3.{code}.amazonaws.com")
        }
    }
}
