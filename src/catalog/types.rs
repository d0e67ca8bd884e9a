//! Domain types and wire DTOs for the landmark catalog.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::Retryable;

/// Errors returned while interacting with the landmark catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Catalog responded with an unexpected status code.
    #[error("Unexpected catalog response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Identifier did not match the `LP-XXXXX` shape after normalization.
    #[error("Invalid landmark id: {0}")]
    InvalidId(String),
}

impl Retryable for CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_timeout() || error.is_connect() || error.is_request()
            }
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidId(_) => false,
        }
    }
}

fn lp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^LP-\d{5}$").expect("valid landmark id regex"))
}

/// Normalized landmark identifier (`LP-XXXXX`).
///
/// The catalog is the source of truth for these values; once normalized the string is
/// used verbatim in vector IDs and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LandmarkId(String);

impl LandmarkId {
    /// Normalize a raw identifier: trim, uppercase, and verify the `LP-XXXXX` shape.
    pub fn normalize(raw: &str) -> Result<Self, CatalogError> {
        let candidate = raw.trim().to_uppercase();
        if lp_regex().is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(CatalogError::InvalidId(raw.to_string()))
        }
    }

    /// Borrow the normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an un-normalized identifier.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A designated landmark as described by the catalog.
#[derive(Debug, Clone)]
pub struct Landmark {
    /// Normalized identifier.
    pub id: LandmarkId,
    /// Display name.
    pub name: String,
    /// Borough, when recorded.
    pub borough: Option<String>,
    /// Neighborhood, when recorded.
    pub neighborhood: Option<String>,
    /// Object type (e.g. "Individual Landmark").
    pub object_type: Option<String>,
    /// Architect of record.
    pub architect: Option<String>,
    /// Architectural style.
    pub style: Option<String>,
    /// Designation date as reported by the provider.
    pub designation_date: Option<String>,
    /// Latitude, when geocoded.
    pub lat: Option<f64>,
    /// Longitude, when geocoded.
    pub lon: Option<f64>,
    /// URL of the designation-report PDF, when published.
    pub pdf_report_url: Option<String>,
    /// Whether the registry holds a photo for the landmark.
    pub has_photo: bool,
}

/// A building associated with a landmark. All fields are provider-optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    /// Borough-block-lot identifier.
    pub bbl: Option<String>,
    /// Building identification number.
    pub bin: Option<String>,
    /// Tax block.
    pub block: Option<String>,
    /// Tax lot.
    pub lot: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Building name, when distinct from the landmark name.
    pub name: Option<String>,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lon: Option<f64>,
    /// Landmark the building belongs to, used for case-insensitive correlation.
    #[serde(alias = "lpNumber")]
    pub lp_number: Option<String>,
}

/// PLUTO tax-lot record for a landmark. Zero or one per landmark.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlutoRecord {
    /// Construction year.
    pub year_built: Option<String>,
    /// Land-use category.
    pub land_use: Option<String>,
    /// Historic district, when applicable.
    pub historic_district: Option<String>,
    /// Zoning district.
    #[serde(alias = "zoneDist")]
    pub zoning: Option<String>,
    /// Lot area in square feet.
    pub lot_area: Option<String>,
}

/// Reference to a Wikipedia article associated with a landmark.
#[derive(Debug, Clone)]
pub struct WikipediaArticleRef {
    /// Owning landmark.
    pub landmark_id: LandmarkId,
    /// Article URL.
    pub url: String,
    /// Article title.
    pub title: String,
}

// Wire DTOs. The provider serializes camelCase and omits absent fields.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LpcReportPage {
    #[serde(default)]
    pub(crate) total: Option<u64>,
    #[serde(default)]
    pub(crate) results: Vec<LpcReportDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LpcReportDto {
    pub(crate) lp_number: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) borough: Option<String>,
    #[serde(default)]
    pub(crate) neighborhood: Option<String>,
    #[serde(default)]
    pub(crate) object_type: Option<String>,
    #[serde(default)]
    pub(crate) architect: Option<String>,
    #[serde(default)]
    pub(crate) style: Option<String>,
    #[serde(default)]
    pub(crate) date_designated: Option<String>,
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    #[serde(default)]
    pub(crate) pdf_report_url: Option<String>,
    #[serde(default)]
    pub(crate) photo_status: Option<bool>,
    /// Buildings embedded in the detail response, used as the fallback source.
    #[serde(default)]
    pub(crate) landmarks: Option<Vec<serde_json::Value>>,
}

impl LpcReportDto {
    pub(crate) fn into_landmark(self) -> Result<Landmark, CatalogError> {
        let id = LandmarkId::normalize(&self.lp_number)?;
        Ok(Landmark {
            name: self.name.unwrap_or_else(|| id.as_str().to_string()),
            borough: self.borough,
            neighborhood: self.neighborhood,
            object_type: self.object_type,
            architect: self.architect,
            style: self.style,
            designation_date: self.date_designated,
            lat: self.lat,
            lon: self.lon,
            pdf_report_url: self.pdf_report_url,
            has_photo: self.photo_status.unwrap_or(false),
            id,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebContentDto {
    #[serde(default)]
    pub(crate) lp_number: Option<String>,
    #[serde(default)]
    pub(crate) url: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) record_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_validates() {
        let id = LandmarkId::normalize(" lp-00001 ").expect("valid id");
        assert_eq!(id.as_str(), "LP-00001");

        assert!(LandmarkId::normalize("LP-1").is_err());
        assert!(LandmarkId::normalize("XX-00001").is_err());
        assert!(LandmarkId::normalize("LP-000011").is_err());
    }

    #[test]
    fn matches_is_case_insensitive() {
        let id = LandmarkId::normalize("LP-00079").expect("valid id");
        assert!(id.matches("lp-00079"));
        assert!(id.matches(" LP-00079 "));
        assert!(!id.matches("LP-00080"));
    }

    #[test]
    fn status_errors_classify_transience() {
        let server_side = CatalogError::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(server_side.is_transient());

        let client_side = CatalogError::UnexpectedStatus {
            status: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        assert!(!client_side.is_transient());

        assert!(!CatalogError::InvalidId("nope".into()).is_transient());
    }

    #[test]
    fn report_dto_maps_to_landmark() {
        let dto: LpcReportDto = serde_json::from_value(serde_json::json!({
            "lpNumber": "lp-00009",
            "name": "Brooklyn Bridge",
            "borough": "Brooklyn",
            "photoStatus": true,
            "pdfReportUrl": "https://example.org/LP-00009.pdf"
        }))
        .expect("dto");

        let landmark = dto.into_landmark().expect("landmark");
        assert_eq!(landmark.id.as_str(), "LP-00009");
        assert_eq!(landmark.name, "Brooklyn Bridge");
        assert!(landmark.has_photo);
        assert_eq!(
            landmark.pdf_report_url.as_deref(),
            Some("https://example.org/LP-00009.pdf")
        );
    }
}
