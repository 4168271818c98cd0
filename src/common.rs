/// Common types and utilities shared across handlers and services
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ApiError;

/// Date range parameters for filtering queries (`YYYY-MM-DD`, both inclusive)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRangeParams {
    /// Parses both bounds; a missing bound stays open.
    pub fn to_date_range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ApiError> {
        let start = self
            .start_date
            .as_deref()
            .map(|raw| parse_date("start", raw))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|raw| parse_date("end", raw))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ApiError::ValidationError(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }

        Ok((start, end))
    }
}

fn parse_date(which: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ApiError::ValidationError(format!("Invalid {} date format: {}", which, e)))
}

/// Document number: `<PREFIX>-<YYYYMMDD>-<6 hex>`, e.g. `PO-20240315-3FA2C1`.
pub fn generate_document_number(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_ascii_uppercase();
    format!("{}-{}-{}", prefix, Utc::now().format("%Y%m%d"), suffix)
}

/// Trims and upper-cases a warehouse/bin/item code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_numbers_carry_prefix_and_date() {
        let number = generate_document_number("GRN");
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "GRN");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(number, generate_document_number("GRN"));
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let params = DateRangeParams {
            start_date: Some("2024-03-10".into()),
            end_date: Some("2024-03-01".into()),
        };
        assert!(params.to_date_range().is_err());

        let open = DateRangeParams {
            start_date: Some("2024-03-01".into()),
            end_date: None,
        };
        let (start, end) = open.to_date_range().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(end.is_none());
    }

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize_code("  main-wh "), "MAIN-WH");
    }
}
