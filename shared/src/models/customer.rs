//! Customer Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Prefix of free-form ids issued by the first version of the app (`CUST_<anything>`)
pub const LEGACY_PREFIX: &str = "CUST_";
/// Prefix of ids assigned at creation time (`CUST-<millis>-<suffix>`)
pub const CURRENT_PREFIX: &str = "CUST-";
/// Prefix of ids assigned by the migration (`CUST00042`)
pub const SEQUENTIAL_PREFIX: &str = "CUST";
/// Minimum digit count of a sequential id
pub const SEQUENTIAL_WIDTH: usize = 5;
/// Length of the random suffix of a current-format id
pub const CURRENT_SUFFIX_LEN: usize = 9;

/// Customer entity (客户)
///
/// `id` is the backend document id; `customer_id` is the human-facing number
/// printed on invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default)]
    pub id: String,
    pub customer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub mobile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CustomerRecord {
    /// Soft-deleted records stay readable by id but drop out of default listings
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn id_format(&self) -> CustomerIdFormat {
        CustomerIdFormat::classify(&self.customer_id)
    }
}

/// Create customer payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Address must be less than 500 characters"))]
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub dl_no: Option<String>,
    pub state_code: Option<String>,
    #[validate(custom(function = "validate_mobile"))]
    pub mobile: String,
}

/// Update customer payload
///
/// Absent fields are left untouched. `customer_id` is normally written only by
/// the migration routine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "Address must be less than 500 characters"))]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dl_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_mobile"))]
    pub mobile: Option<String>,
}

impl CustomerUpdate {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.name.is_none()
            && self.address.is_none()
            && self.gstin.is_none()
            && self.dl_no.is_none()
            && self.state_code.is_none()
            && self.mobile.is_none()
    }
}

/// Indian mobile number: 10 digits, first digit 6-9.
pub fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    let bytes = mobile.as_bytes();
    let valid = bytes.len() == 10
        && matches!(bytes[0], b'6'..=b'9')
        && bytes.iter().all(u8::is_ascii_digit);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("mobile_format").with_message("Invalid mobile number format".into()))
    }
}

// ── customer_id formats ─────────────────────────────────────────────

/// Which generation of `customer_id` a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerIdFormat {
    /// `CUST_` + free-form suffix, needs migration
    Legacy,
    /// `CUST-` + millis + `-` + random suffix
    Current,
    /// `CUST` + zero-padded counter
    Sequential,
    Unknown,
}

impl CustomerIdFormat {
    pub fn classify(customer_id: &str) -> Self {
        if customer_id.starts_with(LEGACY_PREFIX) {
            return Self::Legacy;
        }
        if let Some(rest) = customer_id.strip_prefix(CURRENT_PREFIX) {
            return match rest.split_once('-') {
                Some((millis, suffix))
                    if !millis.is_empty()
                        && millis.bytes().all(|b| b.is_ascii_digit())
                        && !suffix.is_empty()
                        && suffix.bytes().all(|b| b.is_ascii_alphanumeric()) =>
                {
                    Self::Current
                }
                _ => Self::Unknown,
            };
        }
        match customer_id.strip_prefix(SEQUENTIAL_PREFIX) {
            Some(digits)
                if digits.len() >= SEQUENTIAL_WIDTH && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                Self::Sequential
            }
            _ => Self::Unknown,
        }
    }
}

/// Whether a `customer_id` still uses the legacy `CUST_` prefix
pub fn is_legacy_customer_id(customer_id: &str) -> bool {
    customer_id.starts_with(LEGACY_PREFIX)
}

/// `CUST` + counter zero-padded to five digits (`CUST00042`); wider counters are not truncated
pub fn sequential_customer_id(counter: u64) -> String {
    format!("{SEQUENTIAL_PREFIX}{counter:0width$}", width = SEQUENTIAL_WIDTH)
}

/// Parse the counter back out of a sequential id
pub fn parse_sequential_customer_id(customer_id: &str) -> Option<u64> {
    match CustomerIdFormat::classify(customer_id) {
        CustomerIdFormat::Sequential => customer_id[SEQUENTIAL_PREFIX.len()..].parse().ok(),
        _ => None,
    }
}

/// Fresh creation-time id: `CUST-<unix millis>-<9 base36 chars>`
///
/// Unique in practice only; two ids drawn in the same millisecond collide with
/// probability 36^-9.
pub fn generate_customer_id() -> String {
    format!(
        "{CURRENT_PREFIX}{}-{}",
        crate::util::now_millis(),
        crate::util::random_base36(CURRENT_SUFFIX_LEN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, mobile: &str) -> CustomerForm {
        CustomerForm {
            name: name.to_string(),
            mobile: mobile.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mobile_validation() {
        assert!(validate_mobile("9876543210").is_ok());
        assert!(validate_mobile("6000000000").is_ok());
        assert!(validate_mobile("5876543210").is_err());
        assert!(validate_mobile("987654321").is_err());
        assert!(validate_mobile("98765432101").is_err());
        assert!(validate_mobile("98765x3210").is_err());
        assert!(validate_mobile("").is_err());
    }

    #[test]
    fn test_form_validation() {
        assert!(form("Ravi Traders", "9876543210").validate().is_ok());
        assert!(form("", "9876543210").validate().is_err());
        assert!(form(&"x".repeat(101), "9876543210").validate().is_err());
        assert!(form(&"x".repeat(100), "9876543210").validate().is_ok());

        let errors = form("Ravi", "12345").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("mobile"));

        let mut long_address = form("Ravi", "9876543210");
        long_address.address = Some("a".repeat(501));
        assert!(long_address.validate().is_err());
    }

    #[test]
    fn test_update_validation_only_checks_present_fields() {
        assert!(CustomerUpdate::default().validate().is_ok());
        assert!(CustomerUpdate::default().is_empty());

        let update = CustomerUpdate {
            mobile: Some("123".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = CustomerUpdate {
            name: Some("New Name".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert!(!update.is_empty());
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = CustomerUpdate {
            address: Some("12 MG Road".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["address"], "12 MG Road");
    }

    #[test]
    fn test_classify_customer_id() {
        assert_eq!(CustomerIdFormat::classify("CUST_abc123"), CustomerIdFormat::Legacy);
        assert_eq!(CustomerIdFormat::classify("CUST_"), CustomerIdFormat::Legacy);
        assert_eq!(
            CustomerIdFormat::classify("CUST-1700000000000-k3j9x0a1b"),
            CustomerIdFormat::Current
        );
        assert_eq!(CustomerIdFormat::classify("CUST00042"), CustomerIdFormat::Sequential);
        assert_eq!(CustomerIdFormat::classify("CUST123456"), CustomerIdFormat::Sequential);
        assert_eq!(CustomerIdFormat::classify("CUST0042"), CustomerIdFormat::Unknown);
        assert_eq!(CustomerIdFormat::classify("CUST-abc"), CustomerIdFormat::Unknown);
        assert_eq!(CustomerIdFormat::classify("X42"), CustomerIdFormat::Unknown);
    }

    #[test]
    fn test_sequential_customer_id() {
        assert_eq!(sequential_customer_id(1), "CUST00001");
        assert_eq!(sequential_customer_id(99999), "CUST99999");
        assert_eq!(sequential_customer_id(100000), "CUST100000");
        assert_eq!(parse_sequential_customer_id("CUST00042"), Some(42));
        assert_eq!(parse_sequential_customer_id("CUST_00042"), None);
    }

    #[test]
    fn test_generate_customer_id() {
        let id = generate_customer_id();
        assert_eq!(CustomerIdFormat::classify(&id), CustomerIdFormat::Current);
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), CURRENT_SUFFIX_LEN);
        assert!(!is_legacy_customer_id(&id));
    }

    #[test]
    fn test_record_serde() {
        let json = serde_json::json!({
            "customer_id": "CUST_old1",
            "name": "Asha Medicals",
            "mobile": "9876543210",
            "created_at": "2024-05-01T10:00:00Z"
        });
        let record: CustomerRecord = serde_json::from_value(json).unwrap();
        assert!(record.id.is_empty());
        assert!(!record.is_deleted());
        assert_eq!(record.id_format(), CustomerIdFormat::Legacy);
        assert!(record.created_at.is_some());

        let back = serde_json::to_value(&record).unwrap();
        assert!(back.get("deleted_at").is_none());
        assert!(back.get("address").is_none());
    }
}
