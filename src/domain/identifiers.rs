//! Fixed-format identifiers and timestamps required by the national layout.
//!
//! The builders pad and clean their inputs but do not validate field widths:
//! supplying a 7-digit municipality code, a 1-character registration type and
//! a 50-character access key is the caller's contract. A malformed input
//! yields a malformed identifier, not an error. [`DpsIdFields::checked`] is
//! the opt-in strict path.

use crate::domain::constants::{
    ACCESS_KEY_LEN, CANCELLATION_EVENT_CODE, DPS_ID_PREFIX, DPS_NUMBER_WIDTH, DPS_SERIES_WIDTH,
    EVENT_ID_PREFIX,
};
use crate::infra::error::{NfseError, NfseResult};
use chrono::{DateTime, Local, Offset, TimeZone};

/// Build a DPS identifier.
///
/// Layout: `DPS` + municipality (7) + registration type (1) + federal
/// registration (digits only) + series (5, zero padded) + number (15, zero
/// padded). With a 14-digit CNPJ the result has 45 characters.
#[must_use]
pub fn build_document_id(
    municipality_code: &str,
    taxpayer_id_type: &str,
    taxpayer_id: &str,
    series: &str,
    sequence: &str,
) -> String {
    let taxpayer_digits: String = taxpayer_id.chars().filter(char::is_ascii_digit).collect();
    format!(
        "{DPS_ID_PREFIX}{municipality_code}{taxpayer_id_type}{taxpayer_digits}{series:0>sw$}{sequence:0>nw$}",
        sw = DPS_SERIES_WIDTH,
        nw = DPS_NUMBER_WIDTH,
    )
}

/// Build an event-registration identifier: `PRE` + access key + event code.
#[must_use]
pub fn build_event_id(access_key: &str, event_code: &str) -> String {
    format!("{EVENT_ID_PREFIX}{access_key}{event_code}")
}

/// Cancellation event identifier (event code `101101`).
#[must_use]
pub fn build_cancellation_event_id(access_key: &str) -> String {
    build_event_id(access_key, CANCELLATION_EVENT_CODE)
}

/// Format an instant as `YYYY-MM-DDTHH:MM:SS±HH:00` in its own civil time.
///
/// The offset is floored to whole hours, so `+05:30` prints as `+05:00` and
/// `-03:30` as `-04:00`. Minute offsets are not representable in this format.
#[must_use]
pub fn format_timestamp<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let offset_secs = instant.offset().fix().local_minus_utc();
    let sign = if offset_secs >= 0 { '+' } else { '-' };
    let hours = offset_secs.div_euclid(3600).abs();
    format!(
        "{}{sign}{hours:02}:00",
        instant.format("%Y-%m-%dT%H:%M:%S")
    )
}

/// Current local time in the layout's timestamp format.
#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(&Local::now())
}

/// Typed DPS id inputs, for callers that want width checks up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpsIdFields {
    pub municipality_code: String,
    pub taxpayer_id_type: String,
    pub taxpayer_id: String,
    pub series: String,
    pub sequence: String,
}

impl DpsIdFields {
    /// Validate field widths and content, then keep the fields.
    pub fn checked(
        municipality_code: impl Into<String>,
        taxpayer_id_type: impl Into<String>,
        taxpayer_id: impl Into<String>,
        series: impl Into<String>,
        sequence: impl Into<String>,
    ) -> NfseResult<Self> {
        let fields = Self {
            municipality_code: municipality_code.into(),
            taxpayer_id_type: taxpayer_id_type.into(),
            taxpayer_id: taxpayer_id.into(),
            series: series.into(),
            sequence: sequence.into(),
        };

        require_digits("municipality code", &fields.municipality_code, Some(7))?;
        require_digits("registration type", &fields.taxpayer_id_type, Some(1))?;
        let digits: String = fields
            .taxpayer_id
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if digits.len() != 11 && digits.len() != 14 {
            return Err(NfseError::InvalidInput(format!(
                "federal registration must have 11 or 14 digits, got {}",
                digits.len()
            )));
        }
        require_max_digits("series", &fields.series, DPS_SERIES_WIDTH)?;
        require_max_digits("number", &fields.sequence, DPS_NUMBER_WIDTH)?;
        Ok(fields)
    }

    #[must_use]
    pub fn build(&self) -> String {
        build_document_id(
            &self.municipality_code,
            &self.taxpayer_id_type,
            &self.taxpayer_id,
            &self.series,
            &self.sequence,
        )
    }
}

/// Event id with the access key length checked.
pub fn build_event_id_checked(access_key: &str, event_code: &str) -> NfseResult<String> {
    if access_key.len() != ACCESS_KEY_LEN || !access_key.chars().all(|c| c.is_ascii_digit()) {
        return Err(NfseError::InvalidInput(format!(
            "access key must have {ACCESS_KEY_LEN} digits, got {:?}",
            access_key
        )));
    }
    require_digits("event code", event_code, Some(6))?;
    Ok(build_event_id(access_key, event_code))
}

fn require_digits(field: &str, value: &str, len: Option<usize>) -> NfseResult<()> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(NfseError::InvalidInput(format!(
            "{field} must be numeric, got {value:?}"
        )));
    }
    match len {
        Some(n) if value.len() != n => Err(NfseError::InvalidInput(format!(
            "{field} must have {n} digits, got {}",
            value.len()
        ))),
        _ => Ok(()),
    }
}

fn require_max_digits(field: &str, value: &str, max: usize) -> NfseResult<()> {
    require_digits(field, value, None)?;
    if value.len() > max {
        return Err(NfseError::InvalidInput(format!(
            "{field} exceeds {max} digits: {value}"
        )));
    }
    Ok(())
}
