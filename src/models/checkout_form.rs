use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use super::payment_method::PaymentMethod;
use crate::errors::{CheckoutError, FieldError};

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]*[0-9]$").expect("valid phone pattern"));

/// Customer and delivery details collected on the first checkout step.
///
/// Once handed to the intent builder the value is owned by the prepared
/// checkout and cannot be edited before confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutFormData {
    #[validate(
        length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"),
        custom = "validate_not_blank"
    )]
    pub customer_name: String,

    #[validate(email(message = "Please enter a valid email address"))]
    pub customer_email: String,

    #[validate(
        length(min = 8, max = 20, message = "Phone number must be between 8 and 20 characters"),
        custom = "validate_phone"
    )]
    pub customer_phone: String,

    #[validate(
        length(min = 10, max = 500, message = "Address must be between 10 and 500 characters"),
        custom = "validate_not_blank"
    )]
    pub delivery_address: String,

    pub delivery_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "Delivery notes must be at most 500 characters"))]
    pub delivery_notes: Option<String>,

    pub payment_method: PaymentMethod,
}

/// Bounds on how far ahead a delivery may be booked, in days from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub min_lead_days: i64,
    pub max_lead_days: i64,
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        Self {
            min_lead_days: 3,
            max_lead_days: 90,
        }
    }
}

impl DeliveryWindow {
    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.min_lead_days)
    }

    pub fn latest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.max_lead_days)
    }

    fn check(&self, date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
        if date < self.earliest(today) {
            let mut err = ValidationError::new("delivery_too_soon");
            err.message = Some(Cow::Owned(format!(
                "Delivery requires a minimum {} days advance booking",
                self.min_lead_days
            )));
            return Err(err);
        }
        if date > self.latest(today) {
            let mut err = ValidationError::new("delivery_too_far");
            err.message = Some(Cow::Owned(format!(
                "Delivery can be booked a maximum {} days ahead",
                self.max_lead_days
            )));
            return Err(err);
        }
        Ok(())
    }
}

impl CheckoutFormData {
    /// Runs every field check, including the delivery window relative to `today`.
    pub fn validate_on(&self, today: NaiveDate, window: &DeliveryWindow) -> Result<(), CheckoutError> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if let Err(err) = window.check(self.delivery_date, today) {
            errors.add("delivery_date", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::from(errors))
        }
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("This field is required".into());
        return Err(err);
    }
    Ok(())
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if PHONE_PATTERN.is_match(value.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Please enter a valid phone number".into());
        Err(err)
    }
}

/// Flattens validator output into per-field messages, ordered by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                FieldError::new(field, err.code.to_string(), message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn form(delivery_date: NaiveDate) -> CheckoutFormData {
        CheckoutFormData {
            customer_name: "Jane Doe".to_string(),
            customer_email: "jane@x.com".to_string(),
            customer_phone: "91234567".to_string(),
            delivery_address: "10 Long Street, HK".to_string(),
            delivery_date,
            delivery_notes: None,
            payment_method: PaymentMethod::Card,
        }
    }

    fn failed_fields(result: Result<(), CheckoutError>) -> Vec<FieldError> {
        match result {
            Err(CheckoutError::Validation(fields)) => fields,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_form_passes() {
        let data = form(today() + Duration::days(5));
        assert!(data.validate_on(today(), &DeliveryWindow::default()).is_ok());
    }

    #[rstest]
    #[case(2, Some("delivery_too_soon"))]
    #[case(3, None)]
    #[case(90, None)]
    #[case(91, Some("delivery_too_far"))]
    fn delivery_window_bounds(#[case] days_ahead: i64, #[case] expected: Option<&str>) {
        let data = form(today() + Duration::days(days_ahead));
        let result = data.validate_on(today(), &DeliveryWindow::default());
        match expected {
            None => assert!(result.is_ok()),
            Some(code) => {
                let fields = failed_fields(result);
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "delivery_date");
                assert_eq!(fields[0].code, code);
            }
        }
    }

    #[test]
    fn too_soon_message_mentions_minimum() {
        let fields = failed_fields(
            form(today() + Duration::days(2)).validate_on(today(), &DeliveryWindow::default()),
        );
        assert!(fields[0].message.contains("minimum 3 days"));

        let fields = failed_fields(
            form(today() + Duration::days(91)).validate_on(today(), &DeliveryWindow::default()),
        );
        assert!(fields[0].message.contains("maximum 90 days"));
    }

    #[test]
    fn reports_every_bad_field() {
        let mut data = form(today() + Duration::days(5));
        data.customer_name = "J".to_string();
        data.customer_email = "not-an-email".to_string();
        data.customer_phone = "123".to_string();
        data.delivery_address = "short".to_string();

        let fields = failed_fields(data.validate_on(today(), &DeliveryWindow::default()));
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"customer_name"));
        assert!(names.contains(&"customer_email"));
        assert!(names.contains(&"customer_phone"));
        assert!(names.contains(&"delivery_address"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut data = form(today() + Duration::days(5));
        data.customer_name = "     ".to_string();
        let fields = failed_fields(data.validate_on(today(), &DeliveryWindow::default()));
        assert_matches!(fields.as_slice(), [f] if f.field == "customer_name" && f.code == "blank");
    }

    #[rstest]
    #[case("+852 9123 4567", true)]
    #[case("9123-4567", true)]
    #[case("91234567", true)]
    #[case("phone: 9123", false)]
    #[case("91234567x", false)]
    fn phone_shapes(#[case] phone: &str, #[case] ok: bool) {
        assert_eq!(validate_phone(phone).is_ok(), ok);
    }

    #[test]
    fn overlong_notes_are_rejected() {
        let mut data = form(today() + Duration::days(5));
        data.delivery_notes = Some("x".repeat(501));
        let fields = failed_fields(data.validate_on(today(), &DeliveryWindow::default()));
        assert_eq!(fields[0].field, "delivery_notes");
    }

    #[test]
    fn serializes_with_wire_names() {
        let data = form(NaiveDate::from_ymd_opt(2026, 3, 6).unwrap());
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["customerName"], "Jane Doe");
        assert_eq!(json["deliveryDate"], "2026-03-06");
        assert_eq!(json["paymentMethod"], "card_pay");
        assert!(json.get("deliveryNotes").is_none());
    }
}
