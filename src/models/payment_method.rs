use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Payment methods offered at checkout.
///
/// Every branch of the flow goes through [`PaymentMethod::descriptor`], so a
/// new method has to declare its redirect behaviour before it compiles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum PaymentMethod {
    #[serde(rename = "card_pay")]
    #[strum(serialize = "card_pay")]
    Card,
    #[serde(rename = "apple_pay")]
    #[strum(serialize = "apple_pay")]
    ApplePay,
    #[serde(rename = "google_pay")]
    #[strum(serialize = "google_pay")]
    GooglePay,
    #[serde(rename = "alipay")]
    #[strum(serialize = "alipay")]
    AliPay,
    #[serde(rename = "payme")]
    #[strum(serialize = "payme")]
    PayMe,
}

/// Static facts about a payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentMethodDescriptor {
    /// Confirmation navigates the browser off-site and back.
    pub requires_redirect: bool,
    pub display_label: &'static str,
    pub icon: &'static str,
    /// Payment method type understood by the processor; `None` for methods
    /// settled outside the processor.
    pub processor_type: Option<&'static str>,
}

const CARD: PaymentMethodDescriptor = PaymentMethodDescriptor {
    requires_redirect: false,
    display_label: "Credit / Debit Card",
    icon: "card.svg",
    processor_type: Some("card"),
};

const APPLE_PAY: PaymentMethodDescriptor = PaymentMethodDescriptor {
    requires_redirect: false,
    display_label: "Apple Pay",
    icon: "apple-pay.svg",
    processor_type: Some("card"),
};

const GOOGLE_PAY: PaymentMethodDescriptor = PaymentMethodDescriptor {
    requires_redirect: false,
    display_label: "Google Pay",
    icon: "google-pay.svg",
    processor_type: Some("card"),
};

const ALIPAY: PaymentMethodDescriptor = PaymentMethodDescriptor {
    requires_redirect: true,
    display_label: "AliPay",
    icon: "alipay.svg",
    processor_type: Some("alipay"),
};

const PAYME: PaymentMethodDescriptor = PaymentMethodDescriptor {
    requires_redirect: false,
    display_label: "PayMe",
    icon: "payme.svg",
    processor_type: None,
};

impl PaymentMethod {
    pub fn descriptor(self) -> &'static PaymentMethodDescriptor {
        match self {
            PaymentMethod::Card => &CARD,
            PaymentMethod::ApplePay => &APPLE_PAY,
            PaymentMethod::GooglePay => &GOOGLE_PAY,
            PaymentMethod::AliPay => &ALIPAY,
            PaymentMethod::PayMe => &PAYME,
        }
    }

    pub fn requires_redirect(self) -> bool {
        self.descriptor().requires_redirect
    }

    pub fn display_label(self) -> &'static str {
        self.descriptor().display_label
    }

    /// Methods confirmed through the payment processor's hosted element.
    pub fn uses_processor(self) -> bool {
        self.descriptor().processor_type.is_some()
    }

    /// Ordering hint for the payment element so the method picked on the
    /// form is shown first.
    pub fn payment_method_order(self) -> Vec<&'static str> {
        self.descriptor().processor_type.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn only_alipay_redirects() {
        let redirecting: Vec<_> = PaymentMethod::iter()
            .filter(|m| m.requires_redirect())
            .collect();
        assert_eq!(redirecting, vec![PaymentMethod::AliPay]);
    }

    #[test]
    fn payme_bypasses_processor() {
        assert!(!PaymentMethod::PayMe.uses_processor());
        assert!(PaymentMethod::PayMe.payment_method_order().is_empty());
        for method in PaymentMethod::iter().filter(|m| *m != PaymentMethod::PayMe) {
            assert!(method.uses_processor(), "{} should use the processor", method);
        }
    }

    #[test]
    fn wire_names_round_trip() {
        for (method, wire) in [
            (PaymentMethod::Card, "card_pay"),
            (PaymentMethod::ApplePay, "apple_pay"),
            (PaymentMethod::GooglePay, "google_pay"),
            (PaymentMethod::AliPay, "alipay"),
            (PaymentMethod::PayMe, "payme"),
        ] {
            assert_eq!(method.to_string(), wire);
            assert_eq!(PaymentMethod::from_str(wire).unwrap(), method);
            assert_eq!(serde_json::to_value(method).unwrap(), wire);
        }
        assert!(PaymentMethod::from_str("paypal").is_err());
    }

    #[test]
    fn wallets_pin_card_element() {
        assert_eq!(PaymentMethod::ApplePay.payment_method_order(), vec!["card"]);
        assert_eq!(PaymentMethod::AliPay.payment_method_order(), vec!["alipay"]);
    }
}
