//! Field checks of an incoming order.
//!
//! The checks run in a fixed order and stop at the first failure. The
//! `Display` text of [`ValidationError`] is shown to the customer as is.

use std::fmt;

use model::{AddressView, Order, PaymentMethod};
use thiserror::Error;

/// Which of the two addresses of an order a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    Invoice,
    Delivery,
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invoice => "Rechnungsanschrift",
            Self::Delivery => "Versandanschrift",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Bitte bestellen Sie mindestens ein Produkt!")]
    Amount,
    #[error("Bitte geben Sie gültige Emailadresse an!")]
    Email,
    #[error("Bitte geben Sie einen Namen an ({0})!")]
    Name(AddressRole),
    #[error("Bitte geben Sie eine gültigen Straßennamen an ({0})!")]
    Street(AddressRole),
    #[error("Bitte geben Sie eine gültige Straßennummer an ({0})!")]
    HouseNumber(AddressRole),
    #[error("Bitte geben Sie eine gültige Postleitzahl an ({0})!")]
    PostalCode(AddressRole),
    #[error("Bitte geben Sie eine gültige Stadt an ({0})!")]
    City(AddressRole),
    #[error("Bitte geben Sie ein gültiges Land an ({0})!")]
    Country(AddressRole),
    #[error("Bitte wählen Sie eine gültige Zahlart aus (banktransfer oder paypal)!")]
    Payment,
    #[error("Sie müssen für eine Bestellung die AGBs unter https://calendariumculinarium.de/agb akzeptieren!")]
    Terms,
    #[error("Sie müssen für eine Bestellung die Datenschutzerklärung unter https://calendariumculinarium.de/datenschutz akzeptieren!")]
    Privacy,
}

/// Checks that an order carries everything needed to ship and bill it.
pub fn verify(order: &Order) -> Result<(), ValidationError> {
    if order.amount < 1 {
        return Err(ValidationError::Amount);
    }
    // Only presence is checked, not the address format.
    if order.email.is_empty() {
        return Err(ValidationError::Email);
    }
    verify_address(order.invoice_address(), AddressRole::Invoice)?;
    verify_address(order.delivery_address(), AddressRole::Delivery)?;
    if PaymentMethod::parse(&order.payment).is_none() {
        return Err(ValidationError::Payment);
    }
    if !order.agrees_agb {
        return Err(ValidationError::Terms);
    }
    if !order.agrees_data_privacy {
        return Err(ValidationError::Privacy);
    }
    Ok(())
}

fn verify_address(address: AddressView<'_>, role: AddressRole) -> Result<(), ValidationError> {
    if address.first_name.is_empty() || address.last_name.is_empty() {
        return Err(ValidationError::Name(role));
    }
    if address.street.is_empty() {
        return Err(ValidationError::Street(role));
    }
    if address.house_number.is_empty() {
        return Err(ValidationError::HouseNumber(role));
    }
    if address.postal_code.is_empty() {
        return Err(ValidationError::PostalCode(role));
    }
    if address.city.is_empty() {
        return Err(ValidationError::City(role));
    }
    if address.country.is_empty() {
        return Err(ValidationError::Country(role));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn valid_order() -> Order {
        Order {
            product_id: 1,
            amount: 1,
            first_name_invoice: "Erika".to_string(),
            last_name_invoice: "Mustermann".to_string(),
            first_name_delivery: "Erika".to_string(),
            last_name_delivery: "Mustermann".to_string(),
            email: "erika@example.org".to_string(),
            address_street_invoice: "Heidestraße".to_string(),
            address_street_no_invoice: "17".to_string(),
            address_code_invoice: "51147".to_string(),
            address_city_invoice: "Köln".to_string(),
            address_country_invoice: "Deutschland".to_string(),
            address_street_delivery: "Heidestraße".to_string(),
            address_street_no_delivery: "17".to_string(),
            address_code_delivery: "51147".to_string(),
            address_city_delivery: "Köln".to_string(),
            address_country_delivery: "Deutschland".to_string(),
            payment: "banktransfer".to_string(),
            agrees_agb: true,
            agrees_data_privacy: true,
            ..Order::default()
        }
    }

    type Breaker = fn(&mut Order);

    fn breakers() -> Vec<(Breaker, ValidationError)> {
        use AddressRole::{Delivery, Invoice};
        vec![
            (|o| o.amount = 0, ValidationError::Amount),
            (|o| o.email.clear(), ValidationError::Email),
            (|o| o.first_name_invoice.clear(), ValidationError::Name(Invoice)),
            (|o| o.last_name_invoice.clear(), ValidationError::Name(Invoice)),
            (|o| o.address_street_invoice.clear(), ValidationError::Street(Invoice)),
            (|o| o.address_street_no_invoice.clear(), ValidationError::HouseNumber(Invoice)),
            (|o| o.address_code_invoice.clear(), ValidationError::PostalCode(Invoice)),
            (|o| o.address_city_invoice.clear(), ValidationError::City(Invoice)),
            (|o| o.address_country_invoice.clear(), ValidationError::Country(Invoice)),
            (|o| o.first_name_delivery.clear(), ValidationError::Name(Delivery)),
            (|o| o.last_name_delivery.clear(), ValidationError::Name(Delivery)),
            (|o| o.address_street_delivery.clear(), ValidationError::Street(Delivery)),
            (|o| o.address_street_no_delivery.clear(), ValidationError::HouseNumber(Delivery)),
            (|o| o.address_code_delivery.clear(), ValidationError::PostalCode(Delivery)),
            (|o| o.address_city_delivery.clear(), ValidationError::City(Delivery)),
            (|o| o.address_country_delivery.clear(), ValidationError::Country(Delivery)),
            (|o| o.payment = "cash".to_string(), ValidationError::Payment),
            (|o| o.payment.clear(), ValidationError::Payment),
            (|o| o.agrees_agb = false, ValidationError::Terms),
            (|o| o.agrees_data_privacy = false, ValidationError::Privacy),
        ]
    }

    #[test]
    fn test_valid_order_passes() {
        assert_eq!(verify(&valid_order()), Ok(()));
        let mut paypal = valid_order();
        paypal.payment = "paypal".to_string();
        assert_eq!(verify(&paypal), Ok(()));
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        for (breaker, expected) in breakers() {
            let mut order = valid_order();
            breaker(&mut order);
            assert_eq!(verify(&order), Err(expected));
        }
    }

    #[test]
    fn test_messages_are_field_specific() {
        let messages: HashSet<String> = breakers()
            .into_iter()
            .map(|(_, e)| e.to_string())
            .collect();
        // Name checks share one message per address, payment shares one.
        assert_eq!(messages.len(), 17);
        assert!(messages.contains("Bitte geben Sie eine gültige Stadt an (Versandanschrift)!"));
    }

    #[test]
    fn test_first_failure_wins() {
        let mut order = valid_order();
        order.amount = -3;
        order.email.clear();
        order.agrees_agb = false;
        assert_eq!(verify(&order), Err(ValidationError::Amount));

        let mut order = valid_order();
        order.address_city_invoice.clear();
        order.address_city_delivery.clear();
        assert_eq!(verify(&order), Err(ValidationError::City(AddressRole::Invoice)));
    }
}
