//! Domain types shared by every layer of the order backend.
//!
//! The JSON field names of [`Order`] and [`Product`] are the public wire
//! format of the REST API and must not change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod pricing;

pub use pricing::{compute_price, compute_price_for, discount_rate, UNIT_PRICE};

/// ID historically used on the wire for "no such entity".
///
/// Lookups return `Option` instead; the value is kept so that clients
/// relying on it can be recognised in logs.
pub const INVALID_ID: i64 = -1;

/// Product — a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub shipping: f64,
}

/// A product that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub shipping: f64,
}

/// The fixed catalog the store is seeded with at startup.
pub fn catalog() -> Vec<NewProduct> {
    vec![NewProduct {
        name: "Calendarium Culinarium".to_string(),
        description: "Der Slow Food Youth Saisonkalender".to_string(),
        price: UNIT_PRICE,
        shipping: 0.0,
    }]
}

/// Order — a customer order for a single product.
///
/// `id`, `date` and `billbee_api_response` are owned by the server: they
/// are never read from a request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Order {
    #[serde(skip_deserializing)]
    pub id: Option<i64>,
    pub product_id: i64,
    pub amount: i64,
    #[serde(skip_deserializing)]
    pub date: DateTime<Utc>,
    pub company_invoice: String,
    pub first_name_invoice: String,
    pub last_name_invoice: String,
    pub company_delivery: String,
    pub first_name_delivery: String,
    pub last_name_delivery: String,
    pub email: String,
    pub address_street_invoice: String,
    pub address_street_no_invoice: String,
    pub address_code_invoice: String,
    pub address_city_invoice: String,
    pub address_country_invoice: String,
    pub address_street_delivery: String,
    pub address_street_no_delivery: String,
    pub address_code_delivery: String,
    pub address_city_delivery: String,
    pub address_country_delivery: String,
    pub payment: String,
    pub premium: String,
    #[serde(rename = "is_reseller")]
    pub reseller: bool,
    pub slow_food_member: bool,
    pub agrees_agb: bool,
    pub agrees_data_privacy: bool,
    pub message: String,
    #[serde(rename = "billbee_api_response", skip_deserializing)]
    pub forwarding_response: String,
}

/// Borrowed view of one of the two postal addresses of an [`Order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressView<'a> {
    pub company: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub street: &'a str,
    pub house_number: &'a str,
    pub postal_code: &'a str,
    pub city: &'a str,
    pub country: &'a str,
}

impl Order {
    pub fn invoice_address(&self) -> AddressView<'_> {
        AddressView {
            company: &self.company_invoice,
            first_name: &self.first_name_invoice,
            last_name: &self.last_name_invoice,
            street: &self.address_street_invoice,
            house_number: &self.address_street_no_invoice,
            postal_code: &self.address_code_invoice,
            city: &self.address_city_invoice,
            country: &self.address_country_invoice,
        }
    }

    pub fn delivery_address(&self) -> AddressView<'_> {
        AddressView {
            company: &self.company_delivery,
            first_name: &self.first_name_delivery,
            last_name: &self.last_name_delivery,
            street: &self.address_street_delivery,
            house_number: &self.address_street_no_delivery,
            postal_code: &self.address_code_delivery,
            city: &self.address_city_delivery,
            country: &self.address_country_delivery,
        }
    }

    /// Customer facing reference, `None` until the order has been stored.
    pub fn reference(&self) -> Option<OrderReference> {
        self.id.map(OrderReference::standard)
    }
}

/// The two payment methods a customer may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    BankTransfer,
    PayPal,
}

impl PaymentMethod {
    /// Parses the literal sent by the web shop. Anything else is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "banktransfer" => Some(Self::BankTransfer),
            "paypal" => Some(Self::PayPal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "banktransfer",
            Self::PayPal => "paypal",
        }
    }
}

/// Prefix family of a human readable order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Regular web shop orders (`CC-`).
    Standard,
    /// Membership voucher orders (`UZ-`).
    Voucher,
}

/// Human readable order number: two letter prefix plus the zero padded ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderReference {
    pub kind: ReferenceKind,
    pub id: i64,
}

impl OrderReference {
    pub fn standard(id: i64) -> Self {
        Self { kind: ReferenceKind::Standard, id }
    }

    pub fn voucher(id: i64) -> Self {
        Self { kind: ReferenceKind::Voucher, id }
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ReferenceKind::Standard => "CC",
            ReferenceKind::Voucher => "UZ",
        };
        write!(f, "{}-{:06}", prefix, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_order_from_json() {
        let json = r#"
        {
           "id": 999,
           "product_id": 1,
           "amount": 3,
           "date": "1999-01-01T00:00:00Z",
           "company_invoice": "",
           "first_name_invoice": "Erika",
           "last_name_invoice": "Mustermann",
           "first_name_delivery": "Erika",
           "last_name_delivery": "Mustermann",
           "email": "erika@example.org",
           "address_street_invoice": "Heidestraße",
           "address_street_no_invoice": "17",
           "address_code_invoice": "51147",
           "address_city_invoice": "Köln",
           "address_country_invoice": "Deutschland",
           "address_street_delivery": "Heidestraße",
           "address_street_no_delivery": "17",
           "address_code_delivery": "51147",
           "address_city_delivery": "Köln",
           "address_country_delivery": "Deutschland",
           "payment": "paypal",
           "is_reseller": true,
           "slow_food_member": false,
           "agrees_agb": true,
           "agrees_data_privacy": true,
           "message": "Bitte klingeln",
           "billbee_api_response": "forged"
        }
        "#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, None);
        assert_eq!(order.date, DateTime::<Utc>::default());
        assert!(order.forwarding_response.is_empty());
        assert_eq!(order.amount, 3);
        assert!(order.reseller);
        assert_eq!(order.company_delivery, "");
        assert_eq!(order.delivery_address().city, "Köln");
        assert_eq!(PaymentMethod::parse(&order.payment), Some(PaymentMethod::PayPal));
    }

    #[test]
    fn test_serialize_order_uses_wire_names() {
        let order = Order {
            id: Some(7),
            reseller: true,
            forwarding_response: "ok".to_string(),
            ..Order::default()
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["is_reseller"], true);
        assert_eq!(value["billbee_api_response"], "ok");
    }

    #[test]
    fn test_order_reference_format() {
        assert_eq!(OrderReference::standard(42).to_string(), "CC-000042");
        assert_eq!(OrderReference::voucher(665).to_string(), "UZ-000665");
        assert_eq!(OrderReference::standard(1_234_567).to_string(), "CC-1234567");
        assert_eq!(Order::default().reference(), None);
    }

    #[test]
    fn test_payment_method_literals() {
        assert_eq!(PaymentMethod::parse("banktransfer"), Some(PaymentMethod::BankTransfer));
        assert_eq!(PaymentMethod::parse("PayPal"), None);
        assert_eq!(PaymentMethod::parse(""), None);
        assert_eq!(PaymentMethod::BankTransfer.as_str(), "banktransfer");
    }

    #[test]
    fn test_catalog_has_single_product() {
        let products = catalog();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Calendarium Culinarium");
        assert_eq!(products[0].price, UNIT_PRICE);
    }
}
