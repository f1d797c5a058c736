//! Order document expected by the order management service.

use chrono::SecondsFormat;
use model::{AddressView, Order, OrderReference, PaymentMethod, Product};
use serde::Serialize;

/// Payment method codes of the order management service.
pub const PAYMENT_BANK_TRANSFER: i32 = 1;
pub const PAYMENT_PAYPAL: i32 = 3;
pub const PAYMENT_VOUCHER: i32 = 6;

pub const TAG_RESELLER: &str = "reseller";
pub const TAG_MEMBER: &str = "slow_food_mitglied";
pub const TAG_VOUCHER: &str = "UZ";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceAddress {
    #[serde(rename = "BillbeeId")]
    pub billbee_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub street: String,
    pub house_number: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub street: String,
    pub house_number: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ItemProduct {
    pub title: String,
    #[serde(rename = "BillbeeId")]
    pub billbee_id: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OrderItem {
    pub product: ItemProduct,
    pub quantity: i64,
    pub total_price: f64,
}

/// Body of the order creation request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BillbeeOrder {
    pub created_at: String,
    pub order_number: String,
    pub invoice_address: InvoiceAddress,
    pub shipping_address: ShippingAddress,
    pub payment_method: i32,
    pub shipping_cost: f64,
    pub total_cost: f64,
    pub order_items: Vec<OrderItem>,
    pub currency: String,
    pub seller_comment: String,
    pub tags: Vec<String>,
}

impl BillbeeOrder {
    /// Document for a regular web shop order.
    pub fn regular(order: &Order, reference: OrderReference, product: &Product, billbee_product_id: i64) -> Self {
        let payment_method = match PaymentMethod::parse(&order.payment) {
            Some(PaymentMethod::BankTransfer) => PAYMENT_BANK_TRANSFER,
            _ => PAYMENT_PAYPAL,
        };
        let items_total = model::compute_price_for(order.amount, product.price);

        Self::build(
            order,
            reference,
            product,
            billbee_product_id,
            payment_method,
            product.shipping,
            items_total,
            base_tags(order),
        )
    }

    /// Document for a membership voucher order: paid by voucher, free of charge.
    pub fn voucher(
        order: &Order,
        reference: OrderReference,
        product: &Product,
        billbee_product_id: i64,
        convivium: &str,
    ) -> Self {
        let mut tags = base_tags(order);
        tags.push(convivium.to_string());
        tags.push(TAG_VOUCHER.to_string());

        Self::build(
            order,
            reference,
            product,
            billbee_product_id,
            PAYMENT_VOUCHER,
            0.0,
            0.0,
            tags,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        order: &Order,
        reference: OrderReference,
        product: &Product,
        billbee_product_id: i64,
        payment_method: i32,
        shipping_cost: f64,
        items_total: f64,
        tags: Vec<String>,
    ) -> Self {
        let invoice = order.invoice_address();
        let delivery = order.delivery_address();

        Self {
            created_at: order.date.to_rfc3339_opts(SecondsFormat::Secs, true),
            order_number: reference.to_string(),
            invoice_address: InvoiceAddress {
                billbee_id: 0,
                first_name: invoice.first_name.to_string(),
                last_name: invoice.last_name.to_string(),
                company: invoice.company.to_string(),
                street: invoice.street.to_string(),
                house_number: invoice.house_number.to_string(),
                zip: invoice.postal_code.to_string(),
                city: invoice.city.to_string(),
                country: invoice.country.to_string(),
                email: order.email.clone(),
            },
            shipping_address: shipping_address(delivery, &order.email),
            payment_method,
            shipping_cost,
            total_cost: items_total + shipping_cost,
            order_items: vec![OrderItem {
                product: ItemProduct {
                    title: product.name.clone(),
                    billbee_id: billbee_product_id,
                },
                quantity: order.amount,
                total_price: items_total,
            }],
            currency: "EUR".to_string(),
            seller_comment: order.message.clone(),
            tags,
        }
    }
}

fn shipping_address(address: AddressView<'_>, email: &str) -> ShippingAddress {
    ShippingAddress {
        first_name: address.first_name.to_string(),
        last_name: address.last_name.to_string(),
        company: address.company.to_string(),
        street: address.street.to_string(),
        house_number: address.house_number.to_string(),
        zip: address.postal_code.to_string(),
        city: address.city.to_string(),
        country: address.country.to_string(),
        email: email.to_string(),
    }
}

fn base_tags(order: &Order) -> Vec<String> {
    let mut tags = Vec::new();
    if order.reseller {
        tags.push(TAG_RESELLER.to_string());
    }
    if order.slow_food_member {
        tags.push(TAG_MEMBER.to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn product() -> Product {
        Product {
            id: 1,
            name: "Calendarium Culinarium".to_string(),
            description: String::new(),
            price: 20.0,
            shipping: 0.0,
        }
    }

    fn order() -> Order {
        Order {
            id: Some(42),
            product_id: 1,
            amount: 5,
            date: Utc.with_ymd_and_hms(2024, 10, 1, 12, 30, 0).unwrap(),
            company_invoice: "SFY".to_string(),
            first_name_invoice: "Erika".to_string(),
            last_name_invoice: "Mustermann".to_string(),
            first_name_delivery: "Max".to_string(),
            last_name_delivery: "Muster".to_string(),
            email: "erika@example.org".to_string(),
            address_street_invoice: "Heidestraße".to_string(),
            address_street_no_invoice: "17".to_string(),
            address_code_invoice: "51147".to_string(),
            address_city_invoice: "Köln".to_string(),
            address_country_invoice: "Deutschland".to_string(),
            address_street_delivery: "Hauptstraße".to_string(),
            address_street_no_delivery: "1".to_string(),
            address_code_delivery: "10115".to_string(),
            address_city_delivery: "Berlin".to_string(),
            address_country_delivery: "Deutschland".to_string(),
            payment: "banktransfer".to_string(),
            reseller: true,
            slow_food_member: true,
            message: "Danke".to_string(),
            ..Order::default()
        }
    }

    #[test]
    fn test_regular_order_document() {
        let body = BillbeeOrder::regular(&order(), OrderReference::standard(42), &product(), 200000000711626);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["OrderNumber"], "CC-000042");
        assert_eq!(json["CreatedAt"], "2024-10-01T12:30:00Z");
        assert_eq!(json["PaymentMethod"], 1);
        assert_eq!(json["TotalCost"], 85.0);
        assert_eq!(json["Currency"], "EUR");
        assert_eq!(json["SellerComment"], "Danke");
        assert_eq!(json["InvoiceAddress"]["BillbeeId"], 0);
        assert_eq!(json["InvoiceAddress"]["Company"], "SFY");
        assert_eq!(json["InvoiceAddress"]["HouseNumber"], "17");
        assert_eq!(json["ShippingAddress"]["City"], "Berlin");
        assert_eq!(json["ShippingAddress"]["Email"], "erika@example.org");
        assert_eq!(json["OrderItems"][0]["Product"]["BillbeeId"], 200000000711626_i64);
        assert_eq!(json["OrderItems"][0]["Product"]["Title"], "Calendarium Culinarium");
        assert_eq!(json["OrderItems"][0]["Quantity"], 5);
        assert_eq!(json["Tags"], serde_json::json!(["reseller", "slow_food_mitglied"]));
    }

    #[test]
    fn test_paypal_and_no_tags() {
        let mut order = order();
        order.payment = "paypal".to_string();
        order.reseller = false;
        order.slow_food_member = false;
        let body = BillbeeOrder::regular(&order, OrderReference::standard(1), &product(), 1);
        assert_eq!(body.payment_method, PAYMENT_PAYPAL);
        assert!(body.tags.is_empty());
    }

    #[test]
    fn test_voucher_document_is_free() {
        let body = BillbeeOrder::voucher(&order(), OrderReference::voucher(665), &product(), 1, "Köln");
        assert_eq!(body.order_number, "UZ-000665");
        assert_eq!(body.payment_method, PAYMENT_VOUCHER);
        assert_eq!(body.total_cost, 0.0);
        assert_eq!(body.order_items[0].total_price, 0.0);
        assert_eq!(body.tags, vec!["reseller", "slow_food_mitglied", "Köln", "UZ"]);
    }
}
