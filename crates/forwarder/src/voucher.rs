//! Membership voucher orders read from the member list export.
//!
//! Every row after the header is one voucher recipient. Columns are read by
//! position: convivium, member type, company, three name parts, street,
//! postal code, city, country and member number.

use std::io;

use chrono::Utc;
use model::Order;
use serde::Deserialize;

/// Country used when the export leaves it empty.
pub const DEFAULT_COUNTRY: &str = "Deutschland";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoucherRecipient {
    pub convivium: String,
    pub member_type: String,
    pub company: String,
    pub name: String,
    pub name_extra: String,
    pub name_extra2: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub member_no: String,
}

impl VoucherRecipient {
    /// Name parts joined by `", "`, empty parts left out.
    pub fn full_name(&self) -> String {
        [&self.name, &self.name_extra, &self.name_extra2]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The free single-calendar order sent for this recipient.
    ///
    /// `id` is the row number and becomes the `UZ-` order number.
    pub fn to_order(&self, id: i64, product_id: i64) -> Order {
        let name = self.full_name();
        let country = if self.country.is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            self.country.clone()
        };

        Order {
            id: Some(id),
            product_id,
            amount: 1,
            date: Utc::now(),
            company_invoice: self.company.clone(),
            last_name_invoice: name.clone(),
            company_delivery: self.company.clone(),
            last_name_delivery: name,
            address_street_invoice: self.street.clone(),
            address_code_invoice: self.postal_code.clone(),
            address_city_invoice: self.city.clone(),
            address_country_invoice: country.clone(),
            address_street_delivery: self.street.clone(),
            address_code_delivery: self.postal_code.clone(),
            address_city_delivery: self.city.clone(),
            address_country_delivery: country,
            payment: "banktransfer".to_string(),
            slow_food_member: true,
            agrees_agb: true,
            agrees_data_privacy: true,
            message: format!("Mitgliedsnummer {}", self.member_no),
            ..Order::default()
        }
    }
}

/// Reads all recipients, skipping the header row.
pub fn read_recipients<R: io::Read>(reader: R) -> Result<Vec<VoucherRecipient>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    reader
        .records()
        .map(|record| record?.deserialize(None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Convivium,Typ,Firma,Name,Name 2,Name 3,Strasse,PLZ,Ort,Land,Mitgliedsnummer
Köln,Einzel,,Erika Mustermann,,,Heidestraße 17,51147,Köln,,1042
Berlin,Familie,Slow Food Berlin,Max Muster,Moritz Muster,,Hauptstraße 1,10115,Berlin,Österreich,2077
";

    #[test]
    fn test_read_recipients_by_position() {
        let recipients = read_recipients(EXPORT.as_bytes()).unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].convivium, "Köln");
        assert_eq!(recipients[1].company, "Slow Food Berlin");
        assert_eq!(recipients[1].member_no, "2077");
    }

    #[test]
    fn test_recipient_becomes_free_member_order() {
        let recipients = read_recipients(EXPORT.as_bytes()).unwrap();

        let order = recipients[0].to_order(1, 1);
        assert_eq!(order.id, Some(1));
        assert_eq!(order.amount, 1);
        assert_eq!(order.last_name_delivery, "Erika Mustermann");
        assert_eq!(order.address_country_invoice, DEFAULT_COUNTRY);
        assert_eq!(order.message, "Mitgliedsnummer 1042");
        assert!(order.slow_food_member);
        assert!(!order.reseller);

        let order = recipients[1].to_order(2, 1);
        assert_eq!(order.last_name_invoice, "Max Muster, Moritz Muster");
        assert_eq!(order.company_delivery, "Slow Food Berlin");
        assert_eq!(order.address_country_delivery, "Österreich");
    }

    #[test]
    fn test_short_row_is_an_error() {
        let export = "a,b,c\nKöln,Einzel,\n";
        assert!(read_recipients(export.as_bytes()).is_err());
    }
}
