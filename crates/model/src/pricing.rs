//! Tiered quantity discount.

/// Catalog price of the calendar in EUR.
pub const UNIT_PRICE: f64 = 20.0;

/// Discount granted for ordering `amount` pieces.
pub fn discount_rate(amount: i64) -> f64 {
    match amount {
        a if a < 3 => 0.0,
        a if a < 5 => 0.10,
        a if a < 50 => 0.15,
        _ => 0.20,
    }
}

/// Total price of `amount` calendars at the catalog price.
pub fn compute_price(amount: i64) -> f64 {
    compute_price_for(amount, UNIT_PRICE)
}

/// Total price of `amount` pieces of a product costing `unit_price`.
pub fn compute_price_for(amount: i64, unit_price: f64) -> f64 {
    amount as f64 * unit_price * (1.0 - discount_rate(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn test_tier_boundaries() {
        assert_close(compute_price(2), 40.0);
        assert_close(compute_price(3), 54.0);
        assert_close(compute_price(4), 72.0);
        assert_close(compute_price(5), 85.0);
        assert_close(compute_price(49), 833.0);
        assert_close(compute_price(50), 800.0);
    }

    #[test]
    fn test_each_tier_transition_once() {
        let boundaries = [2, 3, 4, 5, 49, 50];
        let changes = boundaries
            .windows(2)
            .filter(|w| discount_rate(w[0]) != discount_rate(w[1]))
            .count();
        assert_eq!(changes, 3);
    }

    #[test]
    fn test_unit_price_never_increases() {
        let mut previous = f64::MAX;
        for amount in 1..200 {
            let per_unit = compute_price(amount) / amount as f64;
            assert!(per_unit <= previous + 1e-9, "unit price rose at {amount}");
            previous = per_unit;
        }
    }

    #[test]
    fn test_total_grows_except_at_bulk_tier() {
        for amount in 1..200 {
            let (current, next) = (compute_price(amount), compute_price(amount + 1));
            if amount == 49 {
                // The 20% tier makes 50 pieces cheaper than 49.
                assert!(next < current);
            } else {
                assert!(next >= current, "total fell at {amount}");
            }
        }
    }

    #[test]
    fn test_price_for_other_unit_price() {
        assert_close(compute_price_for(1, 12.5), 12.5);
        assert_close(compute_price_for(10, 10.0), 85.0);
    }
}
