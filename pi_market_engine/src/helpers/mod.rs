//! Small shared policy helpers.

use pmg_common::MicroPi;

/// The marketplace commission withheld from every payout, in basis points. 500 = 5%.
pub const COMMISSION_BPS: i64 = 500;

/// The amount paid out to a store for an order of the given total.
pub fn payout_amount(order_total: MicroPi) -> MicroPi {
    order_total.less_commission(COMMISSION_BPS)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn five_percent_commission() {
        assert_eq!(payout_amount(MicroPi::from_pi(10)), MicroPi::from(9_500_000));
        assert_eq!(payout_amount(MicroPi::from(0)), MicroPi::from(0));
    }
}
