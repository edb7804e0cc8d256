use pmg_common::MicroPi;

/// Convert a wire-format π amount (fractional) into integer µπ, rounding to the nearest µπ.
pub fn pi_amount_to_micro(amount: f64) -> MicroPi {
    MicroPi::from((amount * 1_000_000.0).round() as i64)
}

/// Convert an integer µπ amount into the fractional π format the platform API expects.
pub fn micro_to_pi_amount(amount: MicroPi) -> f64 {
    amount.value() as f64 / 1_000_000.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        assert_eq!(pi_amount_to_micro(9.5), MicroPi::from(9_500_000));
        assert_eq!(pi_amount_to_micro(0.000001), MicroPi::from(1));
        assert_eq!(micro_to_pi_amount(MicroPi::from(9_500_000)), 9.5);
        let exact = MicroPi::from(1_234_567);
        assert_eq!(pi_amount_to_micro(micro_to_pi_amount(exact)), exact);
    }
}
