//! Contract Checks
//!
//! Violations of the reference-counting and topology protocol are
//! programming defects, not recoverable errors. They are reported through
//! `log` and then abort the current thread with a panic.
//!
//! # Policy
//! - Active in debug builds and with the `strict-contracts` feature
//! - Compiled out otherwise (the invariant is assumed to hold)

/// Whether contract checks are compiled in.
pub const CHECKS_ENABLED: bool = cfg!(any(debug_assertions, feature = "strict-contracts"));

/// Check a protocol invariant.
///
/// On failure the message is logged at `error` level and the thread
/// panics. Does nothing when checks are disabled.
macro_rules! contract {
    ($cond:expr, $($arg:tt)+) => {
        if $crate::contract::CHECKS_ENABLED && !($cond) {
            log::error!("[CONTRACT] {}", format_args!($($arg)+));
            panic!("contract violation: {}", format_args!($($arg)+));
        }
    };
}

pub(crate) use contract;

#[cfg(test)]
mod tests {
    #[test]
    fn test_holding_contract_is_silent() {
        contract!(1 + 1 == 2, "arithmetic");
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-contracts")), ignore)]
    #[should_panic(expected = "contract violation: count was 3")]
    fn test_broken_contract_panics() {
        let count = 3;
        contract!(count == 0, "count was {}", count);
    }
}
