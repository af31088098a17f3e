use rand::Rng;
use std::time::Duration;

mod single_flight;

pub use single_flight::{FlightTicket, SingleFlight};

/// 在 base 上下浮动 deviation 比例，避免同一批写入的缓存同时过期
pub fn around_duration(base: Duration, deviation: f64) -> Duration {
    if deviation <= 0.0 || base.is_zero() {
        return base;
    }
    let deviation = deviation.min(1.0);
    let factor = rand::thread_rng().gen_range((1.0 - deviation)..=(1.0 + deviation));
    // 超出 Duration 范围时不做偏移
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn around_duration_stays_within_bounds() {
        let base = Duration::from_secs(100);
        for _ in 0..1000 {
            let d = around_duration(base, 0.05);
            assert!(d >= Duration::from_millis(94_999), "{:?}", d);
            assert!(d <= Duration::from_millis(105_001), "{:?}", d);
        }
    }

    #[test]
    fn zero_deviation_keeps_base() {
        let base = Duration::from_secs(60);
        assert_eq!(around_duration(base, 0.0), base);
        assert_eq!(around_duration(Duration::ZERO, 0.05), Duration::ZERO);
    }

    #[test]
    fn huge_base_does_not_overflow() {
        let base = Duration::from_secs(u64::MAX);
        for _ in 0..100 {
            assert!(around_duration(base, 0.05) >= Duration::from_secs(u64::MAX / 2));
        }
    }
}
