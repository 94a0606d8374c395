//! Resource quantity parsing and display normalization
//!
//! Kubernetes reports CPU and memory as quantity strings (`"250m"`,
//! `"16318412Ki"`, `"1.5Gi"`, `"2"`). They are parsed here with exact
//! rational arithmetic and rounded up to whole milli-units or bytes, the
//! same way the control plane's own quantity type rounds. Going through
//! `f64` would not: `2.007 * 1000.0` is `2007.0000000000002` and would
//! round up to 2008m.
//!
//! Display conversions all use truncating integer division. Values below
//! one unit of the target scale render as `0`.

use crate::models::ContainerResources;
use thiserror::Error;

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;
const MILLI_PER_CORE: u64 = 1000;

/// Errors produced while parsing a quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity \"{0}\"")]
    Invalid(String),
    #[error("negative quantity \"{0}\" is not a valid resource amount")]
    Negative(String),
    #[error("quantity \"{0}\" is out of range")]
    OutOfRange(String),
}

/// Exact value of a quantity as `num / den`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rational {
    num: u128,
    den: u128,
}

impl Rational {
    fn scaled_ceil(&self, scale: u128, raw: &str) -> Result<u64, QuantityError> {
        let num = self
            .num
            .checked_mul(scale)
            .ok_or_else(|| QuantityError::OutOfRange(raw.to_string()))?;
        let value = num.div_ceil(self.den);
        u64::try_from(value).map_err(|_| QuantityError::OutOfRange(raw.to_string()))
    }
}

fn parse(raw: &str) -> Result<Rational, QuantityError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let invalid = || QuantityError::Invalid(raw.to_string());
    let overflow = || QuantityError::OutOfRange(raw.to_string());

    let (negative, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let split = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let (number, suffix) = body.split_at(split);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
        return Err(invalid());
    }

    let mut num: u128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = c.to_digit(10).ok_or_else(invalid)? as u128;
        num = num
            .checked_mul(10)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(overflow)?;
    }
    let mut den = 10u128
        .checked_pow(frac_part.len() as u32)
        .ok_or_else(overflow)?;

    let (multiplier, divisor): (u128, u128) = match suffix {
        "" => (1, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        exp if exp.starts_with(['e', 'E']) => {
            let exponent: i32 = exp[1..].parse().map_err(|_| invalid())?;
            let factor = 10u128
                .checked_pow(exponent.unsigned_abs())
                .ok_or_else(overflow)?;
            if exponent >= 0 {
                (factor, 1)
            } else {
                (1, factor)
            }
        }
        _ => return Err(invalid()),
    };

    num = num.checked_mul(multiplier).ok_or_else(overflow)?;
    den = den.checked_mul(divisor).ok_or_else(overflow)?;

    if negative && num != 0 {
        return Err(QuantityError::Negative(raw.to_string()));
    }

    Ok(Rational { num, den })
}

/// Quantity expressed in thousandths, rounded up (`"1.5"` -> 1500, `"250m"` -> 250)
pub fn milli_value(quantity: &str) -> Result<u64, QuantityError> {
    parse(quantity)?.scaled_ceil(1000, quantity)
}

/// Quantity expressed in whole units, rounded up (`"1Ki"` -> 1024)
pub fn value(quantity: &str) -> Result<u64, QuantityError> {
    parse(quantity)?.scaled_ceil(1, quantity)
}

/// Per-node CPU display, e.g. `"4000m"`
pub fn cpu_display(cpu_milli: u64) -> String {
    format!("{}m", cpu_milli)
}

/// Per-node memory display in MiB, e.g. `"15935Mi"`
pub fn memory_display(memory_bytes: u64) -> String {
    format!("{}Mi", memory_bytes / MIB)
}

/// Per-node storage display in GiB, e.g. `"97Gi"`
pub fn storage_display(storage_bytes: u64) -> String {
    format!("{}Gi", storage_bytes / GIB)
}

/// Whole cores contained in a milli-core amount
pub fn whole_cores(cpu_milli: u128) -> u64 {
    saturate(cpu_milli / MILLI_PER_CORE as u128)
}

/// Whole GiB contained in a byte amount
pub fn whole_gibibytes(bytes: u128) -> u64 {
    saturate(bytes / GIB as u128)
}

/// Cluster total CPU display, e.g. `"12 cores"`
pub fn cores_display(cores: u64) -> String {
    format!("{} cores", cores)
}

/// Cluster total memory/storage display, e.g. `"31 GiB"`
pub fn gibibytes_display(gib: u64) -> String {
    format!("{} GiB", gib)
}

/// Per-container figure shown in pod views
pub fn container_display(resources: &ContainerResources) -> String {
    format!(
        "CPU: {} | RAM: {}",
        cpu_display(resources.cpu_milli),
        memory_display(resources.memory_bytes)
    )
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_quantities_to_millicores() {
        assert_eq!(milli_value("250m").unwrap(), 250);
        assert_eq!(milli_value("4").unwrap(), 4000);
        assert_eq!(milli_value("1.5").unwrap(), 1500);
        assert_eq!(milli_value("0.1").unwrap(), 100);
        assert_eq!(milli_value("1e3").unwrap(), 1_000_000);
    }

    #[test]
    fn test_decimal_fractions_are_exact() {
        assert_eq!(milli_value("2.007").unwrap(), 2007);
        assert_eq!(milli_value("0.0001").unwrap(), 1);
        assert_eq!(value("4.1Ki").unwrap(), 4199);
        // Above 2^53, where f64 loses whole bytes
        assert_eq!(value("9007199254740993").unwrap(), 9_007_199_254_740_993);
    }

    #[test]
    fn test_nanocore_usage_rounds_up() {
        // metrics-server reports CPU in nanocores
        assert_eq!(milli_value("1234567n").unwrap(), 2);
        assert_eq!(milli_value("1000000n").unwrap(), 1);
        assert_eq!(milli_value("0").unwrap(), 0);
    }

    #[test]
    fn test_memory_quantities_to_bytes() {
        assert_eq!(value("16318412Ki").unwrap(), 16_710_053_888);
        assert_eq!(value("128Mi").unwrap(), 134_217_728);
        assert_eq!(value("1.5Gi").unwrap(), 1_610_612_736);
        assert_eq!(value("1G").unwrap(), 1_000_000_000);
        assert_eq!(value("500k").unwrap(), 500_000);
        assert_eq!(value("104857600").unwrap(), 104_857_600);
    }

    #[test]
    fn test_exa_suffix_is_not_an_exponent() {
        assert_eq!(value("1E").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(value("2E2").unwrap(), 200);
    }

    #[test]
    fn test_invalid_quantities_are_rejected() {
        assert_eq!(value(""), Err(QuantityError::Empty));
        assert!(matches!(value("abc"), Err(QuantityError::Invalid(_))));
        assert!(matches!(value("12Xi"), Err(QuantityError::Invalid(_))));
        assert!(matches!(value("1.2.3"), Err(QuantityError::Invalid(_))));
        assert!(matches!(value("-5Mi"), Err(QuantityError::Negative(_))));
        assert!(matches!(value("99999Ei"), Err(QuantityError::OutOfRange(_))));
    }

    #[test]
    fn test_node_displays_truncate() {
        assert_eq!(cpu_display(4000), "4000m");
        assert_eq!(memory_display(16_710_053_888), "15935Mi");
        assert_eq!(memory_display(MIB - 1), "0Mi");
        assert_eq!(storage_display(104_857_600_000), "97Gi");
        assert_eq!(storage_display(GIB - 1), "0Gi");
    }

    #[test]
    fn test_total_conversions_floor() {
        assert_eq!(whole_cores(3999), 3);
        assert_eq!(whole_cores(4000), 4);
        assert_eq!(whole_gibibytes(2 * GIB as u128 - 1), 1);
        assert_eq!(cores_display(12), "12 cores");
        assert_eq!(gibibytes_display(31), "31 GiB");
    }

    #[test]
    fn test_container_display() {
        let resources = ContainerResources {
            cpu_milli: 100,
            memory_bytes: 128 * MIB,
        };
        assert_eq!(container_display(&resources), "CPU: 100m | RAM: 128Mi");
    }
}
