//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s.trim())
}

/// Stable partition index for a request id
///
/// Messages sharing a request id always land in the same partition,
/// the same way a keyed producer routes by message key. Partition counts
/// above `i32::MAX` are treated as `i32::MAX`.
pub fn partition_for(id: &Uuid, partitions: u32) -> i32 {
    let partitions = partitions.clamp(1, i32::MAX as u32) as u128;
    (id.as_u128() % partitions) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_hyphenated_and_trims() {
        let id = generate();
        assert_eq!(parse(&format!(" {} ", id)).unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("nonexistent-id").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_partition_is_stable_and_bounded() {
        let id = generate();
        let p = partition_for(&id, 4);
        assert!((0..4).contains(&p));
        assert_eq!(p, partition_for(&id, 4));
        assert_eq!(partition_for(&id, 0), 0);
        assert_eq!(partition_for(&Uuid::from_u128(7), 4), 3);
    }

    #[test]
    fn test_partition_never_negative_for_huge_counts() {
        let max_id = Uuid::from_u128(u128::MAX);
        for partitions in [i32::MAX as u32, i32::MAX as u32 + 1, u32::MAX] {
            let p = partition_for(&max_id, partitions);
            assert!(p >= 0, "partition {} for count {}", p, partitions);
        }
        let below_max = Uuid::from_u128(i32::MAX as u128 - 1);
        assert_eq!(partition_for(&below_max, u32::MAX), i32::MAX - 1);
    }
}
