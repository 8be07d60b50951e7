use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

const DEFAULT_ID_LEN: usize = 10;
const TIME_DIGITS: usize = 6;

/// Short unique id: the last six digits of the millisecond clock followed by
/// random alphanumerics.
pub fn generate_id() -> String {
    generate_id_with_len(DEFAULT_ID_LEN)
}

/// Like [`generate_id`] with a chosen length. The time digits are always
/// kept, so lengths below six still produce six characters.
pub fn generate_id_with_len(len: usize) -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let mut id: String = millis[millis.len().saturating_sub(TIME_DIGITS)..].to_string();

    let remaining = len.saturating_sub(id.len());
    id.extend(
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(remaining)
            .map(char::from),
    );
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_length_and_charset() {
        let id = generate_id();
        assert_eq!(id.len(), 10);
        assert!(id[..6].chars().all(|c| c.is_ascii_digit()));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_short_length_keeps_time_digits() {
        assert_eq!(generate_id_with_len(3).len(), 6);
        assert_eq!(generate_id_with_len(16).len(), 16);
    }

    #[test]
    fn test_ids_are_distinct() {
        let ids: HashSet<String> = (0..100).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 100);
    }
}
