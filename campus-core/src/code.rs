use uuid::Uuid;

pub const ORDER_CODE_PREFIX: &str = "ORD-";

const CODE_HEX_LEN: usize = 12;

/// Generate a candidate order code: `ORD-` plus 12 uppercase hex chars
/// drawn from a v4 UUID (48 bits of entropy). Uniqueness is enforced by
/// the store's constraint; callers retry with a fresh code on collision.
pub fn generate_order_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}",
        ORDER_CODE_PREFIX,
        hex[..CODE_HEX_LEN].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn code_has_stable_format() {
        let code = generate_order_code();
        assert!(code.starts_with("ORD-"));
        assert_eq!(code.len(), ORDER_CODE_PREFIX.len() + CODE_HEX_LEN);
        assert!(code[ORDER_CODE_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let codes: HashSet<String> = (0..10_000).map(|_| generate_order_code()).collect();
        assert_eq!(codes.len(), 10_000);
    }
}
