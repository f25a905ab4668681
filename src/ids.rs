//! Opaque 12-character id generation for users and library entries
//! (spec.md §3: "`id` (opaque 12-char token)").

use rand::distributions::Alphanumeric;
use rand::Rng;

const ID_LEN: usize = 12;

pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_twelve_char_ids() {
        let id = generate();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
    }
}
