//! Identity pool for simulated clients, read from a line-oriented file.

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use rand::{Rng, seq::SliceRandom};

/// Trims, lower-cases and replaces spaces with dots: `" Ada Lovelace "`
/// becomes `"ada.lovelace"`.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', ".")
}

/// Loads one identity per line, skipping blank lines.
pub fn load_identities(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read user list {}", path.display()))?;
    let identities: Vec<String> = contents
        .lines()
        .map(normalize_identity)
        .filter(|identity| !identity.is_empty())
        .collect();
    ensure!(
        !identities.is_empty(),
        "user list {} contains no identities",
        path.display()
    );
    Ok(identities)
}

pub fn pick_identity<'a, R: Rng + ?Sized>(identities: &'a [String], rng: &mut R) -> Option<&'a str> {
    identities.choose(rng).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn normalizes_like_a_login_name() {
        assert_eq!(normalize_identity("  Ada Lovelace \r"), "ada.lovelace");
        assert_eq!(normalize_identity("GRACE"), "grace");
        assert_eq!(normalize_identity("   "), "");
    }

    #[test]
    fn picks_from_the_pool() {
        let pool = vec!["ada".to_string(), "grace".to_string()];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let picked = pick_identity(&pool, &mut rng).unwrap();
            assert!(pool.iter().any(|identity| identity == picked));
        }
        assert_eq!(pick_identity(&[], &mut rng), None);
    }
}
