//! Resume rule: whether a provider's enrichment is already complete.

use crate::Provider;

/// True when the provider already has a result for the current source,
/// either a rating or a "checked, absent" marker, and no refresh is forced.
pub fn should_skip(provider: &Provider, force_refresh: bool) -> bool {
    if force_refresh {
        return false;
    }
    provider.rating.is_some() || provider.checked_at.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn unchecked_provider_is_fetched() {
        let p = Provider::unchecked("p1", "Acme", "Toronto");
        assert!(!should_skip(&p, false));
    }

    #[test]
    fn rated_provider_is_skipped() {
        let mut p = Provider::unchecked("p1", "Acme", "Toronto");
        p.rating = Some(9.1);
        assert!(should_skip(&p, false));
    }

    #[test]
    fn checked_absent_provider_is_skipped() {
        let mut p = Provider::unchecked("p1", "Acme", "Toronto");
        p.checked_at = Some(Utc::now());
        assert!(should_skip(&p, false));
    }

    #[test]
    fn force_refresh_overrides() {
        let mut p = Provider::unchecked("p1", "Acme", "Toronto");
        p.rating = Some(9.1);
        p.checked_at = Some(Utc::now());
        assert!(!should_skip(&p, true));
    }
}
