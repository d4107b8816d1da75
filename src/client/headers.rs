//! Request header profiles rotated across outbound calls.

/// One header set: user-agent plus locale variant.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
];

const LOCALES: &[&str] = &["en-US,en;q=0.9", "en-AU,en;q=0.8", "en-GB,en;q=0.7"];

/// Cross product of user agents and locales, selected round-robin.
pub fn default_pool() -> Vec<HeaderProfile> {
    let mut pool = Vec::with_capacity(USER_AGENTS.len() * LOCALES.len());
    for ua in USER_AGENTS {
        for locale in LOCALES {
            pool.push(HeaderProfile {
                user_agent: ua,
                accept_language: locale,
            });
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_is_non_empty_and_varied() {
        let pool = default_pool();
        assert_eq!(pool.len(), USER_AGENTS.len() * LOCALES.len());
        assert_ne!(pool[0].accept_language, pool[1].accept_language);
    }
}
