//! Named, cached R2 clients built from one shared configuration

use crate::cache::{CachePolicy, ClientCache};
use crate::client::R2Client;
use crate::config::R2Options;
use crate::error::{Error, Result};
use crate::logging::Logged;
use parking_lot::RwLock;
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client handed out by the factory
pub type SharedClient = Arc<Logged<R2Client>>;

const USER_AGENT: &str = concat!("r2kit/", env!("CARGO_PKG_VERSION"));

/// Configuration together with the HTTP client built from it
struct Settings {
    options: Arc<R2Options>,
    http_client: Client,
}

impl Settings {
    fn new(options: R2Options) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(options.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            options: Arc::new(options),
            http_client,
        })
    }
}

/// Maps logical client names to cached clients.
///
/// Configuration is checked every time a client is constructed, never once
/// up front, so a bad configuration fails each construction the same way
/// until [`ClientFactory::reload`] supplies a good one. Replacing or
/// removing an entry does not affect clients already handed out.
pub struct ClientFactory {
    settings: RwLock<Settings>,
    cache: ClientCache<Logged<R2Client>>,
}

impl ClientFactory {
    pub fn new(options: R2Options) -> Result<Self> {
        Self::with_policy(options, CachePolicy::default())
    }

    pub fn with_policy(options: R2Options, policy: CachePolicy) -> Result<Self> {
        Ok(Self {
            settings: RwLock::new(Settings::new(options)?),
            cache: ClientCache::new(policy),
        })
    }

    /// Current configuration
    pub fn options(&self) -> Arc<R2Options> {
        Arc::clone(&self.settings.read().options)
    }

    /// Check the configuration and return the parsed base URL.
    fn prepare(name: &str, options: &R2Options) -> Result<Url> {
        let checked = options.validate().and_then(|_| options.base_url());
        if let Err(err) = &checked {
            warn!(client = name, error = %err, "Refusing to create R2 client");
        }
        checked
    }

    fn construct(name: &str, settings: &Settings, base_url: Url) -> Logged<R2Client> {
        let client = R2Client::with_base_url(
            name,
            Arc::clone(&settings.options),
            base_url,
            settings.http_client.clone(),
        );
        info!(client = name, "Created R2 client");
        Logged::new(name, client)
    }

    /// Cached client for `name`, created on first use.
    ///
    /// Concurrent first calls for the same name construct one client and
    /// all receive it. A configuration error leaves no entry behind.
    pub fn get_client(&self, name: &str) -> Result<SharedClient> {
        if let Some(client) = self.cache.get(name) {
            debug!(client = name, "Reusing cached R2 client");
            return Ok(client);
        }

        // Held until the entry is stored, so `reload` cannot clear the cache
        // between validation and insertion
        let settings = self.settings.read();
        let base_url = Self::prepare(name, &settings.options)?;
        Ok(self
            .cache
            .get_or_insert_with(name, || Self::construct(name, &settings, base_url)))
    }

    /// Build a fresh client for `name` and make it the cached one.
    pub fn refresh_client(&self, name: &str) -> Result<SharedClient> {
        let settings = self.settings.read();
        let base_url = Self::prepare(name, &settings.options)?;
        let client = self
            .cache
            .replace(name, Self::construct(name, &settings, base_url));
        info!(client = name, "Refreshed R2 client");
        Ok(client)
    }

    /// Drop the cached client for `name`; `true` if there was one
    pub fn try_remove_client(&self, name: &str) -> bool {
        let removed = self.cache.remove(name);
        if removed {
            info!(client = name, "Removed R2 client");
        }
        removed
    }

    /// Swap in new configuration, rebuild the HTTP client (so a changed
    /// `timeout` applies) and drop every cached client.
    ///
    /// On error the previous configuration and cache stay in place.
    pub fn reload(&self, options: R2Options) -> Result<()> {
        let fresh = Settings::new(options)?;
        let mut settings = self.settings.write();
        *settings = fresh;
        self.cache.clear();
        info!("Reloaded R2 configuration");
        Ok(())
    }

    pub fn contains_client(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    /// Number of cached clients
    pub fn len(&self) -> u64 {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_options() -> R2Options {
        R2Options {
            account_id: "acct".to_string(),
            api_token: "token".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            ..R2Options::default()
        }
    }

    #[test]
    fn test_get_client_is_cached() {
        let factory = ClientFactory::new(valid_options()).unwrap();

        let first = factory.get_client("media").unwrap();
        let second = factory.get_client("media").unwrap();
        let other = factory.get_client("logs").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.name(), "media");
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_concurrent_get_client_shares_one_instance() {
        let factory = ClientFactory::new(valid_options()).unwrap();

        let clients: Vec<SharedClient> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| factory.get_client("media").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_refresh_replaces_cached_instance() {
        let factory = ClientFactory::new(valid_options()).unwrap();

        let old = factory.get_client("media").unwrap();
        let refreshed = factory.refresh_client("media").unwrap();
        let later = factory.get_client("media").unwrap();

        assert!(!Arc::ptr_eq(&old, &refreshed));
        assert!(Arc::ptr_eq(&refreshed, &later));
        assert_eq!(old.name(), "media");
    }

    #[test]
    fn test_refresh_creates_missing_entry() {
        let factory = ClientFactory::new(valid_options()).unwrap();

        let refreshed = factory.refresh_client("media").unwrap();

        assert!(Arc::ptr_eq(&refreshed, &factory.get_client("media").unwrap()));
    }

    #[test]
    fn test_try_remove_client() {
        let factory = ClientFactory::new(valid_options()).unwrap();
        let held = factory.get_client("media").unwrap();

        assert!(factory.try_remove_client("media"));
        assert!(!factory.try_remove_client("media"));
        assert!(!factory.try_remove_client("unknown"));

        let recreated = factory.get_client("media").unwrap();
        assert!(!Arc::ptr_eq(&held, &recreated));
        assert_eq!(held.name(), "media");
    }

    #[test]
    fn test_invalid_options_create_no_entry() {
        let mut options = valid_options();
        options.api_token.clear();
        let factory = ClientFactory::new(options).unwrap();

        assert!(matches!(factory.get_client("media"), Err(Error::Config(_))));
        assert!(matches!(factory.get_client("media"), Err(Error::Config(_))));
        assert!(matches!(factory.refresh_client("media"), Err(Error::Config(_))));
        assert!(!factory.contains_client("media"));
        assert!(factory.is_empty());
    }

    #[test]
    fn test_reload_fixes_configuration() {
        let factory = ClientFactory::new(R2Options::default()).unwrap();
        assert!(factory.get_client("media").is_err());

        factory.reload(valid_options()).unwrap();

        assert!(factory.get_client("media").is_ok());
        assert_eq!(factory.options().account_id, "acct");
    }

    #[test]
    fn test_reload_drops_cached_clients() {
        let factory = ClientFactory::new(valid_options()).unwrap();
        let before = factory.get_client("media").unwrap();

        factory
            .reload(R2Options {
                account_id: "other".to_string(),
                ..valid_options()
            })
            .unwrap();
        let after = factory.get_client("media").unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.options().account_id, "other");
        assert_eq!(before.options().account_id, "acct");
    }

    #[test]
    fn test_reload_during_concurrent_gets_leaves_no_stale_client() {
        let factory = ClientFactory::new(valid_options()).unwrap();

        for round in 0..20 {
            let account = format!("acct-{}", round);
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..25 {
                            factory.get_client("media").unwrap();
                        }
                    });
                }
                scope.spawn(|| {
                    factory
                        .reload(R2Options {
                            account_id: account.clone(),
                            ..valid_options()
                        })
                        .unwrap();
                });
            });

            assert_eq!(factory.get_client("media").unwrap().options().account_id, account);
        }
    }

    #[test]
    fn test_reload_with_invalid_options_drops_clients() {
        let factory = ClientFactory::new(valid_options()).unwrap();
        let before = factory.get_client("media").unwrap();

        // Validation happens per construction, not on reload
        factory.reload(R2Options::default()).unwrap();

        assert!(!factory.contains_client("media"));
        assert!(factory.get_client("media").is_err());
        assert_eq!(before.options().account_id, "acct");
    }
}
