//! Remote configuration fetch, apply and change polling.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use url::form_urlencoded;

use crate::config::AgentConfig;
use crate::observability::metrics;
use crate::registry::auth::TokenManager;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::fingerprint::fingerprint;
use crate::registry::http::{RegistryHttp, CONFIG_PATH, LISTENER_PATH};
use crate::settings::{parse_document, DocumentFormat, Settings, SettingsStore};

/// Header telling the registry how long it may hold a long-poll open.
pub const LONG_POLL_HEADER: &str = "Long-Pulling-Timeout";

/// Raw text of the last fetched document and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    pub content: String,
    pub fingerprint: String,
}

/// Encode the listener watch key for one document.
///
/// Fields are form-encoded, joined by `%02` and the key is terminated by
/// `%01`; an unknown fingerprint is sent as the empty string.
pub fn watch_key(data_id: &str, group: &str, fingerprint: Option<&str>, tenant: &str) -> String {
    format!(
        "{}%02{}%02{}%02{}%01",
        form_encode(data_id),
        form_encode(group),
        form_encode(fingerprint.unwrap_or("")),
        form_encode(tenant)
    )
}

fn form_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Fetches the config document and applies it to a [`SettingsStore`].
pub struct ConfigService<T> {
    http: RegistryHttp,
    tokens: Arc<TokenManager>,
    data_id: String,
    group: String,
    tenant: String,
    format: DocumentFormat,
    long_poll: Duration,
    read_timeout: Duration,
    store: Arc<SettingsStore<T>>,
    document: ArcSwapOption<ConfigDocument>,
}

impl<T: Settings> ConfigService<T> {
    pub fn new(
        http: RegistryHttp,
        tokens: Arc<TokenManager>,
        config: &AgentConfig,
        store: Arc<SettingsStore<T>>,
    ) -> RegistryResult<Self> {
        let format = DocumentFormat::from_extension(&config.registry.file_extension).ok_or_else(
            || {
                RegistryError::Validation(format!(
                    "unsupported document extension '{}'",
                    config.registry.file_extension
                ))
            },
        )?;
        let long_poll = Duration::from_secs(config.listener.long_poll_secs);

        Ok(Self {
            http,
            tokens,
            data_id: config.registry.data_id(&config.instance.app_name),
            group: config.registry.group.clone(),
            tenant: config.registry.namespace.clone(),
            format,
            long_poll,
            read_timeout: long_poll + Duration::from_secs(config.listener.read_timeout_margin_secs),
            store,
            document: ArcSwapOption::empty(),
        })
    }

    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    pub fn store(&self) -> &Arc<SettingsStore<T>> {
        &self.store
    }

    /// Last fetched document, if any.
    pub fn document(&self) -> Option<Arc<ConfigDocument>> {
        self.document.load_full()
    }

    /// Fingerprint the next long-poll compares against.
    pub fn fingerprint(&self) -> Option<String> {
        self.document.load_full().map(|doc| doc.fingerprint.clone())
    }

    /// Watch key for the current fingerprint.
    pub fn watch_key(&self) -> String {
        watch_key(
            &self.data_id,
            &self.group,
            self.fingerprint().as_deref(),
            &self.tenant,
        )
    }

    /// Download the raw document without applying it.
    pub async fn fetch(&self) -> RegistryResult<String> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .client()
            .get(self.http.url(CONFIG_PATH))
            .query(&[
                ("tenant", self.tenant.as_str()),
                ("accessToken", token.as_str()),
                ("dataId", self.data_id.as_str()),
                ("group", self.group.as_str()),
            ])
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        self.tokens.check_rejection(&token, body).await
    }

    /// Download the document, remember its fingerprint and apply it.
    ///
    /// The fingerprint is recorded before validation so a rejected document
    /// does not re-trigger the listener until it changes again.
    pub async fn fetch_and_apply(&self) -> RegistryResult<String> {
        let content = self.fetch().await?;
        let digest = fingerprint(&content);
        self.document.store(Some(Arc::new(ConfigDocument {
            content: content.clone(),
            fingerprint: digest.clone(),
        })));

        let applied = parse_document::<T>(&content, self.format)
            .and_then(|candidate| self.store.apply_if_valid(candidate));

        match applied {
            Ok(_) => {
                metrics::record_config_reload("applied");
                tracing::info!(
                    data_id = %self.data_id,
                    fingerprint = %digest,
                    version = self.store.version(),
                    "Reloaded settings from registry"
                );
                Ok(content)
            }
            Err(e) => {
                metrics::record_config_reload("rejected");
                tracing::error!(
                    data_id = %self.data_id,
                    fingerprint = %digest,
                    error = %e,
                    "Rejected registry document, keeping current settings"
                );
                Err(e.into())
            }
        }
    }

    /// Long-poll the registry. Returns `true` when the watched document changed.
    pub async fn poll_change(&self) -> RegistryResult<bool> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .client()
            .post(self.http.url(LISTENER_PATH))
            .query(&[("accessToken", token.as_str())])
            .header(LONG_POLL_HEADER, self.long_poll.as_millis().to_string())
            .timeout(self.read_timeout)
            .body(format!("Listening-Configs={}", self.watch_key()))
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        let body = self.tokens.check_rejection(&token, body).await?;

        let changed = !body.trim().is_empty();
        metrics::record_longpoll(if changed { "changed" } else { "unchanged" });
        tracing::debug!(data_id = %self.data_id, changed, "Long-poll completed");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_key_with_fingerprint() {
        assert_eq!(
            watch_key("svc.yml", "GROUP", Some("abc123"), "ns-id"),
            "svc.yml%02GROUP%02abc123%02ns-id%01"
        );
    }

    #[test]
    fn test_watch_key_without_fingerprint() {
        assert_eq!(
            watch_key("svc.yml", "GROUP", None, "ns-id"),
            "svc.yml%02GROUP%02%02ns-id%01"
        );
    }

    #[test]
    fn test_watch_key_escapes_field_values() {
        assert_eq!(
            watch_key("svc.yml", "A&B C", Some("abc123"), "ns%1+x"),
            "svc.yml%02A%26B+C%02abc123%02ns%251%2Bx%01"
        );
    }
}
