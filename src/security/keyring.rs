use crate::core::{
    errors::{AppError, AppResult},
    types::Provider,
};

const SERVICE: &str = "scan-assembler";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

fn username_for_provider(provider: &Provider) -> &'static str {
    match provider {
        Provider::Gemini => "gemini",
    }
}

fn entry(provider: &Provider) -> AppResult<keyring::Entry> {
    keyring::Entry::new(SERVICE, username_for_provider(provider))
        .map_err(|err| AppError::Internal(err.to_string()))
}

pub fn set_provider_key(provider: Provider, api_key: &str) -> AppResult<()> {
    if api_key.trim().is_empty() {
        return Err(AppError::InvalidInput("api key cannot be empty".to_string()));
    }
    entry(&provider)?
        .set_password(api_key.trim())
        .map_err(|err| AppError::Internal(err.to_string()))
}

pub fn get_provider_key(provider: Provider) -> AppResult<String> {
    entry(&provider)?
        .get_password()
        .map_err(|_err| AppError::ProviderAuth)
}

/// Keyring first, then the environment. Missing everywhere is a
/// configuration error.
pub fn resolve_api_key(provider: Provider) -> AppResult<String> {
    resolve_with(
        || get_provider_key(provider.clone()).ok(),
        |key| std::env::var(key).ok(),
    )
}

fn resolve_with<K, E>(from_keyring: K, from_env: E) -> AppResult<String>
where
    K: FnOnce() -> Option<String>,
    E: FnOnce(&str) -> Option<String>,
{
    from_keyring()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| from_env(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
        .map(|key| key.trim().to_string())
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "no Gemini API key: run `scan-assembler set-key` or set {API_KEY_ENV}"
            ))
        })
}
