use gm_api_types::WalletAddress;
use gm_chain_client::{ChainError, WalletProvider};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NoProvider,
    NoneAuthorized,
    Authorized(WalletAddress),
}

/// Account access through the injected wallet, if there is one.
pub struct WalletBridge<P> {
    provider: Option<P>,
}

impl<P: WalletProvider> WalletBridge<P> {
    pub fn new(provider: Option<P>) -> Self {
        Self { provider }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Silent check: never opens a permission prompt.
    pub async fn detect_and_check_authorization(&self) -> Result<AuthorizationStatus, ChainError> {
        let Some(provider) = &self.provider else {
            info!("no wallet provider found, make sure you have MetaMask");
            return Ok(AuthorizationStatus::NoProvider);
        };

        let accounts = provider.request("eth_accounts", json!([])).await?;
        match first_account(accounts)? {
            Some(account) => {
                info!(%account, "found an authorized account");
                Ok(AuthorizationStatus::Authorized(account))
            }
            None => {
                info!("no authorized account found");
                Ok(AuthorizationStatus::NoneAuthorized)
            }
        }
    }

    /// Opens the wallet's permission prompt.
    pub async fn request_authorization(&self) -> Result<WalletAddress, ChainError> {
        let provider = self.provider.as_ref().ok_or(ChainError::NoProviderFound)?;
        let accounts = provider.request("eth_requestAccounts", json!([])).await?;
        let account = first_account(accounts)?.ok_or(ChainError::UserRejected)?;
        info!(%account, "connected");
        Ok(account)
    }
}

fn first_account(accounts: Value) -> Result<Option<WalletAddress>, ChainError> {
    let accounts: Vec<String> = serde_json::from_value(accounts)?;
    Ok(accounts.into_iter().next().map(WalletAddress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_chain_client::mock::MockWalletProvider;

    #[tokio::test]
    async fn missing_provider_is_not_an_error() -> anyhow::Result<()> {
        let bridge = WalletBridge::<MockWalletProvider>::new(None);
        assert_eq!(
            bridge.detect_and_check_authorization().await?,
            AuthorizationStatus::NoProvider
        );
        assert_eq!(
            bridge.request_authorization().await.unwrap_err(),
            ChainError::NoProviderFound
        );
        assert!(!bridge.has_provider());
        Ok(())
    }

    #[tokio::test]
    async fn picks_first_authorized_account() -> anyhow::Result<()> {
        let bridge = WalletBridge::new(Some(MockWalletProvider::with_accounts(&["0xaa", "0xbb"])));
        assert_eq!(
            bridge.detect_and_check_authorization().await?,
            AuthorizationStatus::Authorized(WalletAddress("0xaa".to_owned()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn no_accounts_means_none_authorized() -> anyhow::Result<()> {
        let bridge = WalletBridge::new(Some(MockWalletProvider::with_accounts(&[])));
        assert_eq!(
            bridge.detect_and_check_authorization().await?,
            AuthorizationStatus::NoneAuthorized
        );
        Ok(())
    }

    #[tokio::test]
    async fn request_uses_the_prompting_method() -> anyhow::Result<()> {
        let provider = MockWalletProvider::new();
        provider.respond("eth_requestAccounts", Ok(json!(["0xcc"])));
        let bridge = WalletBridge::new(Some(provider));

        assert_eq!(bridge.request_authorization().await?, WalletAddress("0xcc".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn rejection_and_empty_grants_are_user_rejected() {
        let provider = MockWalletProvider::new();
        provider.respond_once("eth_requestAccounts", Err(ChainError::UserRejected));
        provider.respond_once("eth_requestAccounts", Ok(json!([])));
        let bridge = WalletBridge::new(Some(provider));

        assert_eq!(bridge.request_authorization().await.unwrap_err(), ChainError::UserRejected);
        assert_eq!(bridge.request_authorization().await.unwrap_err(), ChainError::UserRejected);
    }

    #[tokio::test]
    async fn malformed_accounts_are_decode_errors() {
        let provider = MockWalletProvider::new();
        provider.respond("eth_accounts", Ok(json!({ "not": "a list" })));
        let bridge = WalletBridge::new(Some(provider));

        assert!(matches!(
            bridge.detect_and_check_authorization().await,
            Err(ChainError::Decode(_))
        ));
    }
}
