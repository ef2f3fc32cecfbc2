use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::Identity;
use crate::health::{DependencyChecker, DependencyStatus};
use crate::ports::{IdentityError, IdentityVerifier};

const USER_PATH: &str = "/auth/v1/user";

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

/// Resolves bearer credentials by asking the identity provider who they belong to.
#[derive(Clone)]
pub struct RemoteIdentityVerifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RemoteIdentityVerifier {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self::with_circuit_breaker(base_url, api_key, 5, 30)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        api_key: Option<String>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    async fn fetch_user(
        client: Client,
        url: String,
        api_key: Option<String>,
        credential: String,
    ) -> Result<Identity, IdentityError> {
        let mut request = client.get(&url).bearer_auth(&credential);
        if let Some(key) = &api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let user = response
                    .json::<UserResponse>()
                    .await
                    .map_err(|e| IdentityError::Unavailable(format!("invalid user payload: {}", e)))?;
                Ok(Identity {
                    user_id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdentityError::Rejected),
            status if status.is_client_error() => Err(IdentityError::Rejected),
            status => Err(IdentityError::Unavailable(format!(
                "identity provider returned {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl IdentityVerifier for RemoteIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), USER_PATH);
        let fut = Self::fetch_user(
            self.client.clone(),
            url,
            self.api_key.clone(),
            credential.to_string(),
        );

        match self
            .circuit_breaker
            .call_with(|e: &IdentityError| e.is_outage(), fut)
            .await
        {
            Ok(identity) => Ok(identity),
            Err(FailsafeError::Rejected) => Err(IdentityError::Unavailable(
                "identity provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl DependencyChecker for RemoteIdentityVerifier {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.circuit_state() {
            "closed" => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            state => DependencyStatus::unhealthy(format!("circuit breaker {}", state)),
        }
    }
}
