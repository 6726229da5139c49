//! TokenVerifier 集成测试
//!
//! ## 测试重点
//! - **端到端流程**：从 JWKS 获取、签名验证到声明校验的完整流程
//! - **短路行为**：任一阶段失败即返回对应错误，不进入后续阶段
//! - **缓存效果**：同一授权方的第二次验证不再请求 JWKS
//! - **并发安全**：多个任务并发验证同一 token

use super::test_helpers::*;
use crate::error::AuthError;
use crate::{KeySet, VerifierConfig};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use tokio::task::JoinSet;

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VerifierConfig {
        VerifierConfig::new(TEST_AUTHORITY)
    }

    // ==================== 场景测试 ====================

    /// 场景 A：标量声明匹配
    #[tokio::test]
    async fn test_scalar_claim_accepted() {
        let mock_server = create_jwks_server(&create_test_key_set(), 1).await;
        let verifier = create_verifier(&mock_server.uri(), config().require_claim("aud", "api"));

        let token = sign_token(json!({ "sub": TEST_SUBJECT, "aud": "api" }));
        assert_eq!(verifier.validate_token(&token).await, Ok(true));
    }

    /// 场景 B：列表声明包含期望值
    #[tokio::test]
    async fn test_list_claim_membership_accepted() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config().require_claim("roles", "admin"));

        let token = sign_token(json!({ "roles": ["admin", "user"] }));
        assert_eq!(verifier.validate_token(&token).await, Ok(true));
    }

    /// 场景 C：列表声明不包含期望值
    #[tokio::test]
    async fn test_list_claim_membership_rejected() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config().require_claim("roles", "admin"));

        let token = sign_token(json!({ "roles": ["user"] }));
        assert_eq!(
            verifier.validate_token(&token).await,
            Err(AuthError::ClaimValidation("roles".to_string()))
        );
    }

    /// 场景 D：kid 不在密钥集中
    #[tokio::test]
    async fn test_unknown_kid_rejected() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config());

        let claims = json!({ "aud": "api" });
        let token = sign_with(&claims, Some("X"), TEST_PRIVATE_KEY_PEM, Algorithm::RS256);
        assert_eq!(
            verifier.validate_token(&token).await,
            Err(AuthError::KeyNotFound("X".to_string()))
        );
    }

    /// 场景 E：同一授权方的第二次调用命中缓存
    #[tokio::test]
    async fn test_second_call_uses_cached_jwks() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, cache) =
            create_fake_verifier(http.clone(), config().require_claim("aud", "api"));

        let token = sign_token(json!({ "aud": "api" }));
        let first = verifier.validate_token(&token).await;
        let second = verifier.validate_token(&token).await;

        assert_eq!(first, Ok(true));
        assert_eq!(first, second, "Repeated validation must be idempotent");
        assert_eq!(http.calls(), 1, "JWKS must be fetched only once");
        assert_eq!(cache.len().await, 1);
    }

    // ==================== 失败路径测试 ====================

    #[tokio::test]
    async fn test_non_rsa_rejected_regardless_of_claims() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http.clone(), config().require_claim("aud", "api"));

        for alg in ["HS256", "ES256", "none"] {
            let token = raw_token(
                &json!({ "alg": alg, "kid": TEST_KID }),
                &json!({ "aud": "api" }),
                "c2ln",
            );
            assert_eq!(
                verifier.validate_token(&token).await,
                Err(AuthError::UnsupportedAlgorithm(alg.to_string()))
            );
        }

        assert_eq!(http.calls(), 0, "Rejected algorithms must not trigger a JWKS fetch");
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config());

        let claims = json!({ "aud": "api" });
        let same_kid = sign_with(&claims, Some(TEST_KID), OTHER_PRIVATE_KEY_PEM, Algorithm::RS256);
        let other_kid = sign_with(&claims, Some(OTHER_KID), OTHER_PRIVATE_KEY_PEM, Algorithm::RS256);

        assert_eq!(
            verifier.validate_token(&same_kid).await,
            Err(AuthError::InvalidSignature)
        );
        assert_eq!(
            verifier.validate_token(&other_kid).await,
            Err(AuthError::KeyNotFound(OTHER_KID.to_string()))
        );
    }

    #[tokio::test]
    async fn test_signature_failure_skips_claims_stage() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config().require_claim("aud", "api"));

        // 声明也不满足，但应先报告签名错误
        let claims = json!({ "aud": "other" });
        let token = sign_with(&claims, Some(TEST_KID), OTHER_PRIVATE_KEY_PEM, Algorithm::RS256);
        assert_eq!(
            verifier.validate_token(&token).await,
            Err(AuthError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_fetch_error_surfaces_and_retries_next_call() {
        let mock_server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&mock_server)
            .await;

        let verifier = create_verifier(&mock_server.uri(), config());
        let token = sign_token(json!({ "aud": "api" }));

        assert!(matches!(verifier.validate_token(&token).await, Err(AuthError::Fetch(_))));
        assert!(matches!(verifier.validate_token(&token).await, Err(AuthError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_malformed_token_rejected() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http.clone(), config());

        assert!(matches!(
            verifier.validate_token("invalid.jwt.token").await,
            Err(AuthError::MalformedToken(_))
        ));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config().with_leeway(0));

        let token = sign_token(json!({ "aud": "api", "exp": now() - 120 }));
        assert_eq!(verifier.validate_token(&token).await, Err(AuthError::Expired));
    }

    // ==================== Bearer 与返回值测试 ====================

    #[tokio::test]
    async fn test_validate_bearer_header() {
        let http = CountingHttp::serving(&create_test_key_set());
        let (verifier, _) = create_fake_verifier(http, config().require_claim("aud", "api"));

        let token = sign_token(json!({ "sub": TEST_SUBJECT, "aud": "api" }));
        let validated = verifier
            .validate_bearer(&format!("Bearer {token}"))
            .await
            .expect("Bearer header should validate");
        assert_eq!(validated.claims().subject(), Some(TEST_SUBJECT));
        assert!(validated.is_verified());

        assert!(matches!(
            verifier.validate_bearer(&token).await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn test_verifiers_sharing_cache() {
        let http = CountingHttp::serving(&create_test_key_set());
        let cache = Arc::new(crate::MemoryCache::new());

        let api = crate::TokenVerifier::with_collaborators(
            config().require_claim("aud", "api"),
            http.clone(),
            cache.clone(),
        )
        .unwrap();
        let admin = crate::TokenVerifier::with_collaborators(
            VerifierConfig::new("https://idp.example.com/").require_claim("roles", "admin"),
            http.clone(),
            cache.clone(),
        )
        .unwrap();

        let token = sign_token(json!({ "aud": "api", "roles": ["admin"] }));
        assert_eq!(api.validate_token(&token).await, Ok(true));
        assert_eq!(admin.validate_token(&token).await, Ok(true));
        assert_eq!(http.calls(), 1);
    }

    // ==================== 并发测试 ====================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_validation() {
        let key_set = KeySet {
            keys: vec![create_test_jwk(), rsa_jwk(OTHER_KID, OTHER_MODULUS)],
        };
        let mock_server = create_jwks_server(&key_set, 1).await;
        let verifier = Arc::new(create_verifier(
            &mock_server.uri(),
            config().require_claim("aud", "api"),
        ));

        let token = sign_token(json!({ "aud": "api" }));
        let mut join_set = JoinSet::new();
        for _ in 0..10 {
            let verifier = verifier.clone();
            let token = token.clone();
            join_set.spawn(async move { verifier.validate_token(&token).await });
        }

        while let Some(result) = join_set.join_next().await {
            assert_eq!(result.unwrap(), Ok(true));
        }
    }
}
