//! Rotation, revocation, and version-counter lifecycle tests over in-memory
//! stores.
mod support;

use session_service::error::{AuthError, ErrorKind};
use session_service::models::TokenKind;
use session_service::store::RevocationStore;
use support::*;
use uuid::Uuid;

#[tokio::test]
async fn test_rotation_consumes_the_old_token_and_replay_revokes_the_family() {
    let h = harness();
    let principal = seed_principal(&h, "p@example.com");

    // Login under token_version 1.
    let first = h
        .session
        .login("p@example.com", PASSWORD, None, false)
        .await
        .expect("login should succeed");

    // First rotation succeeds and consumes R1.
    let second = h
        .rotation
        .rotate(&first.refresh_token)
        .await
        .expect("first rotation should succeed");

    // Replaying R1 fails and must look like any other bad token.
    let err = h
        .rotation
        .rotate(&first.refresh_token)
        .await
        .expect_err("replay must fail");
    assert!(matches!(err, AuthError::ReplayDetected));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // The replay escalated: the whole family is dead, including R2 which was
    // minted before the escalation.
    let stored = h.credentials.get(principal.id).unwrap();
    assert_eq!(stored.token_version, 2);

    let err = h
        .rotation
        .rotate(&second.refresh_token)
        .await
        .expect_err("tokens from the old version must be dead");
    assert!(matches!(err, AuthError::StaleTokenVersion));

    // The access token issued alongside R2 is dead too.
    let err = h
        .tokens
        .verify(&second.access_token, TokenKind::Access)
        .await
        .expect_err("old-version access token must fail");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_racing_rotations_have_exactly_one_winner() {
    let h = harness();
    seed_principal(&h, "race@example.com");

    let pair = h
        .session
        .login("race@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.rotation.rotate(&pair.refresh_token),
        h.rotation.rotate(&pair.refresh_token),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one racing rotation may succeed");
}

#[tokio::test]
async fn test_rotate_rejects_access_tokens() {
    let h = harness();
    seed_principal(&h, "kind@example.com");

    let pair = h
        .session
        .login("kind@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    let err = h
        .rotation
        .rotate(&pair.access_token)
        .await
        .expect_err("an access token is not exchangeable");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_logout_everywhere_invalidates_every_outstanding_token() {
    let h = harness();
    let principal = seed_principal(&h, "all@example.com");

    let pair_a = h
        .session
        .login("all@example.com", PASSWORD, None, false)
        .await
        .unwrap();
    let pair_b = h
        .session
        .login("all@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    // Neither token was individually revoked.
    h.session.logout_everywhere(principal.id).await.unwrap();

    for token in [&pair_a.access_token, &pair_b.access_token] {
        let err = h
            .tokens
            .verify(token, TokenKind::Access)
            .await
            .expect_err("version bump must invalidate access tokens");
        assert!(matches!(err, AuthError::StaleTokenVersion));
    }

    for token in [&pair_a.refresh_token, &pair_b.refresh_token] {
        let err = h
            .rotation
            .rotate(token)
            .await
            .expect_err("version bump must invalidate refresh tokens");
        assert!(matches!(err, AuthError::StaleTokenVersion));
    }
}

#[tokio::test]
async fn test_password_change_invalidates_sessions() {
    let h = harness();
    let principal = seed_principal(&h, "pw@example.com");

    let pair = h
        .session
        .login("pw@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    h.session
        .change_password(principal.id, PASSWORD, "N3w!Passw0rd#88")
        .await
        .unwrap();

    let err = h
        .tokens
        .verify(&pair.access_token, TokenKind::Access)
        .await
        .expect_err("old sessions must die with the old password");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // And the new password works.
    h.session
        .login("pw@example.com", "N3w!Passw0rd#88", None, false)
        .await
        .expect("login with the new password should succeed");
}

#[tokio::test]
async fn test_fail_secure_when_the_cache_is_unreachable() {
    let h = harness();
    seed_principal(&h, "outage@example.com");

    let pair = h
        .session
        .login("outage@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    h.cache.set_unavailable(true);

    // A token that was never revoked is reported revoked during the outage.
    let revoked = h
        .registry
        .is_revoked(&Uuid::new_v4().to_string())
        .await
        .expect("fail-secure lookup never errors");
    assert!(revoked);

    let err = h
        .tokens
        .verify(&pair.access_token, TokenKind::Access)
        .await
        .expect_err("verification must deny during a cache outage");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // Rotation does not guess: the outage surfaces as a dependency failure,
    // not as a replay escalation.
    let err = h
        .rotation
        .rotate(&pair.refresh_token)
        .await
        .expect_err("rotation must not proceed during a cache outage");
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);

    // Service recovers once the cache does.
    h.cache.set_unavailable(false);
    h.rotation
        .rotate(&pair.refresh_token)
        .await
        .expect("rotation should succeed after the outage clears");
}

#[tokio::test]
async fn test_rotation_requires_a_durably_acknowledged_revocation() {
    let h = harness();
    seed_principal(&h, "durable@example.com");

    let pair = h
        .session
        .login("durable@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    h.durable.set_unavailable(true);

    let err = h
        .rotation
        .rotate(&pair.refresh_token)
        .await
        .expect_err("no new tokens while the durable write cannot be acknowledged");
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
}

#[tokio::test]
async fn test_cache_loss_is_healed_from_the_durable_store() {
    let h = harness();
    seed_principal(&h, "heal@example.com");

    let pair = h
        .session
        .login("heal@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    // Consume the refresh token, then lose the cache.
    h.rotation.rotate(&pair.refresh_token).await.unwrap();
    h.cache.wipe();

    let jti = h
        .tokens
        .signer()
        .decode(&pair.refresh_token, TokenKind::Refresh)
        .map(|c| c.jti)
        // The token is expired-signature-free but consumed; decoding still works.
        .expect("decode should succeed");

    assert!(
        !h.cache.contains_entry(&jti),
        "precondition: cache entry lost"
    );

    // The durable record answers and re-heats the cache.
    assert!(h.registry.is_revoked(&jti).await.unwrap());
    assert!(h.cache.contains_entry(&jti), "read-through must heal the cache");
}

#[tokio::test]
async fn test_logout_revokes_the_presented_pair() {
    let h = harness();
    seed_principal(&h, "bye@example.com");

    let pair = h
        .session
        .login("bye@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    h.session
        .logout(&pair.access_token, Some(&pair.refresh_token))
        .await
        .unwrap();

    let err = h
        .tokens
        .verify(&pair.access_token, TokenKind::Access)
        .await
        .expect_err("revoked access token must fail verification");
    assert!(matches!(err, AuthError::TokenRevoked));

    let err = h
        .rotation
        .rotate(&pair.refresh_token)
        .await
        .expect_err("revoked refresh token must not rotate");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_verified_claims_match_the_principal() {
    let h = harness();
    let principal = seed_principal(&h, "claims@example.com");

    let pair = h
        .session
        .login("claims@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    for (token, kind) in [
        (&pair.access_token, TokenKind::Access),
        (&pair.refresh_token, TokenKind::Refresh),
    ] {
        let claims = h.tokens.verify(token, kind).await.unwrap();
        assert_eq!(claims.sub, principal.id.to_string());
        assert_eq!(claims.role, principal.role);
        assert_eq!(claims.token_version, principal.token_version);
        assert_eq!(claims.token_type, kind);
        assert!(Uuid::parse_str(&claims.jti).is_ok(), "jti must be a UUID");
        assert!(claims.iat <= claims.exp);
    }
}

#[tokio::test]
async fn test_remember_me_survives_rotation() {
    let h = harness();
    seed_principal(&h, "rem@example.com");

    let pair = h
        .session
        .login("rem@example.com", PASSWORD, None, true)
        .await
        .unwrap();

    let rotated = h.rotation.rotate(&pair.refresh_token).await.unwrap();

    let claims = h
        .tokens
        .signer()
        .decode(&rotated.refresh_token, TokenKind::Refresh)
        .unwrap();
    assert!(claims.rem, "remember-me must carry across rotation");

    let standard = h
        .session
        .login("rem@example.com", PASSWORD, None, false)
        .await
        .unwrap();
    let standard_claims = h
        .tokens
        .signer()
        .decode(&standard.refresh_token, TokenKind::Refresh)
        .unwrap();
    assert!(
        claims.exp > standard_claims.exp,
        "extended lifetime must survive rotation"
    );
}

#[tokio::test]
async fn test_sweeper_purges_only_expired_records() {
    let h = harness();
    seed_principal(&h, "gc@example.com");

    let pair = h
        .session
        .login("gc@example.com", PASSWORD, None, false)
        .await
        .unwrap();

    // One live revocation, one already past its token's expiry.
    h.rotation.rotate(&pair.refresh_token).await.unwrap();
    h.durable
        .insert(
            "stale-jti",
            TokenKind::Access,
            chrono::Utc::now() - chrono::Duration::minutes(5),
        )
        .await
        .unwrap();

    assert_eq!(h.durable.len(), 2);
    let purged = h.registry.purge_expired().await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(h.durable.len(), 1);
}
