mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use auth::Claims;
use auth::JwtHandler;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use common::RecordingEmailSender;
use common::TestServices;
use common::JWT_AUDIENCE;
use common::JWT_SECRET;
use session_service::background::sweeper::TokenSweeper;
use session_service::domain::session::clock::Clock;
use session_service::domain::session::errors::AuthError;
use session_service::domain::session::errors::StoreError;
use session_service::domain::session::models::EmailAddress;
use session_service::domain::session::models::RegisterCommand;
use session_service::domain::session::models::Token;
use session_service::domain::session::models::TokenKind;
use session_service::domain::session::models::UserId;
use session_service::domain::session::ports::AuthServicePort;
use session_service::domain::session::ports::TokenRepository;
use session_service::domain::session::ports::UserRepository;
use session_service::domain::session::service::AuthService;
use session_service::domain::session::service::SessionSettings;
use session_service::domain::session::service::REFRESH_TOKEN_TTL;
use session_service::domain::session::service::VERIFICATION_TOKEN_TTL;
use session_service::outbound::repositories::InMemoryTokenRepository;
use session_service::outbound::repositories::InMemoryUserRepository;
use tokio::sync::oneshot;
use tokio::sync::Mutex;

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "Str0ng!Pass";

fn registration(email: &str) -> RegisterCommand {
    RegisterCommand {
        email: email.to_string(),
        user_name: "alice".to_string(),
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
        first_name: "Alice".to_string(),
        last_name: "Liddell".to_string(),
    }
}

async fn registered() -> TestServices {
    let services = TestServices::new(SessionSettings::default());
    services
        .service
        .register(registration(EMAIL))
        .await
        .expect("Failed to register");
    services
}

#[tokio::test]
async fn test_second_registration_with_same_email_is_rejected() {
    let services = registered().await;

    let result = services
        .service
        .register(registration("ALICE@example.com"))
        .await;

    assert!(matches!(result, Err(AuthError::EmailTaken)));
}

#[tokio::test]
async fn test_login_issues_fifteen_minute_access_and_seven_day_refresh() {
    let services = registered().await;
    let now = services.clock.now();

    let session = services
        .service
        .login(EMAIL, PASSWORD)
        .await
        .expect("Failed to login");

    assert_eq!(session.user.email.as_str(), EMAIL);
    assert_eq!(session.tokens.access_expires_at, now + Duration::minutes(15));
    assert_eq!(session.tokens.refresh_expires_at, now + REFRESH_TOKEN_TTL);

    let claims = services
        .service
        .validate(&session.tokens.access_token)
        .await
        .expect("Failed to validate");
    assert_eq!(claims.user_id, session.user.id);
    assert_eq!(claims.email, EMAIL);
    assert_eq!(claims.user_name, "alice");
}

#[tokio::test]
async fn test_logout_then_refresh_is_revoked() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    services
        .service
        .logout(&session.tokens.refresh_token)
        .await
        .expect("Failed to logout");

    let result = services.service.refresh(&session.tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn test_refresh_token_expires_after_seven_days() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    services.clock.advance(REFRESH_TOKEN_TTL - Duration::seconds(1));
    assert!(services
        .service
        .refresh(&session.tokens.refresh_token)
        .await
        .is_ok());

    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();
    services.clock.advance(REFRESH_TOKEN_TTL);

    let result = services.service.refresh(&session.tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn test_access_token_expiry_follows_the_clock() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    services.clock.advance(Duration::minutes(15) - Duration::seconds(1));
    assert!(services
        .service
        .validate(&session.tokens.access_token)
        .await
        .is_ok());

    services.clock.advance(Duration::seconds(1));
    let result = services.service.validate(&session.tokens.access_token).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn test_validate_rejects_foreign_issuer_and_audience() {
    let services = registered().await;
    let now = services.clock.now();

    let foreign_issuer = JwtHandler::new(JWT_SECRET, "someone-else", JWT_AUDIENCE)
        .issue("user-1", EMAIL, "alice", now)
        .unwrap();
    let result = services.service.validate(&foreign_issuer.token).await;
    assert!(matches!(result, Err(AuthError::InvalidIssuer)));

    let foreign_audience = JwtHandler::new(JWT_SECRET, common::JWT_ISSUER, "other-clients")
        .issue("user-1", EMAIL, "alice", now)
        .unwrap();
    let result = services.service.validate(&foreign_audience.token).await;
    assert!(matches!(result, Err(AuthError::InvalidAudience)));
}

#[tokio::test]
async fn test_validate_rejects_expired_claims_signed_with_our_key() {
    let services = registered().await;
    let now = services.clock.now();
    let handler = JwtHandler::new(JWT_SECRET, common::JWT_ISSUER, JWT_AUDIENCE);

    let claims = Claims::for_user(
        "user-1",
        EMAIL,
        "alice",
        now - Duration::hours(1),
        Duration::minutes(15),
    )
    .with_issuer(common::JWT_ISSUER)
    .with_audience(JWT_AUDIENCE);
    let token = handler.encode(&claims).unwrap();

    let result = services.service.validate(&token).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn test_change_password_invalidates_every_refresh_token() {
    let services = registered().await;
    let first = services.service.login(EMAIL, PASSWORD).await.unwrap();
    let second = services.service.login(EMAIL, PASSWORD).await.unwrap();
    // Two refresh tokens plus the pending email verification.
    assert_eq!(services.tokens.len().await, 3);

    services
        .service
        .change_password(&first.user.id, PASSWORD, "N3w!Password")
        .await
        .expect("Failed to change password");

    assert!(services.tokens.is_empty().await);
    for session in [first, second] {
        let result = services.service.refresh(&session.tokens.refresh_token).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    assert!(matches!(
        services.service.login(EMAIL, PASSWORD).await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(services.service.login(EMAIL, "N3w!Password").await.is_ok());
}

#[tokio::test]
async fn test_deactivated_account_cannot_refresh() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    let email = EmailAddress::new(EMAIL).unwrap();
    let mut user = services.users.find_by_email(&email).await.unwrap().unwrap();
    user.is_active = false;
    services.users.update(user).await.unwrap();

    let result = services.service.refresh(&session.tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::AccountDeactivated)));

    let result = services.service.login(EMAIL, PASSWORD).await;
    assert!(matches!(result, Err(AuthError::AccountDeactivated)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_one_winner() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();
    let secret = session.tokens.refresh_token;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&services.service);
            let secret = secret.clone();
            tokio::spawn(async move { service.refresh(&secret).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AuthError::TokenRevoked) => {}
            Err(other) => panic!("unexpected refresh outcome: {:?}", other),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(services.tokens.len().await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logout_and_refresh_never_leave_the_token_usable() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();
    let secret = session.tokens.refresh_token;

    let refresh = {
        let service = Arc::clone(&services.service);
        let secret = secret.clone();
        tokio::spawn(async move { service.refresh(&secret).await })
    };
    let logout = {
        let service = Arc::clone(&services.service);
        let secret = secret.clone();
        tokio::spawn(async move { service.logout(&secret).await })
    };

    logout.await.unwrap().expect("Logout should always succeed");
    match refresh.await.unwrap() {
        Ok(_) | Err(AuthError::TokenRevoked) => {}
        Err(other) => panic!("unexpected refresh outcome: {:?}", other),
    }

    let result = services.service.refresh(&secret).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn test_sweeper_removes_expired_tokens_only() {
    let services = registered().await;
    services.service.login(EMAIL, PASSWORD).await.unwrap();

    services.clock.advance(Duration::days(3));
    services.service.login(EMAIL, PASSWORD).await.unwrap();

    services.clock.advance(Duration::days(5));

    let sweeper = TokenSweeper::new(
        Arc::clone(&services.tokens),
        services.clock.clone(),
        StdDuration::from_secs(60),
        StdDuration::from_secs(5),
    );

    // The first refresh token and the day-old verification token.
    let removed = sweeper.sweep_once().await.expect("Failed to sweep");
    assert_eq!(removed, 2);
    assert_eq!(services.tokens.len().await, 1);
}

/// Token store whose next `create` parks until the test releases it.
#[derive(Default)]
struct GatedTokenRepository {
    inner: InMemoryTokenRepository,
    gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    created: Mutex<Vec<Token>>,
}

impl GatedTokenRepository {
    /// Returns (entered, release).
    async fn arm(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().await = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

#[async_trait]
impl TokenRepository for GatedTokenRepository {
    async fn create(&self, token: Token) -> Result<(), StoreError> {
        let gate = self.gate.lock().await.take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.await;
        }
        self.created.lock().await.push(token.clone());
        self.inner.create(token).await
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError> {
        self.inner.find_by_secret(secret).await
    }

    async fn blacklist(&self, secret: &str) -> Result<(), StoreError> {
        self.inner.blacklist(secret).await
    }

    async fn revoke_if_active(&self, secret: &str) -> Result<bool, StoreError> {
        self.inner.revoke_if_active(secret).await
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, StoreError> {
        self.inner.delete_all_for_user(user_id).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.sweep_expired(now).await
    }
}

#[tokio::test]
async fn test_password_change_during_rotation_kills_the_successor() {
    let tokens = Arc::new(GatedTokenRepository::default());
    let service = Arc::new(AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::clone(&tokens),
        Arc::new(RecordingEmailSender::default()),
        common::test_security(common::test_clock()),
        SessionSettings::default(),
    ));
    service.register(registration(EMAIL)).await.unwrap();
    let session = service.login(EMAIL, PASSWORD).await.unwrap();

    let (entered, release) = tokens.arm().await;
    let refresh = {
        let service = Arc::clone(&service);
        let secret = session.tokens.refresh_token.clone();
        tokio::spawn(async move { service.refresh(&secret).await })
    };

    // Old token is revoked and the successor is about to be stored.
    entered.await.expect("Refresh never reached the token store");
    service
        .change_password(&session.user.id, PASSWORD, "N3w!Password")
        .await
        .expect("Failed to change password");
    release.send(()).expect("Refresh task dropped the gate");

    let result = refresh.await.unwrap();
    assert!(matches!(result, Err(AuthError::TokenRevoked)));

    let successor = tokens
        .created
        .lock()
        .await
        .last()
        .cloned()
        .expect("Successor was never stored");
    assert_ne!(successor.secret, session.tokens.refresh_token);
    let result = service.refresh(&successor.secret).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn test_refresh_token_minted_before_password_change_is_dead() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    services
        .service
        .change_password(&session.user.id, PASSWORD, "N3w!Password")
        .await
        .unwrap();

    // Put the old token back as if the purge had missed it.
    let stale = session_token(&services, &session.tokens.refresh_token).await;
    services.tokens.create(stale).await.unwrap();

    let result = services.service.refresh(&session.tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));
}

async fn session_token(services: &TestServices, secret: &str) -> Token {
    let user = services
        .users
        .find_by_email(&EmailAddress::new(EMAIL).unwrap())
        .await
        .unwrap()
        .unwrap();
    let now = services.clock.now();
    Token {
        id: "restored".to_string(),
        user_id: user.id,
        secret: secret.to_string(),
        kind: TokenKind::Refresh,
        expires_at: now + REFRESH_TOKEN_TTL,
        blacklisted: false,
        credential_version: 0,
        created_at: now,
    }
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let services = registered().await;
    let token = services
        .emails
        .last_verification_token(EMAIL)
        .await
        .expect("No verification email sent");

    let profile = services
        .service
        .verify_email(&token)
        .await
        .expect("Failed to verify email");
    assert!(profile.email_verified);

    let result = services.service.verify_email(&token).await;
    assert!(matches!(result, Err(AuthError::TokenRevoked)));

    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();
    assert!(session.user.email_verified);
}

#[tokio::test]
async fn test_verification_token_expires_after_a_day() {
    let services = registered().await;
    let stale = services.emails.last_verification_token(EMAIL).await.unwrap();

    services.clock.advance(VERIFICATION_TOKEN_TTL);
    let result = services.service.verify_email(&stale).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));

    services
        .service
        .resend_verification(EMAIL)
        .await
        .expect("Failed to resend verification");
    let fresh = services.emails.last_verification_token(EMAIL).await.unwrap();
    assert_ne!(fresh, stale);

    assert!(services.service.verify_email(&fresh).await.is_ok());
}

#[tokio::test]
async fn test_resend_is_silent_for_verified_and_unknown_addresses() {
    let services = registered().await;
    let token = services.emails.last_verification_token(EMAIL).await.unwrap();
    services.service.verify_email(&token).await.unwrap();

    services.service.resend_verification(EMAIL).await.unwrap();
    services
        .service
        .resend_verification("nobody@example.com")
        .await
        .unwrap();

    assert_eq!(services.emails.verification_count().await, 1);
}

#[tokio::test]
async fn test_refresh_token_cannot_verify_email() {
    let services = registered().await;
    let session = services.service.login(EMAIL, PASSWORD).await.unwrap();

    let result = services
        .service
        .verify_email(&session.tokens.refresh_token)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));
}
