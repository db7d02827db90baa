//! User accounts

use billpay_core::{new_id, KycStatus, RiskLevel};
use billpay_security::PasswordHasher;
use billpay_store::{Document, DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            kyc_status: self.kyc_status,
            risk_level: self.risk_level,
            created_at: self.created_at,
        }
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// User as returned to callers (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub struct UserService {
    store: DocumentStore,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            hasher: PasswordHasher::default(),
        }
    }

    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    fn find_by_email(&self, email: &str) -> PaymentResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .store
            .find_by_field::<User>("email", &email)?
            .into_iter()
            .next())
    }

    pub fn register(&self, new_user: NewUser) -> PaymentResult<User> {
        let email = normalize_email(&new_user.email);
        if !is_valid_email(&email) {
            return Err(PaymentError::Validation(format!(
                "Invalid email address: {}",
                new_user.email
            )));
        }

        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PaymentError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let name = new_user.name.trim();
        if name.is_empty() {
            return Err(PaymentError::Validation("Name is required".to_string()));
        }

        if self.find_by_email(&email)?.is_some() {
            return Err(PaymentError::EmailTaken);
        }

        let user = User {
            id: new_id(),
            email,
            password_hash: self.hasher.hash(&new_user.password),
            name: name.to_string(),
            phone: new_user.phone,
            kyc_status: KycStatus::NotStarted,
            risk_level: RiskLevel::Low,
            created_at: Utc::now(),
        };

        match self.store.insert_unique(&user, "email", &user.email) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(PaymentError::EmailTaken),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user = %user.id, "User registered");

        Ok(user)
    }

    /// Unknown email and wrong password fail the same way
    pub fn login(&self, email: &str, password: &str) -> PaymentResult<User> {
        match self.find_by_email(email)? {
            Some(user) if self.hasher.verify(password, &user.password_hash) => Ok(user),
            _ => Err(PaymentError::InvalidCredentials),
        }
    }

    pub fn get(&self, user_id: &str) -> PaymentResult<User> {
        self.store
            .get::<User>(user_id)?
            .ok_or_else(|| PaymentError::NotFound(format!("User {}", user_id)))
    }

    pub fn update_kyc_status(&self, user_id: &str, status: KycStatus) -> PaymentResult<User> {
        let mut user = self.get(user_id)?;
        user.kyc_status = status;
        self.store.save(&user)?;

        tracing::info!(user = user_id, kyc_status = %status, "KYC status updated");
        Ok(user)
    }

    pub fn update_risk_level(&self, user_id: &str, level: RiskLevel) -> PaymentResult<User> {
        let mut user = self.get(user_id)?;
        user.risk_level = level;
        self.store.save(&user)?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> UserService {
        UserService::new(DocumentStore::in_memory().unwrap())
            .with_hasher(PasswordHasher::with_iterations(1_000))
    }

    fn alice() -> NewUser {
        NewUser {
            email: "Alice@Example.com".to_string(),
            password: "secret123".to_string(),
            name: "Alice".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_register_and_login() {
        let users = service();
        let user = users.register(alice()).unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.kyc_status, KycStatus::NotStarted);
        assert_eq!(user.risk_level, RiskLevel::Low);
        assert!(user.password_hash.starts_with("pbkdf2_sha256$"));

        let logged_in = users.login("alice@example.com", "secret123").unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn test_duplicate_email() {
        let users = service();
        users.register(alice()).unwrap();

        let mut again = alice();
        again.email = "alice@example.com".to_string();
        let err = users.register(again).unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn test_concurrent_registration_same_email() {
        let users = service();

        let outcomes: Vec<PaymentResult<User>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| scope.spawn(|| users.register(alice())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Err(PaymentError::EmailTaken)))
                .count(),
            2
        );
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let users = service();
        users.register(alice()).unwrap();

        let wrong_password = users.login("alice@example.com", "nope").unwrap_err();
        let unknown_email = users.login("bob@example.com", "secret123").unwrap_err();

        assert_eq!(wrong_password.to_string(), "Incorrect email or password");
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[test]
    fn test_registration_validation() {
        let users = service();

        let mut short = alice();
        short.password = "12345".to_string();
        assert!(matches!(users.register(short), Err(PaymentError::Validation(_))));

        let mut nameless = alice();
        nameless.name = "  ".to_string();
        assert!(matches!(users.register(nameless), Err(PaymentError::Validation(_))));

        for email in ["plainaddress", "@example.com", "a@b", "a b@example.com", "a@@b.com"] {
            let mut bad = alice();
            bad.email = email.to_string();
            assert!(users.register(bad).is_err(), "accepted {}", email);
        }
    }

    #[test]
    fn test_update_kyc_status() {
        let users = service();
        let user = users.register(alice()).unwrap();

        users.update_kyc_status(&user.id, KycStatus::Approved).unwrap();
        assert_eq!(users.get(&user.id).unwrap().kyc_status, KycStatus::Approved);

        assert!(matches!(
            users.update_kyc_status("missing", KycStatus::Approved),
            Err(PaymentError::NotFound(_))
        ));
    }

    #[test]
    fn test_profile_hides_password() {
        let user = service().register(alice()).unwrap();
        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["kyc_status"], "not_started");
    }
}
