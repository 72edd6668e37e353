use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use agora_types::api::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenSettings {
    pub fn issue(&self, user_id: i64, username: &str, token_type: TokenType) -> anyhow::Result<String> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            token_type,
            jti: Uuid::new_v4(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn issue_pair(&self, user_id: i64, username: &str) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(user_id, username, TokenType::Access)?,
            refresh: self.issue(user_id, username, TokenType::Refresh)?,
        })
    }

    /// Decodes and validates `token`, which must be of kind `expected`.
    pub fn verify(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .ok()?;

        (data.claims.token_type == expected).then_some(data.claims)
    }
}
