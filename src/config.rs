use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// `None` selects the in-process store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicy {
    pub min_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingConfig {
    pub max_retries: u32,
    /// Echo the recipe's author-supplied rating from `rate_recipe`
    /// instead of the recomputed average.
    pub echo_base_rating: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub password: PasswordPolicy,
    pub ratings: RatingConfig,
    pub seed_user: Option<SeedUser>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty() && v != "memory");
        let db = DbConfig {
            url,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", 5),
            statement_timeout_ms: env_parse("DB_STATEMENT_TIMEOUT_MS", 5000),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipebox".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recipebox-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        let password = PasswordPolicy {
            min_len: env_parse("PASSWORD_MIN_LEN", 6),
        };
        let ratings = RatingConfig {
            max_retries: env_parse("RATING_MAX_RETRIES", 3),
            echo_base_rating: env_parse("RATING_ECHO_BASE_RATING", false),
        };
        let seed_user = match (std::env::var("SEED_USERNAME"), std::env::var("SEED_PASSWORD")) {
            (Ok(username), Ok(password)) => Some(SeedUser { username, password }),
            _ => None,
        };
        Ok(Self {
            db,
            jwt,
            password,
            ratings,
            seed_user,
        })
    }

    /// Configuration for tests: in-memory store, short-lived secret.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            db: DbConfig {
                url: None,
                max_connections: 1,
                acquire_timeout_secs: 1,
                statement_timeout_ms: 1000,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            password: PasswordPolicy { min_len: 6 },
            ratings: RatingConfig {
                max_retries: 3,
                echo_base_rating: false,
            },
            seed_user: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
