//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types. `SecretString` redacts itself in `Debug`
//! output, so any config struct that derives or hand-writes `Debug` stays
//! safe to log. Access the value explicitly with `expose_secret()`.
//!
//! Use `SecretString` for:
//! - Verification (CAPTCHA) secret keys
//! - Bearer tokens sent to the relay
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let key = SecretString::from("turnstile-secret");
//! assert!(!format!("{key:?}").contains("turnstile-secret"));
//! assert_eq!(key.expose_secret(), "turnstile-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
