use crate::SmsError;

/// Field-level encryption for values stored at rest (phone numbers mostly).
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SmsError>;

    /// Values that were never encrypted are returned unchanged.
    fn decrypt(&self, value: &str) -> Result<String, SmsError>;

    fn is_encrypted(&self, value: &str) -> bool;
}
