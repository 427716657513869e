#![forbid(unsafe_code)]

/// Caller-chosen token that scopes "this exact attempt" of a write operation.
/// Retries must reuse the key; a missing key is an error, never a generated
/// default, so that true retries stay distinguishable from new requests.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdempotencyKeyError> {
        let value = value.into();
        validate_key(&value)?;
        Ok(Self(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdempotencyKeyError {
    Empty,
    TooLong,
    InvalidChar { ch: char, index: usize },
}

impl IdempotencyKeyError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "idempotency key must not be empty",
            Self::TooLong => "idempotency key is too long",
            Self::InvalidChar { .. } => "idempotency key contains an invalid character",
        }
    }
}

fn validate_key(value: &str) -> Result<(), IdempotencyKeyError> {
    if value.is_empty() {
        return Err(IdempotencyKeyError::Empty);
    }
    if value.len() > 100 {
        return Err(IdempotencyKeyError::TooLong);
    }
    for (index, ch) in value.chars().enumerate() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':' | '/') {
            continue;
        }
        return Err(IdempotencyKeyError::InvalidChar { ch, index });
    }
    Ok(())
}

/// Groups causally related events (e.g. a proposal and its later decision)
/// so a timeline can be reconstructed across entities.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, CorrelationIdError> {
        let value = value.into();
        validate_correlation(&value)?;
        Ok(Self(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorrelationIdError {
    Empty,
    TooLong,
    ContainsWhitespace,
    ContainsControl,
}

impl CorrelationIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "correlation id must not be empty",
            Self::TooLong => "correlation id is too long",
            Self::ContainsWhitespace => "correlation id must not contain whitespace",
            Self::ContainsControl => "correlation id contains control characters",
        }
    }
}

fn validate_correlation(value: &str) -> Result<(), CorrelationIdError> {
    if value.is_empty() {
        return Err(CorrelationIdError::Empty);
    }
    if value.len() > 100 {
        return Err(CorrelationIdError::TooLong);
    }
    if value.chars().any(|c| c.is_whitespace()) {
        return Err(CorrelationIdError::ContainsWhitespace);
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(CorrelationIdError::ContainsControl);
    }
    Ok(())
}
